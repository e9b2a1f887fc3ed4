use bytes::{BufMut, BytesMut};

use crate::av::{CodecType, Rational};
use crate::utils::Crc32Mpeg2;

pub const TS_PACKET_SIZE: usize = 188;
pub const TS_HEADER_SIZE: usize = 4;
pub const TS_PAYLOAD_SIZE: usize = TS_PACKET_SIZE - TS_HEADER_SIZE;
pub const SYNC_BYTE: u8 = 0x47;

// PIDs
pub const PID_PAT: u16 = 0x0000;
pub const PID_PMT: u16 = 0x1000;
pub const PID_NULL: u16 = 0x1FFF;
pub const PID_FIRST_ELEMENTARY: u16 = 0x0100;

// Table IDs
pub const TABLE_ID_PAT: u8 = 0x00;
pub const TABLE_ID_PMT: u8 = 0x02;
pub const TRANSPORT_STREAM_ID: u16 = 1;
pub const PROGRAM_NUMBER: u16 = 1;

// Elementary stream types
pub const STREAM_TYPE_MPEG2_VIDEO: u8 = 0x02;
pub const STREAM_TYPE_MPEG1_AUDIO: u8 = 0x03;
pub const STREAM_TYPE_MPEG2_AUDIO: u8 = 0x04;
pub const STREAM_TYPE_PRIVATE_DATA: u8 = 0x06;
pub const STREAM_TYPE_AAC: u8 = 0x0F;
pub const STREAM_TYPE_H264: u8 = 0x1B;
pub const STREAM_TYPE_H265: u8 = 0x24;
pub const STREAM_TYPE_AC3: u8 = 0x81;

// PES stream IDs
pub const STREAM_ID_VIDEO: u8 = 0xE0;
pub const STREAM_ID_AUDIO: u8 = 0xC0;
pub const STREAM_ID_PRIVATE_1: u8 = 0xBD;

pub const DESCRIPTOR_TAG_AC3: u8 = 0x6A;

pub const PTS_HZ: u64 = 90_000;
pub const PCR_HZ: u64 = 27_000_000;
/// Timestamps inside a transport stream count 90 kHz ticks.
pub const MPEG_TIME_BASE: Rational = Rational::new(1, PTS_HZ as i32);

/// Maps a PMT entry to the codec it carries.
pub fn codec_for_stream_type(stream_type: u8, descriptors: &[Descriptor]) -> CodecType {
    match stream_type {
        STREAM_TYPE_MPEG2_VIDEO => CodecType::MPEG2Video,
        STREAM_TYPE_MPEG1_AUDIO | STREAM_TYPE_MPEG2_AUDIO => CodecType::MP3,
        STREAM_TYPE_AAC => CodecType::AAC,
        STREAM_TYPE_H264 => CodecType::H264,
        STREAM_TYPE_H265 => CodecType::H265,
        STREAM_TYPE_AC3 => CodecType::AC3,
        STREAM_TYPE_PRIVATE_DATA
            if descriptors.iter().any(|d| d.tag == DESCRIPTOR_TAG_AC3) =>
        {
            CodecType::AC3
        }
        _ => CodecType::Data,
    }
}

pub fn stream_type_for_codec(codec: CodecType, sample_rate: u32) -> u8 {
    match codec {
        CodecType::MPEG2Video => STREAM_TYPE_MPEG2_VIDEO,
        CodecType::MP3 if sample_rate > 0 && sample_rate < 32000 => STREAM_TYPE_MPEG2_AUDIO,
        CodecType::MP3 => STREAM_TYPE_MPEG1_AUDIO,
        CodecType::AAC => STREAM_TYPE_AAC,
        CodecType::H264 => STREAM_TYPE_H264,
        CodecType::H265 => STREAM_TYPE_H265,
        CodecType::AC3 => STREAM_TYPE_AC3,
        CodecType::Data => STREAM_TYPE_PRIVATE_DATA,
    }
}

pub fn stream_id_for_codec(codec: CodecType) -> u8 {
    match codec {
        CodecType::H264 | CodecType::H265 | CodecType::MPEG2Video => STREAM_ID_VIDEO,
        CodecType::AAC | CodecType::MP3 => STREAM_ID_AUDIO,
        CodecType::AC3 | CodecType::Data => STREAM_ID_PRIVATE_1,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PATEntry {
    pub program_number: u16,
    /// Network PID when `program_number` is 0, program map PID otherwise
    pub pid: u16,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PAT {
    pub entries: Vec<PATEntry>,
}

impl PAT {
    pub fn single_program(pmt_pid: u16) -> Self {
        Self {
            entries: vec![PATEntry {
                program_number: PROGRAM_NUMBER,
                pid: pmt_pid,
            }],
        }
    }

    /// First entry describing a program (entries for the network PID are skipped).
    pub fn program_map_pid(&self) -> Option<u16> {
        self.entries
            .iter()
            .find(|e| e.program_number != 0)
            .map(|e| e.pid)
    }

    pub fn to_section(&self) -> BytesMut {
        let mut body = BytesMut::with_capacity(self.entries.len() * 4);
        for entry in &self.entries {
            body.put_u16(entry.program_number);
            body.put_u16(0xE000 | (entry.pid & 0x1FFF));
        }
        psi_section(TABLE_ID_PAT, TRANSPORT_STREAM_ID, &body)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    pub tag: u8,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementaryStreamInfo {
    pub stream_type: u8,
    pub elementary_pid: u16,
    pub descriptors: Vec<Descriptor>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PMT {
    pub pcr_pid: u16,
    pub program_descriptors: Vec<Descriptor>,
    pub elementary_stream_infos: Vec<ElementaryStreamInfo>,
}

fn put_descriptors(buf: &mut BytesMut, descriptors: &[Descriptor]) {
    let len: usize = descriptors.iter().map(|d| 2 + d.data.len()).sum();
    buf.put_u16(0xF000 | (len as u16 & 0x0FFF));
    for desc in descriptors {
        buf.put_u8(desc.tag);
        buf.put_u8(desc.data.len() as u8);
        buf.put_slice(&desc.data);
    }
}

impl PMT {
    pub fn to_section(&self) -> BytesMut {
        let mut body = BytesMut::new();
        body.put_u16(0xE000 | (self.pcr_pid & 0x1FFF));
        put_descriptors(&mut body, &self.program_descriptors);
        for info in &self.elementary_stream_infos {
            body.put_u8(info.stream_type);
            body.put_u16(0xE000 | (info.elementary_pid & 0x1FFF));
            put_descriptors(&mut body, &info.descriptors);
        }
        psi_section(TABLE_ID_PMT, PROGRAM_NUMBER, &body)
    }
}

/// Wraps a table body into a long-form PSI section (version 0, current) with its CRC.
pub fn psi_section(table_id: u8, table_id_extension: u16, body: &[u8]) -> BytesMut {
    // 5 bytes of extended header and the CRC follow the length field
    let section_length = body.len() + 5 + 4;
    let mut buf = BytesMut::with_capacity(3 + section_length);
    buf.put_u8(table_id);
    buf.put_u16(0xB000 | (section_length as u16 & 0x03FF));
    buf.put_u16(table_id_extension);
    buf.put_u8(0xC1);
    buf.put_u8(0); // section_number
    buf.put_u8(0); // last_section_number
    buf.put_slice(body);
    let crc = Crc32Mpeg2::checksum(&buf);
    buf.put_u32(crc);
    buf
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdaptationField {
    /// Value of the adaptation_field_length byte
    pub length: usize,
    pub discontinuity: bool,
    pub random_access: bool,
    /// Program clock reference in 27 MHz units
    pub pcr: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TSHeader {
    pub transport_error: bool,
    pub payload_unit_start: bool,
    pub pid: u16,
    pub scrambling_control: u8,
    pub adaptation_field_exists: bool,
    pub contains_payload: bool,
    pub continuity_counter: u8,
}

impl Default for TSHeader {
    fn default() -> Self {
        Self {
            transport_error: false,
            payload_unit_start: false,
            pid: PID_NULL,
            scrambling_control: 0,
            adaptation_field_exists: false,
            contains_payload: true,
            continuity_counter: 0,
        }
    }
}

impl TSHeader {
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u8(SYNC_BYTE);

        let mut b1 = ((self.pid >> 8) & 0x1F) as u8;
        if self.transport_error {
            b1 |= 0x80;
        }
        if self.payload_unit_start {
            b1 |= 0x40;
        }
        buf.put_u8(b1);
        buf.put_u8((self.pid & 0xFF) as u8);

        let mut b3 = (self.scrambling_control & 0x03) << 6;
        if self.adaptation_field_exists {
            b3 |= 0x20;
        }
        if self.contains_payload {
            b3 |= 0x10;
        }
        b3 |= self.continuity_counter & 0x0F;
        buf.put_u8(b3);
    }
}

/// Splits a 27 MHz clock into the 33 bit base and 9 bit extension of the PCR field.
pub fn write_pcr(buf: &mut BytesMut, pcr: u64) {
    let base = (pcr / 300) & 0x1_FFFF_FFFF;
    let ext = pcr % 300;
    buf.put_u32((base >> 1) as u32);
    buf.put_u8((((base & 0x01) << 7) as u8) | 0x7E | ((ext >> 8) as u8 & 0x01));
    buf.put_u8((ext & 0xFF) as u8);
}

pub fn read_pcr(data: &[u8]) -> u64 {
    let base = ((data[0] as u64) << 25)
        | ((data[1] as u64) << 17)
        | ((data[2] as u64) << 9)
        | ((data[3] as u64) << 1)
        | ((data[4] as u64) >> 7);
    let ext = (((data[4] & 0x01) as u64) << 8) | data[5] as u64;
    base * 300 + ext
}
