use super::types::*;
use crate::utils::Crc32Mpeg2;
use crate::{Result, SegmenterError};

/// One transport packet split into its parts.
#[derive(Debug)]
pub struct TSPacket<'a> {
    pub header: TSHeader,
    pub adaptation: Option<AdaptationField>,
    pub payload: &'a [u8],
}

/// Stateless decoder for transport packets and the PSI tables they carry.
#[derive(Debug, Default, Clone, Copy)]
pub struct TSPacketParser;

impl TSPacketParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_header(&self, data: &[u8]) -> Result<TSHeader> {
        if data.len() < TS_HEADER_SIZE {
            return Err(SegmenterError::InvalidData("TS packet too short".into()));
        }
        if data[0] != SYNC_BYTE {
            return Err(SegmenterError::InvalidData("invalid sync byte".into()));
        }

        Ok(TSHeader {
            transport_error: (data[1] & 0x80) != 0,
            payload_unit_start: (data[1] & 0x40) != 0,
            pid: (((data[1] & 0x1F) as u16) << 8) | data[2] as u16,
            scrambling_control: (data[3] >> 6) & 0x03,
            adaptation_field_exists: (data[3] & 0x20) != 0,
            contains_payload: (data[3] & 0x10) != 0,
            continuity_counter: data[3] & 0x0F,
        })
    }

    /// Parses the adaptation field starting at `data[0]` (its length byte).
    pub fn parse_adaptation_field(&self, data: &[u8]) -> Result<AdaptationField> {
        let length = *data
            .first()
            .ok_or_else(|| SegmenterError::InvalidData("missing adaptation field".into()))?
            as usize;
        if data.len() < length + 1 {
            return Err(SegmenterError::InvalidData("adaptation field too short".into()));
        }

        let mut field = AdaptationField {
            length,
            ..Default::default()
        };
        if length == 0 {
            return Ok(field);
        }

        let flags = data[1];
        field.discontinuity = (flags & 0x80) != 0;
        field.random_access = (flags & 0x40) != 0;
        if (flags & 0x10) != 0 {
            if length < 7 {
                return Err(SegmenterError::InvalidData("PCR data too short".into()));
            }
            field.pcr = Some(read_pcr(&data[2..8]));
        }
        Ok(field)
    }

    pub fn parse_packet<'a>(&self, data: &'a [u8]) -> Result<TSPacket<'a>> {
        if data.len() != TS_PACKET_SIZE {
            return Err(SegmenterError::InvalidData(format!(
                "TS packet of {} bytes",
                data.len()
            )));
        }
        let header = self.parse_header(data)?;

        let mut offset = TS_HEADER_SIZE;
        let mut adaptation = None;
        if header.adaptation_field_exists {
            let field = self.parse_adaptation_field(&data[offset..])?;
            offset += field.length + 1;
            adaptation = Some(field);
        }
        let payload = if header.contains_payload && offset < data.len() {
            &data[offset..]
        } else {
            &[]
        };

        Ok(TSPacket {
            header,
            adaptation,
            payload,
        })
    }

    /// Extracts the table body of a section starting in `payload` (pointer field first).
    ///
    /// Returns the table id and the bytes between the extended header and the CRC. Only
    /// sections that fit in one packet are supported.
    pub fn parse_section<'a>(&self, payload: &'a [u8]) -> Result<(u8, &'a [u8])> {
        let pointer = *payload
            .first()
            .ok_or_else(|| SegmenterError::InvalidData("empty PSI payload".into()))?
            as usize;
        let start = 1 + pointer;
        if payload.len() < start + 3 {
            return Err(SegmenterError::InvalidData("PSI section too short".into()));
        }
        let section = &payload[start..];
        let table_id = section[0];
        let section_length = (((section[1] & 0x0F) as usize) << 8) | section[2] as usize;
        if section_length < 9 || section.len() < 3 + section_length {
            return Err(SegmenterError::InvalidData(format!(
                "PSI section of {} bytes does not fit the packet",
                section_length
            )));
        }
        let section = &section[..3 + section_length];
        if !Crc32Mpeg2::verify(section) {
            return Err(SegmenterError::InvalidData("PSI section CRC mismatch".into()));
        }
        Ok((table_id, &section[8..section.len() - 4]))
    }

    pub fn parse_pat(&self, body: &[u8]) -> Result<PAT> {
        if body.len() % 4 != 0 {
            return Err(SegmenterError::InvalidData("PAT body not a multiple of 4".into()));
        }
        let entries = body
            .chunks_exact(4)
            .map(|entry| PATEntry {
                program_number: ((entry[0] as u16) << 8) | entry[1] as u16,
                pid: (((entry[2] & 0x1F) as u16) << 8) | entry[3] as u16,
            })
            .collect();
        Ok(PAT { entries })
    }

    pub fn parse_pmt(&self, body: &[u8]) -> Result<PMT> {
        if body.len() < 4 {
            return Err(SegmenterError::InvalidData("PMT too short".into()));
        }
        let mut pmt = PMT {
            pcr_pid: (((body[0] & 0x1F) as u16) << 8) | body[1] as u16,
            ..Default::default()
        };

        let program_info_length = (((body[2] & 0x0F) as usize) << 8) | body[3] as usize;
        let mut pos = 4;
        if pos + program_info_length > body.len() {
            return Err(SegmenterError::InvalidData("program info too short".into()));
        }
        pmt.program_descriptors = self.parse_descriptors(&body[pos..pos + program_info_length])?;
        pos += program_info_length;

        while pos + 5 <= body.len() {
            let stream_type = body[pos];
            let elementary_pid = (((body[pos + 1] & 0x1F) as u16) << 8) | body[pos + 2] as u16;
            let es_info_length = (((body[pos + 3] & 0x0F) as usize) << 8) | body[pos + 4] as usize;
            pos += 5;

            if pos + es_info_length > body.len() {
                return Err(SegmenterError::InvalidData("ES info too short".into()));
            }
            let descriptors = self.parse_descriptors(&body[pos..pos + es_info_length])?;
            pos += es_info_length;

            pmt.elementary_stream_infos.push(ElementaryStreamInfo {
                stream_type,
                elementary_pid,
                descriptors,
            });
        }

        Ok(pmt)
    }

    fn parse_descriptors(&self, data: &[u8]) -> Result<Vec<Descriptor>> {
        let mut descriptors = Vec::new();
        let mut pos = 0;

        while pos + 2 <= data.len() {
            let tag = data[pos];
            let length = data[pos + 1] as usize;
            pos += 2;
            if pos + length > data.len() {
                return Err(SegmenterError::InvalidData("descriptor too short".into()));
            }
            descriptors.push(Descriptor {
                tag,
                data: data[pos..pos + length].to_vec(),
            });
            pos += length;
        }

        Ok(descriptors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{BufMut, BytesMut};

    fn psi_packet(pid: u16, section: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        TSHeader {
            payload_unit_start: true,
            pid,
            ..Default::default()
        }
        .write_to(&mut buf);
        buf.put_u8(0);
        buf.put_slice(section);
        buf.resize(TS_PACKET_SIZE, 0xFF);
        buf.to_vec()
    }

    #[test]
    fn test_parse_ts_header() {
        let parser = TSPacketParser::new();
        let header = parser.parse_header(&[0x47, 0x41, 0x00, 0x1A]).unwrap();
        assert!(header.payload_unit_start);
        assert_eq!(header.pid, 0x100);
        assert!(header.contains_payload);
        assert_eq!(header.continuity_counter, 0x0A);
        assert!(parser.parse_header(&[0x46, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_pat_round_trip() {
        let parser = TSPacketParser::new();
        let packet = psi_packet(PID_PAT, &PAT::single_program(PID_PMT).to_section());
        let ts = parser.parse_packet(&packet).unwrap();
        let (table_id, body) = parser.parse_section(ts.payload).unwrap();
        assert_eq!(table_id, TABLE_ID_PAT);
        assert_eq!(parser.parse_pat(body).unwrap().program_map_pid(), Some(PID_PMT));
    }

    #[test]
    fn test_pmt_round_trip() {
        let parser = TSPacketParser::new();
        let pmt = PMT {
            pcr_pid: 0x100,
            program_descriptors: vec![],
            elementary_stream_infos: vec![
                ElementaryStreamInfo {
                    stream_type: STREAM_TYPE_H264,
                    elementary_pid: 0x100,
                    descriptors: vec![],
                },
                ElementaryStreamInfo {
                    stream_type: STREAM_TYPE_PRIVATE_DATA,
                    elementary_pid: 0x101,
                    descriptors: vec![Descriptor {
                        tag: DESCRIPTOR_TAG_AC3,
                        data: vec![0x00],
                    }],
                },
            ],
        };
        let packet = psi_packet(PID_PMT, &pmt.to_section());
        let ts = parser.parse_packet(&packet).unwrap();
        let (table_id, body) = parser.parse_section(ts.payload).unwrap();
        assert_eq!(table_id, TABLE_ID_PMT);
        assert_eq!(parser.parse_pmt(body).unwrap(), pmt);
    }

    #[test]
    fn test_corrupt_section_rejected() {
        let parser = TSPacketParser::new();
        let mut packet = psi_packet(PID_PAT, &PAT::single_program(PID_PMT).to_section());
        packet[14] ^= 0xFF;
        let ts = parser.parse_packet(&packet).unwrap();
        assert!(parser.parse_section(ts.payload).is_err());
    }

    #[test]
    fn test_adaptation_field_with_pcr() {
        let parser = TSPacketParser::new();
        let mut buf = BytesMut::new();
        buf.put_u8(7);
        buf.put_u8(0x50); // random access, PCR
        write_pcr(&mut buf, 2_700_000);
        let field = parser.parse_adaptation_field(&buf).unwrap();
        assert!(field.random_access);
        assert_eq!(field.pcr, Some(2_700_000));
    }
}
