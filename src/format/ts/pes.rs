use bytes::{BufMut, BytesMut};

use crate::{Result, SegmenterError};

const PES_START_CODE: [u8; 3] = [0x00, 0x00, 0x01];
const TIMESTAMP_MASK: u64 = 0x1_FFFF_FFFF;

/// The parts of a PES header the segmenter reads or writes.
///
/// Timestamps are 33 bit values in 90 kHz ticks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PESHeader {
    pub stream_id: u8,
    /// PES_packet_length, 0 when unbounded
    pub packet_length: u16,
    pub data_alignment: bool,
    pub pts: Option<u64>,
    pub dts: Option<u64>,
}

impl PESHeader {
    pub fn new(stream_id: u8) -> Self {
        Self {
            stream_id,
            ..Default::default()
        }
    }

    pub fn with_pts(mut self, pts: u64) -> Self {
        self.pts = Some(pts & TIMESTAMP_MASK);
        self
    }

    /// Sets the decode timestamp; it is only written when it differs from the PTS.
    pub fn with_dts(mut self, dts: u64) -> Self {
        self.dts = Some(dts & TIMESTAMP_MASK);
        self
    }

    fn writes_dts(&self) -> bool {
        matches!((self.pts, self.dts), (Some(pts), Some(dts)) if pts != dts)
    }

    fn header_data_length(&self) -> usize {
        match (self.pts.is_some(), self.writes_dts()) {
            (true, true) => 10,
            (true, false) => 5,
            _ => 0,
        }
    }

    /// Bytes `write_to` will produce.
    pub fn encoded_len(&self) -> usize {
        9 + self.header_data_length()
    }

    /// Sets `packet_length` for a payload of `payload_len` bytes, or 0 if it does not fit.
    pub fn sized_for(mut self, payload_len: usize) -> Self {
        let length = self.encoded_len() - 6 + payload_len;
        self.packet_length = u16::try_from(length).unwrap_or(0);
        self
    }

    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_slice(&PES_START_CODE);
        buf.put_u8(self.stream_id);
        buf.put_u16(self.packet_length);

        // '10' marker, no scrambling, not original
        let mut flags = 0x80u8;
        if self.data_alignment {
            flags |= 0x04;
        }
        buf.put_u8(flags);

        let dts = self.writes_dts();
        let pts_dts_flags = match (self.pts.is_some(), dts) {
            (true, true) => 0xC0,
            (true, false) => 0x80,
            _ => 0x00,
        };
        buf.put_u8(pts_dts_flags);
        buf.put_u8(self.header_data_length() as u8);

        if let Some(pts) = self.pts {
            write_timestamp(buf, if dts { 0x30 } else { 0x20 }, pts);
        }
        if dts {
            if let Some(value) = self.dts {
                write_timestamp(buf, 0x10, value);
            }
        }
    }

    /// Parses the header at the start of a PES packet.
    ///
    /// Returns the header and the offset of the elementary stream payload.
    pub fn parse(data: &[u8]) -> Result<(PESHeader, usize)> {
        if data.len() < 6 || data[..3] != PES_START_CODE {
            return Err(SegmenterError::InvalidData("missing PES start code".into()));
        }
        let stream_id = data[3];
        let packet_length = ((data[4] as u16) << 8) | data[5] as u16;
        let mut header = PESHeader {
            stream_id,
            packet_length,
            ..Default::default()
        };

        if !has_optional_header(stream_id) {
            return Ok((header, 6));
        }
        if data.len() < 9 {
            return Err(SegmenterError::InvalidData("PES header truncated".into()));
        }
        header.data_alignment = data[6] & 0x04 != 0;
        let pts_dts_flags = data[7] >> 6;
        let payload_offset = 9 + data[8] as usize;
        if data.len() < payload_offset {
            return Err(SegmenterError::InvalidData("PES header data truncated".into()));
        }

        if pts_dts_flags & 0x02 != 0 {
            header.pts = Some(read_timestamp(&data[9..payload_offset])?);
        }
        if pts_dts_flags == 0x03 {
            header.dts = Some(read_timestamp(&data[14..payload_offset])?);
        }

        Ok((header, payload_offset))
    }
}

// Stream ids without the optional PES header (padding, private_stream_2, ECM, EMM, ...)
fn has_optional_header(stream_id: u8) -> bool {
    !matches!(stream_id, 0xBC | 0xBE | 0xBF | 0xF0 | 0xF1 | 0xF2 | 0xF8 | 0xFF)
}

fn write_timestamp(buf: &mut BytesMut, marker: u8, ts: u64) {
    buf.put_u8(marker | (((ts >> 29) & 0x0E) as u8) | 0x01);
    buf.put_u16((((ts >> 14) & 0xFFFE) | 0x01) as u16);
    buf.put_u16((((ts << 1) & 0xFFFE) | 0x01) as u16);
}

fn read_timestamp(data: &[u8]) -> Result<u64> {
    if data.len() < 5 {
        return Err(SegmenterError::InvalidData("PES timestamp truncated".into()));
    }
    Ok((((data[0] as u64) & 0x0E) << 29)
        | ((data[1] as u64) << 22)
        | (((data[2] as u64) & 0xFE) << 14)
        | ((data[3] as u64) << 7)
        | ((data[4] as u64) >> 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pts_only_header() {
        let mut buf = BytesMut::new();
        let header = PESHeader::new(0xC0).with_pts(90_000).sized_for(10);
        header.write_to(&mut buf);

        assert_eq!(&buf[0..4], &[0x00, 0x00, 0x01, 0xC0]);
        assert_eq!(buf.len(), header.encoded_len());
        // 3 flag bytes, 5 timestamp bytes, 10 payload bytes
        assert_eq!(header.packet_length, 18);
        assert_eq!(buf[7], 0x80);

        let (parsed, offset) = PESHeader::parse(&buf).unwrap();
        assert_eq!(offset, 14);
        assert_eq!(parsed.pts, Some(90_000));
        assert_eq!(parsed.dts, None);
    }

    #[test]
    fn test_dts_written_only_when_distinct() {
        let same = PESHeader::new(0xE0).with_pts(3003).with_dts(3003);
        assert_eq!(same.encoded_len(), 14);

        let mut buf = BytesMut::new();
        let reordered = PESHeader::new(0xE0).with_pts(6006).with_dts(3003);
        reordered.write_to(&mut buf);
        assert_eq!(buf.len(), 19);

        let (parsed, offset) = PESHeader::parse(&buf).unwrap();
        assert_eq!(offset, 19);
        assert_eq!((parsed.pts, parsed.dts), (Some(6006), Some(3003)));
    }

    #[test]
    fn test_large_timestamp_survives() {
        let mut buf = BytesMut::new();
        PESHeader::new(0xE0).with_pts(0x1_2345_6789).write_to(&mut buf);
        assert_eq!(PESHeader::parse(&buf).unwrap().0.pts, Some(0x1_2345_6789));
    }

    #[test]
    fn test_oversized_payload_is_unbounded() {
        let header = PESHeader::new(0xE0).with_pts(0).sized_for(70_000);
        assert_eq!(header.packet_length, 0);
    }

    #[test]
    fn test_rejects_missing_start_code() {
        assert!(PESHeader::parse(&[0x00, 0x00, 0x02, 0xE0, 0, 0]).is_err());
    }
}
