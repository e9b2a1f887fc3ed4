//! MPEG-2 video sequence headers.

use crate::av::Rational;
use crate::{Result, SegmenterError};

const SEQUENCE_HEADER_CODE: [u8; 4] = [0x00, 0x00, 0x01, 0xB3];

// frame_rate_code 1..=8 as (frames, seconds)
const FRAME_RATES: [(i32, i32); 8] = [
    (24000, 1001),
    (24, 1),
    (25, 1),
    (30000, 1001),
    (30, 1),
    (50, 1),
    (60000, 1001),
    (60, 1),
];

#[derive(Debug, Clone, PartialEq)]
pub struct SequenceHeader {
    pub width: u32,
    pub height: u32,
    /// Frames per second
    pub frame_rate: Option<Rational>,
    pub bit_rate: Option<u64>,
}

/// Parses the bytes following a sequence header start code.
pub fn parse_sequence_header(data: &[u8]) -> Result<SequenceHeader> {
    if data.len() < 8 {
        return Err(SegmenterError::Parser("sequence header too short".into()));
    }
    let width = ((data[0] as u32) << 4) | (data[1] as u32 >> 4);
    let height = (((data[1] & 0x0F) as u32) << 8) | data[2] as u32;
    let frame_rate_code = (data[3] & 0x0F) as usize;
    let bit_rate_value =
        ((data[4] as u64) << 10) | ((data[5] as u64) << 2) | (data[6] as u64 >> 6);

    if width == 0 || height == 0 {
        return Err(SegmenterError::Parser("sequence header without picture size".into()));
    }

    let frame_rate = frame_rate_code
        .checked_sub(1)
        .and_then(|i| FRAME_RATES.get(i))
        .map(|&(num, den)| Rational::new(num, den));

    Ok(SequenceHeader {
        width,
        height,
        frame_rate,
        // units of 400 bit/s, all ones means variable
        bit_rate: (bit_rate_value != 0x3FFFF && bit_rate_value != 0).then_some(bit_rate_value * 400),
    })
}

pub fn probe(data: &[u8]) -> Option<SequenceHeader> {
    let pos = data
        .windows(SEQUENCE_HEADER_CODE.len())
        .position(|w| w == SEQUENCE_HEADER_CODE)?;
    parse_sequence_header(&data[pos + SEQUENCE_HEADER_CODE.len()..]).ok()
}

#[cfg(test)]
pub(crate) fn sequence_header(width: u32, height: u32, frame_rate_code: u8) -> Vec<u8> {
    let mut out = SEQUENCE_HEADER_CODE.to_vec();
    out.push((width >> 4) as u8);
    out.push((((width & 0x0F) << 4) | (height >> 8)) as u8);
    out.push(height as u8);
    out.push(0x20 | frame_rate_code);
    // 15 Mbit/s, marker bit, vbv size
    let rate = 15_000_000u32 / 400;
    out.push((rate >> 10) as u8);
    out.push((rate >> 2) as u8);
    out.push((((rate & 0x03) << 6) | 0x20) as u8);
    out.push(0x00);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_sequence_header() {
        let mut data = vec![0x00, 0x00, 0x00];
        data.extend(sequence_header(720, 576, 3));
        let header = probe(&data).unwrap();
        assert_eq!((header.width, header.height), (720, 576));
        assert_eq!(header.frame_rate, Some(Rational::new(25, 1)));
        assert_eq!(header.bit_rate, Some(15_000_000));
    }

    #[test]
    fn test_reserved_frame_rate() {
        let header = probe(&sequence_header(352, 288, 0)).unwrap();
        assert_eq!(header.frame_rate, None);
    }
}
