//! MPEG-1/2/2.5 audio (layers I-III) frame headers.

use crate::{Result, SegmenterError};

const SAMPLE_RATES: [[u32; 3]; 3] = [
    [44100, 48000, 32000], // MPEG-1
    [22050, 24000, 16000], // MPEG-2
    [11025, 12000, 8000],  // MPEG-2.5
];

// kbit/s, index 0 is "free format"
const BITRATES_V1: [[u32; 15]; 3] = [
    [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448],
    [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384],
    [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320],
];
const BITRATES_V2: [[u32; 15]; 2] = [
    [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256],
    [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    V1,
    V2,
    V25,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MpegAudioHeader {
    pub version: MpegVersion,
    pub layer: u8,
    pub bit_rate: Option<u32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl MpegAudioHeader {
    pub fn frame_size(&self) -> u32 {
        match (self.layer, self.version) {
            (1, _) => 384,
            (2, _) | (3, MpegVersion::V1) => 1152,
            _ => 576,
        }
    }
}

pub fn parse_header(data: &[u8]) -> Result<MpegAudioHeader> {
    if data.len() < 4 {
        return Err(SegmenterError::Parser("MPEG audio header too short".into()));
    }
    let header = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
    if header >> 21 != 0x7FF {
        return Err(SegmenterError::Parser("invalid MPEG audio sync".into()));
    }

    let version = match (header >> 19) & 0x03 {
        0 => MpegVersion::V25,
        2 => MpegVersion::V2,
        3 => MpegVersion::V1,
        _ => return Err(SegmenterError::Parser("reserved MPEG audio version".into())),
    };
    let layer = match (header >> 17) & 0x03 {
        1 => 3,
        2 => 2,
        3 => 1,
        _ => return Err(SegmenterError::Parser("reserved MPEG audio layer".into())),
    };
    let bitrate_index = ((header >> 12) & 0x0F) as usize;
    let rate_index = ((header >> 10) & 0x03) as usize;
    if bitrate_index == 15 || rate_index == 3 {
        return Err(SegmenterError::Parser("invalid MPEG audio rate index".into()));
    }

    let kbps = match version {
        MpegVersion::V1 => BITRATES_V1[layer as usize - 1][bitrate_index],
        _ if layer == 1 => BITRATES_V2[0][bitrate_index],
        _ => BITRATES_V2[1][bitrate_index],
    };
    let sample_rate = match version {
        MpegVersion::V1 => SAMPLE_RATES[0][rate_index],
        MpegVersion::V2 => SAMPLE_RATES[1][rate_index],
        MpegVersion::V25 => SAMPLE_RATES[2][rate_index],
    };
    let channels = if (header >> 6) & 0x03 == 3 { 1 } else { 2 };

    Ok(MpegAudioHeader {
        version,
        layer,
        bit_rate: (kbps > 0).then_some(kbps * 1000),
        sample_rate,
        channels,
    })
}

/// Finds and parses the first frame header in `data`.
pub fn probe(data: &[u8]) -> Option<MpegAudioHeader> {
    (0..data.len().saturating_sub(3))
        .filter(|&pos| data[pos] == 0xFF && data[pos + 1] & 0xE0 == 0xE0)
        .find_map(|pos| parse_header(&data[pos..]).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer3_128k_44k_stereo() {
        let header = parse_header(&[0xFF, 0xFB, 0x90, 0x00]).unwrap();
        assert_eq!(header.version, MpegVersion::V1);
        assert_eq!(header.layer, 3);
        assert_eq!(header.bit_rate, Some(128_000));
        assert_eq!(header.sample_rate, 44100);
        assert_eq!(header.channels, 2);
        assert_eq!(header.frame_size(), 1152);
    }

    #[test]
    fn test_mono_mpeg2_layer2() {
        // MPEG-2, layer II, 64 kbit/s, 24 kHz, single channel
        let header = parse_header(&[0xFF, 0xF5, 0x84, 0xC0]).unwrap();
        assert_eq!(header.version, MpegVersion::V2);
        assert_eq!(header.layer, 2);
        assert_eq!(header.sample_rate, 24000);
        assert_eq!(header.channels, 1);
        assert_eq!(header.frame_size(), 1152);
    }

    #[test]
    fn test_probe_rejects_garbage() {
        assert!(probe(&[0x00, 0x01, 0x02, 0x03, 0x04]).is_none());
        assert!(probe(&[0x47, 0xFF, 0xFB, 0x90, 0x00]).is_some());
    }
}
