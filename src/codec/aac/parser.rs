use super::types::{AACConfig, ADTSHeader, ProfileType};
use crate::utils::BitReader;
use crate::{Result, SegmenterError};

pub const ADTS_SYNC_WORD: u32 = 0xFFF;

/// Parses a 7 byte ADTS header.
pub fn parse_adts_header(data: &[u8]) -> Result<ADTSHeader> {
    if data.len() < 7 {
        return Err(SegmenterError::Parser("ADTS header too short".into()));
    }

    let mut reader = BitReader::new(data);
    if reader.read_bits(12)? != ADTS_SYNC_WORD {
        return Err(SegmenterError::Parser("invalid ADTS sync word".into()));
    }

    let id = reader.read_bits(1)? as u8;
    reader.skip_bits(2)?; // layer
    let protection_absent = reader.read_flag()?;
    let profile = ProfileType::from(reader.read_bits(2)? as u8);
    let sample_rate_index = reader.read_bits(4)? as u8;
    reader.skip_bits(1)?; // private bit
    let channel_configuration = reader.read_bits(3)? as u8;
    reader.skip_bits(4)?; // original/copy, home, copyright id bit and start
    let frame_length = reader.read_bits(13)? as u16;
    reader.skip_bits(11)?; // buffer fullness
    let number_of_raw_blocks = reader.read_bits(2)? as u8;

    if sample_rate_index > 12 {
        return Err(SegmenterError::Parser(format!(
            "reserved ADTS sampling frequency index {}",
            sample_rate_index
        )));
    }

    Ok(ADTSHeader {
        id,
        protection_absent,
        profile,
        sample_rate_index,
        channel_configuration,
        frame_length,
        number_of_raw_blocks,
    })
}

/// Tracks the configuration of an ADTS carried AAC stream.
#[derive(Debug, Default)]
pub struct AACParser {
    config: Option<AACConfig>,
}

impl AACParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans a PES payload for the first ADTS header and remembers its configuration.
    pub fn probe(&mut self, data: &[u8]) -> Option<&AACConfig> {
        let mut pos = 0;
        while pos + 7 <= data.len() {
            if data[pos] == 0xFF && data[pos + 1] & 0xF0 == 0xF0 {
                if let Ok(header) = parse_adts_header(&data[pos..]) {
                    self.config = Some(header.config());
                    break;
                }
            }
            pos += 1;
        }
        self.config.as_ref()
    }

    pub fn config(&self) -> Option<&AACConfig> {
        self.config.as_ref()
    }
}
