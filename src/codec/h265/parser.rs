use bytes::Bytes;

use super::types::{NALUnit, NALUnitType, SPSInfo};
use crate::codec::h264::{remove_emulation_prevention, split_annexb};
use crate::utils::BitReader;
use crate::{Result, SegmenterError};

/// Tracks the active SPS of an HEVC elementary stream.
#[derive(Debug, Default)]
pub struct H265Parser {
    sps: Option<SPSInfo>,
}

impl H265Parser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse_nalu(&mut self, data: &[u8]) -> Result<NALUnit> {
        if data.len() < 2 {
            return Err(SegmenterError::Parser("truncated HEVC NAL header".into()));
        }
        let nalu = NALUnit::new(Bytes::copy_from_slice(data));
        if NALUnitType::from(nalu.nal_type) == NALUnitType::Sps {
            let rbsp = remove_emulation_prevention(&data[2..]);
            self.sps = Some(parse_sps(&rbsp)?);
        }
        Ok(nalu)
    }

    pub fn probe(&mut self, access_unit: &[u8]) -> Option<&SPSInfo> {
        for unit in split_annexb(access_unit) {
            if let Err(e) = self.parse_nalu(unit) {
                log::debug!("skipping undecodable HEVC NAL unit: {}", e);
            }
        }
        self.sps.as_ref()
    }

    pub fn contains_irap(&self, access_unit: &[u8]) -> bool {
        split_annexb(access_unit)
            .iter()
            .any(|unit| NALUnit::new(Bytes::copy_from_slice(&unit[..1])).is_keyframe())
    }

    pub fn sps(&self) -> Option<&SPSInfo> {
        self.sps.as_ref()
    }
}

fn skip_profile_tier_level(
    reader: &mut BitReader,
    max_sub_layers_minus1: u32,
) -> Result<(u8, u8)> {
    reader.skip_bits(3)?; // general_profile_space, general_tier_flag
    let profile_idc = reader.read_bits(5)? as u8;
    reader.skip_bits(32)?; // compatibility flags
    reader.skip_bits(48)?; // constraint flags
    let level_idc = reader.read_bits(8)? as u8;

    let mut present = Vec::with_capacity(max_sub_layers_minus1 as usize);
    for _ in 0..max_sub_layers_minus1 {
        let profile = reader.read_flag()?;
        let level = reader.read_flag()?;
        present.push((profile, level));
    }
    if max_sub_layers_minus1 > 0 {
        reader.skip_bits(2 * (8 - max_sub_layers_minus1))?;
    }
    for (profile, level) in present {
        if profile {
            reader.skip_bits(88)?;
        }
        if level {
            reader.skip_bits(8)?;
        }
    }
    Ok((profile_idc, level_idc))
}

/// Parses an SPS RBSP (the two byte NAL header already removed).
pub fn parse_sps(data: &[u8]) -> Result<SPSInfo> {
    let mut reader = BitReader::new(data);

    reader.skip_bits(4)?; // sps_video_parameter_set_id
    let max_sub_layers_minus1 = reader.read_bits(3)?;
    reader.skip_bits(1)?;
    let (profile_idc, level_idc) = skip_profile_tier_level(&mut reader, max_sub_layers_minus1)?;

    let _sps_id = reader.read_golomb()?;
    let chroma_format_idc = reader.read_golomb()?;
    if chroma_format_idc == 3 {
        reader.skip_bits(1)?;
    }
    let mut width = reader.read_golomb()?;
    let mut height = reader.read_golomb()?;

    if reader.read_flag()? {
        let (sub_w, sub_h) = match chroma_format_idc {
            1 => (2, 2),
            2 => (2, 1),
            _ => (1, 1),
        };
        let left = reader.read_golomb()?;
        let right = reader.read_golomb()?;
        let top = reader.read_golomb()?;
        let bottom = reader.read_golomb()?;
        width = width.saturating_sub(sub_w * (left + right));
        height = height.saturating_sub(sub_h * (top + bottom));
    }

    if width == 0 || height == 0 {
        return Err(SegmenterError::Parser("HEVC SPS without picture size".into()));
    }

    Ok(SPSInfo {
        profile_idc,
        level_idc,
        chroma_format_idc,
        width,
        height,
    })
}


#[cfg(test)]
mod tests {
    use super::test_streams::*;
    use super::*;

    #[test]
    fn test_probe_reads_cropped_size() {
        let mut parser = H265Parser::new();
        let sps = parser.probe(&irap_access_unit(1920, 1080)).cloned().unwrap();
        assert_eq!((sps.width, sps.height), (1920, 1080));
        assert_eq!(sps.profile_idc, 1);
        assert_eq!(sps.level_idc, 93);
    }

    #[test]
    fn test_irap_detection() {
        let parser = H265Parser::new();
        assert!(parser.contains_irap(&irap_access_unit(640, 480)));
        assert!(!parser.contains_irap(&trail_access_unit()));
    }

    #[test]
    fn test_nal_type_mapping() {
        assert_eq!(NALUnitType::from(33), NALUnitType::Sps);
        assert_eq!(NALUnitType::from(21), NALUnitType::Cra);
        assert_eq!(NALUnitType::from(45), NALUnitType::Other(45));
    }
}
