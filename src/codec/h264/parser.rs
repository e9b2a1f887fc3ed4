use bytes::{BufMut, Bytes, BytesMut};

use super::types::{NALUnit, NALUnitType, SPSInfo};
use crate::utils::BitReader;
use crate::{Result, SegmenterError};

const ANNEXB_START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// Splits an Annex B byte stream into NAL unit payloads (start codes removed).
pub fn split_annexb(data: &[u8]) -> Vec<&[u8]> {
    let mut units = Vec::new();
    let mut start = None;
    let mut i = 0;

    while i + 2 < data.len() {
        if data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 1 {
            if let Some(s) = start {
                units.push(trim_trailing_zeros(&data[s..i]));
            }
            i += 3;
            start = Some(i);
        } else {
            i += 1;
        }
    }

    match start {
        Some(s) if s < data.len() => units.push(&data[s..]),
        Some(_) => {}
        None if !data.is_empty() => units.push(data),
        None => {}
    }

    units.retain(|unit| !unit.is_empty());
    units
}

fn trim_trailing_zeros(data: &[u8]) -> &[u8] {
    let end = data.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
    &data[..end]
}

/// Strips emulation prevention bytes (`00 00 03`) to recover the RBSP.
pub fn remove_emulation_prevention(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut zeros = 0;

    for &byte in data {
        if zeros >= 2 && byte == 0x03 {
            zeros = 0;
            continue;
        }
        zeros = if byte == 0 { zeros + 1 } else { 0 };
        out.push(byte);
    }

    out
}

#[derive(Debug, Default)]
pub struct H264Parser {
    sps: Option<SPSInfo>,
    sps_nal: Option<Bytes>,
    pps_nal: Option<Bytes>,
}

impl H264Parser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse_nalu(&mut self, data: &[u8]) -> Result<NALUnit> {
        if data.is_empty() {
            return Err(SegmenterError::Parser("empty NAL unit".into()));
        }
        let nalu = NALUnit::new(Bytes::copy_from_slice(data));

        match NALUnitType::from(nalu.nal_type) {
            NALUnitType::SPS => {
                let rbsp = remove_emulation_prevention(&data[1..]);
                self.sps = Some(parse_sps(&rbsp)?);
                self.sps_nal = Some(nalu.data.clone());
            }
            NALUnitType::PPS => {
                self.pps_nal = Some(nalu.data.clone());
            }
            _ => {}
        }

        Ok(nalu)
    }

    /// Feeds one access unit; returns the sequence parameters once an SPS was seen.
    pub fn probe(&mut self, access_unit: &[u8]) -> Option<&SPSInfo> {
        for unit in split_annexb(access_unit) {
            if let Err(e) = self.parse_nalu(unit) {
                log::debug!("skipping undecodable NAL unit: {}", e);
            }
        }
        self.sps.as_ref()
    }

    pub fn contains_idr(&self, access_unit: &[u8]) -> bool {
        split_annexb(access_unit)
            .iter()
            .any(|unit| NALUnit::new(Bytes::copy_from_slice(&unit[..1])).is_keyframe())
    }

    pub fn sps(&self) -> Option<&SPSInfo> {
        self.sps.as_ref()
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.sps.as_ref().map(|sps| (sps.width, sps.height))
    }

    /// SPS and PPS in Annex B form, usable as out-of-band codec data.
    pub fn parameter_sets(&self) -> Option<Bytes> {
        let sps = self.sps_nal.as_ref()?;
        let pps = self.pps_nal.as_ref()?;
        let mut buf = BytesMut::with_capacity(sps.len() + pps.len() + 8);
        buf.put_slice(&ANNEXB_START_CODE);
        buf.put_slice(sps);
        buf.put_slice(&ANNEXB_START_CODE);
        buf.put_slice(pps);
        Some(buf.freeze())
    }
}

fn is_high_profile(profile_idc: u8) -> bool {
    matches!(
        profile_idc,
        100 | 110 | 122 | 244 | 44 | 83 | 86 | 118 | 128 | 138 | 139 | 134 | 135
    )
}

/// Parses an SPS RBSP (NAL header byte already removed).
pub fn parse_sps(data: &[u8]) -> Result<SPSInfo> {
    let mut reader = BitReader::new(data);

    let profile_idc = reader.read_bits(8)? as u8;
    reader.skip_bits(8)?; // constraint flags and reserved bits
    let level_idc = reader.read_bits(8)? as u8;
    reader.read_golomb()?; // seq_parameter_set_id

    let mut chroma_format_idc = 1;
    let mut bit_depth_luma = 8;
    if is_high_profile(profile_idc) {
        chroma_format_idc = reader.read_golomb()?;
        if chroma_format_idc == 3 {
            reader.skip_bits(1)?; // separate_colour_plane_flag
        }
        bit_depth_luma = reader.read_golomb()? + 8;
        reader.read_golomb()?; // bit_depth_chroma_minus8
        reader.skip_bits(1)?; // qpprime_y_zero_transform_bypass_flag

        if reader.read_flag()? {
            let count = if chroma_format_idc != 3 { 8 } else { 12 };
            for i in 0..count {
                if reader.read_flag()? {
                    skip_scaling_list(&mut reader, if i < 6 { 16 } else { 64 })?;
                }
            }
        }
    }

    reader.read_golomb()?; // log2_max_frame_num_minus4
    let pic_order_cnt_type = reader.read_golomb()?;
    if pic_order_cnt_type == 0 {
        reader.read_golomb()?; // log2_max_pic_order_cnt_lsb_minus4
    } else if pic_order_cnt_type == 1 {
        reader.skip_bits(1)?; // delta_pic_order_always_zero_flag
        reader.read_signed_golomb()?; // offset_for_non_ref_pic
        reader.read_signed_golomb()?; // offset_for_top_to_bottom_field
        let cycle = reader.read_golomb()?;
        for _ in 0..cycle {
            reader.read_signed_golomb()?;
        }
    }

    reader.read_golomb()?; // max_num_ref_frames
    reader.skip_bits(1)?; // gaps_in_frame_num_value_allowed_flag

    let pic_width_in_mbs = reader.read_golomb()? + 1;
    let pic_height_in_map_units = reader.read_golomb()? + 1;
    let frame_mbs_only = reader.read_flag()?;
    if !frame_mbs_only {
        reader.skip_bits(1)?; // mb_adaptive_frame_field_flag
    }
    reader.skip_bits(1)?; // direct_8x8_inference_flag

    let field_factor = if frame_mbs_only { 1 } else { 2 };
    let mut width = pic_width_in_mbs * 16;
    let mut height = field_factor * pic_height_in_map_units * 16;

    if reader.read_flag()? {
        let (crop_unit_x, crop_unit_y) = match chroma_format_idc {
            0 => (1, field_factor),
            1 => (2, 2 * field_factor),
            2 => (2, field_factor),
            _ => (1, field_factor),
        };
        let left = reader.read_golomb()?;
        let right = reader.read_golomb()?;
        let top = reader.read_golomb()?;
        let bottom = reader.read_golomb()?;
        width = width.saturating_sub((left + right) * crop_unit_x);
        height = height.saturating_sub((top + bottom) * crop_unit_y);
    }

    // VUI is optional and may be truncated in the wild; keep what was read so far
    let timing = if reader.read_flag().unwrap_or(false) {
        parse_vui_timing(&mut reader).unwrap_or(None)
    } else {
        None
    };

    Ok(SPSInfo {
        profile_idc,
        level_idc,
        chroma_format_idc,
        bit_depth_luma,
        width,
        height,
        timing,
    })
}

fn parse_vui_timing(reader: &mut BitReader) -> Result<Option<(u32, u32)>> {
    if reader.read_flag()? {
        let aspect_ratio_idc = reader.read_bits(8)?;
        if aspect_ratio_idc == 255 {
            reader.skip_bits(32)?; // sar_width, sar_height
        }
    }
    if reader.read_flag()? {
        reader.skip_bits(1)?; // overscan_appropriate_flag
    }
    if reader.read_flag()? {
        reader.skip_bits(4)?; // video_format, video_full_range_flag
        if reader.read_flag()? {
            reader.skip_bits(24)?; // colour_primaries, transfer, matrix
        }
    }
    if reader.read_flag()? {
        reader.read_golomb()?;
        reader.read_golomb()?;
    }
    if reader.read_flag()? {
        let num_units_in_tick = reader.read_bits(32)?;
        let time_scale = reader.read_bits(32)?;
        if num_units_in_tick > 0 && time_scale > 0 {
            return Ok(Some((num_units_in_tick, time_scale)));
        }
    }
    Ok(None)
}

fn skip_scaling_list(reader: &mut BitReader, size: usize) -> Result<()> {
    let mut last_scale = 8;
    let mut next_scale = 8;
    for _ in 0..size {
        if next_scale != 0 {
            let delta_scale = reader.read_signed_golomb()?;
            next_scale = (last_scale + delta_scale + 256) % 256;
        }
        last_scale = if next_scale == 0 { last_scale } else { next_scale };
    }
    Ok(())
}
