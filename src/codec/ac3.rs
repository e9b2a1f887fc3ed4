//! AC-3 (Dolby Digital) sync frame headers.

use crate::av::ChannelLayout;
use crate::{Result, SegmenterError};

pub const AC3_SYNC_WORD: u16 = 0x0B77;
pub const AC3_FRAME_SIZE: u32 = 1536;

const SAMPLE_RATES: [u32; 3] = [48000, 44100, 32000];
const BITRATES_KBPS: [u32; 19] = [
    32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, 448, 512, 576, 640,
];

const FL: u64 = ChannelLayout::FRONT_LEFT;
const FR: u64 = ChannelLayout::FRONT_RIGHT;
const FC: u64 = ChannelLayout::FRONT_CENTER;
const BC: u64 = ChannelLayout::BACK_CENTER;
const SL: u64 = ChannelLayout::SIDE_LEFT;
const SR: u64 = ChannelLayout::SIDE_RIGHT;

// Indexed by acmod
const LAYOUTS: [u64; 8] = [
    FL | FR,
    FC,
    FL | FR,
    FL | FR | FC,
    FL | FR | BC,
    FL | FR | FC | BC,
    FL | FR | SL | SR,
    FL | FR | FC | SL | SR,
];

#[derive(Debug, Clone, PartialEq)]
pub struct Ac3Header {
    pub sample_rate: u32,
    pub bit_rate: u32,
    pub channels: u16,
    pub channel_layout: ChannelLayout,
}

pub fn parse_header(data: &[u8]) -> Result<Ac3Header> {
    if data.len() < 7 {
        return Err(SegmenterError::Parser("AC-3 header too short".into()));
    }
    if u16::from_be_bytes([data[0], data[1]]) != AC3_SYNC_WORD {
        return Err(SegmenterError::Parser("invalid AC-3 sync word".into()));
    }

    let fscod = (data[4] >> 6) as usize;
    let frmsizecod = (data[4] & 0x3F) as usize;
    let bsid = data[5] >> 3;
    if fscod >= SAMPLE_RATES.len() || frmsizecod / 2 >= BITRATES_KBPS.len() || bsid > 10 {
        return Err(SegmenterError::Parser("unsupported AC-3 sync info".into()));
    }

    // acmod follows bsid and bsmod; lfeon sits after the optional mix level fields
    let acmod = (data[6] >> 5) as usize;
    let mut lfe_bit = 4u32;
    if acmod & 0x01 != 0 && acmod != 1 {
        lfe_bit -= 2; // cmixlev
    }
    if acmod & 0x04 != 0 {
        lfe_bit -= 2; // surmixlev
    }
    if acmod == 2 {
        lfe_bit -= 2; // dsurmod
    }
    let lfe = (data[6] >> lfe_bit) & 0x01 == 1;

    let mut layout = LAYOUTS[acmod];
    if lfe {
        layout |= ChannelLayout::LOW_FREQUENCY;
    }
    let channel_layout = ChannelLayout(layout);

    Ok(Ac3Header {
        sample_rate: SAMPLE_RATES[fscod],
        bit_rate: BITRATES_KBPS[frmsizecod / 2] * 1000,
        channels: channel_layout.channels() as u16,
        channel_layout,
    })
}

/// Finds and parses the first sync frame in `data`.
pub fn probe(data: &[u8]) -> Option<Ac3Header> {
    data.windows(2)
        .enumerate()
        .filter(|(_, w)| w[0] == 0x0B && w[1] == 0x77)
        .find_map(|(pos, _)| parse_header(&data[pos..]).ok())
}
