use bytes::Bytes;

/// The NAL unit types the segmenter distinguishes; everything else is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NALUnitType {
    Trail,
    BlaWLp,
    BlaWRadl,
    BlaNLp,
    IdrWRadl,
    IdrNLp,
    Cra,
    Vps,
    Sps,
    Pps,
    Aud,
    Sei,
    Other(u8),
}

impl From<u8> for NALUnitType {
    fn from(value: u8) -> Self {
        match value {
            0 | 1 => NALUnitType::Trail,
            16 => NALUnitType::BlaWLp,
            17 => NALUnitType::BlaWRadl,
            18 => NALUnitType::BlaNLp,
            19 => NALUnitType::IdrWRadl,
            20 => NALUnitType::IdrNLp,
            21 => NALUnitType::Cra,
            32 => NALUnitType::Vps,
            33 => NALUnitType::Sps,
            34 => NALUnitType::Pps,
            35 => NALUnitType::Aud,
            39 | 40 => NALUnitType::Sei,
            other => NALUnitType::Other(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NALUnit {
    pub nal_type: u8,
    pub data: Bytes,
}

impl NALUnit {
    pub fn new(data: Bytes) -> Self {
        let nal_type = data.first().map_or(0, |b| (b >> 1) & 0x3F);
        Self { nal_type, data }
    }

    /// Intra random access point: a decoder can start here.
    pub fn is_keyframe(&self) -> bool {
        (16..=23).contains(&self.nal_type)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SPSInfo {
    pub profile_idc: u8,
    pub level_idc: u8,
    pub chroma_format_idc: u32,
    pub width: u32,
    pub height: u32,
}
