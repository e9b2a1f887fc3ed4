use bytes::Bytes;

#[derive(Debug, Clone)]
pub struct NALUnit {
    pub nal_type: u8,
    pub nal_ref_idc: u8,
    pub data: Bytes,
}

impl NALUnit {
    pub fn new(data: Bytes) -> Self {
        let header = data.first().copied().unwrap_or(0);
        Self {
            nal_type: header & 0x1F,
            nal_ref_idc: (header >> 5) & 0x03,
            data,
        }
    }

    pub fn is_keyframe(&self) -> bool {
        NALUnitType::from(self.nal_type) == NALUnitType::CodedSliceIDR
    }
}

/// Fields of a sequence parameter set the segmenter cares about.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SPSInfo {
    pub profile_idc: u8,
    pub level_idc: u8,
    pub chroma_format_idc: u32,
    pub bit_depth_luma: u32,
    pub width: u32,
    pub height: u32,
    /// `(num_units_in_tick, time_scale)` from the VUI timing info
    pub timing: Option<(u32, u32)>,
}

impl SPSInfo {
    /// Baseline profile forbids B slices.
    pub fn may_have_b_frames(&self) -> bool {
        self.profile_idc != 66
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum NALUnitType {
    Unspecified,
    CodedSliceNonIDR,
    CodedSliceDataPartitionA,
    CodedSliceDataPartitionB,
    CodedSliceDataPartitionC,
    CodedSliceIDR,
    SEI,
    SPS,
    PPS,
    AccessUnitDelimiter,
    EndOfSequence,
    EndOfStream,
    FillerData,
}

impl From<u8> for NALUnitType {
    fn from(value: u8) -> Self {
        match value {
            1 => NALUnitType::CodedSliceNonIDR,
            2 => NALUnitType::CodedSliceDataPartitionA,
            3 => NALUnitType::CodedSliceDataPartitionB,
            4 => NALUnitType::CodedSliceDataPartitionC,
            5 => NALUnitType::CodedSliceIDR,
            6 => NALUnitType::SEI,
            7 => NALUnitType::SPS,
            8 => NALUnitType::PPS,
            9 => NALUnitType::AccessUnitDelimiter,
            10 => NALUnitType::EndOfSequence,
            11 => NALUnitType::EndOfStream,
            12 => NALUnitType::FillerData,
            _ => NALUnitType::Unspecified,
        }
    }
}
