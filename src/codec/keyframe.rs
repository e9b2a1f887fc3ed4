//! Per-codec key frame detection on elementary stream payloads.

use crate::av::CodecType;
use crate::codec::h264::H264Parser;
use crate::codec::h265::H265Parser;

/// Looks inside an access unit to tell whether a decoder could start from it.
pub trait KeyframeInspector: Send {
    fn is_keyframe(&self, access_unit: &[u8]) -> bool;
}

impl KeyframeInspector for H264Parser {
    fn is_keyframe(&self, access_unit: &[u8]) -> bool {
        self.contains_idr(access_unit)
    }
}

impl KeyframeInspector for H265Parser {
    fn is_keyframe(&self, access_unit: &[u8]) -> bool {
        self.contains_irap(access_unit)
    }
}

/// Returns an inspector for `codec`, or `None` when key frames cannot be detected for it.
pub fn inspector_for(codec: CodecType) -> Option<Box<dyn KeyframeInspector>> {
    match codec {
        CodecType::H264 => Some(Box::new(H264Parser::new())),
        CodecType::H265 => Some(Box::new(H265Parser::new())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::h264::parser::test_streams;

    #[test]
    fn test_h264_inspector() {
        let inspector = inspector_for(CodecType::H264).unwrap();
        assert!(inspector.is_keyframe(&test_streams::idr_access_unit(320, 240, None)));
        assert!(!inspector.is_keyframe(&test_streams::slice_access_unit()));
    }

    #[test]
    fn test_no_inspector_for_mpeg2_or_audio() {
        assert!(inspector_for(CodecType::MPEG2Video).is_none());
        assert!(inspector_for(CodecType::AAC).is_none());
    }
}
