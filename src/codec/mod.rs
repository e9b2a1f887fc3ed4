//! Elementary stream header parsers.
//!
//! Nothing here decodes media. The parsers read just enough of each bitstream to
//! describe a stream (picture size, sample rate, frame timing) and to spot key frames.

pub mod aac;
pub mod ac3;
pub mod h264;
pub mod h265;
pub mod keyframe;
pub mod mpa;
pub mod mpeg2;
pub mod probe;

pub use keyframe::{inspector_for, KeyframeInspector};
pub use probe::StreamProber;
