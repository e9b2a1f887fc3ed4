//! HEVC parameter set parsing and random access point detection.

pub mod parser;
pub mod types;

pub use parser::{parse_sps, H265Parser};
pub use types::{NALUnit, NALUnitType, SPSInfo};
