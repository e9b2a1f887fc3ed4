//! AAC in ADTS framing, as carried in transport streams.

pub mod parser;
pub mod types;

pub use parser::{parse_adts_header, AACParser};
pub use types::{AACConfig, ADTSHeader, ProfileType, AAC_FRAME_SIZE};
