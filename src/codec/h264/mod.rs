//! # H.264/AVC bitstream inspection
//!
//! Only what segmenting needs: splitting Annex B access units into NAL units, reading
//! the sequence parameter set for dimensions, pixel format and frame timing, and
//! spotting IDR pictures.
//!
//! ```rust
//! use live_segmenter::codec::h264::H264Parser;
//!
//! let access_unit = [0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x84];
//! let parser = H264Parser::new();
//! assert!(parser.contains_idr(&access_unit));
//! ```

/// Annex B splitting and parameter set parsing
pub mod parser;
/// NAL unit and parameter set types
pub mod types;

#[doc(inline)]
pub use parser::*;
#[doc(inline)]
pub use types::*;
