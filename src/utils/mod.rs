//! Bit-level reading/writing and the MPEG-2 CRC32 used by transport stream PSI tables.

/// Bitstream reader and writer
pub mod bits;

/// CRC calculation for PSI sections
pub mod crc;

pub use bits::{BitReader, BitWriter};
pub use crc::Crc32Mpeg2;
