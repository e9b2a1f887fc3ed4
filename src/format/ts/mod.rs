//! # MPEG transport stream
//!
//! A single program reader and writer, enough to carry one segmenting pipeline:
//!
//! - **Demuxing**: PAT/PMT discovery, PES reassembly, codec probing, per-stream discard
//! - **Muxing**: PAT/PMT at the start of every output, PES packetization, PCR on the
//!   video PID, continuity counters that can be carried from one output to the next
//!
//! PSI sections are expected to fit in one transport packet and scrambled packets are
//! dropped.
//!
//! ```rust
//! use live_segmenter::av::{CodecType, Muxer, Packet, StreamDescriptor};
//! use live_segmenter::format::ts::{TSMuxer, MPEG_TIME_BASE, TS_PACKET_SIZE};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut muxer = TSMuxer::new(Vec::new());
//! muxer
//!     .write_header(&[StreamDescriptor::new(0, CodecType::AAC, MPEG_TIME_BASE)])
//!     .await?;
//! muxer.write_packet(&Packet::new(vec![0u8; 64]).with_pts(0)).await?;
//!
//! let (output, _) = muxer.into_parts();
//! assert_eq!(output.len(), 3 * TS_PACKET_SIZE);
//! # Ok(())
//! # }
//! ```

pub mod demuxer;
pub mod muxer;
pub mod parser;
pub mod pes;
pub mod types;

pub use demuxer::{TSDemuxer, DEFAULT_PROBE_SIZE};
pub use muxer::{ContinuityCounters, TSMuxer};
pub use parser::{TSPacket, TSPacketParser};
pub use pes::PESHeader;
pub use types::{
    TSHeader, MPEG_TIME_BASE, PID_PAT, PID_PMT, STREAM_TYPE_AAC, STREAM_TYPE_AC3,
    STREAM_TYPE_H264, STREAM_TYPE_H265, STREAM_TYPE_MPEG2_VIDEO, TS_PACKET_SIZE,
};
