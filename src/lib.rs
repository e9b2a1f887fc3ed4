#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::missing_crate_level_docs)]

//! # live-segmenter
//!
//! Cuts a live MPEG transport stream into fixed-duration segments for HTTP live
//! streaming, without decoding or re-encoding anything.
//!
//! The first video and first audio stream of the input are copied into a sequence of
//! transport stream files. A segment ends as soon as the stream clock has advanced by
//! the target duration, and every finished segment is announced through a
//! [`CompletionReporter`](segment::CompletionReporter) so a playlist writer can pick it
//! up.
//!
//! ## Example
//!
//! ```rust,no_run
//! use live_segmenter::format::TSDemuxer;
//! use live_segmenter::segment::{FileSegmentFactory, Pipeline, SegmentOptions, StderrReporter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let input = tokio::fs::File::open("feed.ts").await?;
//!     let mut pipeline = Pipeline::new(
//!         TSDemuxer::new(tokio::io::BufReader::new(input)),
//!         FileSegmentFactory::new("/srv/live", "channel1"),
//!         StderrReporter,
//!         SegmentOptions::new(10.0, "720p"),
//!     );
//!     let summary = pipeline.run().await?;
//!     println!("{} segments", summary.segments);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - `av`: packets, stream descriptors and the demuxer/muxer traits
//! - `codec`: header parsers used to probe streams and spot key frames
//! - `format`: the MPEG transport stream reader and writer
//! - `segment`: stream mapping, segment clock, rotation and the pipeline driver
//! - `config`: command line independent settings
//! - `shutdown`: SIGINT/SIGTERM handling for graceful finalization
//! - `error`: the crate error type
//! - `utils`: bit reader/writer and the MPEG-2 CRC

/// Packets, stream descriptors and container traits
pub mod av;

/// Elementary stream header parsers
pub mod codec;

/// Settings and validated run configuration
pub mod config;

/// Error types
pub mod error;

/// Container formats
pub mod format;

/// Segmenting pipeline
pub mod segment;

/// Process termination signals
pub mod shutdown;

/// Bitstream and checksum helpers
pub mod utils;

pub use error::{Result, SegmenterError};
