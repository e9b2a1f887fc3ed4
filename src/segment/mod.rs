//! # Segmenting
//!
//! Splits a demuxed stream into consecutive, independently decodable segments of a
//! target duration and reports each finished segment.
//!
//! - [`mapper`]: output stream parameters from the input streams
//! - [`clock`]: segment clock and cut decision
//! - [`writer`]: the open segment and rotation between segments
//! - [`output`]: segment destinations
//! - [`report`]: completion records
//! - [`pipeline`]: the driver tying them together

pub mod clock;
pub mod mapper;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod writer;

pub use clock::{should_cut, ClockSource, ClockState, SegmentClock};
pub use mapper::{map_stream, OutputFormat, OutputLayout, StreamSelection};
pub use output::{FileSegmentFactory, MemorySegmentFactory};
pub use pipeline::{EndReason, Pipeline, PipelineState, PipelineSummary, SegmentOptions};
pub use report::{CompletionRecord, CompletionReporter, StderrReporter};
pub use writer::{SegmentFactory, SegmentState, SegmentWriter, TrailerPolicy};
