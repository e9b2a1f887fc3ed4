use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::report::{CompletionRecord, CompletionReporter};
use crate::av::{Muxer, Packet, StreamDescriptor, WriteStatus};
use crate::{Result, SegmenterError};

/// When container trailers are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrailerPolicy {
    /// Only the last segment of the stream gets a trailer.
    #[default]
    FinalSegmentOnly,
    EverySegment,
}

impl FromStr for TrailerPolicy {
    type Err = SegmenterError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "final-segment-only" => Ok(TrailerPolicy::FinalSegmentOnly),
            "every-segment" => Ok(TrailerPolicy::EverySegment),
            other => Err(SegmenterError::Config(format!(
                "unknown trailer policy '{}', expected final-segment-only or every-segment",
                other
            ))),
        }
    }
}

impl fmt::Display for TrailerPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TrailerPolicy::FinalSegmentOnly => "final-segment-only",
            TrailerPolicy::EverySegment => "every-segment",
        })
    }
}

/// Opens and closes the destination of each segment.
#[async_trait]
pub trait SegmentFactory: Send {
    type Output: Muxer;

    /// Opens the destination for segment `sequence` and binds a muxer to it.
    async fn create(&mut self, sequence: u32) -> Result<Self::Output>;

    /// Releases the destination of a finished segment.
    async fn close(&mut self, sequence: u32, output: Self::Output) -> Result<()>;
}

/// The open segment.
pub struct SegmentState<M> {
    pub sequence: u32,
    pub output: M,
    /// Clock time the segment started at, in seconds
    pub start_time: f64,
    pub packets_written: u64,
}

/// Owns the open segment and moves the stream from one segment to the next.
pub struct SegmentWriter<F: SegmentFactory, R: CompletionReporter> {
    factory: F,
    reporter: R,
    policy: TrailerPolicy,
    encoding_profile: String,
    streams: Vec<StreamDescriptor>,
    current: Option<SegmentState<F::Output>>,
    last_sequence: u32,
}

impl<F: SegmentFactory, R: CompletionReporter> SegmentWriter<F, R> {
    pub const FIRST_SEQUENCE: u32 = 1;

    pub fn new(factory: F, reporter: R, policy: TrailerPolicy, encoding_profile: String) -> Self {
        Self {
            factory,
            reporter,
            policy,
            encoding_profile,
            streams: Vec::new(),
            current: None,
            last_sequence: 0,
        }
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    pub fn into_parts(self) -> (F, R) {
        (self.factory, self.reporter)
    }

    /// Sequence number of the open segment, or of the last one once finalized.
    pub fn sequence(&self) -> u32 {
        self.current
            .as_ref()
            .map_or(self.last_sequence, |segment| segment.sequence)
    }

    pub fn current(&self) -> Option<&SegmentState<F::Output>> {
        self.current.as_ref()
    }

    /// Moves the start of the open segment, once the clock knows where it really began.
    pub fn align_start(&mut self, start_time: f64) {
        if let Some(segment) = self.current.as_mut() {
            segment.start_time = start_time;
        }
    }

    /// Opens segment 1 for `streams`.
    pub async fn open_first(&mut self, streams: Vec<StreamDescriptor>, start_time: f64) -> Result<()> {
        self.streams = streams;
        self.open(Self::FIRST_SEQUENCE, start_time).await
    }

    async fn open(&mut self, sequence: u32, start_time: f64) -> Result<()> {
        let mut output = self.factory.create(sequence).await?;
        output
            .write_header(&self.streams)
            .await
            .map_err(|e| SegmenterError::Header {
                sequence,
                reason: e.to_string(),
            })?;
        debug!("segment {} opened at {:.3}s", sequence, start_time);
        self.current = Some(SegmentState {
            sequence,
            output,
            start_time,
            packets_written: 0,
        });
        Ok(())
    }

    fn take_current(&mut self) -> Result<SegmentState<F::Output>> {
        self.current
            .take()
            .ok_or_else(|| SegmenterError::InvalidData("no segment is open".into()))
    }

    /// Writes `packet` into the open segment.
    pub async fn write(&mut self, packet: &Packet) -> Result<WriteStatus> {
        let segment = self
            .current
            .as_mut()
            .ok_or_else(|| SegmenterError::InvalidData("no segment is open".into()))?;
        let status = segment.output.write_packet(packet).await?;
        if status == WriteStatus::Written {
            segment.packets_written += 1;
        }
        Ok(status)
    }

    /// Closes the open segment after `duration` seconds and opens the next one at
    /// `boundary_time`.
    pub async fn rotate(&mut self, boundary_time: f64, duration: f64) -> Result<()> {
        let mut segment = self.take_current()?;
        if let Err(e) = segment.output.flush().await {
            warn!("Could not flush segment {}: {}", segment.sequence, e);
        }
        if self.policy == TrailerPolicy::EverySegment {
            write_trailer(&mut segment).await?;
        }
        let sequence = segment.sequence;
        let packets = segment.packets_written;
        self.factory.close(sequence, segment.output).await?;
        self.last_sequence = sequence;
        info!(
            "segment {} complete: {:.2}s, {} packets",
            sequence, duration, packets
        );
        self.report(sequence, false, duration);

        self.open(sequence + 1, boundary_time).await
    }

    /// Writes the trailer of the last segment, closes it and reports the end of the stream.
    pub async fn finalize(&mut self, duration: f64) -> Result<u32> {
        let mut segment = self.take_current()?;
        write_trailer(&mut segment).await?;
        let sequence = segment.sequence;
        self.factory.close(sequence, segment.output).await?;
        self.last_sequence = sequence;
        info!("final segment {} complete: {:.2}s", sequence, duration);
        self.report(sequence, true, duration);
        Ok(sequence)
    }

    fn report(&mut self, last_sequence: u32, is_final: bool, duration_seconds: f64) {
        self.reporter.segment_complete(&CompletionRecord {
            first_sequence: Self::FIRST_SEQUENCE,
            last_sequence,
            is_final,
            encoding_profile: self.encoding_profile.clone(),
            duration_seconds,
        });
    }
}

async fn write_trailer<M: Muxer>(segment: &mut SegmentState<M>) -> Result<()> {
    segment
        .output
        .write_trailer()
        .await
        .map_err(|e| SegmenterError::Trailer {
            sequence: segment.sequence,
            reason: e.to_string(),
        })
}
