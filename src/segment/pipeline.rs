use std::future::Future;

use log::{debug, info, warn};

use super::clock::{ClockSource, SegmentClock};
use super::mapper::{OutputFormat, OutputLayout, StreamSelection};
use super::report::CompletionReporter;
use super::writer::{SegmentFactory, SegmentWriter, TrailerPolicy};
use crate::av::{Demuxer, Packet, StreamDescriptor, WriteStatus};
use crate::codec::{inspector_for, KeyframeInspector};
use crate::{Result, SegmenterError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Starting,
    Running,
    Rotating,
    Draining,
    Done,
}

/// Why the pipeline stopped reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The input ran out, or could no longer be read
    EndOfInput,
    /// A destination asked for the stream to end
    EndRequested,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSummary {
    /// Number of segments written, which is also the last sequence number
    pub segments: u32,
    pub packets_written: u64,
    pub packets_dropped: u64,
    pub end_reason: EndReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentOptions {
    /// Target segment duration in seconds
    pub segment_length: f64,
    pub encoding_profile: String,
    pub trailer_policy: TrailerPolicy,
    pub format: OutputFormat,
}

impl SegmentOptions {
    pub fn new(segment_length: f64, encoding_profile: impl Into<String>) -> Self {
        Self {
            segment_length,
            encoding_profile: encoding_profile.into(),
            trailer_policy: TrailerPolicy::default(),
            format: OutputFormat::default(),
        }
    }

    pub fn with_trailer_policy(mut self, policy: TrailerPolicy) -> Self {
        self.trailer_policy = policy;
        self
    }
}

/// Reads packets from a demuxer and spreads them over consecutive segments.
///
/// The first video and first audio stream are kept, everything else is discarded at
/// the demuxer. Each packet is handled completely before the next one is read, so the
/// order of packets within a stream is preserved. A segment is cut as soon as the
/// clock stream (video, or audio for audio-only inputs) has advanced by at least the
/// segment length since the segment started; the packet that crosses the boundary opens
/// the new segment. Cuts ignore key frames.
pub struct Pipeline<D, F, R>
where
    D: Demuxer,
    F: SegmentFactory,
    R: CompletionReporter,
{
    demuxer: D,
    writer: SegmentWriter<F, R>,
    options: SegmentOptions,
    state: PipelineState,
    layout: OutputLayout,
    clock: SegmentClock,
    video_index: Option<usize>,
    inspector: Option<Box<dyn KeyframeInspector>>,
    packets_written: u64,
    packets_dropped: u64,
}

impl<D, F, R> Pipeline<D, F, R>
where
    D: Demuxer,
    F: SegmentFactory,
    R: CompletionReporter,
{
    pub fn new(demuxer: D, factory: F, reporter: R, options: SegmentOptions) -> Self {
        let writer = SegmentWriter::new(
            factory,
            reporter,
            options.trailer_policy,
            options.encoding_profile.clone(),
        );
        let layout = OutputLayout::new(options.format.clone());
        Self {
            demuxer,
            writer,
            options,
            state: PipelineState::Starting,
            layout,
            clock: SegmentClock::new(ClockSource::None),
            video_index: None,
            inspector: None,
            packets_written: 0,
            packets_dropped: 0,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn reporter(&self) -> &R {
        self.writer.reporter()
    }

    /// Output streams, valid once the pipeline has started.
    pub fn output_streams(&self) -> &[StreamDescriptor] {
        self.layout.streams()
    }

    pub fn into_parts(self) -> (D, F, R) {
        let (factory, reporter) = self.writer.into_parts();
        (self.demuxer, factory, reporter)
    }

    /// Runs until the input ends or a destination requests the end of the stream.
    pub async fn run(&mut self) -> Result<PipelineSummary> {
        self.run_until(futures::future::pending::<()>()).await
    }

    /// Like [`run`](Self::run), additionally draining when `shutdown` completes.
    pub async fn run_until<S>(&mut self, shutdown: S) -> Result<PipelineSummary>
    where
        S: Future<Output = ()> + Send,
    {
        if self.state != PipelineState::Starting {
            return Err(SegmenterError::InvalidData(
                "pipeline has already been run".into(),
            ));
        }
        self.start().await?;
        self.transition(PipelineState::Running);

        tokio::pin!(shutdown);
        let end_reason = loop {
            let next = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("shutdown requested, finishing the open segment");
                    break EndReason::Shutdown;
                }
                next = self.demuxer.read_packet() => next,
            };

            let packet = match next {
                Ok(Some(packet)) => packet,
                Ok(None) => break EndReason::EndOfInput,
                Err(e) => {
                    warn!("Could not read from input, ending stream: {}", e);
                    break EndReason::EndOfInput;
                }
            };

            if let Some(reason) = self.process(packet).await? {
                break reason;
            }
        };

        self.transition(PipelineState::Draining);
        let segments = self.writer.finalize(self.clock.elapsed()).await?;
        self.transition(PipelineState::Done);

        Ok(PipelineSummary {
            segments,
            packets_written: self.packets_written,
            packets_dropped: self.packets_dropped,
            end_reason,
        })
    }

    async fn start(&mut self) -> Result<()> {
        let inputs = self.demuxer.streams().await?;
        let selection = StreamSelection::select(&inputs);
        for input in inputs.iter().filter(|s| !selection.retains(s.index)) {
            debug!("discarding input stream {} ({:?})", input.index, input.codec);
            self.demuxer.set_discard(input.index, true);
        }

        let find = |index: Option<usize>| index.and_then(|i| inputs.iter().find(|s| s.index == i));
        let video = match find(selection.video) {
            Some(input) => Some(self.layout.add(input)?),
            None => None,
        };
        let audio = match find(selection.audio) {
            Some(input) => Some(self.layout.add(input)?),
            None => None,
        };

        let streams = self.layout.streams();
        let with_base = |index: usize| (index, streams[index].time_base);
        self.clock = SegmentClock::new(ClockSource::choose(
            video.map(with_base),
            audio.map(with_base),
        ));
        debug!("segment clock follows {:?}", self.clock.source());

        self.video_index = video;
        if let Some(index) = video {
            let codec = streams[index].codec;
            self.inspector = inspector_for(codec);
            if self.inspector.is_none() {
                warn!(
                    "Could not find video decoder for {:?}, key frames will not be honored",
                    codec
                );
            }
        }

        info!(
            "segmenting {} stream(s) into {}s {} segments",
            streams.len(),
            self.options.segment_length,
            self.layout.format().name
        );
        self.writer.open_first(streams.to_vec(), 0.0).await
    }

    /// Handles one input packet, returning why the pipeline should stop, if it should.
    async fn process(&mut self, mut packet: Packet) -> Result<Option<EndReason>> {
        let Some(index) = self.layout.output_index(packet.stream_index) else {
            return Ok(None);
        };
        packet.stream_index = index;

        if self.clock.observe(index, packet.pts) {
            self.writer.align_start(self.clock.state().segment_start_time);
        }
        if self.clock.should_cut(self.options.segment_length) {
            self.transition(PipelineState::Rotating);
            self.writer
                .rotate(self.clock.segment_time(), self.clock.elapsed())
                .await?;
            self.clock.start_segment();
            self.transition(PipelineState::Running);
        }

        if self.video_index == Some(index) {
            if let Some(inspector) = &self.inspector {
                packet.is_key |= inspector.is_keyframe(&packet.data);
            }
        }

        match self.writer.write(&packet).await {
            Ok(WriteStatus::Written) => {
                self.packets_written += 1;
                Ok(None)
            }
            Ok(WriteStatus::EndOfStream) => {
                info!("output requested the end of the stream");
                Ok(Some(EndReason::EndRequested))
            }
            Err(e) => {
                warn!("Could not write frame of stream {}: {}", index, e);
                self.packets_dropped += 1;
                Ok(None)
            }
        }
    }

    fn transition(&mut self, next: PipelineState) {
        debug!("pipeline {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::av::{CodecType, Rational};
    use crate::segment::clock::PTS_WRAP;
    use crate::segment::output::MemorySegmentFactory;
    use crate::segment::report::CompletionRecord;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    const MPEG_TB: Rational = Rational::new(1, 90_000);

    struct ScriptedDemuxer {
        streams: Vec<StreamDescriptor>,
        packets: VecDeque<Packet>,
        discarded: Vec<usize>,
    }

    #[async_trait]
    impl Demuxer for ScriptedDemuxer {
        async fn read_packet(&mut self) -> Result<Option<Packet>> {
            while let Some(packet) = self.packets.pop_front() {
                if !self.discarded.contains(&packet.stream_index) {
                    return Ok(Some(packet));
                }
            }
            Ok(None)
        }

        async fn streams(&mut self) -> Result<Vec<StreamDescriptor>> {
            Ok(self.streams.clone())
        }

        fn set_discard(&mut self, index: usize, discard: bool) {
            if discard {
                self.discarded.push(index);
            }
        }
    }

    fn video_frames(count: i64, frame_ticks: i64) -> VecDeque<Packet> {
        (0..count)
            .map(|i| Packet::new(vec![0u8; 32]).with_pts(i * frame_ticks))
            .collect()
    }

    fn pipeline(
        streams: Vec<StreamDescriptor>,
        packets: VecDeque<Packet>,
    ) -> Pipeline<ScriptedDemuxer, MemorySegmentFactory, Vec<CompletionRecord>> {
        let demuxer = ScriptedDemuxer {
            streams,
            packets,
            discarded: Vec::new(),
        };
        Pipeline::new(
            demuxer,
            MemorySegmentFactory::new(),
            Vec::new(),
            SegmentOptions::new(10.0, "test"),
        )
    }

    #[tokio::test]
    async fn test_cuts_every_ten_seconds() {
        let streams = vec![StreamDescriptor::new(0, CodecType::H264, MPEG_TB)];
        let mut pipeline = pipeline(streams, video_frames(625, 3600));
        let summary = pipeline.run().await.unwrap();

        assert_eq!(summary.segments, 3);
        assert_eq!(summary.packets_written, 625);
        assert_eq!(summary.end_reason, EndReason::EndOfInput);
        assert_eq!(pipeline.state(), PipelineState::Done);

        let records = pipeline.reporter();
        let durations: Vec<f64> = records.iter().map(|r| r.duration_seconds).collect();
        assert_eq!(durations[..2].to_vec(), vec![10.0, 10.0]);
        assert!((durations[2] - 4.96).abs() < 1e-9);
        assert_eq!(
            records.iter().map(|r| r.is_final).collect::<Vec<_>>(),
            vec![false, false, true]
        );
    }

    #[tokio::test]
    async fn test_other_streams_are_discarded() {
        let streams = vec![
            StreamDescriptor::new(0, CodecType::Data, MPEG_TB),
            StreamDescriptor::new(1, CodecType::AAC, MPEG_TB),
        ];
        let packets = VecDeque::from(vec![
            Packet::new(vec![1]).with_stream_index(0).with_pts(0),
            Packet::new(vec![2]).with_stream_index(1).with_pts(0),
        ]);
        let mut pipeline = pipeline(streams, packets);
        let summary = pipeline.run().await.unwrap();

        assert_eq!(summary.packets_written, 1);
        assert_eq!(pipeline.output_streams().len(), 1);
        assert_eq!(pipeline.output_streams()[0].codec, CodecType::AAC);
        let (demuxer, _, _) = pipeline.into_parts();
        assert_eq!(demuxer.discarded, vec![0]);
    }

    #[tokio::test]
    async fn test_shutdown_finalizes_open_segment() {
        let streams = vec![StreamDescriptor::new(0, CodecType::H264, MPEG_TB)];
        let mut pipeline = pipeline(streams, video_frames(10, 3600));
        let summary = pipeline.run_until(async {}).await.unwrap();

        assert_eq!(summary.end_reason, EndReason::Shutdown);
        assert_eq!(summary.packets_written, 0);
        let records = pipeline.reporter();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_final);
    }

    #[tokio::test]
    async fn test_first_segment_starts_at_first_timestamp() {
        let streams = vec![StreamDescriptor::new(0, CodecType::H264, MPEG_TB)];
        let frames = video_frames(300, 3600)
            .into_iter()
            .map(|p| {
                let pts = p.pts.unwrap_or(0) + 90_000 * 50;
                p.with_pts(pts)
            })
            .collect::<Vec<_>>();
        let mut pipeline = pipeline(streams, VecDeque::new());
        pipeline.start().await.unwrap();
        assert_eq!(pipeline.writer.current().unwrap().start_time, 0.0);

        for packet in frames {
            pipeline.process(packet).await.unwrap();
            let segment = pipeline.writer.current().unwrap();
            assert_eq!(segment.start_time, pipeline.clock.state().segment_start_time);
        }
        let segment = pipeline.writer.current().unwrap();
        assert_eq!(segment.sequence, 2);
        assert_eq!(segment.start_time, 60.0);
    }

    #[tokio::test]
    async fn test_pts_wrap_keeps_cutting() {
        let streams = vec![StreamDescriptor::new(0, CodecType::H264, MPEG_TB)];
        let start = PTS_WRAP - 5 * 90_000;
        let frames = (0..1500i64)
            .map(|i| {
                Packet::new(vec![0u8; 32]).with_pts((start + i * 3600) & (PTS_WRAP - 1))
            })
            .collect();
        let mut pipeline = pipeline(streams, frames);
        let summary = pipeline.run().await.unwrap();

        assert_eq!(summary.segments, 6);
        let records = pipeline.reporter();
        assert!(records[..5].iter().all(|r| r.duration_seconds >= 10.0));
        assert!(records.iter().all(|r| r.duration_seconds >= 0.0));
        assert!(records[5].is_final);
    }

    #[tokio::test]
    async fn test_runs_once() {
        let mut pipeline = pipeline(Vec::new(), VecDeque::new());
        pipeline.run().await.unwrap();
        assert!(pipeline.run().await.is_err());
    }
}
