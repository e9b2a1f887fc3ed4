#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use live_segmenter::av::{
    CodecType, Demuxer, Muxer, Packet, Rational, StreamDescriptor, WriteStatus,
};
use live_segmenter::segment::{CompletionRecord, Pipeline, SegmentFactory, SegmentOptions};
use live_segmenter::{Result, SegmenterError};

pub const MPEG_TB: Rational = Rational::new(1, 90_000);
/// 25 frames per second in 90 kHz ticks
pub const FRAME_TICKS: i64 = 3_600;

/// Demuxer replaying a fixed list of packets.
pub struct ScriptedDemuxer {
    pub streams: Vec<StreamDescriptor>,
    pub packets: VecDeque<Packet>,
    pub discarded: Vec<usize>,
    /// Fail with a read error once this many packets have been returned
    pub fail_after: Option<usize>,
    returned: usize,
}

impl ScriptedDemuxer {
    pub fn new(streams: Vec<StreamDescriptor>, packets: Vec<Packet>) -> Self {
        Self {
            streams,
            packets: packets.into(),
            discarded: Vec::new(),
            fail_after: None,
            returned: 0,
        }
    }
}

#[async_trait]
impl Demuxer for ScriptedDemuxer {
    async fn read_packet(&mut self) -> Result<Option<Packet>> {
        if self.fail_after == Some(self.returned) {
            return Err(SegmenterError::Io(std::io::ErrorKind::ConnectionReset.into()));
        }
        while let Some(packet) = self.packets.pop_front() {
            if !self.discarded.contains(&packet.stream_index) {
                self.returned += 1;
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

/// One muxer call, tagged with the segment it went to.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Header { sequence: u32, streams: usize },
    Packet { sequence: u32, packet: WrittenPacket },
    Trailer { sequence: u32 },
    Close { sequence: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct WrittenPacket {
    pub stream_index: usize,
    pub pts: Option<i64>,
    pub is_key: bool,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    pub fn packets(&self) -> Vec<(u32, WrittenPacket)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Packet { sequence, packet } => Some((sequence, packet)),
                _ => None,
            })
            .collect()
    }

    pub fn trailers(&self) -> Vec<u32> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Trailer { sequence } => Some(sequence),
                _ => None,
            })
            .collect()
    }
}

/// How a [`RecordingMuxer`] answers packets whose payload starts with a marker byte.
#[derive(Debug, Clone, Copy, Default)]
pub struct Faults {
    /// Payloads starting with this byte fail to write
    pub fail_marker: Option<u8>,
    /// Payloads starting with this byte request the end of the stream
    pub end_marker: Option<u8>,
    /// Segment whose header cannot be written
    pub header_fails_at: Option<u32>,
}

pub struct RecordingMuxer {
    sequence: u32,
    log: EventLog,
    faults: Faults,
}

#[async_trait]
impl Muxer for RecordingMuxer {
    async fn write_header(&mut self, streams: &[StreamDescriptor]) -> Result<()> {
        if self.faults.header_fails_at == Some(self.sequence) {
            return Err(SegmenterError::Io(std::io::ErrorKind::Other.into()));
        }
        self.log.push(Event::Header {
            sequence: self.sequence,
            streams: streams.len(),
        });
        Ok(())
    }

    async fn write_packet(&mut self, packet: &Packet) -> Result<WriteStatus> {
        let marker = packet.data.first().copied();
        if marker.is_some() && marker == self.faults.end_marker {
            return Ok(WriteStatus::EndOfStream);
        }
        if marker.is_some() && marker == self.faults.fail_marker {
            return Err(SegmenterError::InvalidData("rejected".into()));
        }
        self.log.push(Event::Packet {
            sequence: self.sequence,
            packet: WrittenPacket {
                stream_index: packet.stream_index,
                pts: packet.pts,
                is_key: packet.is_key,
                data: packet.data.to_vec(),
            },
        });
        Ok(WriteStatus::Written)
    }

    async fn write_trailer(&mut self) -> Result<()> {
        self.log.push(Event::Trailer {
            sequence: self.sequence,
        });
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingFactory {
    pub log: EventLog,
    pub faults: Faults,
}

#[async_trait]
impl SegmentFactory for RecordingFactory {
    type Output = RecordingMuxer;

    async fn create(&mut self, sequence: u32) -> Result<RecordingMuxer> {
        Ok(RecordingMuxer {
            sequence,
            log: self.log.clone(),
            faults: self.faults,
        })
    }

    async fn close(&mut self, sequence: u32, _output: RecordingMuxer) -> Result<()> {
        self.log.push(Event::Close { sequence });
        Ok(())
    }
}

pub type TestPipeline = Pipeline<ScriptedDemuxer, RecordingFactory, Vec<CompletionRecord>>;

pub fn pipeline(demuxer: ScriptedDemuxer, factory: RecordingFactory, target: f64) -> TestPipeline {
    Pipeline::new(
        demuxer,
        factory,
        Vec::new(),
        SegmentOptions::new(target, "baseline"),
    )
}

pub fn video(index: usize) -> StreamDescriptor {
    StreamDescriptor::new(index, CodecType::H264, MPEG_TB)
}

pub fn audio(index: usize) -> StreamDescriptor {
    StreamDescriptor::new(index, CodecType::AAC, MPEG_TB)
}

/// `count` video frames at 25 fps starting at pts 0.
pub fn video_frames(index: usize, count: i64) -> Vec<Packet> {
    (0..count)
        .map(|i| {
            Packet::new(vec![0x00, 0x00, 0x01, 0x41, i as u8])
                .with_stream_index(index)
                .with_pts(i * FRAME_TICKS)
        })
        .collect()
}

/// Video frames interleaved with one audio frame after each.
pub fn interleaved(video_index: usize, audio_index: usize, count: i64) -> Vec<Packet> {
    video_frames(video_index, count)
        .into_iter()
        .flat_map(|v| {
            let pts = v.pts.unwrap_or(0);
            let a = Packet::new(vec![0xFF, 0xF1, (pts / FRAME_TICKS) as u8])
                .with_stream_index(audio_index)
                .with_pts(pts + 1_800);
            [v, a]
        })
        .collect()
}

pub fn durations(records: &[CompletionRecord]) -> Vec<f64> {
    records.iter().map(|r| r.duration_seconds).collect()
}
