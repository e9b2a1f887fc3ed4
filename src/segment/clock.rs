//! Segment clock and the cut decision.

use log::{debug, warn};

use crate::av::Rational;
use crate::format::ts::MPEG_TIME_BASE;

/// Period of 33 bit MPEG timestamps, in 90 kHz ticks.
pub const PTS_WRAP: i64 = 1 << 33;

/// Backward steps up to this size are frame reordering, larger ones a discontinuity.
pub const MAX_REORDER_SECONDS: f64 = 1.0;

/// Snapshot of the segment clock, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClockState {
    /// Time of the most recent packet on the clock stream
    pub segment_time: f64,
    /// Time the open segment started at
    pub segment_start_time: f64,
}

impl ClockState {
    pub fn elapsed(&self) -> f64 {
        (self.segment_time - self.segment_start_time).max(0.0)
    }
}

/// True once the open segment has reached `target` seconds.
pub fn should_cut(clock: &ClockState, target: f64) -> bool {
    clock.elapsed() >= target
}

/// Stream whose timestamps drive the segment clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClockSource {
    Video { index: usize, time_base: Rational },
    Audio { index: usize, time_base: Rational },
    None,
}

impl ClockSource {
    /// Video wins over audio; `(output index, time base)` pairs.
    pub fn choose(video: Option<(usize, Rational)>, audio: Option<(usize, Rational)>) -> Self {
        match (video, audio) {
            (Some((index, time_base)), _) => ClockSource::Video { index, time_base },
            (None, Some((index, time_base))) => ClockSource::Audio { index, time_base },
            (None, None) => ClockSource::None,
        }
    }

    fn time_base_for(&self, stream_index: usize) -> Option<Rational> {
        match *self {
            ClockSource::Video { index, time_base } | ClockSource::Audio { index, time_base }
                if index == stream_index =>
            {
                Some(time_base)
            }
            _ => None,
        }
    }
}

/// Tracks elapsed segment time from the packets of the clock stream.
#[derive(Debug, Clone)]
pub struct SegmentClock {
    source: ClockSource,
    state: ClockState,
    started: bool,
    /// Last raw 33 bit timestamp, for wrap detection
    last_pts: Option<i64>,
    wrap_offset: i64,
}

impl SegmentClock {
    pub fn new(source: ClockSource) -> Self {
        Self {
            source,
            state: ClockState::default(),
            started: false,
            last_pts: None,
            wrap_offset: 0,
        }
    }

    pub fn source(&self) -> ClockSource {
        self.source
    }

    /// Feeds the presentation timestamp of a packet on output stream `stream_index`.
    ///
    /// Returns true if the timestamp was taken into account. The first observation
    /// also sets the segment start, so streams that do not begin at zero still get a
    /// full first segment.
    ///
    /// 90 kHz timestamps are unwrapped across the 33 bit boundary. The clock never runs
    /// backwards: small steps back (B-frame reordering) are ignored, and a larger jump
    /// back rebases the segment start so the elapsed time carries on from where it was.
    pub fn observe(&mut self, stream_index: usize, pts: Option<i64>) -> bool {
        let (Some(time_base), Some(pts)) = (self.source.time_base_for(stream_index), pts) else {
            return false;
        };
        let time = time_base.seconds(self.unwrap_pts(time_base, pts));

        if !self.started {
            self.started = true;
            self.state.segment_time = time;
            self.state.segment_start_time = time;
            debug!("segment clock starts at {:.3}s", time);
            return true;
        }

        if time < self.state.segment_time - MAX_REORDER_SECONDS {
            let elapsed = self.state.elapsed();
            warn!(
                "timestamp discontinuity: clock went back from {:.3}s to {:.3}s",
                self.state.segment_time, time
            );
            self.state.segment_time = time;
            self.state.segment_start_time = time - elapsed;
        } else if time > self.state.segment_time {
            self.state.segment_time = time;
        }
        true
    }

    fn unwrap_pts(&mut self, time_base: Rational, pts: i64) -> i64 {
        if time_base != MPEG_TIME_BASE {
            return pts;
        }
        if let Some(last) = self.last_pts {
            if last - pts > PTS_WRAP / 2 {
                self.wrap_offset += PTS_WRAP;
                debug!("timestamps wrapped, offset now {}", self.wrap_offset);
            } else if pts - last > PTS_WRAP / 2 {
                // reordered frame from before the wrap
                return pts + self.wrap_offset - PTS_WRAP;
            }
        }
        self.last_pts = Some(pts);
        pts + self.wrap_offset
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn should_cut(&self, target: f64) -> bool {
        should_cut(&self.state, target)
    }

    /// Starts a new segment at the current clock time.
    pub fn start_segment(&mut self) {
        self.state.segment_start_time = self.state.segment_time;
    }

    pub fn elapsed(&self) -> f64 {
        self.state.elapsed()
    }

    pub fn segment_time(&self) -> f64 {
        self.state.segment_time
    }

    pub fn state(&self) -> ClockState {
        self.state
    }
}
