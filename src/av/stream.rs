use super::{CodecType, MediaKind};
use bytes::Bytes;

/// A rational number of seconds, the unit timestamps of a stream are counted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    pub fn as_f64(&self) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        self.num as f64 / self.den as f64
    }

    /// Converts `ts` ticks of this base into seconds.
    pub fn seconds(&self, ts: i64) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        ts as f64 * self.num as f64 / self.den as f64
    }

    /// Rescales `ts` from this base into `to`, rounding to the nearest tick.
    pub fn rescale(&self, ts: i64, to: Rational) -> i64 {
        let mut num = ts as i128 * self.num as i128 * to.den as i128;
        let mut den = self.den as i128 * to.num as i128;
        if den == 0 {
            return 0;
        }
        if den < 0 {
            num = -num;
            den = -den;
        }
        let half = den / 2;
        let rounded = if num >= 0 {
            (num + half) / den
        } else {
            (num - half) / den
        };
        rounded as i64
    }
}

impl std::fmt::Display for Rational {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    #[default]
    Unknown,
    Gray,
    Yuv420p,
    Yuv422p,
    Yuv444p,
    Yuv420p10,
    Yuv422p10,
    Yuv444p10,
}

/// Speaker positions as a bit mask, same bit assignment as WAVEFORMATEXTENSIBLE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelLayout(pub u64);

impl ChannelLayout {
    pub const FRONT_LEFT: u64 = 0x1;
    pub const FRONT_RIGHT: u64 = 0x2;
    pub const FRONT_CENTER: u64 = 0x4;
    pub const LOW_FREQUENCY: u64 = 0x8;
    pub const BACK_LEFT: u64 = 0x10;
    pub const BACK_RIGHT: u64 = 0x20;
    pub const BACK_CENTER: u64 = 0x100;
    pub const SIDE_LEFT: u64 = 0x200;
    pub const SIDE_RIGHT: u64 = 0x400;

    pub const MONO: ChannelLayout = ChannelLayout(Self::FRONT_CENTER);
    pub const STEREO: ChannelLayout = ChannelLayout(Self::FRONT_LEFT | Self::FRONT_RIGHT);

    pub fn channels(&self) -> u32 {
        self.0.count_ones()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct VideoParams {
    pub pixel_format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub has_b_frames: bool,
    /// Stream parameters live in the container header rather than in each frame.
    pub global_header: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AudioParams {
    pub sample_rate: u32,
    pub channels: u16,
    pub channel_layout: ChannelLayout,
    /// Samples per frame, 0 if it varies.
    pub frame_size: u32,
    /// Fixed bytes per frame, 0 for variable-size frames.
    pub block_align: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum CodecParams {
    Video(VideoParams),
    Audio(AudioParams),
    #[default]
    None,
}

/// Everything known about one elementary stream, without its payload.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDescriptor {
    /// Position of the stream in its container
    pub index: usize,
    pub codec: CodecType,
    /// Container specific codec tag (the PMT stream type for transport streams)
    pub codec_tag: u32,
    pub bit_rate: Option<u64>,
    /// Unit of the packet timestamps in the container
    pub time_base: Rational,
    /// Unit the codec counts frames in
    pub codec_time_base: Rational,
    /// Codec time base ticks per displayed frame
    pub ticks_per_frame: u32,
    pub params: CodecParams,
    /// Out-of-band codec initialisation data, shared with every copy of the descriptor
    pub extra_data: Option<Bytes>,
}

impl StreamDescriptor {
    pub fn new(index: usize, codec: CodecType, time_base: Rational) -> Self {
        let params = match codec.kind() {
            MediaKind::Video => CodecParams::Video(VideoParams::default()),
            MediaKind::Audio => CodecParams::Audio(AudioParams::default()),
            MediaKind::Other => CodecParams::None,
        };
        Self {
            index,
            codec,
            codec_tag: 0,
            bit_rate: None,
            time_base,
            codec_time_base: time_base,
            ticks_per_frame: 1,
            params,
            extra_data: None,
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.codec.kind()
    }

    pub fn video(&self) -> Option<&VideoParams> {
        match &self.params {
            CodecParams::Video(v) => Some(v),
            _ => None,
        }
    }

    pub fn video_mut(&mut self) -> Option<&mut VideoParams> {
        match &mut self.params {
            CodecParams::Video(v) => Some(v),
            _ => None,
        }
    }

    pub fn audio(&self) -> Option<&AudioParams> {
        match &self.params {
            CodecParams::Audio(a) => Some(a),
            _ => None,
        }
    }

    pub fn audio_mut(&mut self) -> Option<&mut AudioParams> {
        match &mut self.params {
            CodecParams::Audio(a) => Some(a),
            _ => None,
        }
    }

    pub fn with_codec_tag(mut self, tag: u32) -> Self {
        self.codec_tag = tag;
        self
    }

    pub fn with_codec_time_base(mut self, time_base: Rational, ticks_per_frame: u32) -> Self {
        self.codec_time_base = time_base;
        self.ticks_per_frame = ticks_per_frame;
        self
    }

    pub fn with_params(mut self, params: CodecParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_extra_data(mut self, data: impl Into<Bytes>) -> Self {
        self.extra_data = Some(data.into());
        self
    }

    /// Whether codec probing has filled in the parameters segmenting relies on.
    pub fn is_probed(&self) -> bool {
        match &self.params {
            CodecParams::Video(v) => v.width > 0 && v.height > 0,
            CodecParams::Audio(a) => a.sample_rate > 0 && a.channels > 0,
            CodecParams::None => true,
        }
    }
}
