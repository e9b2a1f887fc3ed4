//! Output stream parameters derived from the input streams.

use std::collections::HashMap;

use crate::av::{CodecParams, CodecType, MediaKind, Rational, StreamDescriptor};
use crate::{Result, SegmenterError};

/// Properties of the container segments are written in.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFormat {
    pub name: &'static str,
    pub extension: &'static str,
    /// Codec parameters must be carried in the container header instead of in band.
    pub global_header: bool,
    pub max_streams: usize,
}

impl OutputFormat {
    /// MPEG transport stream: parameters travel in band, one PID per stream.
    pub const MPEGTS: OutputFormat = OutputFormat {
        name: "mpegts",
        extension: "ts",
        global_header: false,
        max_streams: 0x1FFE - 0x0100,
    };
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::MPEGTS
    }
}

/// Codecs whose frames vary in size: the output block alignment is zeroed for them.
/// `Some(n)` limits the override to inputs that declare an alignment of `n`.
const VARIABLE_FRAME_CODECS: &[(CodecType, Option<u32>)] =
    &[(CodecType::MP3, Some(1)), (CodecType::AC3, None)];

fn output_block_align(codec: CodecType, input_align: u32) -> u32 {
    let variable = VARIABLE_FRAME_CODECS
        .iter()
        .any(|&(c, align)| c == codec && align.is_none_or(|a| a == input_align));
    if variable {
        0
    } else {
        input_align
    }
}

/// Codec time base of the output stream.
///
/// The codec base scaled by its ticks per frame is used when that is coarser than the
/// container base and the container base is finer than a millisecond.
fn output_codec_time_base(input: &StreamDescriptor) -> Rational {
    let ticks = input.ticks_per_frame.max(1);
    let frame_duration = input.codec_time_base.as_f64() * ticks as f64;
    let container = input.time_base.as_f64();

    if frame_duration > container && container < 1.0 / 1000.0 {
        Rational::new(
            input.codec_time_base.num.saturating_mul(ticks as i32),
            input.codec_time_base.den,
        )
    } else {
        input.time_base
    }
}

/// Maps one input stream to the equivalent output stream. Pure: payload bytes and the
/// shared codec data are referenced, never copied.
pub fn map_stream(format: &OutputFormat, input: &StreamDescriptor) -> StreamDescriptor {
    let params = match &input.params {
        CodecParams::Video(video) => {
            let mut video = video.clone();
            video.global_header = format.global_header;
            CodecParams::Video(video)
        }
        CodecParams::Audio(audio) => {
            let mut audio = audio.clone();
            audio.block_align = output_block_align(input.codec, audio.block_align);
            CodecParams::Audio(audio)
        }
        CodecParams::None => CodecParams::None,
    };

    StreamDescriptor {
        index: input.index,
        codec: input.codec,
        codec_tag: input.codec_tag,
        bit_rate: input.bit_rate,
        time_base: input.time_base,
        codec_time_base: output_codec_time_base(input),
        ticks_per_frame: input.ticks_per_frame,
        params,
        extra_data: input.extra_data.clone(),
    }
}

/// The input streams a segmenter keeps: the first video and the first audio stream.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StreamSelection {
    pub video: Option<usize>,
    pub audio: Option<usize>,
}

impl StreamSelection {
    pub fn select(inputs: &[StreamDescriptor]) -> Self {
        let first = |kind| inputs.iter().find(|s| s.kind() == kind).map(|s| s.index);
        Self {
            video: first(MediaKind::Video),
            audio: first(MediaKind::Audio),
        }
    }

    pub fn retains(&self, input_index: usize) -> bool {
        self.video == Some(input_index) || self.audio == Some(input_index)
    }
}

/// Output streams in allocation order, with the input index each one came from.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    format: OutputFormat,
    streams: Vec<StreamDescriptor>,
    by_input: HashMap<usize, usize>,
}

impl OutputLayout {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            streams: Vec::new(),
            by_input: HashMap::new(),
        }
    }

    /// Allocates an output slot for `input` and returns its output index.
    pub fn add(&mut self, input: &StreamDescriptor) -> Result<usize> {
        if self.streams.len() >= self.format.max_streams {
            return Err(SegmenterError::StreamAllocation(format!(
                "{} output has no free slot for input stream {}",
                self.format.name, input.index
            )));
        }
        let index = self.streams.len();
        let mut output = map_stream(&self.format, input);
        output.index = index;
        self.streams.push(output);
        self.by_input.insert(input.index, index);
        Ok(index)
    }

    pub fn output_index(&self, input_index: usize) -> Option<usize> {
        self.by_input.get(&input_index).copied()
    }

    pub fn streams(&self) -> &[StreamDescriptor] {
        &self.streams
    }

    pub fn format(&self) -> &OutputFormat {
        &self.format
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::av::{AudioParams, ChannelLayout, PixelFormat, VideoParams};
    use pretty_assertions::assert_eq;

    const MPEG_TB: Rational = Rational::new(1, 90_000);

    fn h264() -> StreamDescriptor {
        StreamDescriptor::new(0, CodecType::H264, MPEG_TB)
            .with_codec_tag(0x1B)
            .with_codec_time_base(Rational::new(1001, 60000), 2)
            .with_params(CodecParams::Video(VideoParams {
                pixel_format: PixelFormat::Yuv420p,
                width: 1280,
                height: 720,
                has_b_frames: true,
                global_header: false,
            }))
            .with_extra_data(vec![0, 0, 0, 1, 0x67])
    }

    fn audio(codec: CodecType, block_align: u32) -> StreamDescriptor {
        StreamDescriptor::new(1, codec, MPEG_TB)
            .with_codec_time_base(Rational::new(1, 48000), 1)
            .with_params(CodecParams::Audio(AudioParams {
                sample_rate: 48000,
                channels: 2,
                channel_layout: ChannelLayout::STEREO,
                frame_size: 1152,
                block_align,
            }))
    }

    #[test]
    fn test_video_uses_scaled_codec_time_base() {
        let out = map_stream(&OutputFormat::MPEGTS, &h264());
        assert_eq!(out.codec_time_base, Rational::new(2002, 60000));
        assert_eq!(out.time_base, MPEG_TB);
        assert_eq!(out.codec_tag, 0x1B);
        assert_eq!(out.video(), h264().video());
    }

    #[test]
    fn test_coarse_container_base_is_kept() {
        let input = h264().with_codec_time_base(Rational::new(1, 50), 2);
        let input = StreamDescriptor {
            time_base: Rational::new(1, 25),
            ..input
        };
        assert_eq!(
            map_stream(&OutputFormat::MPEGTS, &input).codec_time_base,
            Rational::new(1, 25)
        );
    }

    #[test]
    fn test_fine_codec_base_falls_back_to_container() {
        // 1/192000 per frame is finer than the 90 kHz container base
        let input = h264().with_codec_time_base(Rational::new(1, 384_000), 2);
        assert_eq!(map_stream(&OutputFormat::MPEGTS, &input).codec_time_base, MPEG_TB);
    }

    #[test]
    fn test_extra_data_is_shared() {
        let input = h264();
        let out = map_stream(&OutputFormat::MPEGTS, &input);
        let (a, b) = (input.extra_data.unwrap(), out.extra_data.unwrap());
        assert_eq!(a.as_ptr(), b.as_ptr());
    }

    #[test]
    fn test_global_header_follows_format() {
        let format = OutputFormat {
            global_header: true,
            ..OutputFormat::MPEGTS
        };
        assert!(map_stream(&format, &h264()).video().unwrap().global_header);
        assert!(!map_stream(&OutputFormat::MPEGTS, &h264()).video().unwrap().global_header);
    }

    #[test]
    fn test_block_align_quirks() {
        let align = |codec, input| {
            map_stream(&OutputFormat::MPEGTS, &audio(codec, input))
                .audio()
                .unwrap()
                .block_align
        };
        assert_eq!(align(CodecType::MP3, 1), 0);
        assert_eq!(align(CodecType::MP3, 4), 4);
        assert_eq!(align(CodecType::AC3, 1536), 0);
        assert_eq!(align(CodecType::AAC, 4), 4);
    }

    #[test]
    fn test_mapping_is_idempotent() {
        let input = audio(CodecType::MP3, 1);
        assert_eq!(
            map_stream(&OutputFormat::MPEGTS, &input),
            map_stream(&OutputFormat::MPEGTS, &input)
        );
    }

    #[test]
    fn test_selection_keeps_first_of_each_kind() {
        let inputs = vec![
            StreamDescriptor::new(0, CodecType::Data, MPEG_TB),
            StreamDescriptor::new(1, CodecType::AAC, MPEG_TB),
            StreamDescriptor::new(2, CodecType::H264, MPEG_TB),
            StreamDescriptor::new(3, CodecType::AC3, MPEG_TB),
        ];
        let selection = StreamSelection::select(&inputs);
        assert_eq!(selection.video, Some(2));
        assert_eq!(selection.audio, Some(1));
        assert!(!selection.retains(0));
        assert!(!selection.retains(3));
    }

    #[test]
    fn test_layout_allocation() {
        let format = OutputFormat {
            max_streams: 1,
            ..OutputFormat::MPEGTS
        };
        let mut layout = OutputLayout::new(format);
        let mut video = h264();
        video.index = 4;
        assert_eq!(layout.add(&video).unwrap(), 0);
        assert_eq!(layout.output_index(4), Some(0));
        assert_eq!(layout.streams()[0].index, 0);
        assert!(matches!(
            layout.add(&audio(CodecType::AAC, 0)),
            Err(SegmenterError::StreamAllocation(_))
        ));
    }
}
