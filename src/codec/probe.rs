//! Fills stream descriptors from the first payloads of each elementary stream.

use log::debug;

use crate::av::{ChannelLayout, CodecType, PixelFormat, Rational, StreamDescriptor};
use crate::codec::aac::{AACParser, AAC_FRAME_SIZE};
use crate::codec::ac3::{self, AC3_FRAME_SIZE};
use crate::codec::h264::H264Parser;
use crate::codec::h265::H265Parser;
use crate::codec::{mpa, mpeg2};

/// Codec specific state kept while a stream is being probed.
#[derive(Debug)]
pub enum StreamProber {
    H264(H264Parser),
    H265(H265Parser),
    Aac(AACParser),
    Mpeg2Video,
    MpegAudio,
    Ac3,
    /// Nothing to learn from the payload
    Opaque,
}

impl StreamProber {
    pub fn for_codec(codec: CodecType) -> Self {
        match codec {
            CodecType::H264 => StreamProber::H264(H264Parser::new()),
            CodecType::H265 => StreamProber::H265(H265Parser::new()),
            CodecType::AAC => StreamProber::Aac(AACParser::new()),
            CodecType::MPEG2Video => StreamProber::Mpeg2Video,
            CodecType::MP3 => StreamProber::MpegAudio,
            CodecType::AC3 => StreamProber::Ac3,
            CodecType::Data => StreamProber::Opaque,
        }
    }

    /// Feeds one access unit. Returns whether `stream` is now fully described.
    pub fn feed(&mut self, stream: &mut StreamDescriptor, payload: &[u8]) -> bool {
        if stream.is_probed() {
            return true;
        }

        match self {
            StreamProber::H264(parser) => {
                if let Some(sps) = parser.probe(payload).cloned() {
                    if let Some(video) = stream.video_mut() {
                        video.width = sps.width;
                        video.height = sps.height;
                        video.pixel_format = pixel_format(sps.chroma_format_idc, sps.bit_depth_luma);
                        video.has_b_frames = sps.may_have_b_frames();
                    }
                    if let Some((units, scale)) = sps.timing {
                        if let (Ok(num), Ok(den)) = (i32::try_from(units), i32::try_from(scale)) {
                            stream.codec_time_base = Rational::new(num, den);
                            stream.ticks_per_frame = 2;
                        }
                    }
                    stream.extra_data = parser.parameter_sets();
                }
            }
            StreamProber::H265(parser) => {
                if let Some(sps) = parser.probe(payload).cloned() {
                    if let Some(video) = stream.video_mut() {
                        video.width = sps.width;
                        video.height = sps.height;
                        video.pixel_format = pixel_format(sps.chroma_format_idc, 8);
                        video.has_b_frames = true;
                    }
                }
            }
            StreamProber::Aac(parser) => {
                if let Some(config) = parser.probe(payload).cloned() {
                    let sample_rate = config.sample_rate().unwrap_or(0);
                    if let Some(audio) = stream.audio_mut() {
                        audio.sample_rate = sample_rate;
                        audio.channels = config.channels();
                        audio.channel_layout = config.channel_layout();
                        audio.frame_size = AAC_FRAME_SIZE;
                    }
                    if sample_rate > 0 {
                        stream.codec_time_base = Rational::new(1, sample_rate as i32);
                    }
                    stream.extra_data = Some(config.audio_specific_config().to_vec().into());
                }
            }
            StreamProber::Mpeg2Video => {
                if let Some(header) = mpeg2::probe(payload) {
                    if let Some(video) = stream.video_mut() {
                        video.width = header.width;
                        video.height = header.height;
                        video.pixel_format = PixelFormat::Yuv420p;
                        video.has_b_frames = true;
                    }
                    if let Some(rate) = header.frame_rate {
                        stream.codec_time_base = Rational::new(rate.den, rate.num * 2);
                        stream.ticks_per_frame = 2;
                    }
                    stream.bit_rate = header.bit_rate;
                }
            }
            StreamProber::MpegAudio => {
                if let Some(header) = mpa::probe(payload) {
                    stream.bit_rate = header.bit_rate.map(u64::from);
                    stream.codec_time_base = Rational::new(1, header.sample_rate as i32);
                    if let Some(audio) = stream.audio_mut() {
                        audio.sample_rate = header.sample_rate;
                        audio.channels = header.channels;
                        audio.channel_layout = if header.channels == 1 {
                            ChannelLayout::MONO
                        } else {
                            ChannelLayout::STEREO
                        };
                        audio.frame_size = header.frame_size();
                    }
                }
            }
            StreamProber::Ac3 => {
                if let Some(header) = ac3::probe(payload) {
                    stream.bit_rate = Some(u64::from(header.bit_rate));
                    stream.codec_time_base = Rational::new(1, header.sample_rate as i32);
                    if let Some(audio) = stream.audio_mut() {
                        audio.sample_rate = header.sample_rate;
                        audio.channels = header.channels;
                        audio.channel_layout = header.channel_layout;
                        audio.frame_size = AC3_FRAME_SIZE;
                    }
                }
            }
            StreamProber::Opaque => {}
        }

        let done = stream.is_probed();
        if done {
            debug!(
                "stream {} ({:?}) probed: {:?}",
                stream.index, stream.codec, stream.params
            );
        }
        done
    }
}

fn pixel_format(chroma_format_idc: u32, bit_depth: u32) -> PixelFormat {
    match (chroma_format_idc, bit_depth > 8) {
        (0, _) => PixelFormat::Gray,
        (1, false) => PixelFormat::Yuv420p,
        (1, true) => PixelFormat::Yuv420p10,
        (2, false) => PixelFormat::Yuv422p,
        (2, true) => PixelFormat::Yuv422p10,
        (3, false) => PixelFormat::Yuv444p,
        (3, true) => PixelFormat::Yuv444p10,
        _ => PixelFormat::Unknown,
    }
}
