use async_trait::async_trait;

/// Codecs the transport stream layer knows how to identify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecType {
    H264,
    H265,
    MPEG2Video,
    AAC,
    MP3,
    AC3,
    /// Anything else carried in the stream (subtitles, metadata, private data)
    Data,
}

/// Broad class of an elementary stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
    Other,
}

impl CodecType {
    pub fn kind(&self) -> MediaKind {
        match self {
            CodecType::H264 | CodecType::H265 | CodecType::MPEG2Video => MediaKind::Video,
            CodecType::AAC | CodecType::MP3 | CodecType::AC3 => MediaKind::Audio,
            CodecType::Data => MediaKind::Other,
        }
    }
}

/// Outcome of handing a packet to a muxer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Written,
    /// The destination asked for the stream to end; not an error.
    EndOfStream,
}

/// Source of demultiplexed packets.
#[async_trait]
pub trait Demuxer: Send {
    /// Reads the next packet, `None` once the input is exhausted.
    async fn read_packet(&mut self) -> crate::Result<Option<Packet>>;

    /// Describes every elementary stream of the input, probing codec parameters first.
    async fn streams(&mut self) -> crate::Result<Vec<StreamDescriptor>>;

    /// Stops (or resumes) delivery of packets for the stream at `index`.
    fn set_discard(&mut self, index: usize, discard: bool);
}

/// Container writer bound to one destination.
#[async_trait]
pub trait Muxer: Send {
    async fn write_header(&mut self, streams: &[StreamDescriptor]) -> crate::Result<()>;
    async fn write_packet(&mut self, packet: &Packet) -> crate::Result<WriteStatus>;
    async fn write_trailer(&mut self) -> crate::Result<()>;
    async fn flush(&mut self) -> crate::Result<()>;
}

mod packet;
mod stream;
pub use packet::*;
pub use stream::*;
