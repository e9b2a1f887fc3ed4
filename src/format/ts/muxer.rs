use std::collections::HashMap;
use std::io;

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use log::debug;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::pes::PESHeader;
use super::types::*;
use crate::av::{CodecType, MediaKind, Muxer, Packet, Rational, StreamDescriptor, WriteStatus};
use crate::{Result, SegmenterError};

/// Maximum PCR spacing, 40 ms in 90 kHz ticks.
const PCR_INTERVAL: u64 = 3_600;
/// How far the PCR runs behind the decode time of the packet carrying it.
const MUX_DELAY: u64 = 9_000;

/// Continuity counter per PID.
///
/// Counters survive segment rotation so that the concatenation of consecutive
/// segments is a continuous transport stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContinuityCounters(HashMap<u16, u8>);

impl ContinuityCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the counter of `pid` and returns the value for the next packet.
    pub fn next(&mut self, pid: u16) -> u8 {
        let counter = self.0.entry(pid).or_insert(0x0F);
        *counter = (*counter + 1) & 0x0F;
        *counter
    }

    /// Value used by the last packet written on `pid`.
    pub fn last(&self, pid: u16) -> Option<u8> {
        self.0.get(&pid).copied()
    }
}

#[derive(Debug, Clone)]
struct MuxStream {
    pid: u16,
    stream_id: u8,
    time_base: Rational,
}

/// Single program MPEG-TS writer.
///
/// `write_header` emits PAT and PMT; every packet becomes one PES packet split over as
/// many transport packets as needed, the last one padded through its adaptation field.
#[derive(Debug)]
pub struct TSMuxer<W: AsyncWrite + Unpin + Send> {
    writer: W,
    streams: Vec<MuxStream>,
    continuity: ContinuityCounters,
    pcr_pid: Option<u16>,
    last_pcr: Option<u64>,
    buf: BytesMut,
}

impl<W: AsyncWrite + Unpin + Send> TSMuxer<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            streams: Vec::new(),
            continuity: ContinuityCounters::new(),
            pcr_pid: None,
            last_pcr: None,
            buf: BytesMut::with_capacity(TS_PACKET_SIZE * 8),
        }
    }

    /// Continues the continuity counters of a previous muxer.
    pub fn with_continuity(mut self, continuity: ContinuityCounters) -> Self {
        self.continuity = continuity;
        self
    }

    pub fn continuity(&self) -> &ContinuityCounters {
        &self.continuity
    }

    pub fn into_parts(self) -> (W, ContinuityCounters) {
        (self.writer, self.continuity)
    }

    pub fn pid_for(index: usize) -> u16 {
        PID_FIRST_ELEMENTARY + index as u16
    }

    fn put_psi(&mut self, pid: u16, section: &[u8]) -> Result<()> {
        if section.len() + 1 > TS_PAYLOAD_SIZE {
            return Err(SegmenterError::InvalidData(format!(
                "PSI section of {} bytes does not fit one packet",
                section.len()
            )));
        }
        TSHeader {
            payload_unit_start: true,
            pid,
            continuity_counter: self.continuity.next(pid),
            ..Default::default()
        }
        .write_to(&mut self.buf);
        self.buf.put_u8(0); // pointer_field
        self.buf.put_slice(section);
        let end = self.buf.len().next_multiple_of(TS_PACKET_SIZE);
        self.buf.resize(end, 0xFF);
        Ok(())
    }

    /// Appends one transport packet. `payload` must leave room for the adaptation
    /// field that `random_access` and `pcr` require.
    fn put_ts_packet(
        &mut self,
        pid: u16,
        unit_start: bool,
        random_access: bool,
        pcr: Option<u64>,
        payload: &[u8],
    ) {
        let mut field = BytesMut::new();
        if random_access || pcr.is_some() {
            let mut flags = 0u8;
            if random_access {
                flags |= 0x40;
            }
            if pcr.is_some() {
                flags |= 0x10;
            }
            field.put_u8(flags);
            if let Some(pcr) = pcr {
                write_pcr(&mut field, pcr);
            }
        }

        let has_field = !field.is_empty() || payload.len() < TS_PAYLOAD_SIZE;
        TSHeader {
            payload_unit_start: unit_start,
            pid,
            adaptation_field_exists: has_field,
            continuity_counter: self.continuity.next(pid),
            ..Default::default()
        }
        .write_to(&mut self.buf);

        if has_field {
            // adaptation field bytes including its length byte
            let total = TS_PAYLOAD_SIZE - payload.len();
            if total >= 2 && field.is_empty() {
                field.put_u8(0);
            }
            field.resize(total - 1, 0xFF);
            self.buf.put_u8((total - 1) as u8);
            self.buf.put_slice(&field);
        }
        self.buf.put_slice(payload);
    }

    async fn write_buffered(&mut self) -> Result<WriteStatus> {
        let result = self.writer.write_all(&self.buf).await;
        self.buf.clear();
        match result {
            Ok(()) => Ok(WriteStatus::Written),
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(WriteStatus::EndOfStream),
            Err(e) => Err(e.into()),
        }
    }

    fn next_pcr(&mut self, pid: u16, clock: Option<u64>) -> Option<u64> {
        if self.pcr_pid != Some(pid) {
            return None;
        }
        let clock = clock?;
        let due = match self.last_pcr {
            None => true,
            Some(last) => clock < last || clock - last >= PCR_INTERVAL,
        };
        if !due {
            return None;
        }
        self.last_pcr = Some(clock);
        Some(clock.saturating_sub(MUX_DELAY) * 300)
    }
}

fn to_mpeg_ticks(time_base: Rational, ts: i64) -> u64 {
    // two's complement wrap keeps negative timestamps inside the 33 bit range
    (time_base.rescale(ts, MPEG_TIME_BASE) as u64) & 0x1_FFFF_FFFF
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> Muxer for TSMuxer<W> {
    async fn write_header(&mut self, streams: &[StreamDescriptor]) -> Result<()> {
        self.streams = streams
            .iter()
            .enumerate()
            .map(|(i, s)| MuxStream {
                pid: Self::pid_for(i),
                stream_id: stream_id_for_codec(s.codec),
                time_base: s.time_base,
            })
            .collect();

        self.pcr_pid = streams
            .iter()
            .position(|s| s.kind() == MediaKind::Video)
            .or(if streams.is_empty() { None } else { Some(0) })
            .map(Self::pid_for);

        let pmt = PMT {
            pcr_pid: self.pcr_pid.unwrap_or(PID_NULL),
            program_descriptors: Vec::new(),
            elementary_stream_infos: streams
                .iter()
                .enumerate()
                .map(|(i, s)| ElementaryStreamInfo {
                    stream_type: stream_type_for_codec(
                        s.codec,
                        s.audio().map_or(0, |a| a.sample_rate),
                    ),
                    elementary_pid: Self::pid_for(i),
                    descriptors: match s.codec {
                        CodecType::AC3 => vec![Descriptor {
                            tag: DESCRIPTOR_TAG_AC3,
                            data: vec![0x00],
                        }],
                        _ => Vec::new(),
                    },
                })
                .collect(),
        };

        self.buf.clear();
        self.put_psi(PID_PAT, &PAT::single_program(PID_PMT).to_section())?;
        self.put_psi(PID_PMT, &pmt.to_section())?;
        self.last_pcr = None;
        debug!("wrote PAT/PMT for {} streams", streams.len());

        let result = self.writer.write_all(&self.buf).await;
        self.buf.clear();
        result.map_err(SegmenterError::from)
    }

    async fn write_packet(&mut self, packet: &Packet) -> Result<WriteStatus> {
        let stream = self
            .streams
            .get(packet.stream_index)
            .cloned()
            .ok_or_else(|| {
                SegmenterError::InvalidData(format!(
                    "no output stream {} in the program",
                    packet.stream_index
                ))
            })?;

        let pts = packet.pts.map(|ts| to_mpeg_ticks(stream.time_base, ts));
        let dts = packet.dts.map(|ts| to_mpeg_ticks(stream.time_base, ts));

        let mut header = PESHeader::new(stream.stream_id);
        header.data_alignment = true;
        if let Some(pts) = pts {
            header = header.with_pts(pts);
        }
        if let Some(dts) = dts {
            header = header.with_dts(dts);
        }
        let header = header.sized_for(packet.data.len());

        let mut pes = BytesMut::with_capacity(header.encoded_len() + packet.data.len());
        header.write_to(&mut pes);
        pes.extend_from_slice(&packet.data);

        // a packet that fails to write must not leave a gap in the counters
        let saved_continuity = self.continuity.clone();
        let saved_pcr = self.last_pcr;
        let pcr = self.next_pcr(stream.pid, dts.or(pts));
        self.buf.clear();

        let mut offset = 0;
        let mut first = true;
        while offset < pes.len() {
            let (random_access, pcr) = if first {
                (packet.is_key, pcr)
            } else {
                (false, None)
            };
            let field_len = match (random_access, pcr) {
                (_, Some(_)) => 8,
                (true, None) => 2,
                (false, None) => 0,
            };
            let chunk = (pes.len() - offset).min(TS_PAYLOAD_SIZE - field_len);
            self.put_ts_packet(
                stream.pid,
                first,
                random_access,
                pcr,
                &pes[offset..offset + chunk],
            );
            offset += chunk;
            first = false;
        }

        let status = self.write_buffered().await;
        if status.is_err() {
            self.continuity = saved_continuity;
            self.last_pcr = saved_pcr;
        }
        status
    }

    async fn write_trailer(&mut self) -> Result<()> {
        self.writer.flush().await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ts::parser::TSPacketParser;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::task::{Context, Poll};
    use tokio::runtime::Runtime;

    fn video_stream() -> StreamDescriptor {
        StreamDescriptor::new(0, CodecType::H264, MPEG_TIME_BASE)
    }

    fn packets(data: &[u8]) -> Vec<&[u8]> {
        assert_eq!(data.len() % TS_PACKET_SIZE, 0);
        data.chunks(TS_PACKET_SIZE).collect()
    }

    #[test]
    fn test_header_writes_pat_and_pmt() {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let mut muxer = TSMuxer::new(Vec::new());
            muxer.write_header(&[video_stream()]).await.unwrap();
            let (data, _) = muxer.into_parts();

            let parser = TSPacketParser::new();
            let ts = packets(&data);
            assert_eq!(ts.len(), 2);
            let pat = parser.parse_packet(ts[0]).unwrap();
            assert_eq!(pat.header.pid, PID_PAT);
            let pmt = parser.parse_packet(ts[1]).unwrap();
            let (_, body) = parser.parse_section(pmt.payload).unwrap();
            let pmt = parser.parse_pmt(body).unwrap();
            assert_eq!(pmt.pcr_pid, 0x100);
            assert_eq!(pmt.elementary_stream_infos[0].stream_type, STREAM_TYPE_H264);
        });
    }

    #[test]
    fn test_packetization_and_continuity() {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let mut muxer = TSMuxer::new(Vec::new());
            muxer.write_header(&[video_stream()]).await.unwrap();
            let packet = Packet::new(vec![0x11; 400]).with_pts(0).with_key_flag(true);
            assert_eq!(muxer.write_packet(&packet).await.unwrap(), WriteStatus::Written);
            let (data, continuity) = muxer.into_parts();

            let parser = TSPacketParser::new();
            let ts: Vec<_> = packets(&data)[2..]
                .iter()
                .map(|p| parser.parse_packet(p).unwrap())
                .collect();
            // 14 byte PES header + 400 bytes over 176 + 184 + 54
            assert_eq!(ts.len(), 3);
            assert!(ts[0].header.payload_unit_start);
            let field = ts[0].adaptation.as_ref().unwrap();
            assert!(field.random_access);
            assert_eq!(field.pcr, Some(0));
            assert!(!ts[1].header.payload_unit_start);
            let counters: Vec<u8> = ts.iter().map(|p| p.header.continuity_counter).collect();
            assert_eq!(counters, vec![0, 1, 2]);
            let total: usize = ts.iter().map(|p| p.payload.len()).sum();
            assert_eq!(total, 414);
            assert_eq!(continuity.last(0x100), Some(2));
        });
    }

    #[tokio::test]
    async fn test_continuity_carries_over() {
        let mut first = TSMuxer::new(Vec::new());
        first.write_header(&[video_stream()]).await.unwrap();
        let (_, continuity) = first.into_parts();

        let mut second = TSMuxer::new(Vec::new()).with_continuity(continuity);
        second.write_header(&[video_stream()]).await.unwrap();
        assert_eq!(second.continuity().last(PID_PAT), Some(1));
        assert_eq!(second.continuity().last(PID_PMT), Some(1));
    }

    #[tokio::test]
    async fn test_unknown_stream_index_is_rejected() {
        let mut muxer = TSMuxer::new(Vec::new());
        muxer.write_header(&[video_stream()]).await.unwrap();
        let packet = Packet::new(vec![0; 10]).with_stream_index(3);
        assert!(muxer.write_packet(&packet).await.is_err());
    }

    struct ClosedPipe;

    impl AsyncWrite for ClosedPipe {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    /// Writer whose writes fail while `failing` is set.
    struct FlakyWriter {
        data: Vec<u8>,
        failing: Arc<AtomicBool>,
    }

    impl AsyncWrite for FlakyWriter {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            if self.failing.load(Ordering::SeqCst) {
                return Poll::Ready(Err(io::ErrorKind::Other.into()));
            }
            self.data.extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_continuity_gap() {
        let failing = Arc::new(AtomicBool::new(false));
        let writer = FlakyWriter {
            data: Vec::new(),
            failing: failing.clone(),
        };
        let mut muxer = TSMuxer::new(writer);
        muxer.write_header(&[video_stream()]).await.unwrap();

        let packet = |pts| Packet::new(vec![0x22; 100]).with_pts(pts);
        muxer.write_packet(&packet(0)).await.unwrap();
        failing.store(true, Ordering::SeqCst);
        assert!(muxer.write_packet(&packet(3600)).await.is_err());
        assert_eq!(muxer.continuity().last(0x100), Some(0));
        failing.store(false, Ordering::SeqCst);
        muxer.write_packet(&packet(7200)).await.unwrap();

        let (writer, _) = muxer.into_parts();
        let parser = TSPacketParser::new();
        let counters: Vec<u8> = packets(&writer.data)[2..]
            .iter()
            .map(|p| parser.parse_packet(p).unwrap().header.continuity_counter)
            .collect();
        assert_eq!(counters, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_closed_pipe_requests_end_of_stream() {
        let mut muxer = TSMuxer::new(ClosedPipe);
        assert!(muxer.write_header(&[video_stream()]).await.is_err());
        let packet = Packet::new(vec![0; 10]).with_pts(0);
        assert_eq!(
            muxer.write_packet(&packet).await.unwrap(),
            WriteStatus::EndOfStream
        );
    }
}
