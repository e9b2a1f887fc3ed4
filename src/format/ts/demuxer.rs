use std::collections::{HashMap, VecDeque};
use std::io;

use async_trait::async_trait;
use bytes::BytesMut;
use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::parser::TSPacketParser;
use super::pes::PESHeader;
use super::types::*;
use crate::av::{Demuxer, Packet, StreamDescriptor};
use crate::codec::StreamProber;
use crate::{Result, SegmenterError};

/// Bytes read while looking for stream parameters before giving up on unprobed streams.
pub const DEFAULT_PROBE_SIZE: usize = 5_000_000;

/// MPEG transport stream demuxer for a single program.
///
/// PES packets are reassembled into access units. Until [`Demuxer::streams`] has
/// finished probing, every completed access unit is also handed to the codec prober of
/// its stream; those units are queued and returned by `read_packet` afterwards, so no
/// data is lost to probing.
pub struct TSDemuxer<R: AsyncRead + Unpin + Send> {
    reader: R,
    parser: TSPacketParser,
    pmt_pid: Option<u16>,
    pmt_received: bool,
    streams: Vec<ElementaryStream>,
    pids: HashMap<u16, usize>,
    ready: VecDeque<Packet>,
    probe_size: usize,
    bytes_read: usize,
    probed: bool,
    eof: bool,
}

struct ElementaryStream {
    pid: u16,
    descriptor: StreamDescriptor,
    prober: StreamProber,
    pes: Option<PESBuilder>,
    discard: bool,
}

/// Access unit being reassembled from transport packets.
struct PESBuilder {
    pts: Option<u64>,
    dts: Option<u64>,
    random_access: bool,
    /// Payload size announced by PES_packet_length
    expected: Option<usize>,
    data: BytesMut,
}

impl PESBuilder {
    fn is_complete(&self) -> bool {
        self.expected.is_some_and(|n| self.data.len() >= n)
    }
}

impl<R: AsyncRead + Unpin + Send> TSDemuxer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            parser: TSPacketParser::new(),
            pmt_pid: None,
            pmt_received: false,
            streams: Vec::new(),
            pids: HashMap::new(),
            ready: VecDeque::new(),
            probe_size: DEFAULT_PROBE_SIZE,
            bytes_read: 0,
            probed: false,
            eof: false,
        }
    }

    pub fn with_probe_size(mut self, probe_size: usize) -> Self {
        self.probe_size = probe_size;
        self
    }

    /// PID the stream at `index` is carried on.
    pub fn pid(&self, index: usize) -> Option<u16> {
        self.streams.get(index).map(|s| s.pid)
    }

    async fn fill(&mut self, buf: &mut [u8]) -> Result<bool> {
        match self.reader.read_exact(buf).await {
            Ok(_) => {
                self.bytes_read += buf.len();
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Reads the next 188 byte packet, resynchronising on the sync byte if needed.
    async fn next_ts_packet(&mut self) -> Result<Option<[u8; TS_PACKET_SIZE]>> {
        let mut packet = [0u8; TS_PACKET_SIZE];
        if !self.fill(&mut packet).await? {
            return Ok(None);
        }
        while packet[0] != SYNC_BYTE {
            let skip = packet
                .iter()
                .position(|&b| b == SYNC_BYTE)
                .unwrap_or(TS_PACKET_SIZE);
            debug!("lost transport stream sync, skipping {} bytes", skip);
            packet.copy_within(skip.., 0);
            if !self.fill(&mut packet[TS_PACKET_SIZE - skip..]).await? {
                return Ok(None);
            }
        }
        Ok(Some(packet))
    }

    fn handle_ts_packet(&mut self, data: &[u8]) {
        let ts = match self.parser.parse_packet(data) {
            Ok(ts) => ts,
            Err(e) => {
                debug!("skipping transport packet: {}", e);
                return;
            }
        };
        let header = &ts.header;
        if header.transport_error || header.scrambling_control != 0 {
            return;
        }

        if header.pid == PID_PAT {
            if header.payload_unit_start {
                self.handle_pat(ts.payload);
            }
        } else if Some(header.pid) == self.pmt_pid {
            if header.payload_unit_start {
                self.handle_pmt(ts.payload);
            }
        } else if let Some(&index) = self.pids.get(&header.pid) {
            let random_access = ts.adaptation.as_ref().is_some_and(|a| a.random_access);
            self.handle_pes_payload(index, header.payload_unit_start, random_access, ts.payload);
        }
    }

    fn handle_pat(&mut self, payload: &[u8]) {
        let pat = self
            .parser
            .parse_section(payload)
            .and_then(|(_, body)| self.parser.parse_pat(body));
        match pat {
            Ok(pat) => {
                if let Some(pid) = pat.program_map_pid() {
                    if self.pmt_pid != Some(pid) {
                        debug!("program map table on PID {:#06x}", pid);
                        self.pmt_pid = Some(pid);
                    }
                }
            }
            Err(e) => warn!("ignoring program association table: {}", e),
        }
    }

    fn handle_pmt(&mut self, payload: &[u8]) {
        if self.pmt_received {
            return;
        }
        let pmt = match self
            .parser
            .parse_section(payload)
            .and_then(|(_, body)| self.parser.parse_pmt(body))
        {
            Ok(pmt) => pmt,
            Err(e) => {
                warn!("ignoring program map table: {}", e);
                return;
            }
        };

        for (index, info) in pmt.elementary_stream_infos.iter().enumerate() {
            let codec = codec_for_stream_type(info.stream_type, &info.descriptors);
            debug!(
                "stream {}: PID {:#06x}, stream type {:#04x}, {:?}",
                index, info.elementary_pid, info.stream_type, codec
            );
            self.pids.insert(info.elementary_pid, index);
            self.streams.push(ElementaryStream {
                pid: info.elementary_pid,
                descriptor: StreamDescriptor::new(index, codec, MPEG_TIME_BASE)
                    .with_codec_tag(info.stream_type as u32),
                prober: StreamProber::for_codec(codec),
                pes: None,
                discard: false,
            });
        }
        self.pmt_received = true;
    }

    fn handle_pes_payload(
        &mut self,
        index: usize,
        unit_start: bool,
        random_access: bool,
        payload: &[u8],
    ) {
        let mut finished = Vec::with_capacity(2);
        {
            let stream = &mut self.streams[index];
            if stream.discard {
                stream.pes = None;
                return;
            }

            if unit_start {
                finished.extend(stream.pes.take());
                match PESHeader::parse(payload) {
                    Ok((header, offset)) => {
                        let expected = (header.packet_length > 0)
                            .then(|| (header.packet_length as usize + 6).checked_sub(offset))
                            .flatten();
                        stream.pes = Some(PESBuilder {
                            pts: header.pts,
                            dts: header.dts,
                            random_access,
                            expected,
                            data: BytesMut::from(&payload[offset..]),
                        });
                    }
                    Err(e) => debug!("stream {}: dropping PES packet: {}", index, e),
                }
            } else if let Some(pes) = stream.pes.as_mut() {
                pes.data.extend_from_slice(payload);
            }

            if stream.pes.as_ref().is_some_and(PESBuilder::is_complete) {
                finished.extend(stream.pes.take());
            }
        }

        for pes in finished {
            self.emit(index, pes);
        }
    }

    fn emit(&mut self, index: usize, mut pes: PESBuilder) {
        if let Some(expected) = pes.expected {
            pes.data.truncate(expected);
        }
        if pes.data.is_empty() {
            return;
        }
        let data = pes.data.freeze();

        let stream = &mut self.streams[index];
        if !self.probed {
            stream.prober.feed(&mut stream.descriptor, &data);
        }

        let mut packet = Packet::new(data)
            .with_stream_index(index)
            .with_key_flag(pes.random_access);
        packet.pts = pes.pts.map(|ts| ts as i64);
        packet.dts = pes.dts.map(|ts| ts as i64);
        self.ready.push_back(packet);
    }

    fn flush_pending(&mut self) {
        for index in 0..self.streams.len() {
            if let Some(pes) = self.streams[index].pes.take() {
                self.emit(index, pes);
            }
        }
    }

    fn all_probed(&self) -> bool {
        self.pmt_received && self.streams.iter().all(|s| s.descriptor.is_probed())
    }

    async fn probe(&mut self) -> Result<()> {
        let start = self.bytes_read;

        while !self.all_probed() {
            if self.bytes_read - start >= self.probe_size {
                if !self.pmt_received {
                    return Err(SegmenterError::StreamInfo(format!(
                        "no program map table in the first {} bytes",
                        self.probe_size
                    )));
                }
                for stream in self.streams.iter().filter(|s| !s.descriptor.is_probed()) {
                    warn!(
                        "stream {} ({:?}) not fully probed after {} bytes",
                        stream.descriptor.index, stream.descriptor.codec, self.probe_size
                    );
                }
                break;
            }

            match self.next_ts_packet().await? {
                Some(packet) => self.handle_ts_packet(&packet),
                None => {
                    self.eof = true;
                    self.flush_pending();
                    if !self.pmt_received {
                        return Err(SegmenterError::StreamInfo(
                            "input ended before a program map table was found".into(),
                        ));
                    }
                    break;
                }
            }
        }

        self.probed = true;
        debug!(
            "probed {} streams in {} bytes",
            self.streams.len(),
            self.bytes_read - start
        );
        Ok(())
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> Demuxer for TSDemuxer<R> {
    async fn read_packet(&mut self) -> Result<Option<Packet>> {
        loop {
            while let Some(packet) = self.ready.pop_front() {
                let wanted = self
                    .streams
                    .get(packet.stream_index)
                    .is_some_and(|s| !s.discard);
                if wanted {
                    return Ok(Some(packet));
                }
            }
            if self.eof {
                return Ok(None);
            }

            match self.next_ts_packet().await? {
                Some(packet) => self.handle_ts_packet(&packet),
                None => {
                    self.eof = true;
                    self.flush_pending();
                }
            }
        }
    }

    async fn streams(&mut self) -> Result<Vec<StreamDescriptor>> {
        if !self.probed {
            self.probe().await?;
        }
        Ok(self.streams.iter().map(|s| s.descriptor.clone()).collect())
    }

    fn set_discard(&mut self, index: usize, discard: bool) {
        if let Some(stream) = self.streams.get_mut(index) {
            stream.discard = discard;
            if discard {
                stream.pes = None;
            }
        }
    }
}
