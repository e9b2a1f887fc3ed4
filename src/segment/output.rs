//! Segment destinations.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::info;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

use super::writer::SegmentFactory;
use crate::format::ts::{ContinuityCounters, TSMuxer};
use crate::{Result, SegmenterError};

/// Writes each segment to `<dir>/<prefix>-<sequence>.ts`, the sequence zero padded to
/// eight digits.
pub struct FileSegmentFactory {
    dir: PathBuf,
    prefix: String,
    continuity: ContinuityCounters,
}

impl FileSegmentFactory {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            continuity: ContinuityCounters::new(),
        }
    }

    pub fn segment_path(&self, sequence: u32) -> PathBuf {
        segment_path(&self.dir, &self.prefix, sequence)
    }
}

pub fn segment_path(dir: &Path, prefix: &str, sequence: u32) -> PathBuf {
    dir.join(format!("{}-{:08}.ts", prefix, sequence))
}

#[async_trait]
impl SegmentFactory for FileSegmentFactory {
    type Output = TSMuxer<BufWriter<File>>;

    async fn create(&mut self, sequence: u32) -> Result<Self::Output> {
        let path = self.segment_path(sequence);
        let file = File::create(&path)
            .await
            .map_err(|source| SegmenterError::Destination {
                path: path.clone(),
                source,
            })?;
        info!("writing segment {}", path.display());
        Ok(TSMuxer::new(BufWriter::new(file)).with_continuity(self.continuity.clone()))
    }

    async fn close(&mut self, _sequence: u32, output: Self::Output) -> Result<()> {
        let (mut writer, continuity) = output.into_parts();
        self.continuity = continuity;
        writer.shutdown().await?;
        Ok(())
    }
}

/// Keeps finished segments in memory.
#[derive(Default)]
pub struct MemorySegmentFactory {
    pub segments: Vec<(u32, Vec<u8>)>,
    continuity: ContinuityCounters,
}

impl MemorySegmentFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SegmentFactory for MemorySegmentFactory {
    type Output = TSMuxer<Vec<u8>>;

    async fn create(&mut self, _sequence: u32) -> Result<Self::Output> {
        Ok(TSMuxer::new(Vec::new()).with_continuity(self.continuity.clone()))
    }

    async fn close(&mut self, sequence: u32, output: Self::Output) -> Result<()> {
        let (data, continuity) = output.into_parts();
        self.continuity = continuity;
        self.segments.push((sequence, data));
        Ok(())
    }
}
