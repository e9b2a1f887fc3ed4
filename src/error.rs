use std::num::ParseIntError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the segmenter.
///
/// Everything except the per-packet write failures the pipeline absorbs is fatal: it
/// travels up to the caller, which decides the process exit status.
#[derive(Error, Debug)]
pub enum SegmenterError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("parser error: {0}")]
    Parser(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("parse int error: {0}")]
    ParseInt(#[from] ParseIntError),

    #[error("could not open input: {0}")]
    InputOpen(String),

    #[error("could not read stream information: {0}")]
    StreamInfo(String),

    #[error("could not allocate output stream: {0}")]
    StreamAllocation(String),

    #[error("could not open '{}': {source}", path.display())]
    Destination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not write header of segment {sequence}: {reason}")]
    Header { sequence: u32, reason: String },

    #[error("could not write trailer of segment {sequence}: {reason}")]
    Trailer { sequence: u32, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SegmenterError>;
