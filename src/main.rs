use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use env_logger::Env;
use futures::future::Either;
use log::{info, warn};
use tokio::fs::File;
use tokio::io::{AsyncRead, BufReader};

use live_segmenter::config::{SegmenterConfig, Settings};
use live_segmenter::format::TSDemuxer;
use live_segmenter::segment::{FileSegmentFactory, Pipeline, StderrReporter};
use live_segmenter::shutdown::termination_signal;
use live_segmenter::{Result, SegmenterError};

/// Splits a live MPEG transport stream read from stdin into fixed-duration segments.
#[derive(Parser)]
#[command(name = "live-segmenter", version)]
struct Cli {
    /// Target segment duration in seconds.
    segment_length: u32,

    /// Directory the segment files are written to.
    output_location: PathBuf,

    /// Segment file name prefix; files are named <prefix>-<8 digit sequence>.ts.
    filename_prefix: String,

    /// Label echoed in every completion record.
    encoding_profile: String,

    /// Read the transport stream from this file instead of stdin.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Settings file (TOML).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Segmenter error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut settings = Settings::discover(cli.config.as_deref())?.apply_process_env()?;
    if cli.input.is_some() {
        settings.input = cli.input;
    }
    let config = SegmenterConfig::new(
        cli.segment_length,
        cli.output_location,
        cli.filename_prefix,
        cli.encoding_profile,
        settings,
    )?;

    let input: Box<dyn AsyncRead + Unpin + Send> = match &config.settings.input {
        Some(path) => Box::new(File::open(path).await.map_err(|e| {
            SegmenterError::InputOpen(format!("{}: {}", path.display(), e))
        })?),
        None => Box::new(tokio::io::stdin()),
    };

    let demuxer =
        TSDemuxer::new(BufReader::new(input)).with_probe_size(config.settings.probe_size);
    let factory = FileSegmentFactory::new(&config.output_dir, &config.filename_prefix);
    let mut pipeline = Pipeline::new(demuxer, factory, StderrReporter, config.segment_options());

    let shutdown = match termination_signal() {
        Ok(signal) => Either::Left(signal),
        Err(e) => {
            warn!("Could not install signal handlers: {}", e);
            Either::Right(futures::future::pending::<()>())
        }
    };
    let summary = pipeline.run_until(shutdown).await?;
    info!(
        "wrote {} segment(s), {} packets ({} dropped), {:?}",
        summary.segments, summary.packets_written, summary.packets_dropped, summary.end_reason
    );
    Ok(())
}
