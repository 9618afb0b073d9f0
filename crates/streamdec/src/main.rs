mod cli;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};

use streamdec_core::frame::Frame;
use streamdec_core::session::DecoderSession;
use streamdec_core::stream::{self, StreamOptions};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = cli::Cli::parse();

    match cli.command {
        cli::Command::Decode {
            input,
            chunk_size,
            retry,
            no_flush,
            dump_frames,
        } => decode(input, chunk_size, retry, no_flush, dump_frames),
        cli::Command::Bench {
            input,
            passes,
            chunk_size,
        } => bench(input, passes, chunk_size),
    }
}

fn decode(
    input: PathBuf,
    chunk_size: usize,
    retry: bool,
    no_flush: bool,
    dump_frames: Option<PathBuf>,
) -> Result<()> {
    let data = std::fs::read(&input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    info!(?input, bytes = data.len(), chunk_size, "decoding");

    let mut session = DecoderSession::new().context("failed to create decoder session")?;
    let options = StreamOptions {
        chunk_size: Some(chunk_size),
        allow_retry: retry,
        flush: !no_flush,
    };
    let frames = stream::decode_stream(&mut session, &data, &options)?;

    for (i, frame) in frames.iter().enumerate() {
        debug!(
            frame = i,
            width = frame.width(),
            height = frame.height(),
            rowsize = frame.rowsize(),
            "decoded frame"
        );
    }

    if frames.is_empty() {
        warn!("no frames decoded; for some streams --retry helps");
    }

    if let Some(dir) = dump_frames {
        save_frames(&frames, &dir)?;
    }

    info!(frame_count = frames.len(), "decode complete");
    Ok(())
}

fn bench(input: PathBuf, passes: u32, chunk_size: usize) -> Result<()> {
    let data = std::fs::read(&input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    info!(?input, bytes = data.len(), passes, chunk_size, "benchmarking");

    let options = StreamOptions {
        chunk_size: Some(chunk_size),
        allow_retry: false,
        flush: true,
    };

    let mut total_frames = 0usize;
    let start = Instant::now();
    for pass in 0..passes {
        let mut session =
            DecoderSession::new().context("failed to create decoder session")?;
        let frames = stream::decode_stream(&mut session, &data, &options)?;
        total_frames += frames.len();
        debug!(pass, frames = frames.len(), "pass complete");
    }
    let elapsed = start.elapsed().as_secs_f64();

    let megabytes = data.len() as f64 * passes as f64 / (1024.0 * 1024.0);
    info!(
        seconds = elapsed,
        mb_per_s = megabytes / elapsed,
        frames_per_s = total_frames as f64 / elapsed,
        total_frames,
        "benchmark complete"
    );
    Ok(())
}

/// Write decoded frames as PNGs, padding stripped.
fn save_frames(frames: &[Frame], dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    for (i, frame) in frames.iter().enumerate() {
        let path = dir.join(format!("frame_{i:06}.png"));
        frame
            .to_image()
            .save(&path)
            .with_context(|| format!("failed to save {}", path.display()))?;
    }
    info!(?dir, count = frames.len(), "frames written");
    Ok(())
}
