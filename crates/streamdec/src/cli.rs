use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "streamdec", about = "Streaming decoder for raw H.264 byte streams")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Decode a raw Annex-B .h264 file and report the frames found.
    Decode {
        /// Path to the raw .h264 elementary stream.
        #[arg(short, long)]
        input: PathBuf,

        /// Feed size in bytes, simulating chunked network arrival.
        #[arg(short, long, default_value_t = 4096)]
        chunk_size: usize,

        /// Re-feed the stream once if the first pass yields no frames.
        #[arg(long)]
        retry: bool,

        /// Skip the end-of-stream flush (streaming-style consumption).
        #[arg(long)]
        no_flush: bool,

        /// Directory to save decoded frames as PNGs.
        #[arg(long)]
        dump_frames: Option<PathBuf>,
    },

    /// Measure decode throughput over repeated passes.
    Bench {
        /// Path to the raw .h264 elementary stream.
        #[arg(short, long)]
        input: PathBuf,

        /// Number of decode passes.
        #[arg(short = 'n', long, default_value_t = 5)]
        passes: u32,

        /// Feed size in bytes.
        #[arg(short, long, default_value_t = 4096)]
        chunk_size: usize,
    },
}
