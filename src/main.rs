// SPDX-License-Identifier: GPL-3.0-only

use clap::Parser;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "video-input")]
#[command(about = "Open a video uri and read frames from it")]
#[command(version = env!("GIT_VERSION"))]
#[command(after_help = cli::USAGE_EXAMPLES)]
struct Cli {
    /// Video uri, e.g. `convert:[fmt=RGB24]//v4l:///dev/video0`
    uri: Option<String>,

    /// Stop after this many frames (0 reads until the stream ends)
    #[arg(short = 'n', long, default_value = "0")]
    frames: u64,

    /// Save every frame as PNG into this directory
    #[arg(short, long)]
    save: Option<PathBuf>,

    /// Record raw frames into a .pvn file
    #[arg(short, long)]
    record: Option<PathBuf>,

    /// Print the source description as JSON
    #[arg(long)]
    json: bool,

    /// Poll without blocking instead of waiting for each frame
    #[arg(long)]
    nonblocking: bool,

    /// List registered driver schemes and exit
    #[arg(long)]
    list_drivers: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=video_input=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let args = Cli::parse();

    if args.list_drivers {
        return cli::list_drivers();
    }

    let options = cli::SessionOptions {
        frames: args.frames,
        save_dir: args.save,
        record: args.record,
        json: args.json,
        block: !args.nonblocking,
    };

    match args.uri {
        Some(uri) => cli::run(&uri, &options),
        None => cli::run_fallbacks(&options),
    }
}
