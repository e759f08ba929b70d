// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use lockstep::backends::camera::types::CameraBackendType;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "lockstep")]
#[command(about = "Synchronized multi-camera capture, display and recording")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the capture pipeline
    Run {
        /// Configuration file (JSON); flags below override its values
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of lock-step sources
        #[arg(short, long)]
        sources: Option<usize>,

        /// Camera backend to use
        #[arg(short, long, value_enum)]
        backend: Option<CameraBackendType>,

        /// Recording output directory (default: ~/Videos/lockstep/TIMESTAMP)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Stop after this many delivered cycles
        #[arg(short, long)]
        frames: Option<u64>,

        /// Disable the terminal display sink
        #[arg(long)]
        no_display: bool,

        /// Disable the recording sink
        #[arg(long)]
        no_record: bool,
    },

    /// List available capture devices
    List {
        /// Camera backend to enumerate
        #[arg(short, long, value_enum, default_value_t = CameraBackendType::default())]
        backend: CameraBackendType,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG to control log level, e.g. RUST_LOG=lockstep=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::List { backend }) => cli::list_devices(backend),
        Some(Commands::Run {
            config,
            sources,
            backend,
            output,
            frames,
            no_display,
            no_record,
        }) => cli::run_pipeline(cli::RunArgs {
            config,
            sources,
            backend,
            output,
            frames,
            no_display,
            no_record,
        }),
        None => cli::run_pipeline(cli::RunArgs::default()),
    }
}
