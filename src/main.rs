// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use rpi_camera::Config;
use rpi_camera::backends::camera::CameraPreference;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

mod cli;

#[derive(Parser)]
#[command(name = "rpi-camera")]
#[command(about = "Camera preview, stills and video recording for Raspberry Pi")]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    /// Configuration file (created with defaults if missing)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Camera type to use: auto, usb or picam
    #[arg(long, global = true)]
    camera: Option<CameraPreference>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List,

    /// Detect cameras and ask which one to use when both types are present
    Launch,

    /// Take a photo
    Photo {
        /// Output file or directory (default: save_paths.images)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Record a video
    Video {
        /// Recording duration in seconds
        #[arg(short, long, default_value = "10")]
        duration: u64,

        /// Output file or directory (default: save_paths.videos)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print a camera diagnostics report
    Debug {
        /// Also write the report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // The preview owns the terminal, so its logs go to a file
    let preview = matches!(cli.command, None | Some(Commands::Launch));
    init_logging(preview);

    // Diagnostics must work even when the config is broken
    if let Some(Commands::Debug { output }) = &cli.command {
        return cli::run_diagnostics(output.clone());
    }

    let config_path = cli.config.unwrap_or_else(Config::default_path);
    let mut config = Config::load(&config_path);
    if let Some(camera) = cli.camera {
        config.camera.preferred_type = camera;
    }

    match cli.command {
        None => cli::run_preview(config),
        Some(Commands::List) => cli::list_cameras(&config),
        Some(Commands::Launch) => cli::launch(config),
        Some(Commands::Photo { output }) => cli::take_photo(config, output),
        Some(Commands::Video { duration, output }) => cli::record_video(config, duration, output),
        Some(Commands::Debug { .. }) => Ok(()),
    }
}

/// Set RUST_LOG environment variable to control log level
/// Examples: RUST_LOG=debug, RUST_LOG=rpi_camera=debug, RUST_LOG=info
fn init_logging(to_file: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(true)
        .with_level(true);

    if to_file && let Some(file) = open_preview_log() {
        builder.with_ansi(false).with_writer(Mutex::new(file)).init();
    } else {
        builder.with_writer(std::io::stderr).init();
    }
}

fn open_preview_log() -> Option<File> {
    let path = rpi_camera::storage::preview_log_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok()?;
    }
    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Could not open log file {}: {}", path.display(), e);
            None
        }
    }
}
