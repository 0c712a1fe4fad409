// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for camera operations
//!
//! This module provides command-line functionality for:
//! - Running the terminal preview
//! - Listing available cameras and picking one interactively
//! - Taking photos
//! - Recording videos
//! - Printing a diagnostics report

use chrono::Local;
use rpi_camera::Config;
use rpi_camera::app::CameraApp;
use rpi_camera::backends::camera::{
    CameraBackend, CameraDevice, CameraKind, CameraPreference, available_types, detect_cameras,
    open_camera,
};
use rpi_camera::diagnostics::DiagnosticsReport;
use rpi_camera::pipelines::photo::{PhotoEncoder, PhotoPipeline};
use rpi_camera::pipelines::video::{EncoderConfig, RecordingSession, VideoRecorder, recording_path};
use rpi_camera::storage::{ensure_save_directories, log_outcomes};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::warn;

/// Run the terminal preview with the configured camera
pub fn run_preview(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let stop = interrupt_flag()?;
    let mut app = CameraApp::new(config)?;
    rpi_camera::terminal::run(&mut app, &stop)
}

/// List all working cameras
pub fn list_cameras(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Detecting cameras...");
    let cameras = detect_cameras(&config.camera);

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for camera in &cameras {
        println!("  {}", describe(camera));
    }
    println!();

    Ok(())
}

fn describe(camera: &CameraDevice) -> String {
    let label = match camera.kind {
        CameraKind::PiCamera => "[PiCam]".to_string(),
        CameraKind::Usb { index } => format!("[USB {}]", index),
    };
    let mut line = format!("{} {}", label, camera.name);
    let details: Vec<&str> = [Some(camera.path.as_str()), camera.driver.as_deref()]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect();
    if !details.is_empty() {
        line.push_str(&format!(" ({})", details.join(", ")));
    }
    line
}

/// Choose a camera type and start the preview
///
/// With only one camera type attached it is selected automatically; with
/// both the user is asked.
pub fn launch(mut config: Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Camera Application Launcher");
    println!("{}", "=".repeat(40));

    let cameras = detect_cameras(&config.camera);
    let first_usb = cameras.iter().find_map(|c| match c.kind {
        CameraKind::Usb { index } => Some(index),
        CameraKind::PiCamera => None,
    });

    println!("Available cameras:");
    for camera in &cameras {
        println!("  {}", describe(camera));
    }

    let preference = match available_types(&cameras) {
        (false, false) => {
            println!("No cameras detected!");
            return Ok(());
        }
        (true, false) => {
            println!("\nOnly Pi Camera detected. Starting...");
            CameraPreference::PiCamera
        }
        (false, true) => {
            println!("\nOnly USB Camera detected. Starting...");
            CameraPreference::Usb
        }
        (true, true) => {
            println!("\nMultiple cameras detected.");
            match prompt_camera_type()? {
                Some(preference) => preference,
                None => {
                    println!("\nExiting...");
                    return Ok(());
                }
            }
        }
    };

    config.camera.preferred_type = preference;
    if preference == CameraPreference::Usb
        && let Some(index) = first_usb
    {
        config.camera.preferred_index = index;
    }
    run_preview(config)
}

/// Ask until the answer is valid; `None` on end of input
fn prompt_camera_type() -> Result<Option<CameraPreference>, Box<dyn std::error::Error>> {
    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    loop {
        print!("Select camera (1 for Pi Camera, 2 for USB Camera): ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        match parse_choice(&line) {
            Some(preference) => return Ok(Some(preference)),
            None => println!("Invalid choice. Please enter 1 or 2."),
        }
    }
}

fn parse_choice(line: &str) -> Option<CameraPreference> {
    match line.trim() {
        "1" => Some(CameraPreference::PiCamera),
        "2" => Some(CameraPreference::Usb),
        _ => None,
    }
}

/// Take a photo after the sensor has settled
pub fn take_photo(config: Config, output: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let mut camera = open_camera(config.camera.preferred_type, &config.camera)?;
    println!("Using camera: {} ({})", camera.kind(), camera.device().name);
    println!("Capture format: {}", camera.format());

    // Wait for frames to stabilize (camera warm-up)
    println!("Capturing...");
    let warmup = Duration::from_millis(config.camera.warmup_ms);
    let start = Instant::now();
    let mut frame = camera.read_frame()?;
    while start.elapsed() < warmup {
        match camera.read_frame() {
            Ok(f) => frame = f,
            Err(e) => warn!(error = %e, "Frame dropped during warm-up"),
        }
    }
    drop(camera);

    let path = match output {
        // A file name was given: write exactly there
        Some(path) if !path.is_dir() => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            PhotoEncoder::new().save_as(&frame.image, &path)?;
            path
        }
        Some(dir) => PhotoPipeline::new().save(&frame.image, &dir, &Local::now().naive_local())?,
        None => {
            let images = save_dirs(config).images;
            PhotoPipeline::new().save(&frame.image, &images, &Local::now().naive_local())?
        }
    };

    println!("Photo saved: {}", path.display());
    Ok(())
}

/// Record for `duration` seconds; Ctrl+C stops early
pub fn record_video(
    config: Config,
    duration: u64,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let stop_flag = interrupt_flag()?;

    let mut camera = open_camera(config.camera.preferred_type, &config.camera)?;
    println!("Using camera: {} ({})", camera.kind(), camera.device().name);

    // The first frame fixes the recording size
    let first = camera.read_frame()?;
    let encoder_config = EncoderConfig::from_settings(&config.video, first.width(), first.height());
    println!(
        "Recording format: {}x{} @ {}fps ({}, {} quality)",
        encoder_config.width,
        encoder_config.height,
        encoder_config.fps,
        encoder_config.codec,
        encoder_config.quality.display_name()
    );

    let output_path = resolve_video_path(output, &config, &encoder_config)?;
    println!("Output: {}", output_path.display());
    println!("Duration: {} seconds", duration);

    let recorder = VideoRecorder::new(&output_path, &encoder_config)?;
    let mut session = RecordingSession::new(recorder, output_path);

    println!();
    println!("Recording... (press Ctrl+C to stop early)");
    session.write(&first.image)?;

    let target_duration = Duration::from_secs(duration);
    let mut last_shown = u64::MAX;
    while session.elapsed() < target_duration {
        if stop_flag.load(Ordering::SeqCst) {
            println!();
            println!("Stopping early...");
            break;
        }

        match camera.read_frame() {
            Ok(frame) => {
                if let Err(e) = session.write(&frame.image) {
                    warn!(error = %e, "Failed to write video frame");
                }
            }
            Err(e) => warn!(error = %e, "Failed to read frame"),
        }

        let elapsed = session.elapsed().as_secs();
        if elapsed != last_shown {
            last_shown = elapsed;
            print!(
                "\rRecording: {:02}:{:02} ({} frames)",
                elapsed / 60,
                elapsed % 60,
                session.frames()
            );
            std::io::stdout().flush()?;
        }
    }
    println!();
    drop(camera);

    let summary = session.finish()?;
    println!(
        "Video saved: {} ({} frames, {:.1}s)",
        summary.path.display(),
        summary.frames,
        summary.duration.as_secs_f64()
    );
    Ok(())
}

fn resolve_video_path(
    output: Option<PathBuf>,
    config: &Config,
    encoder_config: &EncoderConfig,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let timestamp = Local::now().naive_local();
    Ok(match output {
        Some(path) if !path.is_dir() => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(encoder_config.codec.extension()) {
                warn!(
                    path = %path.display(),
                    expected = encoder_config.codec.extension(),
                    "Output extension does not match the codec's container"
                );
            }
            path
        }
        Some(dir) => recording_path(&dir, &timestamp, encoder_config.codec),
        None => {
            let videos = save_dirs(config.clone()).videos;
            recording_path(&videos, &timestamp, encoder_config.codec)
        }
    })
}

/// Configured save directories, with fallbacks applied
fn save_dirs(mut config: Config) -> rpi_camera::config::SavePaths {
    let outcomes = ensure_save_directories(&mut config.save_paths);
    log_outcomes(&outcomes);
    config.save_paths
}

/// Print the diagnostics report, optionally saving it
pub fn run_diagnostics(output: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    println!("Collecting diagnostics, this can take a few seconds...");
    let report = DiagnosticsReport::collect();
    let text = report.to_markdown();
    println!("{}", text);

    if let Some(path) = output {
        write_report(&path, &text)?;
        println!("Report saved: {}", path.display());
    }
    Ok(())
}

fn write_report(path: &Path, text: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, text)
}

/// Flag set by Ctrl+C (SIGINT)
fn interrupt_flag() -> Result<Arc<AtomicBool>, Box<dyn std::error::Error>> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = flag.clone();
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })?;
    Ok(flag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_choice() {
        assert_eq!(parse_choice("1\n"), Some(CameraPreference::PiCamera));
        assert_eq!(parse_choice(" 2 "), Some(CameraPreference::Usb));
        assert_eq!(parse_choice("3"), None);
        assert_eq!(parse_choice(""), None);
    }

    #[test]
    fn test_describe_usb_camera() {
        let camera = CameraDevice {
            name: "HD Webcam".into(),
            kind: CameraKind::Usb { index: 2 },
            path: "/dev/video2".into(),
            driver: Some("uvcvideo".into()),
        };
        assert_eq!(describe(&camera), "[USB 2] HD Webcam (/dev/video2, uvcvideo)");
    }

    #[test]
    fn test_describe_auto_selected_pi_camera() {
        let camera = CameraDevice {
            name: "Pi Camera".into(),
            kind: CameraKind::PiCamera,
            path: String::new(),
            driver: None,
        };
        assert_eq!(describe(&camera), "[PiCam] Pi Camera");
    }
}
