// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the recording state machine

use chrono::NaiveDate;
use image::RgbImage;
use rpi_camera::config::VideoSettings;
use rpi_camera::errors::RecordingError;
use rpi_camera::pipelines::video::{EncoderConfig, Recorder, VideoCodec, VideoWriter, recording_path};
use std::cell::Cell;
use std::path::{Path, PathBuf};

/// Writer that only counts frames
struct MemoryWriter {
    path: PathBuf,
    frames: usize,
}

impl VideoWriter for MemoryWriter {
    fn write_frame(&mut self, _frame: &RgbImage) -> Result<(), RecordingError> {
        self.frames += 1;
        Ok(())
    }

    fn finish(self) -> Result<PathBuf, RecordingError> {
        Ok(self.path)
    }
}

fn memory_writer(path: &Path) -> Result<MemoryWriter, RecordingError> {
    Ok(MemoryWriter {
        path: path.to_path_buf(),
        frames: 0,
    })
}

#[test]
fn test_stop_while_idle_is_noop() {
    let mut recorder: Recorder<MemoryWriter> = Recorder::new();
    assert!(!recorder.is_recording());
    assert_eq!(recorder.stop().unwrap(), None);
    assert!(!recorder.is_recording());
}

#[test]
fn test_start_while_recording_does_not_call_factory() {
    let mut recorder = Recorder::new();
    assert!(recorder.start_with(PathBuf::from("first.mp4"), memory_writer).unwrap());

    let calls = Cell::new(0);
    let started = recorder
        .start_with(PathBuf::from("second.mp4"), |p| {
            calls.set(calls.get() + 1);
            memory_writer(p)
        })
        .unwrap();

    assert!(!started);
    assert_eq!(calls.get(), 0);
    assert_eq!(recorder.path(), Some(Path::new("first.mp4")));
}

#[test]
fn test_full_cycle() {
    let mut recorder = Recorder::new();
    recorder.start_with(PathBuf::from("clip.avi"), memory_writer).unwrap();
    assert!(recorder.elapsed().is_some());

    let frame = RgbImage::new(8, 8);
    for _ in 0..4 {
        recorder.write(&frame).unwrap();
    }

    let summary = recorder.stop().unwrap().unwrap();
    assert_eq!(summary.frames, 4);
    assert_eq!(summary.path, PathBuf::from("clip.avi"));
    assert!(!recorder.is_recording());
    assert_eq!(recorder.elapsed(), None);

    // Idle again: a new recording can start
    assert!(recorder.start_with(PathBuf::from("next.avi"), memory_writer).unwrap());
}

#[test]
fn test_failed_start_stays_idle() {
    let mut recorder: Recorder<MemoryWriter> = Recorder::new();
    let result = recorder.start_with(PathBuf::from("x.mp4"), |_| {
        Err(RecordingError::EncoderNotAvailable("none".into()))
    });
    assert!(result.is_err());
    assert!(!recorder.is_recording());
}

#[test]
fn test_recording_path_uses_codec_container() {
    let dir = std::env::temp_dir();
    let ts = NaiveDate::from_ymd_opt(2024, 12, 24)
        .unwrap()
        .and_hms_opt(18, 30, 0)
        .unwrap();

    let path = recording_path(&dir, &ts, VideoCodec::Mjpeg);
    assert_eq!(path.file_name().unwrap().to_string_lossy(), "Video20241224_183000.avi");

    let path = recording_path(&dir, &ts, VideoCodec::H264);
    assert_eq!(path.extension().unwrap(), "h264");
}

#[test]
fn test_encoder_config_from_settings() {
    let video = VideoSettings {
        codec: "mjpg".into(),
        ..VideoSettings::default()
    };
    let config = EncoderConfig::from_settings(&video, 1920, 1080);
    assert_eq!(config.codec, VideoCodec::Mjpeg);
    assert_eq!((config.width, config.height, config.fps), (1920, 1080, 30));
}
