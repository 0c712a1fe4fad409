// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use rpi_camera::Config;
use rpi_camera::backends::camera::CameraPreference;
use rpi_camera::constants::VideoQuality;
use std::path::PathBuf;

fn temp_file(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("rpi-camera-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!((config.camera.width, config.camera.height), (1280, 720));
    assert_eq!(config.camera.fps, 30);
    assert!(config.camera.auto_detect);
    assert_eq!(config.camera.preferred_type, CameraPreference::Auto);
    assert_eq!(config.video.codec, "mp4v");
    assert_eq!(config.video.quality, VideoQuality::High);
    assert!(config.display.show_status, "Overlay should be on by default");
    assert!(config.save_paths.images.ends_with("Pictures"));
    assert!(config.save_paths.videos.ends_with("Movies"));
}

#[test]
fn test_missing_file_is_created_with_defaults() {
    let path = temp_file("missing.json");

    let config = Config::load(&path);
    assert_eq!(config, Config::default());
    assert!(path.exists(), "Default config should be written");

    // Loading the written file gives the same config
    assert_eq!(Config::load(&path), config);
}

#[test]
fn test_partial_file_keeps_every_default() {
    let config = Config::from_json_str(
        r#"{
            "camera": {"preferred_type": "picam", "fps": 15},
            "display": {"show_controls": false}
        }"#,
    )
    .unwrap();

    assert_eq!(config.camera.preferred_type, CameraPreference::PiCamera);
    assert_eq!(config.camera.fps, 15);
    assert_eq!(config.camera.width, 1280);
    assert!(!config.display.show_controls);
    assert!(config.display.show_fps);
    assert_eq!(config.video, Config::default().video);
}

#[test]
fn test_merge_is_idempotent() {
    let path = temp_file("roundtrip.json");
    let config = Config::from_json_str(r#"{"video": {"codec": "H264", "quality": "low"}}"#).unwrap();

    config.save(&path).unwrap();
    let reloaded = Config::load(&path);
    assert_eq!(reloaded, config);

    reloaded.save(&path).unwrap();
    assert_eq!(Config::load(&path), config);
}

#[test]
fn test_unknown_keys_are_ignored() {
    let config = Config::from_json_str(r#"{"camera": {"width": 640, "zoom": 2}, "audio": {}}"#).unwrap();
    assert_eq!(config.camera.width, 640);
}

#[test]
fn test_invalid_file_falls_back_without_overwriting() {
    let path = temp_file("broken.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert_eq!(Config::load(&path), Config::default());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
}

#[test]
fn test_unknown_camera_type_keeps_default() {
    let config = Config::from_json_str(r#"{"camera": {"preferred_type": "webcam", "width": 800}}"#).unwrap();
    assert_eq!(config.camera.preferred_type, CameraPreference::Auto);
    assert_eq!(config.camera.width, 800);
}

#[test]
fn test_bad_values_keep_the_valid_keys() {
    let path = temp_file("partly-invalid.json");
    std::fs::write(
        &path,
        r#"{
            "camera": {"width": 640, "height": 480, "preferred_type": "PICAM", "fps": 30.0},
            "video": {"quality": "ultra", "codec": "MJPG"},
            "save_paths": {"images": "/srv/pics"}
        }"#,
    )
    .unwrap();

    let config = Config::load(&path);
    assert_eq!((config.camera.width, config.camera.height), (640, 480));
    assert_eq!(config.camera.preferred_type, CameraPreference::PiCamera);
    assert_eq!(config.camera.fps, 30, "Float fps falls back to the default");
    assert_eq!(config.video.quality, VideoQuality::High);
    assert_eq!(config.video.codec, "MJPG");
    assert_eq!(config.save_paths.images, PathBuf::from("/srv/pics"));
    assert_eq!(config.save_paths.videos, Config::default().save_paths.videos);
}

#[test]
fn test_preferred_type_ignores_case() {
    for (text, expected) in [
        ("USB", CameraPreference::Usb),
        ("Auto", CameraPreference::Auto),
        ("PiCam", CameraPreference::PiCamera),
        ("picamera", CameraPreference::PiCamera),
    ] {
        let json = format!(r#"{{"camera": {{"preferred_type": "{}"}}}}"#, text);
        let config = Config::from_json_str(&json).unwrap();
        assert_eq!(config.camera.preferred_type, expected, "{}", text);
    }
}

