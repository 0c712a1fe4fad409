// SPDX-License-Identifier: GPL-3.0-only

//! JSON configuration file
//!
//! The file is merged key by key over the defaults: a partial file only
//! overrides the keys it names, unknown keys are ignored, and a key with an
//! invalid value keeps its default without affecting the rest of the file.

use crate::backends::camera::CameraPreference;
use crate::constants::{VideoQuality, defaults};
use crate::errors::{AppError, AppResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Camera capture settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Probe other USB indices when `preferred_index` does not work
    pub auto_detect: bool,
    /// First `/dev/videoN` index tried for USB cameras
    pub preferred_index: u32,
    pub preferred_type: CameraPreference,
    /// USB indices `0..max_usb_probe` are probed
    pub max_usb_probe: u32,
    /// Delay before a one-shot still so exposure can settle
    pub warmup_ms: u64,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            width: defaults::CAMERA_WIDTH,
            height: defaults::CAMERA_HEIGHT,
            fps: defaults::CAMERA_FPS,
            auto_detect: true,
            preferred_index: 0,
            preferred_type: CameraPreference::Auto,
            max_usb_probe: defaults::MAX_USB_PROBE,
            warmup_ms: defaults::WARMUP_MS,
        }
    }
}

/// Video recording settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    /// FourCC of the codec ("mp4v", "MJPG", "H264"); kept as text so an
    /// unknown value never makes the whole file unreadable
    pub codec: String,
    pub quality: VideoQuality,
    pub fps: u32,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            codec: defaults::VIDEO_CODEC.to_string(),
            quality: VideoQuality::default(),
            fps: defaults::VIDEO_FPS,
        }
    }
}

/// Output directories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SavePaths {
    pub images: PathBuf,
    pub videos: PathBuf,
}

impl Default for SavePaths {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            images: home.join(crate::constants::storage::IMAGES_FOLDER),
            videos: home.join(crate::constants::storage::VIDEOS_FOLDER),
        }
    }
}

/// Which overlay elements are drawn on the preview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub show_fps: bool,
    /// Master switch for the whole overlay
    pub show_status: bool,
    pub show_timestamp: bool,
    pub show_controls: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            show_fps: true,
            show_status: true,
            show_timestamp: true,
            show_controls: true,
        }
    }
}

impl DisplaySettings {
    /// Flip the overlay on or off and return the new state
    pub fn toggle_overlay(&mut self) -> bool {
        self.show_status = !self.show_status;
        self.show_status
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub camera: CameraSettings,
    pub video: VideoSettings,
    pub save_paths: SavePaths,
    pub display: DisplaySettings,
}

impl Config {
    /// Default config file location (`camera_config.json` in the working directory)
    pub fn default_path() -> PathBuf {
        PathBuf::from(defaults::CONFIG_FILE)
    }

    /// Load the config file, falling back to defaults
    ///
    /// A missing file is created with the defaults. A file that cannot be read
    /// or parsed is left untouched and the defaults are used for this run.
    pub fn load(path: &Path) -> Config {
        if !path.exists() {
            let config = Config::default();
            match config.save(path) {
                Ok(()) => info!(path = %path.display(), "Created default config file"),
                Err(e) => warn!(path = %path.display(), error = %e, "Could not write default config"),
            }
            return config;
        }

        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read config, using defaults");
                return Config::default();
            }
        };

        match Config::from_json_str(&contents) {
            Ok(config) => {
                info!(path = %path.display(), "Loaded config");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Invalid config, using defaults");
                Config::default()
            }
        }
    }

    /// Parse a config from JSON, merging it key by key over the defaults
    ///
    /// Only malformed JSON or a top level that is not an object is an error.
    /// Invalid values are logged and replaced by their defaults.
    pub fn from_json_str(json: &str) -> AppResult<Config> {
        let value: Value = serde_json::from_str(json).map_err(|e| AppError::Config(e.to_string()))?;
        let Value::Object(sections) = value else {
            return Err(AppError::Config("top level must be a JSON object".into()));
        };

        let defaults = Config::default();
        Ok(Config {
            camera: merge_section("camera", defaults.camera, sections.get("camera")),
            video: merge_section("video", defaults.video, sections.get("video")),
            save_paths: merge_section("save_paths", defaults.save_paths, sections.get("save_paths")),
            display: merge_section("display", defaults.display, sections.get("display")),
        })
    }

    /// Write the config as pretty-printed JSON
    pub fn save(&self, path: &Path) -> AppResult<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, json + "\n")?;
        Ok(())
    }
}

/// Apply the keys of one user section over its defaults
///
/// Each key is checked on its own, so one bad value only costs that key.
fn merge_section<T>(name: &str, default: T, user: Option<&Value>) -> T
where
    T: Serialize + DeserializeOwned,
{
    let Some(user) = user else {
        return default;
    };
    let Value::Object(user) = user else {
        warn!(section = name, "Config section is not an object, using defaults");
        return default;
    };
    let mut merged: Map<String, Value> = match serde_json::to_value(&default) {
        Ok(Value::Object(map)) => map,
        _ => return default,
    };

    for (key, value) in user {
        if !merged.contains_key(key) {
            debug!(section = name, key = %key, "Ignoring unknown config key");
            continue;
        }
        let mut candidate = merged.clone();
        candidate.insert(key.clone(), value.clone());
        match serde_json::from_value::<T>(Value::Object(candidate)) {
            Ok(_) => {
                merged.insert(key.clone(), value.clone());
            }
            Err(e) => warn!(
                section = name,
                key = %key,
                value = %value,
                error = %e,
                "Invalid config value, keeping default"
            ),
        }
    }

    serde_json::from_value(Value::Object(merged)).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_overlay() {
        let mut display = DisplaySettings::default();
        assert!(!display.toggle_overlay());
        assert!(!display.show_status);
        assert!(display.toggle_overlay());
        // Individual elements are untouched
        assert!(display.show_fps && display.show_timestamp && display.show_controls);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = Config::from_json_str(r#"{"camera": {"width": 640}}"#).unwrap();
        assert_eq!(config.camera.width, 640);
        assert_eq!(config.camera.height, defaults::CAMERA_HEIGHT);
        assert_eq!(config.video, VideoSettings::default());
    }

    #[test]
    fn test_invalid_value_keeps_only_that_default() {
        let config = Config::from_json_str(r#"{"camera": {"width": 640, "fps": 30.5, "auto_detect": "yes"}}"#)
            .unwrap();
        assert_eq!(config.camera.width, 640);
        assert_eq!(config.camera.fps, defaults::CAMERA_FPS);
        assert!(config.camera.auto_detect);
    }

    #[test]
    fn test_non_object_top_level_is_rejected() {
        assert!(Config::from_json_str("[1, 2]").is_err());
        assert!(Config::from_json_str("{not json").is_err());
    }
}
