// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Video encoder quality presets
///
/// Stored in the config file as `"low"`, `"medium"` or `"high"`. The preset is
/// turned into a target bitrate for the H.264/MPEG-4 encoders and into a
/// per-frame quality for the Motion JPEG encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoQuality {
    /// Smaller files, reduced quality
    Low,
    /// Balanced quality and file size
    Medium,
    /// Larger files, better quality
    #[default]
    High,
}

impl VideoQuality {
    /// All presets, lowest quality first
    pub const ALL: [VideoQuality; 3] = [VideoQuality::Low, VideoQuality::Medium, VideoQuality::High];

    /// Get display name for the preset
    pub fn display_name(&self) -> &'static str {
        match self {
            VideoQuality::Low => "Low",
            VideoQuality::Medium => "Medium",
            VideoQuality::High => "High",
        }
    }

    /// Get bitrate in kbps for a given resolution
    ///
    /// Raspberry Pi hardware encoders top out at 1080p, so the table stops there:
    /// - SD (640x480): Low=1, Medium=2, High=4 Mbps
    /// - HD (1280x720): Low=2.5, Medium=5, High=10 Mbps
    /// - Full HD (1920x1080): Low=4, Medium=8, High=16 Mbps
    pub fn bitrate_kbps(&self, width: u32, _height: u32) -> u32 {
        match (get_resolution_tier(width), self) {
            (ResolutionTier::SD, VideoQuality::Low) => 1_000,
            (ResolutionTier::SD, VideoQuality::Medium) => 2_000,
            (ResolutionTier::SD, VideoQuality::High) => 4_000,
            (ResolutionTier::HD, VideoQuality::Low) => 2_500,
            (ResolutionTier::HD, VideoQuality::Medium) => 5_000,
            (ResolutionTier::HD, VideoQuality::High) => 10_000,
            (ResolutionTier::FullHD, VideoQuality::Low) => 4_000,
            (ResolutionTier::FullHD, VideoQuality::Medium) => 8_000,
            (ResolutionTier::FullHD, VideoQuality::High) => 16_000,
        }
    }

    /// Per-frame JPEG quality (0-100) used by the Motion JPEG encoder
    pub fn mjpeg_quality(&self) -> u32 {
        match self {
            VideoQuality::Low => 60,
            VideoQuality::Medium => 80,
            VideoQuality::High => 92,
        }
    }
}

/// Resolution tiers for bitrate calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionTier {
    /// 640x480 and below
    SD,
    /// 1280x720
    HD,
    /// 1920x1080 and above
    FullHD,
}

/// Get the resolution tier for a given width
pub fn get_resolution_tier(width: u32) -> ResolutionTier {
    match width {
        w if w >= 1920 => ResolutionTier::FullHD,
        w if w >= 1280 => ResolutionTier::HD,
        _ => ResolutionTier::SD,
    }
}

/// Built-in configuration defaults
pub mod defaults {
    /// Config file looked up in the working directory
    pub const CONFIG_FILE: &str = "camera_config.json";

    pub const CAMERA_WIDTH: u32 = 1280;
    pub const CAMERA_HEIGHT: u32 = 720;
    pub const CAMERA_FPS: u32 = 30;

    /// Number of /dev/videoN indices probed for USB cameras
    pub const MAX_USB_PROBE: u32 = 10;

    /// Pi Camera sensor warm-up before the first still is trusted
    pub const WARMUP_MS: u64 = 2_000;

    /// FourCC of the default video codec
    pub const VIDEO_CODEC: &str = "mp4v";
    pub const VIDEO_FPS: u32 = 30;
}

/// Output file naming
pub mod files {
    /// Still images: `Image<timestamp>.jpg`
    pub const IMAGE_PREFIX: &str = "Image";

    /// Videos: `Video<timestamp>.<container>`
    pub const VIDEO_PREFIX: &str = "Video";

    pub const IMAGE_EXTENSION: &str = "jpg";

    /// chrono format for file timestamps (second resolution)
    pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

    /// chrono format for the on-screen clock
    pub const OVERLAY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    /// JPEG quality for saved stills
    pub const JPEG_QUALITY: u8 = 95;

    /// Folder under the user cache directory holding the preview log
    pub const LOG_DIR: &str = "rpi-camera";

    /// Log file written while the terminal preview is running
    pub const PREVIEW_LOG: &str = "preview.log";
}

/// Save directory handling
pub mod storage {
    /// rwxr-xr-x
    pub const DIR_MODE: u32 = 0o755;

    /// Folder used under fallback roots for images
    pub const IMAGES_FOLDER: &str = "Pictures";

    /// Folder used under fallback roots for videos
    pub const VIDEOS_FOLDER: &str = "Movies";

    /// Fallback root below the home directory
    pub const DESKTOP_FOLDER: &str = "Desktop";

    /// Name of the probe file used to verify a directory is writable
    pub const WRITE_PROBE: &str = ".rpi-camera-write-test";

    /// Warn when less than this much space is free
    pub const MIN_FREE_GB: f64 = 1.0;
}

/// Pipeline tuning
pub mod pipeline {
    /// appsink buffer count (older frames are dropped)
    pub const MAX_BUFFERS: u32 = 1;

    /// Memory-mapped V4L2 buffers
    pub const V4L2_BUFFERS: u32 = 4;
}

/// Timing constants
pub mod timing {
    use super::Duration;

    /// Log every Nth frame in hot paths
    pub const FRAME_LOG_INTERVAL: u64 = 60;

    /// Keyboard poll timeout per loop turn
    pub const INPUT_POLL: Duration = Duration::from_millis(1);

    /// Back-off after a failed frame read
    pub const CAPTURE_RETRY_DELAY: Duration = Duration::from_millis(100);

    /// Wait for a frame from libcamerasrc
    pub const FRAME_TIMEOUT_MS: u64 = 2_000;

    /// Wait for a GStreamer pipeline to reach PLAYING
    pub const START_TIMEOUT_SECS: u64 = 5;

    /// Wait for EOS to reach the file sink when finishing a recording
    pub const STOP_TIMEOUT_SECS: u64 = 5;

    /// FPS counter window
    pub const FPS_WINDOW: Duration = Duration::from_secs(1);

    /// Timeout for external diagnostic commands
    pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);
}

/// Application information utilities
pub mod app_info {
    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_tiers() {
        assert_eq!(get_resolution_tier(640), ResolutionTier::SD);
        assert_eq!(get_resolution_tier(1280), ResolutionTier::HD);
        assert_eq!(get_resolution_tier(1920), ResolutionTier::FullHD);
        assert_eq!(get_resolution_tier(3840), ResolutionTier::FullHD);
    }

    #[test]
    fn test_quality_serde_lowercase() {
        let json = serde_json::to_string(&VideoQuality::Medium).unwrap();
        assert_eq!(json, "\"medium\"");
        let parsed: VideoQuality = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(parsed, VideoQuality::Low);
    }
}
