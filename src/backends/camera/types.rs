// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which hardware backend a camera is reached through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraKind {
    /// V4L2 capture device `/dev/video<index>`
    Usb { index: u32 },
    /// Ribbon-cable camera driven by libcamera
    PiCamera,
}

impl CameraKind {
    pub fn is_pi_camera(&self) -> bool {
        matches!(self, CameraKind::PiCamera)
    }

    /// Short label used in the status bar and overlay
    pub fn short_name(&self) -> &'static str {
        match self {
            CameraKind::Usb { .. } => "USB",
            CameraKind::PiCamera => "PiCam",
        }
    }
}

impl std::fmt::Display for CameraKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraKind::Usb { index } => write!(f, "USB Camera {}", index),
            CameraKind::PiCamera => write!(f, "Raspberry Pi Camera Module"),
        }
    }
}

/// Camera type requested by the user (`camera.preferred_type` or `--camera`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum CameraPreference {
    /// Pi Camera if one is attached, otherwise the first USB camera
    #[default]
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "usb")]
    Usb,
    #[serde(rename = "picam")]
    PiCamera,
}

impl CameraPreference {
    /// Preference that targets exactly this kind of camera
    pub fn for_kind(kind: CameraKind) -> Self {
        match kind {
            CameraKind::Usb { .. } => CameraPreference::Usb,
            CameraKind::PiCamera => CameraPreference::PiCamera,
        }
    }
}

impl FromStr for CameraPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(CameraPreference::Auto),
            "usb" => Ok(CameraPreference::Usb),
            "picam" | "pi" | "picamera" => Ok(CameraPreference::PiCamera),
            other => Err(format!(
                "unknown camera type '{}' (expected auto, usb or picam)",
                other
            )),
        }
    }
}

impl TryFrom<String> for CameraPreference {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl std::fmt::Display for CameraPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraPreference::Auto => write!(f, "auto"),
            CameraPreference::Usb => write!(f, "usb"),
            CameraPreference::PiCamera => write!(f, "picam"),
        }
    }
}

/// Represents a camera device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    pub name: String,
    pub kind: CameraKind,
    pub path: String,           // /dev/videoN or libcamera camera id (empty = auto-select)
    pub driver: Option<String>, // V4L2 driver name (e.g. "uvcvideo")
}

/// Framerate as a fraction (numerator/denominator)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Framerate {
    pub num: u32,
    pub denom: u32,
}

impl Framerate {
    /// Create a new framerate from numerator and denominator
    pub fn new(num: u32, denom: u32) -> Self {
        Self {
            num,
            denom: if denom == 0 { 1 } else { denom },
        }
    }

    /// Create a framerate from an integer (e.g., 30 becomes 30/1)
    pub fn from_int(fps: u32) -> Self {
        Self { num: fps, denom: 1 }
    }

    /// Get the framerate as a floating point value
    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.denom as f64
    }

    /// Get the rounded-down integer framerate
    pub fn as_int(&self) -> u32 {
        self.num / self.denom
    }
}

impl std::fmt::Display for Framerate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.denom != 1 {
            write!(f, "{:.2}", self.as_f64())
        } else {
            write!(f, "{}", self.num)
        }
    }
}

impl Default for Framerate {
    fn default() -> Self {
        Self { num: 30, denom: 1 }
    }
}

/// Negotiated capture format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraFormat {
    pub width: u32,
    pub height: u32,
    pub framerate: Framerate,
    pub pixel_format: String, // FourCC delivered by the device (e.g. "MJPG", "YUYV", "RGB")
}

impl std::fmt::Display for CameraFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{} @ {}fps ({})",
            self.width, self.height, self.framerate, self.pixel_format
        )
    }
}

/// A single RGB frame from the camera
///
/// Every backend decodes into packed 8-bit RGB, so the overlay, the still
/// encoder and the video writer only deal with one layout.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub image: RgbImage,
    /// Monotonic per-camera frame counter
    pub sequence: u64,
}

impl CameraFrame {
    pub fn new(image: RgbImage, sequence: u64) -> Self {
        Self { image, sequence }
    }

    /// Build a frame from tightly packed RGB bytes
    ///
    /// Returns `None` if `data` is shorter than `width * height * 3`.
    pub fn from_rgb(width: u32, height: u32, data: Vec<u8>, sequence: u64) -> Option<Self> {
        RgbImage::from_raw(width, height, data).map(|image| Self::new(image, sequence))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone)]
pub enum BackendError {
    /// Backend is not available on this system
    NotAvailable(String),
    /// Failed to initialize backend
    InitializationFailed(String),
    /// Camera device not found
    DeviceNotFound(String),
    /// Format not supported
    FormatNotSupported(String),
    /// Frame read failed
    CaptureFailed(String),
    /// General I/O error
    IoError(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            BackendError::CaptureFailed(msg) => write!(f, "Capture failed: {}", msg),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::IoError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preference_parsing() {
        assert_eq!("auto".parse::<CameraPreference>(), Ok(CameraPreference::Auto));
        assert_eq!("USB".parse::<CameraPreference>(), Ok(CameraPreference::Usb));
        assert_eq!("picam".parse::<CameraPreference>(), Ok(CameraPreference::PiCamera));
        assert!("webcam".parse::<CameraPreference>().is_err());
    }

    #[test]
    fn test_preference_serde_names() {
        let json = serde_json::to_string(&CameraPreference::PiCamera).unwrap();
        assert_eq!(json, "\"picam\"");
        let parsed: CameraPreference = serde_json::from_str("\"usb\"").unwrap();
        assert_eq!(parsed, CameraPreference::Usb);
        let parsed: CameraPreference = serde_json::from_str("\"PiCamera\"").unwrap();
        assert_eq!(parsed, CameraPreference::PiCamera);
        assert!(serde_json::from_str::<CameraPreference>("\"webcam\"").is_err());
    }

    #[test]
    fn test_frame_from_short_buffer() {
        assert!(CameraFrame::from_rgb(4, 4, vec![0; 10], 0).is_none());
        let frame = CameraFrame::from_rgb(4, 2, vec![0; 24], 7).unwrap();
        assert_eq!((frame.width(), frame.height()), (4, 2));
        assert_eq!(frame.sequence, 7);
    }

    #[test]
    fn test_framerate_display() {
        assert_eq!(Framerate::from_int(30).to_string(), "30");
        assert_eq!(Framerate::new(30000, 1001).to_string(), "29.97");
        assert_eq!(Framerate::new(15, 0).as_int(), 15);
    }
}
