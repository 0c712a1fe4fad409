// SPDX-License-Identifier: GPL-3.0-only

//! Raspberry Pi Camera - preview, stills and video recording
//!
//! This library provides the core functionality of the `rpi-camera` binary:
//! opening a USB or Pi Camera Module, burning a status overlay into the
//! frames, saving JPEG stills and recording video through GStreamer.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`app`]: Run-loop state, key actions, camera switching
//! - [`backends`]: USB (V4L2) and Pi Camera (libcamera) capture
//! - [`media`]: Pixel format conversion
//! - [`overlay`]: Text and status overlay
//! - [`pipelines`]: Photo and video capture pipelines
//! - [`config`]: JSON configuration file
//! - [`storage`]: Save directories, file names, free space
//! - [`terminal`]: Terminal preview
//! - [`diagnostics`]: Camera troubleshooting report

pub mod app;
pub mod backends;
pub mod config;
pub mod constants;
pub mod diagnostics;
pub mod errors;
pub mod media;
pub mod overlay;
pub mod pipelines;
pub mod storage;
pub mod terminal;

// Re-export commonly used types
pub use app::{Action, CameraApp};
pub use config::Config;
pub use constants::VideoQuality;
pub use errors::{AppError, AppResult};
