// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend abstraction
//!
//! Two hardware backends sit behind one trait:
//!
//! ```text
//! ┌─────────────────────┐
//! │  CameraApp / CLI    │
//! └──────────┬──────────┘
//!            │ open_camera(preference)
//!            ▼
//! ┌─────────────────────┐
//! │  CameraBackend Trait│  ← read_frame() → RGB CameraFrame
//! └──────────┬──────────┘
//!       ┌────┴──────┐
//!       ▼           ▼
//!   ┌───────┐  ┌──────────┐
//!   │ V4L2  │  │libcamera │
//!   │ (USB) │  │(Pi Cam)  │
//!   └───────┘  └──────────┘
//! ```
//!
//! Handles own their device: dropping a backend stops streaming and closes it.

pub mod detection;
pub mod libcamera;
pub mod types;
pub mod v4l2;

pub use detection::{
    available_types, candidate_order, detect_cameras, exact_order, open_camera, open_first, open_kind,
    switch_target,
};
pub use types::*;

/// Common interface of an opened camera
pub trait CameraBackend {
    /// Which backend this handle belongs to
    fn kind(&self) -> CameraKind;

    /// Device the handle was opened on
    fn device(&self) -> &CameraDevice;

    /// Format negotiated with the hardware
    ///
    /// May differ from the configured resolution/framerate when the driver
    /// picks the closest supported mode.
    fn format(&self) -> &CameraFormat;

    /// Block until the next frame is available and return it as RGB
    ///
    /// # Returns
    /// * `Ok(CameraFrame)` - Frame captured and decoded
    /// * `Err(BackendError::CaptureFailed)` - Read timed out or the data could not be decoded
    fn read_frame(&mut self) -> BackendResult<CameraFrame>;
}
