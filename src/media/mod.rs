// SPDX-License-Identifier: GPL-3.0-only

//! Pixel format conversion
//!
//! Camera backends deliver MJPEG, packed YUYV or padded RGB rows; everything
//! downstream expects tightly packed RGB.

pub mod conversions;

pub use conversions::{decode_mjpeg, pack_rgb_rows, yuv_to_rgb, yuyv_to_rgb};
