// SPDX-License-Identifier: GPL-3.0-only

//! Hardware access layer
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │        App Layer (preview, CLI modes)       │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                   │
//! │  ┌─────────────────┐  ┌──────────────────┐  │
//! │  │   USB camera    │  │    Pi Camera     │  │
//! │  │     (V4L2)      │  │   (libcamera)    │  │
//! │  └─────────────────┘  └──────────────────┘  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! - [`camera`]: Camera backends, detection and selection

pub mod camera;
