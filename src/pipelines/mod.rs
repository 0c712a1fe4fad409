// SPDX-License-Identifier: GPL-3.0-only

//! Capture pipelines for stills and video
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ RGB frame    │ ──▶ │  Photo Pipeline   │ ──▶ │  JPEG File   │
//! │ (+ overlay)  │     │  - JPEG q=95      │     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//!
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ RGB frames   │ ──▶ │  Video Pipeline   │ ──▶ │ MP4/AVI/H264 │
//! │ (+ overlay)  │     │  - appsrc         │     │              │
//! │              │     │  - HW encoder     │     │              │
//! │              │     │    when present   │     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//! ```

pub mod photo;
pub mod video;
