// SPDX-License-Identifier: GPL-3.0-only

//! Video recording
//!
//! - [`encoder_selection`]: codec from the configured FourCC, encoder/parser/muxer choice
//! - [`recorder`]: GStreamer pipeline fed with RGB frames
//! - [`session`]: Idle/Recording state machine over any [`VideoWriter`]

pub mod encoder_selection;
pub mod recorder;
pub mod session;

pub use encoder_selection::{EncoderConfig, VideoCodec, available_encoders, select_video_encoder};
pub use recorder::VideoRecorder;
pub use session::{Recorder, RecordingSession, RecordingSummary, VideoWriter};

use crate::storage::{unique_path, video_filename};
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

/// Output path for a new recording: `Video<timestamp>.<container>` in `dir`
pub fn recording_path(dir: &Path, timestamp: &NaiveDateTime, codec: VideoCodec) -> PathBuf {
    unique_path(dir, &video_filename(timestamp, codec.extension()))
}
