// SPDX-License-Identifier: GPL-3.0-only

//! Recording state machine
//!
//! ```text
//!          start_with()            stop()
//!   Idle ───────────────▶ Recording ──────▶ Idle
//!    ▲ │ stop(): no-op        │ start_with(): no-op
//!    └─┘                      └─┘
//! ```
//!
//! The recorder is generic over its writer so the state machine can be
//! driven without GStreamer.

use crate::errors::RecordingError;
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::info;

/// Sink for recorded frames
pub trait VideoWriter {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), RecordingError>;

    /// Finalise the file and return its path
    fn finish(self) -> Result<PathBuf, RecordingError>
    where
        Self: Sized;
}

/// An open recording
pub struct RecordingSession<W> {
    writer: W,
    path: PathBuf,
    started: Instant,
    frames: u64,
}

impl<W: VideoWriter> RecordingSession<W> {
    pub fn new(writer: W, path: PathBuf) -> Self {
        Self {
            writer,
            path,
            started: Instant::now(),
            frames: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn write(&mut self, frame: &RgbImage) -> Result<(), RecordingError> {
        self.writer.write_frame(frame)?;
        self.frames += 1;
        Ok(())
    }

    /// Finish the file
    pub fn finish(self) -> Result<RecordingSummary, RecordingError> {
        let duration = self.started.elapsed();
        let frames = self.frames;
        let path = self.writer.finish()?;
        Ok(RecordingSummary {
            path,
            duration,
            frames,
        })
    }
}

/// What a finished recording produced
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSummary {
    pub path: PathBuf,
    pub duration: Duration,
    pub frames: u64,
}

/// Idle/Recording toggle
pub struct Recorder<W> {
    session: Option<RecordingSession<W>>,
}

impl<W> Default for Recorder<W> {
    fn default() -> Self {
        Self { session: None }
    }
}

impl<W: VideoWriter> Recorder<W> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /// Start recording to `path` with a writer made by `factory`
    ///
    /// Returns `Ok(false)` without calling `factory` if already recording.
    pub fn start_with<F>(&mut self, path: PathBuf, factory: F) -> Result<bool, RecordingError>
    where
        F: FnOnce(&Path) -> Result<W, RecordingError>,
    {
        if self.session.is_some() {
            return Ok(false);
        }

        let writer = factory(&path)?;
        info!(path = %path.display(), "Video recording started");
        self.session = Some(RecordingSession::new(writer, path));
        Ok(true)
    }

    /// Write a frame if recording; does nothing when idle
    pub fn write(&mut self, frame: &RgbImage) -> Result<(), RecordingError> {
        match self.session.as_mut() {
            Some(session) => session.write(frame),
            None => Ok(()),
        }
    }

    /// Stop recording; `Ok(None)` when idle
    ///
    /// The recorder is idle afterwards even if finalising the file fails.
    pub fn stop(&mut self) -> Result<Option<RecordingSummary>, RecordingError> {
        let Some(session) = self.session.take() else {
            return Ok(None);
        };
        let summary = session.finish()?;
        info!(
            path = %summary.path.display(),
            duration_secs = format!("{:.1}", summary.duration.as_secs_f64()),
            frames = summary.frames,
            "Video recording stopped"
        );
        Ok(Some(summary))
    }

    /// Time since recording started, `None` when idle
    pub fn elapsed(&self) -> Option<Duration> {
        self.session.as_ref().map(RecordingSession::elapsed)
    }

    /// Output file of the running recording
    pub fn path(&self) -> Option<&Path> {
        self.session.as_ref().map(RecordingSession::path)
    }
}
