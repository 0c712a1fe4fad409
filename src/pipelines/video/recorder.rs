// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer video recorder fed with RGB frames
//!
//! ```text
//! appsrc (RGB) → videoconvert → encoder → [parser] → [capsfilter] → [muxer] → filesink
//! ```
//!
//! Frames are timestamped from their index at the configured framerate, so
//! the file plays at that rate regardless of how fast frames arrive.

use super::encoder_selection::{EncoderConfig, select_video_encoder};
use super::session::VideoWriter;
use crate::constants::timing;
use crate::errors::RecordingError;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use image::RgbImage;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Video recorder writing one file
pub struct VideoRecorder {
    pipeline: gst::Pipeline,
    appsrc: gst_app::AppSrc,
    file_path: PathBuf,
    width: u32,
    height: u32,
    fps: u32,
    frame_count: u64,
    finished: bool,
}

impl VideoRecorder {
    /// Build the pipeline and start it
    ///
    /// `output_path` is used as-is; its extension should match
    /// `config.codec.extension()`.
    ///
    /// # Returns
    /// * `Ok(VideoRecorder)` - Pipeline playing, ready for frames
    /// * `Err(RecordingError)` - No encoder, or the pipeline failed to start
    pub fn new(output_path: &Path, config: &EncoderConfig) -> Result<Self, RecordingError> {
        info!(
            width = config.width,
            height = config.height,
            fps = config.fps,
            codec = %config.codec,
            output = %output_path.display(),
            "Creating video recorder"
        );

        let encoders = select_video_encoder(config)?;
        debug!(
            chain = %config.codec.chain_description(encoders.element_name),
            "Recording pipeline"
        );
        let pipeline = gst::Pipeline::new();

        let caps = gst::Caps::builder("video/x-raw")
            .field("format", "RGB")
            .field("width", config.width as i32)
            .field("height", config.height as i32)
            .field("framerate", gst::Fraction::new(config.fps as i32, 1))
            .build();

        let appsrc = gst_app::AppSrc::builder()
            .caps(&caps)
            .format(gst::Format::Time)
            .is_live(true)
            .build();

        let videoconvert = make_element("videoconvert")?;

        let location = output_path.to_str().ok_or_else(|| {
            RecordingError::StartFailed(format!("Non UTF-8 path: {}", output_path.display()))
        })?;
        let filesink = gst::ElementFactory::make("filesink")
            .property("location", location)
            .build()
            .map_err(|e| RecordingError::StartFailed(format!("Failed to create filesink: {}", e)))?;

        // Build the chain in link order
        let mut chain: Vec<gst::Element> = vec![
            appsrc.clone().upcast::<gst::Element>(),
            videoconvert,
            encoders.encoder,
        ];
        chain.extend(encoders.parser);
        chain.extend(encoders.capsfilter);
        chain.extend(encoders.muxer);
        chain.push(filesink);

        pipeline
            .add_many(&chain)
            .map_err(|e| RecordingError::StartFailed(format!("Failed to add elements to pipeline: {}", e)))?;
        gst::Element::link_many(&chain)
            .map_err(|_| RecordingError::StartFailed(format!("Failed to link {} pipeline", encoders.element_name)))?;

        let mut recorder = Self {
            pipeline,
            appsrc,
            file_path: output_path.to_path_buf(),
            width: config.width,
            height: config.height,
            fps: config.fps.max(1),
            frame_count: 0,
            finished: false,
        };

        if let Err(e) = recorder.start() {
            recorder.finished = true;
            let _ = recorder.pipeline.set_state(gst::State::Null);
            let _ = std::fs::remove_file(&recorder.file_path);
            return Err(e);
        }

        Ok(recorder)
    }

    fn start(&self) -> Result<(), RecordingError> {
        self.pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| RecordingError::StartFailed(format!("Failed to start pipeline: {}", e)))?;

        // Surface immediate errors (e.g. unwritable location, caps mismatch)
        let bus = self
            .pipeline
            .bus()
            .ok_or_else(|| RecordingError::StartFailed("No bus available".into()))?;
        if let Some(msg) = bus.timed_pop_filtered(
            gst::ClockTime::from_mseconds(100),
            &[gst::MessageType::Error],
        ) && let gst::MessageView::Error(err) = msg.view()
        {
            error!(
                error = %err.error(),
                debug = ?err.debug(),
                source = ?err.src().map(|s| s.name()),
                "GStreamer error during start"
            );
            return Err(RecordingError::StartFailed(err.error().to_string()));
        }

        info!(path = %self.file_path.display(), "Recording started");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Push one frame into the encoder
    pub fn push_frame(&mut self, frame: &RgbImage) -> Result<(), RecordingError> {
        if self.finished {
            return Err(RecordingError::WriteFailed("recording already finished".into()));
        }
        if frame.width() != self.width || frame.height() != self.height {
            return Err(RecordingError::WriteFailed(format!(
                "frame is {}x{}, recording is {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            )));
        }

        if let Some(message) = self.pending_error() {
            return Err(RecordingError::WriteFailed(message));
        }

        let frame_ns = 1_000_000_000 / self.fps as u64;
        let mut buffer = gst::Buffer::from_mut_slice(frame.as_raw().clone());
        if let Some(buffer) = buffer.get_mut() {
            buffer.set_pts(gst::ClockTime::from_nseconds(frame_ns * self.frame_count));
            buffer.set_duration(gst::ClockTime::from_nseconds(frame_ns));
        }

        self.appsrc
            .push_buffer(buffer)
            .map_err(|e| RecordingError::WriteFailed(format!("{:?}", e)))?;
        self.frame_count += 1;

        if self.frame_count % timing::FRAME_LOG_INTERVAL == 0 {
            debug!(frames = self.frame_count, "Recording progress");
        }
        Ok(())
    }

    /// Send EOS, wait for the file to be finalised and stop the pipeline
    pub fn finish(mut self) -> Result<PathBuf, RecordingError> {
        self.finalize()?;
        info!(
            path = %self.file_path.display(),
            frames = self.frame_count,
            "Recording saved"
        );
        Ok(self.file_path.clone())
    }

    fn finalize(&mut self) -> Result<(), RecordingError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        info!("Stopping video recording");
        if let Err(e) = self.appsrc.end_of_stream() {
            warn!(?e, "Failed to send EOS to appsrc");
        }

        let mut result = Ok(());
        match self.pipeline.bus() {
            Some(bus) => {
                let msg = bus.timed_pop_filtered(
                    gst::ClockTime::from_seconds(timing::STOP_TIMEOUT_SECS),
                    &[gst::MessageType::Eos, gst::MessageType::Error],
                );
                match msg.as_ref().map(|m| m.view()) {
                    Some(gst::MessageView::Eos(_)) => debug!("EOS reached file sink"),
                    Some(gst::MessageView::Error(err)) => {
                        result = Err(RecordingError::StopFailed(err.error().to_string()));
                    }
                    _ => warn!("Timed out waiting for EOS, file may be truncated"),
                }
            }
            None => warn!("No bus available, cannot wait for EOS"),
        }

        self.pipeline
            .set_state(gst::State::Null)
            .map_err(|e| RecordingError::StopFailed(format!("Failed to stop pipeline: {}", e)))?;
        result
    }

    fn pending_error(&self) -> Option<String> {
        let bus = self.pipeline.bus()?;
        let msg = bus.pop_filtered(&[gst::MessageType::Error])?;
        match msg.view() {
            gst::MessageView::Error(err) => Some(err.error().to_string()),
            _ => None,
        }
    }
}

impl VideoWriter for VideoRecorder {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), RecordingError> {
        self.push_frame(frame)
    }

    fn finish(self) -> Result<PathBuf, RecordingError> {
        VideoRecorder::finish(self)
    }
}

impl Drop for VideoRecorder {
    fn drop(&mut self) {
        if let Err(e) = self.finalize() {
            warn!(error = %e, "Recording finalised with errors");
        }
    }
}

fn make_element(name: &str) -> Result<gst::Element, RecordingError> {
    gst::ElementFactory::make(name)
        .build()
        .map_err(|e| RecordingError::StartFailed(format!("Failed to create {}: {}", name, e)))
}
