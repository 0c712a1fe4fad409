// SPDX-License-Identifier: GPL-3.0-only

//! Raspberry Pi Camera Module backend
//!
//! Frames come from libcamera through its GStreamer source:
//!
//! ```text
//! libcamerasrc ! video/x-raw,width,height,framerate ! videoconvert
//!     ! video/x-raw,format=RGB ! appsink
//! ```
//!
//! The appsink keeps only the newest buffer so a slow consumer never sees
//! stale frames.

mod enumeration;

pub use enumeration::{
    LibcameraCamera, enumerate_libcamera_cameras, is_libcamera_available, parse_camera_list,
};

use super::CameraBackend;
use super::types::*;
use crate::config::CameraSettings;
use crate::constants::{pipeline, timing};
use crate::media::pack_rgb_rows;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app::AppSink;
use tracing::{debug, info, warn};

/// Build the capture pipeline description
///
/// An empty `camera_id` lets libcamera pick the first camera.
pub fn pipeline_description(camera_id: Option<&str>, settings: &CameraSettings) -> String {
    let source = match camera_id {
        Some(id) if !id.is_empty() => format!("libcamerasrc camera-name=\"{}\"", id),
        _ => "libcamerasrc".to_string(),
    };
    format!(
        "{} ! video/x-raw,width={},height={},framerate={}/1 ! videoconvert ! \
         video/x-raw,format=RGB ! appsink name=sink max-buffers={} drop=true sync=false",
        source,
        settings.width,
        settings.height,
        settings.fps,
        pipeline::MAX_BUFFERS
    )
}

/// An opened Pi Camera
pub struct PiCamera {
    pipeline: gst::Pipeline,
    appsink: AppSink,
    device: CameraDevice,
    format: CameraFormat,
    /// First frame pulled while verifying the camera, handed out on the first read
    pending: Option<CameraFrame>,
    sequence: u64,
}

impl PiCamera {
    /// Open the first Pi camera and wait for it to deliver a frame
    ///
    /// Fails with `NotAvailable` if libcamerasrc is not installed and with
    /// `DeviceNotFound` if libcamera reports no camera or none starts.
    pub fn open(settings: &CameraSettings) -> BackendResult<Self> {
        gst::init()
            .map_err(|e| BackendError::InitializationFailed(format!("GStreamer init failed: {}", e)))?;

        if !is_libcamera_available() {
            return Err(BackendError::NotAvailable(
                "libcamerasrc GStreamer element not installed".into(),
            ));
        }

        let camera = match enumerate_libcamera_cameras() {
            Some(cameras) if cameras.is_empty() => {
                return Err(BackendError::DeviceNotFound("libcamera reports no cameras".into()));
            }
            Some(mut cameras) => Some(cameras.remove(0)),
            // No listing tool installed; let libcamerasrc decide
            None => None,
        };

        let description = pipeline_description(camera.as_ref().map(|c| c.id.as_str()), settings);
        debug!(pipeline = %description, "Creating Pi Camera pipeline");

        let pipeline = gst::parse::launch(&description)
            .map_err(|e| BackendError::InitializationFailed(format!("Failed to create pipeline: {}", e)))?
            .downcast::<gst::Pipeline>()
            .map_err(|_| BackendError::InitializationFailed("Failed to downcast to Pipeline".into()))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| BackendError::InitializationFailed("Failed to find appsink".into()))?
            .downcast::<AppSink>()
            .map_err(|_| BackendError::InitializationFailed("Failed to downcast to AppSink".into()))?;

        if let Err(e) = pipeline.set_state(gst::State::Playing) {
            let detail = bus_error(&pipeline).unwrap_or_else(|| format!("{:?}", e));
            let _ = pipeline.set_state(gst::State::Null);
            return Err(BackendError::DeviceNotFound(format!(
                "Pi Camera failed to start: {}",
                detail
            )));
        }

        let Some(sample) =
            appsink.try_pull_sample(gst::ClockTime::from_seconds(timing::START_TIMEOUT_SECS))
        else {
            let detail = bus_error(&pipeline).unwrap_or_else(|| "no frames received".into());
            let _ = pipeline.set_state(gst::State::Null);
            return Err(BackendError::DeviceNotFound(format!(
                "Pi Camera did not deliver frames: {}",
                detail
            )));
        };

        let (first, framerate) = match frame_from_sample(&sample, 1) {
            Ok(decoded) => decoded,
            Err(e) => {
                let _ = pipeline.set_state(gst::State::Null);
                return Err(e);
            }
        };

        let framerate = framerate.unwrap_or_else(|| Framerate::from_int(settings.fps));
        let format = CameraFormat {
            width: first.width(),
            height: first.height(),
            framerate,
            pixel_format: "RGB".to_string(),
        };

        let (name, path) = match camera {
            Some(cam) => (cam.name, cam.id),
            None => (CameraKind::PiCamera.to_string(), String::new()),
        };

        info!(name = %name, format = %format, "Initialized Pi Camera");

        Ok(Self {
            pipeline,
            appsink,
            device: CameraDevice {
                name,
                kind: CameraKind::PiCamera,
                path,
                driver: Some("libcamera".to_string()),
            },
            format,
            pending: Some(first),
            sequence: 1,
        })
    }
}

impl CameraBackend for PiCamera {
    fn kind(&self) -> CameraKind {
        CameraKind::PiCamera
    }

    fn device(&self) -> &CameraDevice {
        &self.device
    }

    fn format(&self) -> &CameraFormat {
        &self.format
    }

    fn read_frame(&mut self) -> BackendResult<CameraFrame> {
        if let Some(frame) = self.pending.take() {
            return Ok(frame);
        }

        let sample = self
            .appsink
            .try_pull_sample(gst::ClockTime::from_mseconds(timing::FRAME_TIMEOUT_MS))
            .ok_or_else(|| {
                let detail = bus_error(&self.pipeline).unwrap_or_else(|| "timed out".into());
                BackendError::CaptureFailed(format!("No frame from Pi Camera: {}", detail))
            })?;

        self.sequence += 1;
        let (frame, _) = frame_from_sample(&sample, self.sequence)?;

        if self.sequence % timing::FRAME_LOG_INTERVAL == 0 {
            debug!(frame = self.sequence, "Pi Camera frame captured");
        }

        Ok(frame)
    }
}

impl Drop for PiCamera {
    fn drop(&mut self) {
        debug!("Stopping Pi Camera pipeline");
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            warn!(?e, "Failed to stop Pi Camera pipeline");
        }
    }
}

/// Convert an RGB appsink sample into a frame, with the caps framerate if fixed
fn frame_from_sample(
    sample: &gst::Sample,
    sequence: u64,
) -> BackendResult<(CameraFrame, Option<Framerate>)> {
    let caps = sample
        .caps()
        .ok_or_else(|| BackendError::CaptureFailed("No caps on sample".into()))?;
    let info = gstreamer_video::VideoInfo::from_caps(caps)
        .map_err(|e| BackendError::CaptureFailed(format!("Invalid caps: {}", e)))?;

    let buffer = sample
        .buffer()
        .ok_or_else(|| BackendError::CaptureFailed("No buffer in sample".into()))?;
    let map = buffer
        .map_readable()
        .map_err(|_| BackendError::CaptureFailed("Failed to map buffer".into()))?;

    let stride = info.stride()[0].max(0) as u32;
    let data = pack_rgb_rows(map.as_slice(), info.width(), info.height(), stride)
        .ok_or_else(|| BackendError::CaptureFailed("Buffer smaller than frame".into()))?;

    let frame = CameraFrame::from_rgb(info.width(), info.height(), data, sequence)
        .ok_or_else(|| BackendError::CaptureFailed("Invalid frame geometry".into()))?;

    let fps = info.fps();
    let framerate = (fps.numer() > 0 && fps.denom() > 0)
        .then(|| Framerate::new(fps.numer() as u32, fps.denom() as u32));

    Ok((frame, framerate))
}

/// Pop the most recent error message from the pipeline bus
fn bus_error(pipeline: &gst::Pipeline) -> Option<String> {
    let bus = pipeline.bus()?;
    let msg = bus.pop_filtered(&[gst::MessageType::Error])?;
    match msg.view() {
        gst::MessageView::Error(err) => Some(err.error().to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_description_default_camera() {
        let settings = CameraSettings::default();
        let desc = pipeline_description(None, &settings);
        assert!(desc.starts_with("libcamerasrc !"));
        assert!(desc.contains("width=1280,height=720,framerate=30/1"));
        assert!(desc.contains("format=RGB"));
        assert!(desc.contains("appsink name=sink"));
    }

    #[test]
    fn test_pipeline_description_named_camera() {
        let settings = CameraSettings::default();
        let desc = pipeline_description(Some("/base/soc/i2c0mux/i2c@1/imx219@10"), &settings);
        assert!(desc.starts_with("libcamerasrc camera-name=\"/base/soc/i2c0mux/i2c@1/imx219@10\""));
    }
}
