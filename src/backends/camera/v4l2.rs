// SPDX-License-Identifier: GPL-3.0-only

//! USB camera capture through V4L2
//!
//! Opens `/dev/video<index>` with the v4l crate, negotiates MJPEG (falling
//! back to YUYV) at the configured resolution and framerate, and decodes each
//! memory-mapped buffer to RGB.

use super::types::*;
use super::CameraBackend;
use crate::config::CameraSettings;
use crate::constants::{pipeline, timing};
use crate::media::{decode_mjpeg, yuyv_to_rgb};
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::capability::Flags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::video::capture::Parameters;
use v4l::FourCC;

/// Pixel formats we can decode, in order of preference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceFormat {
    /// Compressed; lets USB 2.0 cameras reach 720p30
    Mjpeg,
    /// Packed 4:2:2
    Yuyv,
}

impl SourceFormat {
    const PREFERRED: [SourceFormat; 2] = [SourceFormat::Mjpeg, SourceFormat::Yuyv];

    fn fourcc(&self) -> FourCC {
        match self {
            SourceFormat::Mjpeg => FourCC::new(b"MJPG"),
            SourceFormat::Yuyv => FourCC::new(b"YUYV"),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            SourceFormat::Mjpeg => "MJPG",
            SourceFormat::Yuyv => "YUYV",
        }
    }
}

/// Device node path for a V4L2 index
pub fn device_path(index: u32) -> String {
    format!("/dev/video{}", index)
}

/// An opened, streaming USB camera
pub struct UsbCamera {
    // Declared before the device so buffers are unmapped first
    stream: MmapStream<'static>,
    _dev: Device,
    device: CameraDevice,
    format: CameraFormat,
    source: SourceFormat,
    stride: u32,
    sequence: u64,
}

impl UsbCamera {
    /// Open the camera at `/dev/video<index>` and start streaming
    ///
    /// Fails with `DeviceNotFound` if the node does not exist or is not a
    /// capture device (e.g. the Pi's codec nodes), and with
    /// `FormatNotSupported` if neither MJPEG nor YUYV is accepted.
    pub fn open(index: u32, settings: &CameraSettings) -> BackendResult<Self> {
        let path = device_path(index);
        debug!(path = %path, "Opening V4L2 device");

        let mut dev = Device::new(index as usize)
            .map_err(|e| BackendError::DeviceNotFound(format!("{}: {}", path, e)))?;

        let caps = dev
            .query_caps()
            .map_err(|e| BackendError::DeviceNotFound(format!("{}: {}", path, e)))?;
        if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
            return Err(BackendError::DeviceNotFound(format!(
                "{} ({}) is not a video capture device",
                path, caps.card
            )));
        }

        let (source, negotiated) = negotiate_format(&mut dev, settings.width, settings.height)?;

        let framerate = match dev.set_params(&Parameters::with_fps(settings.fps)) {
            Ok(params) if params.interval.numerator > 0 => {
                Framerate::new(params.interval.denominator, params.interval.numerator)
            }
            Ok(_) => Framerate::from_int(settings.fps),
            Err(e) => {
                warn!(path = %path, error = %e, "Could not set framerate, using driver default");
                Framerate::from_int(settings.fps)
            }
        };

        let stream = MmapStream::with_buffers(&dev, Type::VideoCapture, pipeline::V4L2_BUFFERS)
            .map_err(|e| {
                BackendError::InitializationFailed(format!(
                    "Failed to create buffer stream on {}: {}",
                    path, e
                ))
            })?;

        let format = CameraFormat {
            width: negotiated.width,
            height: negotiated.height,
            framerate,
            pixel_format: source.name().to_string(),
        };

        info!(
            path = %path,
            card = %caps.card,
            driver = %caps.driver,
            format = %format,
            "Initialized USB camera"
        );

        Ok(Self {
            stream,
            _dev: dev,
            device: CameraDevice {
                name: caps.card.clone(),
                kind: CameraKind::Usb { index },
                path,
                driver: Some(caps.driver.clone()),
            },
            format,
            source,
            stride: negotiated.stride,
            sequence: 0,
        })
    }

    /// Open the camera and read one frame to prove it actually delivers images
    pub fn probe(index: u32, settings: &CameraSettings) -> BackendResult<Self> {
        let mut camera = Self::open(index, settings)?;
        camera.read_frame()?;
        Ok(camera)
    }

    fn decode(&self, data: &[u8]) -> BackendResult<image::RgbImage> {
        match self.source {
            SourceFormat::Mjpeg => {
                let image = decode_mjpeg(data).map_err(BackendError::CaptureFailed)?;
                Ok(image)
            }
            SourceFormat::Yuyv => {
                let rgb = yuyv_to_rgb(data, self.format.width, self.format.height, self.stride)
                    .ok_or_else(|| {
                        BackendError::CaptureFailed(format!(
                            "Short YUYV buffer: {} bytes for {}x{}",
                            data.len(),
                            self.format.width,
                            self.format.height
                        ))
                    })?;
                image::RgbImage::from_raw(self.format.width, self.format.height, rgb)
                    .ok_or_else(|| BackendError::CaptureFailed("Invalid frame geometry".into()))
            }
        }
    }
}

impl CameraBackend for UsbCamera {
    fn kind(&self) -> CameraKind {
        self.device.kind
    }

    fn device(&self) -> &CameraDevice {
        &self.device
    }

    fn format(&self) -> &CameraFormat {
        &self.format
    }

    fn read_frame(&mut self) -> BackendResult<CameraFrame> {
        let data = {
            let (buf, meta) = self
                .stream
                .next()
                .map_err(|e| BackendError::CaptureFailed(e.to_string()))?;
            let used = (meta.bytesused as usize).min(buf.len());
            if used == 0 {
                return Err(BackendError::CaptureFailed("Empty buffer".into()));
            }
            buf[..used].to_vec()
        };

        let image = self.decode(&data)?;
        self.sequence += 1;

        if self.sequence % timing::FRAME_LOG_INTERVAL == 0 {
            debug!(
                path = %self.device.path,
                frame = self.sequence,
                bytes = data.len(),
                "USB frame captured"
            );
        }

        Ok(CameraFrame::new(image, self.sequence))
    }
}

impl Drop for UsbCamera {
    fn drop(&mut self) {
        debug!(path = %self.device.path, "Releasing USB camera");
    }
}

/// Try each decodable pixel format at the requested size
fn negotiate_format(
    dev: &mut Device,
    width: u32,
    height: u32,
) -> BackendResult<(SourceFormat, v4l::Format)> {
    let mut format = dev
        .format()
        .map_err(|e| BackendError::InitializationFailed(format!("Failed to query format: {}", e)))?;

    for source in SourceFormat::PREFERRED {
        format.width = width;
        format.height = height;
        format.fourcc = source.fourcc();

        match dev.set_format(&format) {
            Ok(actual) if actual.fourcc == source.fourcc() => {
                if actual.width != width || actual.height != height {
                    info!(
                        requested = format!("{}x{}", width, height),
                        actual = format!("{}x{}", actual.width, actual.height),
                        "Driver adjusted resolution"
                    );
                }
                return Ok((source, actual));
            }
            Ok(actual) => {
                debug!(wanted = source.name(), got = %actual.fourcc, "Format not accepted");
            }
            Err(e) => {
                debug!(wanted = source.name(), error = %e, "Failed to set format");
            }
        }
    }

    Err(BackendError::FormatNotSupported(
        "camera offers neither MJPG nor YUYV".to_string(),
    ))
}
