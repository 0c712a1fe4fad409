// SPDX-License-Identifier: GPL-3.0-only

//! Application core: one camera, one recorder, one loop turn at a time
//!
//! - `keys`: keyboard shortcuts mapped to [`Action`]s
//! - `fps`: windowed frame rate for the overlay
//!
//! [`CameraApp`] holds no UI. The terminal preview (or any other front end)
//! calls [`CameraApp::tick`] once per loop turn and forwards key presses
//! through [`CameraApp::handle`].
//!
//! # Frame flow
//!
//! ```text
//! camera.read_frame() → overlay → recorder (if recording) → preview
//!                                                          → still (on SPACE)
//! ```
//!
//! Stills are taken from the displayed frame, so they carry the overlay when
//! it is switched on.

pub mod fps;
pub mod keys;

pub use fps::FpsCounter;
pub use keys::{Action, action_for};

use crate::backends::camera::{
    BackendResult, CameraBackend, CameraKind, candidate_order, exact_order, open_first, open_kind,
    switch_target,
};
use crate::config::{CameraSettings, Config};
use crate::constants::{files, storage as storage_consts, timing};
use crate::errors::{AppResult, CameraError, PhotoError, RecordingError};
use crate::overlay::{OverlayInfo, render_overlay};
use crate::pipelines::photo::PhotoPipeline;
use crate::pipelines::video::{
    EncoderConfig, Recorder, RecordingSummary, VideoRecorder, VideoWriter, recording_path,
};
use crate::storage::{check_disk_space, ensure_save_directories, log_outcomes};
use chrono::Local;
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Opens one specific camera
pub type CameraOpener = fn(CameraKind, &CameraSettings) -> BackendResult<Box<dyn CameraBackend>>;

/// Creates the writer for a new recording
pub type WriterFactory<W> = fn(&Path, &EncoderConfig) -> Result<W, RecordingError>;

/// Camera application state
pub struct CameraApp<W: VideoWriter = VideoRecorder> {
    config: Config,
    camera: Option<Box<dyn CameraBackend>>,
    opener: CameraOpener,
    make_writer: WriterFactory<W>,
    recorder: Recorder<W>,
    photo: PhotoPipeline,
    fps: FpsCounter,
    /// Last displayed frame, overlay included
    frame: Option<RgbImage>,
    status: String,
    failed_reads: u64,
    shut_down: bool,
}

impl CameraApp<VideoRecorder> {
    /// Prepare the save directories and open a camera
    ///
    /// The camera type comes from `config.camera.preferred_type`. Failing to
    /// open any camera is the only fatal startup error.
    pub fn new(config: Config) -> AppResult<Self> {
        Self::with_hooks(config, open_kind, VideoRecorder::new)
    }
}

impl<W: VideoWriter> CameraApp<W> {
    /// Build the app with a custom camera opener and video writer
    pub fn with_hooks(
        mut config: Config,
        opener: CameraOpener,
        make_writer: WriterFactory<W>,
    ) -> AppResult<Self> {
        let outcomes = ensure_save_directories(&mut config.save_paths);
        log_outcomes(&outcomes);

        let settings = &config.camera;
        let order = candidate_order(settings.preferred_type, settings);
        let camera = open_first(&order, |kind| opener(kind, settings)).map_err(|e| {
            error!(error = %e, "No camera could be initialized");
            CameraError::NoCameraFound
        })?;

        let status = format!("{} ready", camera.kind());
        info!(
            camera = %camera.kind(),
            format = %camera.format(),
            images = %config.save_paths.images.display(),
            videos = %config.save_paths.videos.display(),
            "Camera application started"
        );

        Ok(Self {
            config,
            camera: Some(camera),
            opener,
            make_writer,
            recorder: Recorder::new(),
            photo: PhotoPipeline::new(),
            fps: FpsCounter::new(timing::FPS_WINDOW),
            frame: None,
            status,
            failed_reads: 0,
            shut_down: false,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn camera_kind(&self) -> Option<CameraKind> {
        self.camera.as_ref().map(|c| c.kind())
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn recording_elapsed(&self) -> Option<Duration> {
        self.recorder.elapsed()
    }

    /// Last user-facing message
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Last displayed frame
    pub fn frame(&self) -> Option<&RgbImage> {
        self.frame.as_ref()
    }

    pub fn fps(&self) -> f64 {
        self.fps.fps()
    }

    /// One loop turn: read a frame, draw the overlay, feed the recorder
    ///
    /// A failed read is logged, followed by a short pause, and `None` is
    /// returned so the caller simply tries again on the next turn.
    pub fn tick(&mut self) -> Option<&RgbImage> {
        let camera = self.camera.as_mut()?;

        let frame = match camera.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                self.failed_reads += 1;
                if self.failed_reads == 1 || self.failed_reads % timing::FRAME_LOG_INTERVAL == 0 {
                    error!(error = %e, failures = self.failed_reads, "Failed to read frame from camera");
                    self.status = format!("Failed to read frame: {}", e);
                }
                std::thread::sleep(timing::CAPTURE_RETRY_DELAY);
                return None;
            }
        };
        if self.failed_reads > 0 {
            debug!(failures = self.failed_reads, "Camera recovered");
            self.failed_reads = 0;
        }

        let fps = self.fps.tick();
        let mut image = frame.image;
        let info = OverlayInfo {
            fps,
            timestamp: Local::now().format(files::OVERLAY_TIMESTAMP_FORMAT).to_string(),
            recording: self.recorder.elapsed(),
        };
        render_overlay(&mut image, &info, &self.config.display);

        if let Err(e) = self.recorder.write(&image) {
            warn!(error = %e, "Dropped video frame");
            self.status = e.to_string();
        }

        self.frame = Some(image);
        self.frame.as_ref()
    }

    /// Run an action; returns `false` when the app should quit
    ///
    /// Failures are logged and shown in the status line; none of them end
    /// the loop.
    pub fn handle(&mut self, action: Action) -> bool {
        debug!(?action, "Handling action");
        let result = match action {
            Action::SavePhoto => self
                .save_photo()
                .map(|path| format!("Image saved: {}", path.display())),
            Action::ToggleRecording => self.toggle_recording(),
            Action::ToggleOverlay => {
                let on = self.config.display.toggle_overlay();
                info!(overlay = on, "Overlay toggled");
                Ok(format!("Overlay {}", if on { "on" } else { "off" }))
            }
            Action::SwitchCamera => self
                .switch_camera()
                .map(|kind| format!("Switched to {}", kind)),
            Action::Quit => return false,
        };

        match result {
            Ok(message) => self.status = message,
            Err(e) => {
                error!(error = %e, ?action, "Action failed");
                self.status = e.to_string();
            }
        }
        true
    }

    /// Save the last displayed frame to the images directory
    pub fn save_photo(&mut self) -> AppResult<PathBuf> {
        let frame = self.frame.as_ref().ok_or(PhotoError::NoFrameAvailable)?;
        let timestamp = Local::now().naive_local();
        Ok(self
            .photo
            .save(frame, &self.config.save_paths.images, &timestamp)?)
    }

    /// Start or stop recording, returning a message for the status line
    pub fn toggle_recording(&mut self) -> AppResult<String> {
        if self.recorder.is_recording() {
            let summary = self.stop_recording()?;
            Ok(match summary {
                Some(s) => format!(
                    "Video saved ({:.1}s): {}",
                    s.duration.as_secs_f64(),
                    s.path.display()
                ),
                None => "Not recording".to_string(),
            })
        } else {
            let path = self.start_recording()?;
            Ok(format!("Recording: {}", path.display()))
        }
    }

    /// Open a new recording at the current frame size
    ///
    /// Does nothing and returns the running file's path when a recording is
    /// already open.
    pub fn start_recording(&mut self) -> AppResult<PathBuf> {
        if let Some(path) = self.recorder.path() {
            return Ok(path.to_path_buf());
        }

        let (width, height) = match (&self.frame, &self.camera) {
            (Some(frame), _) => frame.dimensions(),
            (None, Some(camera)) => (camera.format().width, camera.format().height),
            (None, None) => return Err(CameraError::NoCameraFound.into()),
        };

        let videos = &self.config.save_paths.videos;
        let space = check_disk_space(videos, storage_consts::MIN_FREE_GB);
        if !space.ok {
            warn!(free_gb = ?space.free_gb, dir = %videos.display(), "Low disk space, recording anyway");
        }

        let encoder = EncoderConfig::from_settings(&self.config.video, width, height);
        let path = recording_path(videos, &Local::now().naive_local(), encoder.codec);
        let make_writer = self.make_writer;
        self.recorder
            .start_with(path.clone(), |p| make_writer(p, &encoder))?;
        Ok(path)
    }

    /// Close the running recording; `Ok(None)` when idle
    pub fn stop_recording(&mut self) -> AppResult<Option<RecordingSummary>> {
        Ok(self.recorder.stop()?)
    }

    /// Switch between the Pi Camera and a USB camera
    ///
    /// Refused while recording. The current camera is released first because
    /// most devices cannot be opened twice. If the other type cannot be
    /// opened the previous camera is reopened.
    pub fn switch_camera(&mut self) -> AppResult<CameraKind> {
        if self.recorder.is_recording() {
            return Err(CameraError::SwitchWhileRecording.into());
        }

        let previous = self.camera_kind();
        let target = previous
            .map(switch_target)
            .unwrap_or(self.config.camera.preferred_type);

        if let Some(camera) = self.camera.take() {
            info!(camera = %camera.kind(), "Releasing camera for switch");
        }
        self.frame = None;

        let opener = self.opener;
        let settings = &self.config.camera;
        match open_first(&exact_order(target, settings), |kind| opener(kind, settings)) {
            Ok(camera) => {
                let kind = camera.kind();
                info!(camera = %kind, format = %camera.format(), "Switched camera");
                self.camera = Some(camera);
                self.fps = FpsCounter::new(timing::FPS_WINDOW);
                Ok(kind)
            }
            Err(e) => {
                warn!(target = %target, error = %e, "Switch failed");
                if let Some(kind) = previous {
                    match opener(kind, settings) {
                        Ok(camera) => self.camera = Some(camera),
                        Err(e) => error!(camera = %kind, error = %e, "Could not reopen previous camera"),
                    }
                }
                Err(CameraError::InitializationFailed(format!("no {} camera available", target)).into())
            }
        }
    }

    /// Stop recording and release the camera
    ///
    /// Safe to call more than once; also runs when the app is dropped.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        match self.recorder.stop() {
            Ok(Some(summary)) => info!(path = %summary.path.display(), "Recording closed on exit"),
            Ok(None) => {}
            Err(e) => error!(error = %e, "Failed to close recording on exit"),
        }

        if let Some(camera) = self.camera.take() {
            info!(camera = %camera.kind(), "Camera released");
        }
    }
}

impl<W: VideoWriter> Drop for CameraApp<W> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::{
        BackendError, CameraDevice, CameraFormat, CameraFrame, CameraPreference, Framerate,
    };
    use crate::config::SavePaths;

    struct FakeCamera {
        device: CameraDevice,
        format: CameraFormat,
        sequence: u64,
    }

    impl CameraBackend for FakeCamera {
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
            self.sequence += 1;
            Ok(CameraFrame::new(RgbImage::new(64, 48), self.sequence))
        }
    }

    fn fake_camera(kind: CameraKind) -> Box<dyn CameraBackend> {
        Box::new(FakeCamera {
            device: CameraDevice {
                name: "fake".into(),
                kind,
                path: String::new(),
                driver: None,
            },
            format: CameraFormat {
                width: 64,
                height: 48,
                framerate: Framerate::from_int(30),
                pixel_format: "RGB".into(),
            },
            sequence: 0,
        })
    }

    /// Only the Pi Camera exists
    fn pi_only(kind: CameraKind, _: &CameraSettings) -> BackendResult<Box<dyn CameraBackend>> {
        match kind {
            CameraKind::PiCamera => Ok(fake_camera(kind)),
            CameraKind::Usb { .. } => Err(BackendError::DeviceNotFound("no usb".into())),
        }
    }

    /// Both types exist
    fn both(kind: CameraKind, _: &CameraSettings) -> BackendResult<Box<dyn CameraBackend>> {
        Ok(fake_camera(kind))
    }

    fn nothing(_: CameraKind, _: &CameraSettings) -> BackendResult<Box<dyn CameraBackend>> {
        Err(BackendError::DeviceNotFound("none".into()))
    }

    struct CountingWriter {
        path: PathBuf,
    }

    impl VideoWriter for CountingWriter {
        fn write_frame(&mut self, _frame: &RgbImage) -> Result<(), RecordingError> {
            Ok(())
        }

        fn finish(self) -> Result<PathBuf, RecordingError> {
            Ok(self.path)
        }
    }

    fn counting_writer(path: &Path, _: &EncoderConfig) -> Result<CountingWriter, RecordingError> {
        Ok(CountingWriter {
            path: path.to_path_buf(),
        })
    }

    /// Writes the file only when finished
    struct FileOnFinishWriter {
        path: PathBuf,
    }

    impl VideoWriter for FileOnFinishWriter {
        fn write_frame(&mut self, _frame: &RgbImage) -> Result<(), RecordingError> {
            Ok(())
        }

        fn finish(self) -> Result<PathBuf, RecordingError> {
            std::fs::write(&self.path, b"finished").map_err(|e| RecordingError::StopFailed(e.to_string()))?;
            Ok(self.path)
        }
    }

    fn file_on_finish_writer(path: &Path, _: &EncoderConfig) -> Result<FileOnFinishWriter, RecordingError> {
        Ok(FileOnFinishWriter {
            path: path.to_path_buf(),
        })
    }

    fn test_config(name: &str) -> Config {
        let root = std::env::temp_dir().join(format!("rpi-camera-app-{}-{}", name, std::process::id()));
        let mut config = Config::default();
        config.camera.max_usb_probe = 2;
        config.save_paths = SavePaths {
            images: root.join("images"),
            videos: root.join("videos"),
        };
        config
    }

    fn app(name: &str, opener: CameraOpener) -> CameraApp<CountingWriter> {
        CameraApp::with_hooks(test_config(name), opener, counting_writer).unwrap()
    }

    #[test]
    fn test_no_camera_is_fatal() {
        let result = CameraApp::with_hooks(test_config("none"), nothing, counting_writer);
        assert!(matches!(
            result,
            Err(crate::errors::AppError::Camera(CameraError::NoCameraFound))
        ));
    }

    #[test]
    fn test_recording_counts_ticked_frames() {
        let mut app = app("record", pi_only);
        assert!(app.tick().is_some());
        app.start_recording().unwrap();
        for _ in 0..5 {
            app.tick();
        }
        let summary = app.stop_recording().unwrap().unwrap();
        assert_eq!(summary.frames, 5);
        assert_eq!(summary.path.extension().unwrap(), "mp4");
        assert!(!app.is_recording());
        assert_eq!(app.stop_recording().unwrap(), None);
    }

    #[test]
    fn test_switch_refused_while_recording() {
        let mut app = app("switch-rec", both);
        app.tick();
        app.start_recording().unwrap();
        assert!(app.switch_camera().is_err());
        assert_eq!(app.camera_kind(), Some(CameraKind::PiCamera));
    }

    #[test]
    fn test_switch_between_types() {
        let mut app = app("switch", both);
        assert_eq!(app.switch_camera().unwrap(), CameraKind::Usb { index: 0 });
        assert_eq!(app.switch_camera().unwrap(), CameraKind::PiCamera);
    }

    #[test]
    fn test_failed_switch_reopens_previous_camera() {
        let mut app = app("switch-fail", pi_only);
        assert!(app.switch_camera().is_err());
        assert_eq!(app.camera_kind(), Some(CameraKind::PiCamera));
    }

    #[test]
    fn test_usb_preference_falls_back_to_pi() {
        let mut config = test_config("fallback");
        config.camera.preferred_type = CameraPreference::Usb;
        let app = CameraApp::with_hooks(config, pi_only, counting_writer).unwrap();
        assert_eq!(app.camera_kind(), Some(CameraKind::PiCamera));
    }

    #[test]
    fn test_photo_needs_a_frame() {
        let mut app = app("photo-none", pi_only);
        assert!(app.save_photo().is_err());
        app.tick();
        let path = app.save_photo().unwrap();
        assert!(path.exists());
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("Image"));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_handle_actions() {
        let mut app = app("actions", pi_only);
        assert!(app.handle(Action::ToggleOverlay));
        assert!(!app.config().display.show_status);
        assert_eq!(app.status(), "Overlay off");
        assert!(app.handle(Action::ToggleRecording));
        assert!(app.is_recording());
        assert!(app.handle(Action::ToggleRecording));
        assert!(!app.is_recording());
        assert!(!app.handle(Action::Quit));
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let mut app = app("shutdown", pi_only);
        app.tick();
        app.start_recording().unwrap();
        app.shutdown();
        assert!(!app.is_recording());
        assert_eq!(app.camera_kind(), None);
        app.shutdown();
        assert!(app.tick().is_none());
    }

    #[test]
    fn test_drop_while_recording_finishes_the_file() {
        let config = test_config("drop-rec");
        let videos = config.save_paths.videos.clone();
        let _ = std::fs::remove_dir_all(&videos);

        let mut app = CameraApp::with_hooks(config, pi_only, file_on_finish_writer).unwrap();
        app.tick();
        app.start_recording().unwrap();
        app.tick();
        drop(app);

        let files: Vec<_> = std::fs::read_dir(&videos).unwrap().flatten().collect();
        assert_eq!(files.len(), 1);
        assert_eq!(std::fs::read(files[0].path()).unwrap(), b"finished");
        let _ = std::fs::remove_dir_all(&videos);
    }
}
