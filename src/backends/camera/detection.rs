// SPDX-License-Identifier: GPL-3.0-only

//! Camera detection and selection
//!
//! Selection is split in two: [`candidate_order`] decides which cameras to try
//! and in what order, [`open_first`] walks that list with an opener. Only the
//! opener touches hardware.

use super::CameraBackend;
use super::libcamera::{PiCamera, is_libcamera_available};
use super::types::*;
use super::v4l2::UsbCamera;
use crate::config::CameraSettings;
use tracing::{debug, info, warn};

/// Cameras to try for a preference, most wanted first
///
/// The Pi Camera is preferred in auto mode. An explicit preference is tried
/// first and the other type is kept as a fallback. USB indices start at the
/// configured `preferred_index`; with `auto_detect` off no other index is
/// probed.
pub fn candidate_order(preference: CameraPreference, settings: &CameraSettings) -> Vec<CameraKind> {
    let usb = usb_candidates(settings);
    let mut order = Vec::with_capacity(usb.len() + 1);

    match preference {
        CameraPreference::Auto | CameraPreference::PiCamera => {
            order.push(CameraKind::PiCamera);
            order.extend(usb);
        }
        CameraPreference::Usb => {
            order.extend(usb);
            order.push(CameraKind::PiCamera);
        }
    }

    order
}

/// Like [`candidate_order`] but without falling back to the other type
pub fn exact_order(preference: CameraPreference, settings: &CameraSettings) -> Vec<CameraKind> {
    candidate_order(preference, settings)
        .into_iter()
        .filter(|kind| {
            preference == CameraPreference::Auto || CameraPreference::for_kind(*kind) == preference
        })
        .collect()
}

fn usb_candidates(settings: &CameraSettings) -> Vec<CameraKind> {
    let preferred = settings.preferred_index;
    let mut indices = vec![preferred];
    if settings.auto_detect {
        indices.extend((0..settings.max_usb_probe).filter(|&i| i != preferred));
    }
    indices
        .into_iter()
        .map(|index| CameraKind::Usb { index })
        .collect()
}

/// Open the first candidate that succeeds
///
/// Failures are logged and skipped. If nothing opens the result is
/// `DeviceNotFound`, which the application reports as "no camera".
pub fn open_first<T, F>(order: &[CameraKind], mut opener: F) -> BackendResult<T>
where
    F: FnMut(CameraKind) -> BackendResult<T>,
{
    let first_kind_is_pi = order.first().map(|k| k.is_pi_camera());

    for kind in order {
        match opener(*kind) {
            Ok(camera) => {
                if first_kind_is_pi.is_some_and(|pi| pi != kind.is_pi_camera()) {
                    info!(camera = %kind, "Preferred camera type unavailable, fell back");
                }
                return Ok(camera);
            }
            Err(e) => debug!(camera = %kind, error = %e, "Camera not usable"),
        }
    }

    Err(BackendError::DeviceNotFound("No cameras available".into()))
}

/// Open one specific camera
pub fn open_kind(kind: CameraKind, settings: &CameraSettings) -> BackendResult<Box<dyn CameraBackend>> {
    match kind {
        CameraKind::Usb { index } => Ok(Box::new(UsbCamera::probe(index, settings)?)),
        CameraKind::PiCamera => Ok(Box::new(PiCamera::open(settings)?)),
    }
}

/// Open the best camera for a preference
pub fn open_camera(
    preference: CameraPreference,
    settings: &CameraSettings,
) -> BackendResult<Box<dyn CameraBackend>> {
    let order = candidate_order(preference, settings);
    info!(preference = %preference, candidates = order.len(), "Opening camera");

    let camera = open_first(&order, |kind| open_kind(kind, settings))?;
    info!(
        camera = %camera.kind(),
        name = %camera.device().name,
        format = %camera.format(),
        "Camera ready"
    );
    Ok(camera)
}

/// Preference that selects the other camera type
pub fn switch_target(current: CameraKind) -> CameraPreference {
    match current {
        CameraKind::PiCamera => CameraPreference::Usb,
        CameraKind::Usb { .. } => CameraPreference::PiCamera,
    }
}

/// Open and release every camera to find out which ones work
///
/// Each camera is opened and must deliver a frame, so this takes a moment per
/// device and must not run while a camera is already open.
pub fn detect_cameras(settings: &CameraSettings) -> Vec<CameraDevice> {
    let mut found = Vec::new();

    if is_libcamera_available() {
        match PiCamera::open(settings) {
            Ok(camera) => found.push(camera.device().clone()),
            Err(e) => debug!(error = %e, "No Pi Camera"),
        }
    } else {
        debug!("libcamerasrc not installed, skipping Pi Camera");
    }

    for index in 0..settings.max_usb_probe {
        match UsbCamera::probe(index, settings) {
            Ok(camera) => found.push(camera.device().clone()),
            Err(BackendError::DeviceNotFound(_)) => {}
            Err(e) => warn!(index, error = %e, "USB camera present but not working"),
        }
    }

    info!(count = found.len(), "Camera detection complete");
    found
}

/// Which camera types are in a detection result: `(pi_camera, usb)`
pub fn available_types(devices: &[CameraDevice]) -> (bool, bool) {
    let pi = devices.iter().any(|d| d.kind.is_pi_camera());
    let usb = devices.iter().any(|d| !d.kind.is_pi_camera());
    (pi, usb)
}
