// SPDX-License-Identifier: GPL-3.0-only

//! Pi Camera discovery
//!
//! libcamera has no GStreamer-side enumeration API, so cameras are listed by
//! asking the libcamera command line tools and parsing their output.

use crate::constants::timing;
use std::process::{Command, Stdio};
use std::time::Instant;
use tracing::{debug, info};

/// A camera reported by libcamera
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibcameraCamera {
    /// Sensor model (e.g. "imx219")
    pub name: String,
    /// libcamera camera id, passed to `libcamerasrc camera-name=`
    pub id: String,
}

/// Listing tools in order of preference (Bookworm ships rpicam-*, Bullseye libcamera-*)
const LIST_COMMANDS: &[(&str, &[&str])] = &[
    ("rpicam-hello", &["--list-cameras"]),
    ("libcamera-hello", &["--list-cameras"]),
    ("cam", &["--list"]),
];

/// Check if the libcamerasrc GStreamer element is installed
pub fn is_libcamera_available() -> bool {
    if gstreamer::init().is_err() {
        return false;
    }
    gstreamer::ElementFactory::find("libcamerasrc").is_some()
}

/// List Pi cameras using whichever libcamera tool is installed
///
/// Returns `None` if no tool could be run, `Some(vec![])` if a tool ran and
/// reported no cameras.
pub fn enumerate_libcamera_cameras() -> Option<Vec<LibcameraCamera>> {
    for (program, args) in LIST_COMMANDS {
        let Some(stdout) = run_list_command(program, args) else {
            continue;
        };
        let cameras = parse_camera_list(&stdout);
        info!(tool = program, count = cameras.len(), "Enumerated libcamera cameras");
        return Some(cameras);
    }
    debug!("No libcamera listing tool available");
    None
}

fn run_list_command(program: &str, args: &[&str]) -> Option<String> {
    let mut child = Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .ok()?;

    let started = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(_)) => break,
            Ok(None) if started.elapsed() < timing::COMMAND_TIMEOUT => {
                std::thread::sleep(std::time::Duration::from_millis(50));
            }
            _ => {
                debug!(program, "Listing command timed out");
                let _ = child.kill();
                let _ = child.wait();
                return None;
            }
        }
    }

    let output = child.wait_with_output().ok()?;
    // rpicam-hello exits non-zero when no camera is attached but still prints a header
    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parse the camera list printed by `rpicam-hello --list-cameras` or `cam --list`
///
/// ```text
/// Available cameras
/// -----------------
/// 0 : imx219 [3280x2464 10-bit RGGB] (/base/soc/i2c0mux/i2c@1/imx219@10)
/// ```
///
/// ```text
/// Available cameras:
/// 1: 'ov5647' (/base/soc/i2c0mux/i2c@1/ov5647@36)
/// ```
pub fn parse_camera_list(output: &str) -> Vec<LibcameraCamera> {
    let mut cameras = Vec::new();

    for line in output.lines() {
        let trimmed = line.trim();
        let Some((number, rest)) = trimmed.split_once(':') else {
            continue;
        };
        if number.trim().parse::<u32>().is_err() {
            continue;
        }
        let rest = rest.trim();

        let name = match rest.strip_prefix('\'') {
            Some(quoted) => quoted.split('\'').next().unwrap_or_default(),
            None => rest.split_whitespace().next().unwrap_or_default(),
        };
        if name.is_empty() {
            continue;
        }

        let id = match (rest.rfind('('), rest.rfind(')')) {
            (Some(start), Some(end)) if start < end => &rest[start + 1..end],
            _ => name,
        };

        debug!(name, id, "Found libcamera camera");
        cameras.push(LibcameraCamera {
            name: name.to_string(),
            id: id.to_string(),
        });
    }

    cameras
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rpicam_output() {
        let output = "Available cameras\n-----------------\n\
            0 : imx219 [3280x2464 10-bit RGGB] (/base/soc/i2c0mux/i2c@1/imx219@10)\n    \
            Modes: 'SRGGB10_CSI2P' : 640x480 [206.65 fps - (1000, 752)/1280x960 crop]\n";
        let cameras = parse_camera_list(output);
        assert_eq!(cameras.len(), 1);
        assert_eq!(cameras[0].name, "imx219");
        assert_eq!(cameras[0].id, "/base/soc/i2c0mux/i2c@1/imx219@10");
    }

    #[test]
    fn test_parse_cam_output() {
        let output = "Available cameras:\n1: 'ov5647' (/base/soc/i2c0mux/i2c@1/ov5647@36)\n";
        let cameras = parse_camera_list(output);
        assert_eq!(
            cameras,
            vec![LibcameraCamera {
                name: "ov5647".into(),
                id: "/base/soc/i2c0mux/i2c@1/ov5647@36".into(),
            }]
        );
    }

    #[test]
    fn test_parse_no_cameras() {
        assert!(parse_camera_list("No cameras available!\n").is_empty());
        assert!(parse_camera_list("").is_empty());
    }
}
