// SPDX-License-Identifier: GPL-3.0-only

//! Camera diagnostics report
//!
//! Collects what is needed to debug a camera that does not show up:
//! - System information (kernel, Raspberry Pi model)
//! - Boot configuration camera settings
//! - `/dev/video*` nodes and loaded kernel modules
//! - libcamera and V4L2 device listings
//! - GStreamer elements used by the capture and recording pipelines
//!
//! Every check is best effort. Missing tools and unreadable files are
//! reported, never treated as errors.

use crate::constants::{app_info, timing};
use crate::pipelines::video::{VideoCodec, available_encoders};
use std::fmt::Write as _;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Boot config locations (Bookworm moved it under /boot/firmware)
const BOOT_CONFIGS: [&str; 2] = ["/boot/firmware/config.txt", "/boot/config.txt"];

/// Boot config keys relevant to the camera
const BOOT_KEYS: [&str; 4] = ["camera", "start_x", "gpu_mem", "dtoverlay"];

/// Kernel modules of the Pi camera stack
const MODULE_PATTERNS: [&str; 2] = ["bcm2835", "v4l2"];

/// GStreamer elements the capture pipelines need
const CAPTURE_ELEMENTS: [&str; 4] = ["libcamerasrc", "v4l2src", "videoconvert", "appsink"];

const COMMAND_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Ok,
    /// Tool, file or device not present
    Missing,
    /// Present but returned an error
    Failed,
}

impl CheckStatus {
    fn marker(&self) -> &'static str {
        match self {
            CheckStatus::Ok => "✓",
            CheckStatus::Missing => "✗",
            CheckStatus::Failed => "!",
        }
    }
}

/// One probe and what it printed
#[derive(Debug, Clone)]
pub struct Check {
    pub description: String,
    /// Command line or file path
    pub source: String,
    pub status: CheckStatus,
    pub output: String,
}

#[derive(Debug, Clone)]
pub struct Section {
    pub title: &'static str,
    pub checks: Vec<Check>,
}

/// Facts extracted from the checks, used for the recommendations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Findings {
    pub pi_model: Option<String>,
    pub boot_config: Option<PathBuf>,
    /// `Some(true)` if `camera_auto_detect=1` is set
    pub camera_auto_detect: Option<bool>,
    pub video_nodes: Vec<PathBuf>,
    /// Cameras listed by the libcamera tools, `None` if no tool ran
    pub libcamera_cameras: Option<usize>,
    pub libcamerasrc: bool,
    pub v4l2src: bool,
    /// Installed encoders per codec
    pub encoders: Vec<(VideoCodec, Vec<&'static str>)>,
}

/// Full diagnostics report
#[derive(Debug, Clone)]
pub struct DiagnosticsReport {
    pub generated: String,
    pub sections: Vec<Section>,
    pub findings: Findings,
}

impl DiagnosticsReport {
    /// Run every check
    ///
    /// Takes a few seconds because external tools are started; each one is
    /// bounded by the command timeout.
    pub fn collect() -> Self {
        info!("Collecting camera diagnostics");
        let mut findings = Findings::default();

        let sections = vec![
            system_section(&mut findings),
            boot_section(&mut findings),
            devices_section(&mut findings),
            modules_section(),
            detection_section(&mut findings),
            gstreamer_section(&mut findings),
            messages_section(),
        ];

        Self {
            generated: chrono::Local::now().to_rfc3339(),
            sections,
            findings,
        }
    }

    pub fn recommendations(&self) -> Vec<String> {
        recommendations_for(&self.findings)
    }

    /// Render as Markdown
    pub fn to_markdown(&self) -> String {
        let mut report = String::new();
        let _ = writeln!(report, "# Raspberry Pi Camera Diagnostics\n");
        let _ = writeln!(report, "Generated: {}", self.generated);
        let _ = writeln!(report, "Version: {}\n", app_info::version());

        for section in &self.sections {
            let _ = writeln!(report, "## {}\n", section.title);
            for check in &section.checks {
                let _ = writeln!(
                    report,
                    "{} **{}** (`{}`)",
                    check.status.marker(),
                    check.description,
                    check.source
                );
                let output = check.output.trim_end();
                if !output.is_empty() {
                    let _ = writeln!(report, "\n```\n{}\n```", output);
                }
                report.push('\n');
            }
        }

        let _ = writeln!(report, "## Recommendations\n");
        for (i, rec) in self.recommendations().iter().enumerate() {
            let _ = writeln!(report, "{}. {}", i + 1, rec);
        }
        report
    }
}

impl std::fmt::Display for DiagnosticsReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_markdown())
    }
}

fn system_section(findings: &mut Findings) -> Section {
    let mut checks = vec![command_check("System information", "uname", &["-a"])];

    let model = std::fs::read_to_string("/proc/device-tree/model")
        .ok()
        .map(|m| m.trim_end_matches('\0').trim().to_string())
        .filter(|m| !m.is_empty())
        .or_else(|| {
            std::fs::read_to_string("/proc/cpuinfo")
                .ok()
                .and_then(|c| parse_pi_model(&c))
        });
    checks.push(Check {
        description: "Raspberry Pi model".into(),
        source: "/proc/device-tree/model".into(),
        status: if model.is_some() {
            CheckStatus::Ok
        } else {
            CheckStatus::Missing
        },
        output: model.clone().unwrap_or_else(|| "not a Raspberry Pi?".into()),
    });
    findings.pi_model = model;

    Section {
        title: "System Information",
        checks,
    }
}

fn boot_section(findings: &mut Findings) -> Section {
    let mut checks = Vec::new();

    match BOOT_CONFIGS
        .into_iter()
        .map(Path::new)
        .find_map(|p| std::fs::read_to_string(p).ok().map(|c| (p, c)))
    {
        Some((path, content)) => {
            let lines = boot_camera_lines(&content);
            findings.boot_config = Some(path.to_path_buf());
            findings.camera_auto_detect = Some(camera_auto_detect_enabled(&content));
            checks.push(Check {
                description: "Camera settings in boot config".into(),
                source: path.display().to_string(),
                status: CheckStatus::Ok,
                output: if lines.is_empty() {
                    "(no camera related lines)".into()
                } else {
                    lines.join("\n")
                },
            });
        }
        None => checks.push(Check {
            description: "Boot configuration file".into(),
            source: BOOT_CONFIGS.join(", "),
            status: CheckStatus::Missing,
            output: String::new(),
        }),
    }

    Section {
        title: "Boot Configuration",
        checks,
    }
}

fn devices_section(findings: &mut Findings) -> Section {
    let nodes = video_nodes(Path::new("/dev"));
    let check = Check {
        description: "Video device nodes".into(),
        source: "/dev/video*".into(),
        status: if nodes.is_empty() {
            CheckStatus::Missing
        } else {
            CheckStatus::Ok
        },
        output: nodes
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join("\n"),
    };
    findings.video_nodes = nodes;

    Section {
        title: "Camera Device Files",
        checks: vec![check],
    }
}

fn modules_section() -> Section {
    let checks = MODULE_PATTERNS
        .into_iter()
        .map(|pattern| {
            let mut check = command_check(&format!("{} modules", pattern), "lsmod", &[]);
            if check.status == CheckStatus::Ok {
                let lines = matching_lines(&check.output, &[pattern]);
                check.status = if lines.is_empty() {
                    CheckStatus::Missing
                } else {
                    CheckStatus::Ok
                };
                check.output = lines.join("\n");
            }
            check.source = format!("lsmod | grep {}", pattern);
            check
        })
        .collect();

    Section {
        title: "Kernel Modules",
        checks,
    }
}

fn detection_section(findings: &mut Findings) -> Section {
    let mut checks = Vec::new();

    let libcamera = ["rpicam-hello", "libcamera-hello"]
        .into_iter()
        .map(|tool| command_check("libcamera camera list", tool, &["--list-cameras"]))
        .find(|c| c.status != CheckStatus::Missing);
    match libcamera {
        Some(check) => {
            let cameras = crate::backends::camera::libcamera::parse_camera_list(&check.output);
            findings.libcamera_cameras = Some(cameras.len());
            checks.push(check);
        }
        None => checks.push(Check {
            description: "libcamera camera list".into(),
            source: "rpicam-hello / libcamera-hello --list-cameras".into(),
            status: CheckStatus::Missing,
            output: "libcamera tools not installed".into(),
        }),
    }

    checks.push(command_check("V4L2 devices", "v4l2-ctl", &["--list-devices"]));

    Section {
        title: "Camera Detection",
        checks,
    }
}

fn gstreamer_section(findings: &mut Findings) -> Section {
    let mut checks = Vec::new();

    if let Err(e) = gstreamer::init() {
        checks.push(Check {
            description: "GStreamer".into(),
            source: "gst::init".into(),
            status: CheckStatus::Failed,
            output: e.to_string(),
        });
        return Section {
            title: "GStreamer",
            checks,
        };
    }

    for element in CAPTURE_ELEMENTS {
        let present = gstreamer::ElementFactory::find(element).is_some();
        match element {
            "libcamerasrc" => findings.libcamerasrc = present,
            "v4l2src" => findings.v4l2src = present,
            _ => {}
        }
        checks.push(Check {
            description: format!("Element {}", element),
            source: element.into(),
            status: if present {
                CheckStatus::Ok
            } else {
                CheckStatus::Missing
            },
            output: String::new(),
        });
    }

    for codec in VideoCodec::ALL {
        let installed = available_encoders(codec);
        checks.push(Check {
            description: format!("{} encoders", codec),
            source: codec
                .encoder_candidates()
                .iter()
                .map(|(name, _)| *name)
                .collect::<Vec<_>>()
                .join(", "),
            status: if installed.is_empty() {
                CheckStatus::Missing
            } else {
                CheckStatus::Ok
            },
            output: installed.join(", "),
        });
        findings.encoders.push((codec, installed));
    }

    Section {
        title: "GStreamer",
        checks,
    }
}

fn messages_section() -> Section {
    let mut check = command_check("Camera kernel messages", "dmesg", &[]);
    if check.status == CheckStatus::Ok {
        let lines = matching_lines(&check.output, &["camera", "bcm2835", "imx", "ov5647"]);
        check.output = lines.join("\n");
    }
    Section {
        title: "System Messages",
        checks: vec![check],
    }
}

/// Run a command with the diagnostics timeout
fn command_check(description: &str, program: &str, args: &[&str]) -> Check {
    let source = std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ");
    debug!(command = %source, "Running diagnostic command");

    let (status, output) = match run_command(program, args) {
        CommandResult::Finished {
            success,
            stdout,
            stderr,
        } => {
            let mut output = stdout;
            if !stderr.trim().is_empty() {
                if !output.is_empty() {
                    output.push('\n');
                }
                output.push_str(&stderr);
            }
            let status = if success {
                CheckStatus::Ok
            } else {
                CheckStatus::Failed
            };
            (status, output)
        }
        CommandResult::NotFound => (CheckStatus::Missing, format!("{} not installed", program)),
        CommandResult::TimedOut => (
            CheckStatus::Failed,
            format!("timed out after {}s", timing::COMMAND_TIMEOUT.as_secs()),
        ),
        CommandResult::Error(e) => (CheckStatus::Failed, e),
    };

    Check {
        description: description.into(),
        source,
        status,
        output,
    }
}

enum CommandResult {
    Finished {
        success: bool,
        stdout: String,
        stderr: String,
    },
    NotFound,
    TimedOut,
    Error(String),
}

fn run_command(program: &str, args: &[&str]) -> CommandResult {
    run_command_with_timeout(program, args, timing::COMMAND_TIMEOUT)
}

/// Run a tool, killing it once `timeout` has passed
fn run_command_with_timeout(program: &str, args: &[&str], timeout: Duration) -> CommandResult {
    let mut child = match Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return CommandResult::NotFound,
        Err(e) => return CommandResult::Error(e.to_string()),
    };

    // Drained while the tool runs; a full pipe would block it
    let stdout = child.stdout.take().map(drain_pipe);
    let stderr = child.stderr.take().map(drain_pipe);

    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if started.elapsed() < timeout => std::thread::sleep(COMMAND_POLL_INTERVAL),
            Ok(None) => {
                debug!(program, "Command timed out, killing it");
                let _ = child.kill();
                let _ = child.wait();
                return CommandResult::TimedOut;
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return CommandResult::Error(e.to_string());
            }
        }
    };

    CommandResult::Finished {
        success: status.success(),
        stdout: collect_pipe(stdout),
        stderr: collect_pipe(stderr),
    }
}

fn drain_pipe<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut data = Vec::new();
        let _ = pipe.read_to_end(&mut data);
        data
    })
}

fn collect_pipe(reader: Option<JoinHandle<Vec<u8>>>) -> String {
    reader
        .and_then(|handle| handle.join().ok())
        .map(|data| String::from_utf8_lossy(&data).into_owned())
        .unwrap_or_default()
}

/// Model name from `/proc/cpuinfo` ("Model : Raspberry Pi 4 Model B Rev 1.4")
pub fn parse_pi_model(cpuinfo: &str) -> Option<String> {
    cpuinfo.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        (key.trim() == "Model")
            .then(|| value.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

/// Boot config lines mentioning camera, `start_x`, `gpu_mem` or overlays
pub fn boot_camera_lines(content: &str) -> Vec<String> {
    matching_lines(content, &BOOT_KEYS)
}

/// Whether `camera_auto_detect=1` is set on an uncommented line
pub fn camera_auto_detect_enabled(content: &str) -> bool {
    content.lines().any(|line| {
        let line = line.trim();
        !line.starts_with('#')
            && line
                .split_once('=')
                .is_some_and(|(k, v)| k.trim() == "camera_auto_detect" && v.trim() == "1")
    })
}

/// Lines containing any of `needles`, ignoring case
pub fn matching_lines(text: &str, needles: &[&str]) -> Vec<String> {
    text.lines()
        .filter(|line| {
            let lower = line.to_lowercase();
            needles.iter().any(|n| lower.contains(&n.to_lowercase()))
        })
        .map(|line| line.trim_end().to_string())
        .collect()
}

/// `videoN` nodes in `dev_dir`, sorted by index
pub fn video_nodes(dev_dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dev_dir) else {
        return Vec::new();
    };
    let mut nodes: Vec<(u32, PathBuf)> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name();
            let index = name.to_str()?.strip_prefix("video")?.parse().ok()?;
            Some((index, entry.path()))
        })
        .collect();
    nodes.sort_by_key(|(index, _)| *index);
    nodes.into_iter().map(|(_, path)| path).collect()
}

/// Troubleshooting steps for what was (not) found
pub fn recommendations_for(findings: &Findings) -> Vec<String> {
    let mut recs = Vec::new();

    if findings.video_nodes.is_empty() {
        recs.push(
            "No /dev/video* nodes: check the ribbon cable (contacts toward the board) \
             or plug the USB camera into another port"
                .to_string(),
        );
    }

    if findings.pi_model.is_some() {
        if findings.camera_auto_detect == Some(false) {
            let path = findings
                .boot_config
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "config.txt".into());
            recs.push(format!(
                "Add camera_auto_detect=1 to {} and reboot",
                path
            ));
        }
        match findings.libcamera_cameras {
            None => recs.push("Install the libcamera tools: sudo apt install rpicam-apps".into()),
            Some(0) => recs.push(
                "libcamera sees no camera: reseat the ribbon cable, then run rpicam-hello --list-cameras"
                    .into(),
            ),
            Some(_) => {}
        }
    }

    if !findings.libcamerasrc {
        recs.push(
            "libcamerasrc missing (needed for the Pi Camera): sudo apt install gstreamer1.0-libcamera"
                .into(),
        );
    }

    if !findings.v4l2src {
        recs.push(
            "GStreamer good plugins missing (no v4l2src, mp4mux or avimux): \
             sudo apt install gstreamer1.0-plugins-good"
                .into(),
        );
    }

    let missing: Vec<String> = findings
        .encoders
        .iter()
        .filter(|(_, installed)| installed.is_empty())
        .map(|(codec, _)| codec.to_string())
        .collect();
    if !missing.is_empty() {
        recs.push(format!(
            "No encoder for {}: sudo apt install gstreamer1.0-plugins-good gstreamer1.0-plugins-ugly gstreamer1.0-libav",
            missing.join(", ")
        ));
    }

    if recs.is_empty() {
        recs.push("No problems found. Run `rpi-camera list` to see the detected cameras".into());
    }
    recs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pi_model() {
        let cpuinfo = "processor\t: 0\nHardware\t: BCM2835\nModel\t\t: Raspberry Pi 4 Model B Rev 1.4\n";
        assert_eq!(
            parse_pi_model(cpuinfo).as_deref(),
            Some("Raspberry Pi 4 Model B Rev 1.4")
        );
        assert_eq!(parse_pi_model("processor : 0\n"), None);
    }

    #[test]
    fn test_boot_config_lines() {
        let content = "# comment\ndtparam=audio=on\ncamera_auto_detect=1\ngpu_mem=128\ndtoverlay=vc4-kms-v3d\n";
        let lines = boot_camera_lines(content);
        assert_eq!(
            lines,
            vec!["camera_auto_detect=1", "gpu_mem=128", "dtoverlay=vc4-kms-v3d"]
        );
        assert!(camera_auto_detect_enabled(content));
        assert!(!camera_auto_detect_enabled("#camera_auto_detect=1\n"));
    }

    #[test]
    fn test_video_nodes_sorted_numerically() {
        let dir = std::env::temp_dir().join(format!("rpi-camera-dev-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        for name in ["video10", "video2", "video0", "vchiq"] {
            std::fs::write(dir.join(name), b"").unwrap();
        }
        let nodes = video_nodes(&dir);
        let names: Vec<_> = nodes
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["video0", "video2", "video10"]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_recommendations() {
        let healthy = Findings {
            pi_model: Some("Raspberry Pi 5".into()),
            camera_auto_detect: Some(true),
            video_nodes: vec![PathBuf::from("/dev/video0")],
            libcamera_cameras: Some(1),
            libcamerasrc: true,
            v4l2src: true,
            encoders: vec![(VideoCodec::Mp4v, vec!["avenc_mpeg4"])],
            ..Findings::default()
        };
        let recs = recommendations_for(&healthy);
        assert_eq!(recs.len(), 1);
        assert!(recs[0].starts_with("No problems found"));

        let broken = Findings {
            pi_model: Some("Raspberry Pi 4".into()),
            camera_auto_detect: Some(false),
            libcamera_cameras: Some(0),
            encoders: vec![(VideoCodec::H264, vec![])],
            ..Findings::default()
        };
        let recs = recommendations_for(&broken);
        assert!(recs.iter().any(|r| r.contains("camera_auto_detect=1")));
        assert!(recs.iter().any(|r| r.contains("gstreamer1.0-libcamera")));
        assert!(recs.iter().any(|r| r.contains("H264")));
        assert!(recs.iter().any(|r| r.contains("/dev/video")));
        assert!(recs.iter().any(|r| r.contains("gstreamer1.0-plugins-good")));
    }

    #[test]
    fn test_hung_command_is_killed() {
        let started = Instant::now();
        let result = run_command_with_timeout("sleep", &["30"], Duration::from_millis(200));
        assert!(matches!(result, CommandResult::TimedOut));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_command_output_and_missing_tool() {
        match run_command_with_timeout("echo", &["camera"], Duration::from_secs(5)) {
            CommandResult::Finished { success, stdout, .. } => {
                assert!(success);
                assert_eq!(stdout.trim(), "camera");
            }
            _ => panic!("echo should finish"),
        }
        assert!(matches!(
            run_command_with_timeout("rpi-camera-no-such-tool", &[], Duration::from_secs(1)),
            CommandResult::NotFound
        ));
    }
}
