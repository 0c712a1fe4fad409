// SPDX-License-Identifier: GPL-3.0-only

//! Save directories, output file names and free space checks

use crate::config::SavePaths;
use crate::constants::{files, storage};
use chrono::NaiveDateTime;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Result of preparing one save directory
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryOutcome {
    /// "images" or "videos"
    pub label: &'static str,
    /// Directory now stored in the config
    pub path: PathBuf,
    /// The configured directory was unusable and a fallback was taken
    pub used_fallback: bool,
    /// Set when no candidate could be used
    pub error: Option<String>,
}

/// Make sure both save directories exist and are writable
///
/// For each directory the configured path is tried first, then
/// `~/Desktop/<folder>`, then `./<folder>`. The first usable candidate is
/// written back into `paths`. If none works the configured path is kept and
/// the outcome carries the last error.
pub fn ensure_save_directories(paths: &mut SavePaths) -> Vec<DirectoryOutcome> {
    ensure_save_directories_with_home(paths, dirs::home_dir().as_deref())
}

/// [`ensure_save_directories`] with an explicit home directory for the
/// Desktop fallback
pub fn ensure_save_directories_with_home(paths: &mut SavePaths, home: Option<&Path>) -> Vec<DirectoryOutcome> {
    let images = resolve_directory("images", &paths.images, storage::IMAGES_FOLDER, home);
    let videos = resolve_directory("videos", &paths.videos, storage::VIDEOS_FOLDER, home);

    paths.images = images.path.clone();
    paths.videos = videos.path.clone();

    vec![images, videos]
}

/// Directories tried for one kind of media, in order
pub fn candidate_directories(configured: &Path, folder: &str, home: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = vec![configured.to_path_buf()];
    if let Some(home) = home {
        candidates.push(home.join(storage::DESKTOP_FOLDER).join(folder));
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    candidates.push(cwd.join(folder));
    candidates.dedup();
    candidates
}

fn resolve_directory(
    label: &'static str,
    configured: &Path,
    folder: &str,
    home: Option<&Path>,
) -> DirectoryOutcome {
    let mut last_error = None;

    for (i, candidate) in candidate_directories(configured, folder, home).into_iter().enumerate() {
        match prepare_directory(&candidate) {
            Ok(()) => {
                if i > 0 {
                    warn!(
                        label,
                        configured = %configured.display(),
                        using = %candidate.display(),
                        "Save directory not usable, using fallback"
                    );
                } else {
                    debug!(label, path = %candidate.display(), "Save directory ready");
                }
                return DirectoryOutcome {
                    label,
                    path: candidate,
                    used_fallback: i > 0,
                    error: None,
                };
            }
            Err(e) => {
                debug!(label, path = %candidate.display(), error = %e, "Directory candidate rejected");
                last_error = Some(format!("{}: {}", candidate.display(), e));
            }
        }
    }

    warn!(label, error = ?last_error, "No usable save directory");
    DirectoryOutcome {
        label,
        path: configured.to_path_buf(),
        used_fallback: false,
        error: last_error,
    }
}

/// Create `path` and check a file can be written into it
///
/// Only a directory created here gets its mode set; existing directories
/// keep theirs.
pub fn prepare_directory(path: &Path) -> io::Result<()> {
    if !path.is_dir() {
        fs::create_dir_all(path)?;
        if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(storage::DIR_MODE)) {
            warn!(path = %path.display(), error = %e, "Could not set directory mode");
        }
    }

    let probe = path.join(storage::WRITE_PROBE);
    fs::write(&probe, b"")?;
    fs::remove_file(&probe)?;
    Ok(())
}

/// Log file used while the terminal preview owns the screen
pub fn preview_log_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(files::LOG_DIR)
        .join(files::PREVIEW_LOG)
}

/// `Image<YYYYmmdd_HHMMSS>.jpg`
pub fn image_filename(timestamp: &NaiveDateTime) -> String {
    format!(
        "{}{}.{}",
        files::IMAGE_PREFIX,
        timestamp.format(files::TIMESTAMP_FORMAT),
        files::IMAGE_EXTENSION
    )
}

/// `Video<YYYYmmdd_HHMMSS>.<extension>`
pub fn video_filename(timestamp: &NaiveDateTime, extension: &str) -> String {
    format!(
        "{}{}.{}",
        files::VIDEO_PREFIX,
        timestamp.format(files::TIMESTAMP_FORMAT),
        extension
    )
}

/// Join `name` onto `dir`, adding `_1`, `_2`, ... before the extension if
/// a file with that name already exists
pub fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, extension) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };

    (1u32..)
        .map(|n| match extension {
            Some(ext) => dir.join(format!("{}_{}.{}", stem, n, ext)),
            None => dir.join(format!("{}_{}", stem, n)),
        })
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

/// Free space on the filesystem holding a directory
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiskSpace {
    /// At least the requested amount is free, or the query failed
    pub ok: bool,
    /// Free space in GiB, `None` if it could not be determined
    pub free_gb: Option<f64>,
}

/// Check that at least `min_gb` GiB are free below `path`
///
/// Space that cannot be queried counts as enough.
pub fn check_disk_space(path: &Path, min_gb: f64) -> DiskSpace {
    match free_bytes(path) {
        Some(bytes) => {
            let free_gb = bytes as f64 / (1024.0 * 1024.0 * 1024.0);
            let ok = free_gb >= min_gb;
            if !ok {
                warn!(path = %path.display(), free_gb = format!("{:.2}", free_gb), "Low disk space");
            }
            DiskSpace {
                ok,
                free_gb: Some(free_gb),
            }
        }
        None => {
            debug!(path = %path.display(), "Could not query free space");
            DiskSpace {
                ok: true,
                free_gb: None,
            }
        }
    }
}

fn free_bytes(path: &Path) -> Option<u64> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).ok()?;
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    // SAFETY: c_path is NUL-terminated and stat is a valid out pointer
    let ret = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if ret != 0 {
        return None;
    }
    Some(stat.f_bavail as u64 * stat.f_frsize as u64)
}

/// Log where files will be saved
pub fn log_outcomes(outcomes: &[DirectoryOutcome]) {
    for outcome in outcomes {
        match &outcome.error {
            None => info!(label = outcome.label, path = %outcome.path.display(), "Saving to"),
            Some(e) => warn!(label = outcome.label, error = %e, "Saving will fail"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn timestamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 7)
            .unwrap()
    }

    #[test]
    fn test_filenames() {
        assert_eq!(image_filename(&timestamp()), "Image20240309_140507.jpg");
        assert_eq!(video_filename(&timestamp(), "mp4"), "Video20240309_140507.mp4");
    }

    #[test]
    fn test_candidates_start_with_configured() {
        let configured = Path::new("/nonexistent/photos");
        let candidates = candidate_directories(configured, "Pictures", Some(Path::new("/home/pi")));
        assert_eq!(candidates[0], configured);
        assert_eq!(candidates[1], Path::new("/home/pi/Desktop/Pictures"));
        assert!(candidates.last().unwrap().ends_with("Pictures"));

        let candidates = candidate_directories(configured, "Pictures", None);
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn test_preview_log_outside_save_dirs() {
        let path = preview_log_path();
        assert!(path.ends_with("rpi-camera/preview.log"));
        assert!(path.is_absolute());
    }

    #[test]
    fn test_unreadable_free_space_counts_as_ok() {
        let space = check_disk_space(Path::new("/nonexistent/rpi-camera/path"), 1.0);
        assert!(space.ok);
        assert_eq!(space.free_gb, None);
    }
}
