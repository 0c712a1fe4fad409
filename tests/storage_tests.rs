// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for save directories and file naming

use chrono::NaiveDate;
use rpi_camera::config::SavePaths;
use rpi_camera::storage::{
    check_disk_space, ensure_save_directories_with_home, image_filename, prepare_directory, unique_path,
    video_filename,
};
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("rpi-camera-storage-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_filenames() {
    let ts = NaiveDate::from_ymd_opt(2025, 1, 31)
        .unwrap()
        .and_hms_opt(23, 59, 1)
        .unwrap();
    assert_eq!(image_filename(&ts), "Image20250131_235901.jpg");
    assert_eq!(video_filename(&ts, "avi"), "Video20250131_235901.avi");
}

#[test]
fn test_same_second_names_are_unique() {
    let dir = temp_dir("unique");
    let ts = NaiveDate::from_ymd_opt(2025, 6, 1)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap();

    let mut seen = Vec::new();
    for _ in 0..3 {
        let path = unique_path(&dir, &image_filename(&ts));
        assert!(!seen.contains(&path));
        std::fs::write(&path, b"jpeg").unwrap();
        seen.push(path);
    }
    assert_eq!(
        seen[2].file_name().unwrap().to_string_lossy(),
        "Image20250601_080000_2.jpg"
    );
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_directories_created_with_mode() {
    let root = temp_dir("create");
    let mut paths = SavePaths {
        images: root.join("a/images"),
        videos: root.join("b/videos"),
    };
    let expected = paths.clone();

    let outcomes = ensure_save_directories_with_home(&mut paths, Some(&root.join("home")));
    assert_eq!(paths, expected);
    assert!(outcomes.iter().all(|o| o.error.is_none() && !o.used_fallback));

    let mode = std::fs::metadata(&paths.images).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o755);
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn test_unusable_directory_falls_back() {
    let root = temp_dir("fallback");
    // A regular file cannot hold a directory, whatever the permissions
    let blocker = root.join("blocker");
    std::fs::write(&blocker, b"").unwrap();

    let home = root.join("home");
    let mut paths = SavePaths {
        images: blocker.join("Pictures"),
        videos: root.join("videos"),
    };
    let outcomes = ensure_save_directories_with_home(&mut paths, Some(&home));

    assert!(outcomes[0].used_fallback);
    assert_eq!(paths.images, home.join("Desktop").join("Pictures"));
    assert!(paths.images.is_dir());
    assert!(!outcomes[1].used_fallback);
    assert_eq!(paths.videos, root.join("videos"));
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn test_existing_directory_keeps_its_mode() {
    let root = temp_dir("existing");
    let shared = root.join("shared");
    std::fs::create_dir_all(&shared).unwrap();
    std::fs::set_permissions(&shared, std::fs::Permissions::from_mode(0o775)).unwrap();

    prepare_directory(&shared).unwrap();
    let mode = std::fs::metadata(&shared).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o775);
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn test_disk_space_query() {
    let dir = temp_dir("space");
    let space = check_disk_space(&dir, 0.0);
    assert!(space.ok);
    assert!(space.free_gb.is_some());

    let space = check_disk_space(&dir, f64::MAX);
    assert!(!space.ok);

    // Unqueryable paths count as enough space
    let space = check_disk_space(&dir.join("does/not/exist"), f64::MAX);
    assert!(space.ok);
    assert_eq!(space.free_gb, None);
    let _ = std::fs::remove_dir_all(&dir);
}
