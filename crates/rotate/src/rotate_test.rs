//! Tests for the rotating append file

use std::fs;
use std::io::Write;

use crate::{RotateConfig, RotatingFile};

fn config(max_size: u64, max_backups: usize, compress: bool) -> RotateConfig {
    RotateConfig {
        max_size,
        max_backups,
        max_age_days: 0,
        compress,
    }
}

#[test]
fn test_append_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");

    let mut w = RotatingFile::open(&path, config(1024, 3, false)).unwrap();
    w.write_all(b"line 1\n").unwrap();
    w.close().unwrap();

    let mut w = RotatingFile::open(&path, config(1024, 3, false)).unwrap();
    w.write_all(b"line 2\n").unwrap();
    w.flush().unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "line 1\nline 2\n");
}

#[test]
fn test_creates_parent_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("grp/sub/app.log");

    let mut w = RotatingFile::open(&path, config(1024, 3, false)).unwrap();
    w.write_all(b"x\n").unwrap();
    w.flush().unwrap();
    assert!(path.exists());
}

#[test]
fn test_rotates_over_size() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");

    let mut w = RotatingFile::open(&path, config(20, 5, false)).unwrap();
    for i in 0..10 {
        writeln!(w, "line number {i}").unwrap();
    }
    w.close().unwrap();

    let names: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|d| d.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert!(names.iter().any(|n| n == "app.log"));
    assert!(
        names.iter().any(|n| n.starts_with("app-") && n.ends_with(".log")),
        "expected a rotated backup in {names:?}"
    );
    // live file holds only the tail after the last rotation
    assert!(fs::read_to_string(&path).unwrap().len() <= 20);
}

#[test]
fn test_compresses_rotated_segment() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");

    let mut w = RotatingFile::open(&path, config(20, 5, true)).unwrap();
    for i in 0..10 {
        writeln!(w, "line number {i}").unwrap();
    }
    w.close().unwrap();

    let names: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|d| d.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert!(
        names.iter().any(|n| n.ends_with(".log.lz4")),
        "expected compressed backups in {names:?}"
    );
    assert!(
        !names
            .iter()
            .any(|n| n.starts_with("app-") && n.ends_with(".log")),
        "uncompressed originals must be removed, got {names:?}"
    );
}

#[test]
fn test_prunes_backups_over_count() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");

    let mut w = RotatingFile::open(&path, config(10, 2, false)).unwrap();
    for i in 0..30 {
        writeln!(w, "line {i}").unwrap();
    }
    w.close().unwrap();

    let backups = fs::read_dir(dir.path())
        .unwrap()
        .map(|d| d.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with("app-"))
        .count();
    assert!(backups <= 2, "expected at most 2 backups, got {backups}");
}
