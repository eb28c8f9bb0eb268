use std::fs;

use ferry_fs::{Error, FileKind, StorageLayout};
use tempfile::tempdir;

#[test]
fn test_ensure_root_creates_nested_dirs() {
    let dir = tempdir().unwrap();
    let layout = StorageLayout::new(dir.path().join("a").join("b"));

    layout.ensure_root().unwrap();
    layout.ensure_root().unwrap();

    assert!(layout.root().is_dir());
}

#[test]
fn test_full_lifecycle() {
    let dir = tempdir().unwrap();
    let layout = StorageLayout::new(dir.path());

    fs::write(layout.staging_path("model.gguf").unwrap(), b"0123").unwrap();
    assert_eq!(layout.resume_offset("model.gguf").unwrap(), 4);
    assert!(!layout.is_complete("model.gguf"));

    let final_path = layout.commit("model.gguf").unwrap();
    assert!(layout.is_complete("model.gguf"));
    assert_eq!(layout.resume_offset("model.gguf").unwrap(), 0);

    layout.delete("model.gguf").unwrap();
    assert!(!final_path.exists());
    assert!(!layout.is_complete("model.gguf"));
    assert!(layout.scan().unwrap().is_empty());
}

#[test]
fn test_commit_replaces_existing_final() {
    let dir = tempdir().unwrap();
    let layout = StorageLayout::new(dir.path());

    fs::write(layout.final_path("m.bin").unwrap(), b"old").unwrap();
    fs::write(layout.staging_path("m.bin").unwrap(), b"new weights").unwrap();

    let path = layout.commit("m.bin").unwrap();
    assert_eq!(fs::read(path).unwrap(), b"new weights");
}

#[test]
fn test_commit_into_missing_directory_fails_loudly() {
    let dir = tempdir().unwrap();
    let layout = StorageLayout::new(dir.path());
    fs::write(layout.staging_path("m.bin").unwrap(), b"bytes").unwrap();

    // A directory occupying the final path makes the rename fail.
    fs::create_dir(layout.final_path("m.bin").unwrap()).unwrap();
    fs::write(layout.final_path("m.bin").unwrap().join("blocker"), b"x").unwrap();

    let err = layout.commit("m.bin").unwrap_err();
    assert!(matches!(err, Error::Rename { .. }));
    assert_eq!(layout.resume_offset("m.bin").unwrap(), 5);
}

#[test]
fn test_delete_when_nothing_exists() {
    let dir = tempdir().unwrap();
    let layout = StorageLayout::new(dir.path());
    layout.delete("never-downloaded.bin").unwrap();
}

#[test]
fn test_invalid_names_are_rejected_everywhere() {
    let dir = tempdir().unwrap();
    let layout = StorageLayout::new(dir.path());

    assert!(matches!(
        layout.resume_offset("../escape"),
        Err(Error::InvalidFilename(_))
    ));
    assert!(layout.commit("../escape").is_err());
    assert!(layout.discard("../escape").is_err());
    assert!(!layout.is_complete("../escape"));
}

#[test]
fn test_scan_reports_both_kinds_for_same_name() {
    let dir = tempdir().unwrap();
    let layout = StorageLayout::new(dir.path());
    fs::write(layout.final_path("m.bin").unwrap(), b"done").unwrap();
    fs::write(layout.staging_path("m.bin").unwrap(), b"re").unwrap();

    let kinds: Vec<_> = layout.scan().unwrap().into_iter().map(|f| f.kind).collect();
    assert_eq!(kinds.len(), 2);
    assert!(kinds.contains(&FileKind::Final));
    assert!(kinds.contains(&FileKind::Staging));
}
