use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::{Error, Result};

/// Suffix appended to the final filename while bytes are still arriving.
pub const STAGING_SUFFIX: &str = ".part";

/// Suffix of the resume validator sidecar written beside a staging file.
pub const META_SUFFIX: &str = ".part.meta";

/// Suffix of the temporary file the sidecar is written through before its rename.
pub const META_TEMP_SUFFIX: &str = ".part.meta.tmp";

const RESERVED_SUFFIXES: [&str; 3] = [STAGING_SUFFIX, META_SUFFIX, META_TEMP_SUFFIX];

/// Kind of artifact file found by [`StorageLayout::scan`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    Final,
    Staging,
}

/// One artifact file found in the storage directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScannedFile {
    /// Target filename (without the staging suffix).
    pub name: String,
    pub kind: FileKind,
    pub len:  u64,
}

/// Maps target filenames to their final and staging paths inside one directory.
///
/// A final file exists only after [`commit`](Self::commit) renamed the staging
/// file into place; its presence with a non-zero length is the only signal that
/// an artifact is already downloaded.
#[derive(Clone, Debug)]
pub struct StorageLayout {
    root: PathBuf,
}

/// Reject names that would escape the storage directory or collide with the
/// staging, sidecar or sidecar temp file of another name.
pub fn validate_filename(name: &str) -> Result<()> {
    let invalid = || Error::InvalidFilename(name.to_string());

    if name.is_empty() || name.contains('\0') {
        return Err(invalid());
    }
    if RESERVED_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
        return Err(invalid());
    }
    if name.contains('/') || name.contains('\\') {
        return Err(invalid());
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(invalid()),
    }
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the storage directory if it is missing.
    pub fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|e| Error::CreateDir {
            path:   self.root.clone(),
            source: e,
        })
    }

    pub fn final_path(&self, name: &str) -> Result<PathBuf> {
        validate_filename(name)?;
        Ok(self.root.join(name))
    }

    pub fn staging_path(&self, name: &str) -> Result<PathBuf> {
        validate_filename(name)?;
        Ok(self.root.join(format!("{name}{STAGING_SUFFIX}")))
    }

    pub fn meta_path(&self, name: &str) -> Result<PathBuf> {
        validate_filename(name)?;
        Ok(self.root.join(format!("{name}{META_SUFFIX}")))
    }

    /// Length of the staging file, or 0 when nothing is staged.
    pub fn resume_offset(&self, name: &str) -> Result<u64> {
        let staging = self.staging_path(name)?;
        match fs::metadata(&staging) {
            Ok(meta) if meta.is_file() => Ok(meta.len()),
            Ok(_) => Ok(0),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(Error::Read {
                path:   staging,
                source: e,
            }),
        }
    }

    /// Whether the final file exists and is non-empty.
    pub fn is_complete(&self, name: &str) -> bool {
        self.final_path(name)
            .ok()
            .and_then(|path| fs::metadata(path).ok())
            .is_some_and(|meta| meta.is_file() && meta.len() > 0)
    }

    /// Atomically rename the staging file onto the final path.
    ///
    /// Fails when nothing is staged or the rename itself fails; the staging
    /// file is left where it was in both cases.
    pub fn commit(&self, name: &str) -> Result<PathBuf> {
        let staging = self.staging_path(name)?;
        let destination = self.final_path(name)?;

        if !staging.is_file() {
            return Err(Error::NothingStaged(staging));
        }

        fs::rename(&staging, &destination).map_err(|e| Error::Rename {
            from:   staging.clone(),
            to:     destination.clone(),
            source: e,
        })?;

        sync_dir(&self.root);

        let meta = self.meta_path(name)?;
        if let Err(e) = remove_if_exists(&meta) {
            warn!(path = %meta.display(), error = %e, "stale resume metadata left behind");
        }

        Ok(destination)
    }

    /// Delete the staging file and its sidecar. A no-op when absent.
    pub fn discard(&self, name: &str) -> Result<()> {
        let staging = self.staging_path(name)?;
        if remove_if_exists(&staging)? {
            debug!(path = %staging.display(), "discarded staging file");
        }
        remove_if_exists(&self.meta_path(name)?)?;
        Ok(())
    }

    /// Delete every on-disk artifact for `name`: final, staging and sidecar.
    pub fn delete(&self, name: &str) -> Result<()> {
        remove_if_exists(&self.final_path(name)?)?;
        self.discard(name)
    }

    /// List final and staging files currently in the storage directory.
    ///
    /// A missing directory scans as empty.
    pub fn scan(&self) -> Result<Vec<ScannedFile>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::Read {
                    path:   self.root.clone(),
                    source: e,
                });
            }
        };

        let mut found = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::Read {
                path:   self.root.clone(),
                source: e,
            })?;
            let Ok(file_name) = entry.file_name().into_string() else {
                continue;
            };
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            if !meta.is_file() || file_name.ends_with(META_SUFFIX) || file_name.ends_with(META_TEMP_SUFFIX) {
                continue;
            }

            let (name, kind) = match file_name.strip_suffix(STAGING_SUFFIX) {
                Some(base) => (base.to_string(), FileKind::Staging),
                None => (file_name, FileKind::Final),
            };
            found.push(ScannedFile {
                name,
                kind,
                len: meta.len(),
            });
        }

        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }
}

/// Remove a file, returning whether anything was there.
pub fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::Remove {
            path:   path.to_path_buf(),
            source: e,
        }),
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = fs::File::open(dir).and_then(|d| d.sync_all()) {
        debug!(path = %dir.display(), error = %e, "directory sync after rename failed");
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_validate_filename() {
        assert!(validate_filename("model.gguf").is_ok());
        assert!(validate_filename("weights-q4_k_m.bin").is_ok());

        for bad in [
            "", ".", "..", "a/b", "..\\x", "/etc/passwd", "model.gguf.part", "nul\0",
            "x.part.meta", "x.part.meta.tmp",
        ] {
            assert!(validate_filename(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_paths() {
        let layout = StorageLayout::new("/data/models");
        assert_eq!(layout.final_path("m.bin").unwrap(), PathBuf::from("/data/models/m.bin"));
        assert_eq!(
            layout.staging_path("m.bin").unwrap(),
            PathBuf::from("/data/models/m.bin.part")
        );
        assert_eq!(
            layout.meta_path("m.bin").unwrap(),
            PathBuf::from("/data/models/m.bin.part.meta")
        );
    }

    #[test]
    fn test_resume_offset() {
        let dir = tempdir().unwrap();
        let layout = StorageLayout::new(dir.path());

        assert_eq!(layout.resume_offset("m.bin").unwrap(), 0);
        fs::write(layout.staging_path("m.bin").unwrap(), [7u8; 400]).unwrap();
        assert_eq!(layout.resume_offset("m.bin").unwrap(), 400);
    }

    #[test]
    fn test_is_complete_requires_non_empty_final() {
        let dir = tempdir().unwrap();
        let layout = StorageLayout::new(dir.path());
        let path = layout.final_path("m.bin").unwrap();

        assert!(!layout.is_complete("m.bin"));
        fs::write(&path, b"").unwrap();
        assert!(!layout.is_complete("m.bin"));
        fs::write(&path, b"weights").unwrap();
        assert!(layout.is_complete("m.bin"));
    }

    #[test]
    fn test_commit_renames_staging() {
        let dir = tempdir().unwrap();
        let layout = StorageLayout::new(dir.path());
        fs::write(layout.staging_path("m.bin").unwrap(), b"weights").unwrap();
        fs::write(layout.meta_path("m.bin").unwrap(), b"{}").unwrap();

        let path = layout.commit("m.bin").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"weights");
        assert!(!layout.staging_path("m.bin").unwrap().exists());
        assert!(!layout.meta_path("m.bin").unwrap().exists());
        assert!(layout.is_complete("m.bin"));
    }

    #[test]
    fn test_commit_without_staging_fails() {
        let dir = tempdir().unwrap();
        let layout = StorageLayout::new(dir.path());

        let err = layout.commit("m.bin").unwrap_err();
        assert!(matches!(err, Error::NothingStaged(_)));
    }

    #[test]
    fn test_discard_is_idempotent() {
        let dir = tempdir().unwrap();
        let layout = StorageLayout::new(dir.path());
        fs::write(layout.staging_path("m.bin").unwrap(), b"partial").unwrap();

        layout.discard("m.bin").unwrap();
        layout.discard("m.bin").unwrap();
        assert_eq!(layout.resume_offset("m.bin").unwrap(), 0);
    }

    #[test]
    fn test_scan() {
        let dir = tempdir().unwrap();
        let layout = StorageLayout::new(dir.path());
        fs::write(layout.final_path("a.bin").unwrap(), b"done").unwrap();
        fs::write(layout.staging_path("b.bin").unwrap(), b"par").unwrap();
        fs::write(layout.meta_path("b.bin").unwrap(), b"{}").unwrap();
        fs::write(dir.path().join("b.bin.part.meta.tmp"), b"{").unwrap();
        fs::write(layout.final_path("c.tmp").unwrap(), b"tmp").unwrap();
        fs::create_dir(dir.path().join("subdir")).unwrap();

        let found = layout.scan().unwrap();
        assert_eq!(found, vec![
            ScannedFile {
                name: "a.bin".into(),
                kind: FileKind::Final,
                len:  4,
            },
            ScannedFile {
                name: "b.bin".into(),
                kind: FileKind::Staging,
                len:  3,
            },
            ScannedFile {
                name: "c.tmp".into(),
                kind: FileKind::Final,
                len:  3,
            },
        ]);
    }

    #[test]
    fn test_scan_missing_root() {
        let dir = tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().join("absent"));
        assert!(layout.scan().unwrap().is_empty());
    }
}
