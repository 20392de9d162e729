//! Temporary patched-module file
//!
//! The artifact lives exactly as long as the run that created it. Dropping it
//! removes the file, so early returns and `?` propagation never leak it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// On-disk patched module, removed when dropped.
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
    removed: bool,
}

impl TempArtifact {
    /// Write `contents` to `path` (overwriting it) and take ownership of the file.
    pub fn create(path: PathBuf, contents: &str) -> io::Result<Self> {
        fs::write(&path, contents)?;
        Ok(Self { path, removed: false })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the file now, reporting failure instead of logging it.
    pub fn remove(mut self) -> io::Result<()> {
        self.removed = true;
        fs::remove_file(&self.path)
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "failed to remove patched module"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temp.js");
        let artifact = TempArtifact::create(path.clone(), "export function a() {}").unwrap();
        assert!(path.exists());
        drop(artifact);
        assert!(!path.exists());
    }

    #[test]
    fn test_create_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temp.js");
        fs::write(&path, "stale").unwrap();
        let artifact = TempArtifact::create(path.clone(), "fresh").unwrap();
        assert_eq!(fs::read_to_string(artifact.path()).unwrap(), "fresh");
    }

    #[test]
    fn test_remove_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temp.js");
        let artifact = TempArtifact::create(path.clone(), "").unwrap();
        fs::remove_file(&path).unwrap();
        let err = artifact.remove().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_drop_tolerates_already_removed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temp.js");
        let artifact = TempArtifact::create(path.clone(), "").unwrap();
        fs::remove_file(&path).unwrap();
        drop(artifact);
        assert!(!path.exists());
    }
}
