//! Compiled artifact persistence and the "current artifact" reference.
//!
//! Writes go to a hidden sibling file that is renamed over the target, so
//! a concurrent `/pdf` request never observes a half-written PDF.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("cannot write `{}`", .0.display())]
    Write(PathBuf, #[source] std::io::Error),

    #[error("cannot move artifact into place at `{}`", .0.display())]
    Promote(PathBuf, #[source] std::io::Error),
}

/// Persists artifact bytes at a fixed output path.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    path: PathBuf,
}

impl ArtifactWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically replace the output file with `bytes`.
    pub fn persist(&self, bytes: &[u8]) -> Result<PathBuf, ArtifactError> {
        let staging = self.staging_path();
        if let Err(e) = fs::write(&staging, bytes) {
            let _ = fs::remove_file(&staging);
            return Err(ArtifactError::Write(staging, e));
        }
        if let Err(e) = fs::rename(&staging, &self.path) {
            let _ = fs::remove_file(&staging);
            return Err(ArtifactError::Promote(self.path.clone(), e));
        }
        Ok(self.path.clone())
    }

    /// `dir/.output.pdf.<pid>.tmp`, on the same filesystem as the target.
    fn staging_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "artifact".to_string());
        let staging = format!(".{name}.{}.tmp", std::process::id());
        match self.path.parent() {
            Some(parent) => parent.join(staging),
            None => PathBuf::from(staging),
        }
    }
}

/// Shared reference to the most recently produced artifact.
///
/// Written by the notification bus, read by every `/pdf` request.
#[derive(Debug, Clone, Default)]
pub struct ArtifactSlot(Arc<ArcSwapOption<PathBuf>>);

impl ArtifactSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, path: PathBuf) {
        self.0.store(Some(Arc::new(path)));
    }

    pub fn current(&self) -> Option<Arc<PathBuf>> {
        self.0.load_full()
    }

    /// Bytes of the current artifact, if one was produced and is readable.
    pub fn read(&self) -> Option<Vec<u8>> {
        let path = self.current()?;
        match fs::read(path.as_path()) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                crate::debug!("serve"; "artifact {} unreadable: {}", path.display(), e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_persist_replaces_and_leaves_no_staging_file() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path().join("output.pdf"));

        writer.persist(b"%PDF-1").unwrap();
        let path = writer.persist(b"%PDF-2").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"%PDF-2");
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().flatten().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_persist_into_missing_dir_fails() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path().join("missing").join("output.pdf"));
        assert!(matches!(
            writer.persist(b"%PDF"),
            Err(ArtifactError::Write(..))
        ));
    }

    #[test]
    fn test_slot_starts_empty() {
        let slot = ArtifactSlot::new();
        assert!(slot.current().is_none());
        assert!(slot.read().is_none());
    }

    #[test]
    fn test_slot_reads_current_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("output.pdf");
        fs::write(&path, b"%PDF").unwrap();

        let slot = ArtifactSlot::new();
        let shared = slot.clone();
        slot.set(path);
        assert_eq!(shared.read().unwrap(), b"%PDF");
    }
}
