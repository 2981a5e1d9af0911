//! Scoped scratch extraction area.
//!
//! Each ingestion owns one `ScratchArea`: a fresh directory under the
//! configured base, removed when the area is dropped. Every exit path from
//! the pipeline, including errors, panics unwinding through it, and
//! cancellation, therefore leaves nothing behind.

use crate::error::IngestError;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SCRATCH_PREFIX: &str = "testcase-bundle-";

pub struct ScratchArea {
    dir: TempDir,
}

impl ScratchArea {
    /// Create a fresh, empty scratch directory under `base`.
    pub fn acquire(base: &Path) -> Result<Self, IngestError> {
        let dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(base)
            .map_err(|e| {
                IngestError::scratch(format!("create scratch dir in {}", base.display()), e)
            })?;
        tracing::debug!(path = %dir.path().display(), "acquired scratch area");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path a testcase file lands at. `base_name` must already be validated as flat.
    pub fn file_path(&self, base_name: &str) -> PathBuf {
        self.dir.path().join(base_name)
    }

    /// Create (or truncate) the file for `base_name` and return a buffered writer.
    pub fn create_file(&self, base_name: &str) -> Result<BufWriter<File>, IngestError> {
        let path = self.file_path(base_name);
        let file = File::create(&path)
            .map_err(|e| IngestError::scratch(format!("create {}", path.display()), e))?;
        Ok(BufWriter::new(file))
    }

    /// Remove the directory now, surfacing removal errors instead of ignoring them.
    pub fn release(self) -> Result<(), IngestError> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .map_err(|e| IngestError::scratch(format!("remove {}", path.display()), e))
    }
}

impl std::fmt::Debug for ScratchArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScratchArea")
            .field("path", &self.dir.path())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_drop_removes_directory() {
        let base = tempfile::tempdir().unwrap();
        let path = {
            let area = ScratchArea::acquire(base.path()).unwrap();
            let mut w = area.create_file("0_0.in").unwrap();
            w.write_all(b"42\n").unwrap();
            w.flush().unwrap();
            assert!(area.file_path("0_0.in").exists());
            area.path().to_path_buf()
        };
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(base.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_release_removes_directory() {
        let base = tempfile::tempdir().unwrap();
        let area = ScratchArea::acquire(base.path()).unwrap();
        let path = area.path().to_path_buf();
        area.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_base_is_scratch_error() {
        let base = tempfile::tempdir().unwrap();
        let missing = base.path().join("does-not-exist");
        let err = ScratchArea::acquire(&missing).unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::Scratch);
    }
}
