//! Ephemeral backing storage for benchmark tables.

use std::io;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Prefix for scratch directory names.
const SCRATCH_PREFIX: &str = "kvbench-";

/// A uniquely named scratch directory holding one table's files.
///
/// Backends write their primary file (and any auxiliary index files next to
/// it) inside the directory, so removing the directory removes every
/// artifact. Removal happens on drop, on the success and the error path
/// alike, and can be forced earlier with [`Scratch::purge`].
#[derive(Debug)]
pub struct Scratch {
    root: PathBuf,
}

impl Scratch {
    /// Create a fresh scratch directory under the system temp dir.
    pub fn new(label: &str) -> Result<Self> {
        Self::new_in(std::env::temp_dir(), label)
    }

    /// Create a fresh scratch directory under `parent`.
    pub fn new_in(parent: impl AsRef<Path>, label: &str) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("{SCRATCH_PREFIX}{label}."))
            .tempdir_in(parent)?;
        Ok(Self { root: dir.keep() })
    }

    /// Directory containing all artifacts.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path for a backing file named `name`.
    ///
    /// The path does not exist yet; the directory was created empty.
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Remove every artifact now.
    ///
    /// Open handles on Unix keep working on unlinked files, so this is safe
    /// to call while a table is still mapped. Idempotent.
    pub fn purge(&self) {
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => tracing::trace!(path = %self.root.display(), "scratch removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.root.display(), error = %e, "failed to remove scratch");
            }
        }
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        self.purge();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_and_empty() {
        let a = Scratch::new("test").unwrap();
        let b = Scratch::new("test").unwrap();
        assert_ne!(a.root(), b.root());
        assert!(!a.path("table.data").exists());
        assert_eq!(std::fs::read_dir(a.root()).unwrap().count(), 0);
    }

    #[test]
    fn test_drop_removes_all_artifacts() {
        let scratch = Scratch::new("test").unwrap();
        let data = scratch.path("table.data");
        std::fs::write(&data, b"data").unwrap();
        std::fs::write(scratch.path("table.data.index"), b"index").unwrap();
        let root = scratch.root().to_path_buf();

        drop(scratch);
        assert!(!data.exists());
        assert!(!root.exists());
    }

    #[test]
    fn test_purge_is_idempotent() {
        let parent = tempfile::tempdir().unwrap();
        let scratch = Scratch::new_in(parent.path(), "test").unwrap();
        scratch.purge();
        scratch.purge();
        assert!(!scratch.root().exists());
    }
}
