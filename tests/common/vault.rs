//! Temporary vault directories

use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A vault directory deleted when dropped.
pub struct TestVault {
    dir: TempDir,
    root: PathBuf,
}

impl TestVault {
    /// Create an empty vault directory named `name`.
    pub fn new(name: &str) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let root = dir.path().join(name);
        std::fs::create_dir_all(&root).expect("create vault root");
        Self { dir, root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A path outside the vault, for settings files.
    pub fn scratch(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write a note at a vault-relative path, creating parent directories.
    pub fn write(&self, relative: &str, text: &str) -> PathBuf {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create note directory");
        }
        std::fs::write(&path, text).expect("write note");
        path
    }

    pub fn delete(&self, relative: &str) {
        std::fs::remove_file(self.root.join(relative)).expect("delete note");
    }
}
