//! Document store backends
//!
//! The scheduler reads notes through the [`DocumentStore`] trait. Two
//! backends ship with the crate: [`FsDocumentStore`] for a vault directory
//! on disk (with a change watcher) and [`MemoryDocumentStore`] for hosts
//! that own their storage.

mod fs;
mod memory;

pub use fs::{FsDocumentStore, WatchGuard};
pub use memory::MemoryDocumentStore;

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors raised by a document store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Vault root is not a directory: {0}")]
    NotADirectory(String),

    #[error("Watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Read failed for {path}: {reason}")]
    Read { path: String, reason: String },
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Handle to one note in a store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentRef {
    /// Vault-relative path with `/` separators, e.g. `projects/Taxes.md`
    pub path: String,
    /// File name without directory or extension, e.g. `Taxes`
    pub base_name: String,
}

impl DocumentRef {
    /// Build a ref from a vault-relative path.
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let base_name = Path::new(&path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.clone());
        Self { path, base_name }
    }
}

/// Change notifications from a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// The initial document listing is available.
    IndexReady,
    /// A document was created or its content changed.
    Changed(DocumentRef),
    /// A document was deleted or moved away.
    Removed(DocumentRef),
}

/// Source of note text.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Name of the vault; part of every notification id.
    fn vault_name(&self) -> String;

    /// Enumerate every note in the vault.
    async fn list_documents(&self) -> StoreResult<Vec<DocumentRef>>;

    /// Read a note's full text.
    async fn read_text(&self, doc: &DocumentRef) -> StoreResult<String>;
}
