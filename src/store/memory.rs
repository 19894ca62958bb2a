//! In-memory document store

use super::{DocumentRef, DocumentStore, StoreError, StoreResult};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};

/// Notes held in memory, keyed by vault-relative path.
///
/// Useful for hosts that already own note storage and for tests. Reads of
/// a path registered with [`fail_reads`](Self::fail_reads) return an error.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    vault_name: String,
    documents: DashMap<String, String>,
    failing: DashSet<String>,
}

impl MemoryDocumentStore {
    pub fn new(vault_name: impl Into<String>) -> Self {
        Self {
            vault_name: vault_name.into(),
            documents: DashMap::new(),
            failing: DashSet::new(),
        }
    }

    /// Insert or overwrite a note. Returns its ref.
    pub fn insert(&self, path: impl Into<String>, text: impl Into<String>) -> DocumentRef {
        let doc = DocumentRef::new(path);
        self.documents.insert(doc.path.clone(), text.into());
        doc
    }

    pub fn remove(&self, path: &str) -> Option<String> {
        self.documents.remove(path).map(|(_, text)| text)
    }

    /// Make every read of `path` fail until [`heal`](Self::heal) is called.
    pub fn fail_reads(&self, path: impl Into<String>) {
        self.failing.insert(path.into());
    }

    pub fn heal(&self, path: &str) {
        self.failing.remove(path);
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn vault_name(&self) -> String {
        self.vault_name.clone()
    }

    async fn list_documents(&self) -> StoreResult<Vec<DocumentRef>> {
        let mut docs: Vec<DocumentRef> = self
            .documents
            .iter()
            .map(|entry| DocumentRef::new(entry.key().clone()))
            .collect();
        docs.sort();
        Ok(docs)
    }

    async fn read_text(&self, doc: &DocumentRef) -> StoreResult<String> {
        if self.failing.contains(&doc.path) {
            return Err(StoreError::Read {
                path: doc.path.clone(),
                reason: "simulated read failure".to_string(),
            });
        }
        self.documents
            .get(&doc.path)
            .map(|text| text.clone())
            .ok_or_else(|| StoreError::NotFound(doc.path.clone()))
    }
}
