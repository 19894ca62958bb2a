//! Vault directory on the local filesystem

use super::{DocumentRef, DocumentStore, StoreError, StoreEvent, StoreResult};
use async_trait::async_trait;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Component, Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Capacity of the change-event channel.
const EVENT_BUFFER: usize = 256;

/// Notes are markdown files anywhere under the vault root, excluding
/// hidden directories such as `.obsidian` or `.trash`.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
    vault_name: String,
}

/// Keeps the filesystem watcher alive. Dropping it stops change events.
pub struct WatchGuard {
    _watcher: RecommendedWatcher,
}

impl std::fmt::Debug for WatchGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchGuard").finish_non_exhaustive()
    }
}

impl FsDocumentStore {
    /// Open a vault rooted at `root`. The vault name is the root's final
    /// path component.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().canonicalize()?;
        if !root.is_dir() {
            return Err(StoreError::NotADirectory(root.display().to_string()));
        }
        let vault_name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());
        Ok(Self { root, vault_name })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start watching the vault.
    ///
    /// The returned channel yields [`StoreEvent::IndexReady`] first, then a
    /// `Changed` or `Removed` event for every markdown file touched.
    pub fn watch(&self) -> StoreResult<(WatchGuard, mpsc::Receiver<StoreEvent>)> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        if tx.try_send(StoreEvent::IndexReady).is_err() {
            debug!("event receiver dropped before index ready");
        }

        let root = self.root.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for store_event in translate_event(&root, &event) {
                    // Runs on the watcher's own thread, outside the runtime.
                    if tx.blocking_send(store_event).is_err() {
                        return;
                    }
                }
            }
            Err(e) => warn!(error = %e, "vault watcher error"),
        })?;
        watcher.watch(&self.root, RecursiveMode::Recursive)?;
        debug!(root = %self.root.display(), "watching vault");

        Ok((WatchGuard { _watcher: watcher }, rx))
    }

    fn list_blocking(root: &Path) -> Vec<DocumentRef> {
        let mut docs: Vec<DocumentRef> = WalkDir::new(root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "skipping unreadable vault entry");
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| document_ref(root, e.path()))
            .collect();
        docs.sort();
        docs
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    fn vault_name(&self) -> String {
        self.vault_name.clone()
    }

    async fn list_documents(&self) -> StoreResult<Vec<DocumentRef>> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || Self::list_blocking(&root))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))
    }

    async fn read_text(&self, doc: &DocumentRef) -> StoreResult<String> {
        let path = self.root.join(&doc.path);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(doc.path.clone()))
            }
            Err(e) => Err(StoreError::Read {
                path: doc.path.clone(),
                reason: e.to_string(),
            }),
        }
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

fn is_markdown(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("md") | Some("markdown")
    )
}

/// Vault-relative ref for an absolute path, or `None` for anything that is
/// not a visible markdown file under `root`.
fn document_ref(root: &Path, path: &Path) -> Option<DocumentRef> {
    if !is_markdown(path) {
        return None;
    }
    let relative = path.strip_prefix(root).ok()?;

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_str()?;
                if part.starts_with('.') {
                    return None;
                }
                parts.push(part);
            }
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(DocumentRef::new(parts.join("/")))
}

fn translate_event(root: &Path, event: &Event) -> Vec<StoreEvent> {
    match event.kind {
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Create(_) | EventKind::Modify(_) => event
            .paths
            .iter()
            .filter_map(|path| {
                let doc = document_ref(root, path)?;
                // Renames arrive as modify events on both ends.
                Some(if path.exists() {
                    StoreEvent::Changed(doc)
                } else {
                    StoreEvent::Removed(doc)
                })
            })
            .collect(),
        EventKind::Remove(_) => event
            .paths
            .iter()
            .filter_map(|path| document_ref(root, path))
            .map(StoreEvent::Removed)
            .collect(),
        _ => Vec::new(),
    }
}
