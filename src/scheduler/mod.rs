//! Due-date scheduler
//!
//! Ties the pieces together: documents are read from a [`DocumentStore`],
//! their due declarations extracted and merged into the
//! [`NotificationRegistry`], and a sweep delivers every record whose due
//! instant has passed through the [`AlertSink`], exactly once.
//!
//! Sweeps run on three triggers, all funnelled through [`Scheduler::sweep`]:
//! the store's initial index, any document change, and a periodic timer
//! (see [`Scheduler::run`]).

mod runner;

pub use runner::SchedulerHandle;

use crate::alert::{Alert, AlertSink};
use crate::config::Config;
use crate::extract::{extract_due, ExtractError};
use crate::registry::{
    IdentityDeriver, MergeOutcome, NotificationRegistry, PendingNotification,
};
use crate::store::{DocumentRef, DocumentStore, StoreError, StoreEvent, StoreResult};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Why a document could not be registered on this pass.
#[derive(Debug, Error)]
pub enum RegisterError {
    #[error(transparent)]
    Read(#[from] StoreError),

    #[error(transparent)]
    Extract(#[from] ExtractError),
}

/// Summary of a full registration pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationReport {
    /// Documents read and parsed successfully
    pub scanned: usize,
    /// Documents that declared a due date
    pub with_due: usize,
    /// Documents skipped because of read or header errors
    pub failed: usize,
}

/// What one sweep delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub now: DateTime<Utc>,
    pub fired: Vec<PendingNotification>,
}

impl SweepReport {
    pub fn fired_count(&self) -> usize {
        self.fired.len()
    }
}

/// The scheduling service. Cheap to clone; clones share the registry.
#[derive(Clone)]
pub struct Scheduler {
    registry: Arc<NotificationRegistry>,
    store: Arc<dyn DocumentStore>,
    sink: Arc<dyn AlertSink>,
    config: watch::Receiver<Config>,
    sweep_lock: Arc<Mutex<()>>,
    /// Serializes read-then-merge per document path.
    path_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl Scheduler {
    /// Build a scheduler over `store`, delivering through `sink`.
    ///
    /// Notification ids are scoped to the configured vault name, or the
    /// store's own name when none is configured.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        sink: Arc<dyn AlertSink>,
        config: watch::Receiver<Config>,
    ) -> Self {
        let (vault_name, scope) = {
            let current = config.borrow();
            (
                current
                    .vault_name
                    .clone()
                    .unwrap_or_else(|| store.vault_name()),
                current.identity_scope,
            )
        };
        let identity = IdentityDeriver::new(vault_name).with_scope(scope);

        Self {
            registry: Arc::new(NotificationRegistry::new(identity)),
            store,
            sink,
            config,
            sweep_lock: Arc::new(Mutex::new(())),
            path_locks: Arc::new(DashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<NotificationRegistry> {
        &self.registry
    }

    /// The configuration currently in effect.
    pub fn config(&self) -> Config {
        self.config.borrow().clone()
    }

    fn path_lock(&self, path: &str) -> Arc<Mutex<()>> {
        self.path_locks.entry(path.to_string()).or_default().clone()
    }

    /// Read, parse and register one document.
    ///
    /// A document without a header or without the due key declares
    /// nothing, and its path is left exactly as it was. On error the
    /// registry is left untouched and the failure is logged.
    ///
    /// Calls for the same path run one at a time, so the last to finish
    /// always merges the newest text the store held.
    pub async fn register_document(&self, doc: &DocumentRef) -> Result<MergeOutcome, RegisterError> {
        let lock = self.path_lock(&doc.path);
        let _guard = lock.lock().await;
        let due_key = self.config.borrow().due_key.clone();

        let text = match self.store.read_text(doc).await {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %doc.path, error = %e, "skipping unreadable document");
                return Err(e.into());
            }
        };

        let declaration = match extract_due(&text, &due_key, &doc.base_name) {
            Ok(declaration) => declaration,
            Err(e) => {
                warn!(path = %doc.path, error = %e, "skipping document with malformed front-matter");
                return Err(e.into());
            }
        };

        let Some(decl) = declaration else {
            debug!(path = %doc.path, key = %due_key, "no due declaration");
            return Ok(MergeOutcome::default());
        };
        if !decl.due_at.is_valid() {
            warn!(
                path = %doc.path,
                key = %due_key,
                value = %decl.due_at,
                "unparsable due date; notification will never fire"
            );
        }

        let outcome = self.registry.upsert_for_path(&doc.path, vec![decl]);
        if !outcome.is_noop() {
            debug!(
                path = %doc.path,
                added = outcome.added.len(),
                dropped = outcome.dropped.len(),
                "registered document"
            );
        }
        Ok(outcome)
    }

    /// Register every document in the store.
    ///
    /// Documents are read concurrently; a failure on one never stops the
    /// others.
    pub async fn register_all(&self) -> StoreResult<RegistrationReport> {
        let docs = self.store.list_documents().await?;
        let mut tasks = JoinSet::new();
        for doc in docs {
            let this = self.clone();
            tasks.spawn(async move { this.register_document(&doc).await });
        }

        let mut report = RegistrationReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(outcome)) => {
                    report.scanned += 1;
                    if outcome.record_count() > 0 {
                        report.with_due += 1;
                    }
                }
                Ok(Err(_)) => report.failed += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(error = %e, "registration task failed");
                }
            }
        }

        info!(
            scanned = report.scanned,
            with_due = report.with_due,
            failed = report.failed,
            tracked = self.registry.len(),
            "registration pass complete"
        );
        Ok(report)
    }

    /// Drop every record for a document that no longer exists.
    pub fn forget_document(&self, doc: &DocumentRef) -> usize {
        let removed = self.registry.remove_path(&doc.path);
        if removed > 0 {
            debug!(path = %doc.path, removed, "forgot removed document");
        }
        removed
    }

    /// Deliver every record due before `now` and mark it fired.
    ///
    /// Sweeps are serialized, so concurrent callers never deliver the same
    /// record twice.
    pub async fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let _guard = self.sweep_lock.lock().await;

        let mut fired = Vec::new();
        for pending in self.registry.pending(now) {
            let alert = Alert::new(&pending.record.title, &pending.record.body);
            self.sink.show(&alert);

            if self.registry.mark_fired(&pending.path, &pending.record.id) {
                info!(
                    path = %pending.path,
                    id = %pending.record.id,
                    title = %pending.record.title,
                    "notification fired"
                );
            }
            fired.push(pending);
        }

        debug!(fired = fired.len(), "sweep complete");
        SweepReport { now, fired }
    }

    /// React to one store event, then sweep.
    pub async fn handle_event(&self, event: StoreEvent) -> SweepReport {
        match event {
            StoreEvent::IndexReady => {
                if let Err(e) = self.register_all().await {
                    error!(error = %e, "cannot list documents");
                }
            }
            StoreEvent::Changed(doc) => {
                // Failures are logged by register_document.
                let _ = self.register_document(&doc).await;
            }
            StoreEvent::Removed(doc) => {
                let lock = self.path_lock(&doc.path);
                let _guard = lock.lock().await;
                self.forget_document(&doc);
            }
        }
        self.sweep(Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::MemoryDocumentStore;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::oneshot;

    #[derive(Default)]
    struct RecordingSink {
        alerts: StdMutex<Vec<Alert>>,
    }

    impl AlertSink for RecordingSink {
        fn show(&self, alert: &Alert) {
            self.alerts.lock().unwrap().push(alert.clone());
        }
    }

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn scheduler_with(
        config: Config,
    ) -> (Scheduler, Arc<MemoryDocumentStore>, Arc<RecordingSink>, watch::Sender<Config>) {
        let store = Arc::new(MemoryDocumentStore::new("Vault"));
        let sink = Arc::new(RecordingSink::default());
        let (tx, rx) = watch::channel(config);
        let scheduler = Scheduler::new(store.clone(), sink.clone(), rx);
        (scheduler, store, sink, tx)
    }

    #[tokio::test]
    async fn test_taxes_scenario() {
        let (scheduler, store, sink, _tx) = scheduler_with(Config::default());
        let doc = store.insert("Taxes.md", "---\ndue: 2024-01-01T00:00:00Z\n---\n");

        let outcome = scheduler.register_document(&doc).await.unwrap();
        assert_eq!(outcome.added.len(), 1);

        let now = at("2024-01-02T00:00:00Z");
        assert_eq!(scheduler.registry().pending(now).len(), 1);

        let report = scheduler.sweep(now).await;
        assert_eq!(report.fired_count(), 1);
        assert_eq!(
            *sink.alerts.lock().unwrap(),
            vec![Alert::new("Taxes", "Notification from Taxes")]
        );
        let record = scheduler.registry().get("Taxes.md", &outcome.added[0]).unwrap();
        assert!(record.fired);
    }

    #[tokio::test]
    async fn test_no_header_leaves_registry_alone() {
        let (scheduler, store, _sink, _tx) = scheduler_with(Config::default());
        let doc = store.insert("Plain.md", "# Plain\n\ndue: 2024-01-01\n");

        let outcome = scheduler.register_document(&doc).await.unwrap();
        assert!(outcome.is_noop());
        assert!(!scheduler.registry().contains_path("Plain.md"));
    }

    #[tokio::test]
    async fn test_header_removed_keeps_pending_record() {
        let (scheduler, store, sink, _tx) = scheduler_with(Config::default());
        let doc = store.insert("Taxes.md", "---\ndue: 2024-01-01T00:00:00Z\n---\n");
        scheduler.register_document(&doc).await.unwrap();
        let before = scheduler.registry().records_for("Taxes.md");

        store.insert("Taxes.md", "# Taxes\n\nno header any more\n");
        let outcome = scheduler.register_document(&doc).await.unwrap();

        assert!(outcome.is_noop());
        assert_eq!(scheduler.registry().records_for("Taxes.md"), before);
        assert_eq!(scheduler.sweep(at("2024-01-02T00:00:00Z")).await.fired_count(), 1);
        assert_eq!(sink.alerts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_header_keeps_previous_records() {
        let (scheduler, store, _sink, _tx) = scheduler_with(Config::default());
        let doc = store.insert("Taxes.md", "---\ndue: 2024-01-01T00:00:00Z\n---\n");
        scheduler.register_document(&doc).await.unwrap();

        store.insert("Taxes.md", "---\ndue: [broken\n---\n");
        let err = scheduler.register_document(&doc).await.unwrap_err();
        assert!(matches!(err, RegisterError::Extract(_)));
        assert_eq!(scheduler.registry().records_for("Taxes.md").len(), 1);
    }

    #[tokio::test]
    async fn test_uses_configured_due_key() {
        let config = Config {
            due_key: "deadline".into(),
            ..Default::default()
        };
        let (scheduler, store, _sink, tx) = scheduler_with(config);
        let doc = store.insert("Report.md", "---\ndue: 2024-01-01T00:00:00Z\n---\n");
        scheduler.register_document(&doc).await.unwrap();
        assert!(!scheduler.registry().contains_path("Report.md"));

        tx.send_modify(|c| c.due_key = "due".into());
        scheduler.register_document(&doc).await.unwrap();
        assert!(scheduler.registry().contains_path("Report.md"));
    }

    #[tokio::test]
    async fn test_configured_vault_name_drives_identity() {
        let config = Config {
            vault_name: Some("Renamed".into()),
            ..Default::default()
        };
        let (scheduler, _store, _sink, _tx) = scheduler_with(config);
        assert_eq!(scheduler.registry().identity().vault_name(), "Renamed");

        let (default_scheduler, _store, _sink, _tx) = scheduler_with(Config::default());
        assert_eq!(default_scheduler.registry().identity().vault_name(), "Vault");
    }

    #[tokio::test]
    async fn test_handle_removed_event() {
        let (scheduler, store, sink, _tx) = scheduler_with(Config::default());
        let doc = store.insert("Old.md", "---\ndue: 2000-01-01T00:00:00Z\n---\n");
        scheduler.register_document(&doc).await.unwrap();

        store.remove("Old.md");
        let report = scheduler.handle_event(StoreEvent::Removed(doc)).await;
        assert_eq!(report.fired_count(), 0);
        assert!(sink.alerts.lock().unwrap().is_empty());
        assert!(scheduler.registry().is_empty());
    }

    /// Memory store whose first read returns the text it saw, but only
    /// once the gate is released.
    struct GatedStore {
        inner: MemoryDocumentStore,
        gate: StdMutex<Option<oneshot::Receiver<()>>>,
    }

    #[async_trait]
    impl DocumentStore for GatedStore {
        fn vault_name(&self) -> String {
            self.inner.vault_name()
        }

        async fn list_documents(&self) -> StoreResult<Vec<DocumentRef>> {
            self.inner.list_documents().await
        }

        async fn read_text(&self, doc: &DocumentRef) -> StoreResult<String> {
            let text = self.inner.read_text(doc).await?;
            let gate = self.gate.lock().unwrap().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            Ok(text)
        }
    }

    #[tokio::test]
    async fn test_overlapping_registrations_keep_newest_text() {
        let (release, gate) = oneshot::channel();
        let store = Arc::new(GatedStore {
            inner: MemoryDocumentStore::new("Vault"),
            gate: StdMutex::new(Some(gate)),
        });
        let doc = store
            .inner
            .insert("Taxes.md", "---\ndue: 2024-01-01T00:00:00Z\n---\n");
        let (_tx, rx) = watch::channel(Config::default());
        let scheduler = Scheduler::new(store.clone(), Arc::new(RecordingSink::default()), rx);

        let stale = {
            let scheduler = scheduler.clone();
            let doc = doc.clone();
            tokio::spawn(async move { scheduler.register_document(&doc).await })
        };
        // The first read has captured the old text once the gate is taken.
        while store.gate.lock().unwrap().is_some() {
            tokio::task::yield_now().await;
        }

        store
            .inner
            .insert("Taxes.md", "---\ndue: 2024-02-01T00:00:00Z\n---\n");
        let fresh = {
            let scheduler = scheduler.clone();
            let doc = doc.clone();
            tokio::spawn(async move { scheduler.register_document(&doc).await })
        };
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        release.send(()).unwrap();

        stale.await.unwrap().unwrap();
        fresh.await.unwrap().unwrap();

        let records = scheduler.registry().records_for("Taxes.md");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].due_at.instant(), Some(at("2024-02-01T00:00:00Z")));
    }
}
