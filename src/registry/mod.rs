//! Notification registry
//!
//! Tracks, per document path, the notifications derived from that
//! document's latest parse and whether each has fired. Re-parsing a
//! document merges by id: records whose id reappears keep their `fired`
//! flag, new ids start unfired, and ids that disappear are dropped.

mod identity;

pub use identity::{IdentityDeriver, IdentityScope, NotificationId};

use crate::extract::{DueAt, DueDeclaration};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use tracing::debug;

/// Tracked state for one due declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRecord {
    pub id: NotificationId,
    pub due_at: DueAt,
    pub title: String,
    pub body: String,
    /// Set once by the sweep; never cleared.
    pub fired: bool,
}

impl NotificationRecord {
    /// Build an unfired record from a declaration.
    pub fn from_declaration(id: NotificationId, declaration: DueDeclaration) -> Self {
        Self {
            id,
            due_at: declaration.due_at,
            title: declaration.title,
            body: declaration.body,
            fired: false,
        }
    }

    pub fn is_pending(&self, now: DateTime<Utc>) -> bool {
        !self.fired && self.due_at.is_before(now)
    }
}

/// A record due for delivery, with the path it is filed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingNotification {
    pub path: String,
    pub record: NotificationRecord,
}

/// How a merge changed one path's records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Ids seen for the first time
    pub added: Vec<NotificationId>,
    /// Ids carried over from the previous parse (fired flag preserved)
    pub retained: Vec<NotificationId>,
    /// Ids from the previous parse that no longer appear
    pub dropped: Vec<NotificationId>,
}

impl MergeOutcome {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.dropped.is_empty()
    }

    pub fn record_count(&self) -> usize {
        self.added.len() + self.retained.len()
    }
}

/// Process-lifetime table of notifications, keyed by document path and
/// then notification id.
///
/// Each path's entry is replaced under its shard lock, so a merge is a
/// critical section relative to sweeps reading the same path.
#[derive(Debug)]
pub struct NotificationRegistry {
    identity: IdentityDeriver,
    entries: DashMap<String, HashMap<NotificationId, NotificationRecord>>,
}

impl NotificationRegistry {
    pub fn new(identity: IdentityDeriver) -> Self {
        Self {
            identity,
            entries: DashMap::new(),
        }
    }

    pub fn identity(&self) -> &IdentityDeriver {
        &self.identity
    }

    /// Register the declarations from one parse of `path`.
    pub fn upsert_for_path(&self, path: &str, declarations: Vec<DueDeclaration>) -> MergeOutcome {
        let records = declarations
            .into_iter()
            .map(|decl| {
                let id = self.identity.derive(path, &decl.due_at);
                NotificationRecord::from_declaration(id, decl)
            })
            .collect();
        self.merge_records(path, records)
    }

    /// Replace `path`'s records with `records`, carrying `fired` forward for
    /// ids that were already tracked.
    ///
    /// An empty `records` leaves the path untouched: a parse that declares
    /// nothing neither creates nor modifies an entry. Use
    /// [`remove_path`](Self::remove_path) to forget a document.
    pub fn merge_records(&self, path: &str, records: Vec<NotificationRecord>) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();
        if records.is_empty() {
            return outcome;
        }

        let mut entry = self.entries.entry(path.to_string()).or_default();
        let mut previous = std::mem::take(entry.value_mut());
        let mut next = HashMap::with_capacity(records.len());

        for mut record in records {
            match previous.remove(&record.id) {
                Some(existing) => {
                    record.fired = existing.fired;
                    outcome.retained.push(record.id.clone());
                }
                None => outcome.added.push(record.id.clone()),
            }
            next.insert(record.id.clone(), record);
        }

        outcome.dropped = previous.into_keys().collect();
        *entry.value_mut() = next;

        if !outcome.dropped.is_empty() {
            debug!(
                path,
                dropped = outcome.dropped.len(),
                "discarded notifications no longer declared"
            );
        }
        outcome
    }

    /// Forget every record filed under `path`. Returns how many were removed.
    pub fn remove_path(&self, path: &str) -> usize {
        self.entries
            .remove(path)
            .map(|(_, records)| records.len())
            .unwrap_or(0)
    }

    /// Every unfired record whose due instant is strictly before `now`.
    ///
    /// Returns an owned snapshot so callers can mark records fired while
    /// walking it. Order is unspecified.
    pub fn pending(&self, now: DateTime<Utc>) -> Vec<PendingNotification> {
        self.entries
            .iter()
            .flat_map(|entry| {
                let path = entry.key().clone();
                entry
                    .value()
                    .values()
                    .filter(|record| record.is_pending(now))
                    .map(|record| PendingNotification {
                        path: path.clone(),
                        record: record.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Mark a record fired. Returns `false` if it no longer exists, e.g.
    /// because the document was re-parsed in the meantime.
    pub fn mark_fired(&self, path: &str, id: &NotificationId) -> bool {
        let Some(mut records) = self.entries.get_mut(path) else {
            debug!(path, %id, "mark_fired on untracked path");
            return false;
        };
        match records.get_mut(id) {
            Some(record) => {
                record.fired = true;
                true
            }
            None => {
                debug!(path, %id, "mark_fired on stale notification");
                false
            }
        }
    }

    pub fn get(&self, path: &str, id: &NotificationId) -> Option<NotificationRecord> {
        self.entries.get(path)?.get(id).cloned()
    }

    /// All records currently filed under `path`.
    pub fn records_for(&self, path: &str) -> Vec<NotificationRecord> {
        self.entries
            .get(path)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Every tracked record, sorted by path then due instant.
    pub fn snapshot(&self) -> Vec<PendingNotification> {
        let mut all: Vec<PendingNotification> = self
            .entries
            .iter()
            .flat_map(|entry| {
                let path = entry.key().clone();
                entry
                    .value()
                    .values()
                    .map(|record| PendingNotification {
                        path: path.clone(),
                        record: record.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        all.sort_by(|a, b| {
            a.path
                .cmp(&b.path)
                .then_with(|| a.record.due_at.instant().cmp(&b.record.due_at.instant()))
        });
        all
    }

    pub fn path_count(&self) -> usize {
        self.entries.len()
    }

    /// Total number of tracked records across all paths.
    pub fn len(&self) -> usize {
        self.entries.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
