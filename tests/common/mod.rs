//! Common test utilities for duewatch integration tests
//!
//! Recording alert sinks, scheduler fixtures over an in-memory store, and
//! throwaway vault directories on disk.

#![allow(dead_code)]

pub mod sink;
pub mod vault;

pub use sink::RecordingAlertSink;
pub use vault::TestVault;

use chrono::{DateTime, Utc};
use duewatch::{Config, MemoryDocumentStore, Scheduler};
use std::sync::Arc;
use tokio::sync::watch;

/// Parse an RFC 3339 instant.
pub fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .expect("valid RFC 3339 instant")
        .with_timezone(&Utc)
}

/// Note text with a front-matter header declaring `key: value`.
pub fn note_with(key: &str, value: &str) -> String {
    format!("---\n{key}: {value}\n---\n\nBody text.\n")
}

/// A scheduler over an in-memory vault named `Vault`.
pub struct Fixture {
    pub scheduler: Scheduler,
    pub store: Arc<MemoryDocumentStore>,
    pub sink: Arc<RecordingAlertSink>,
    pub config: watch::Sender<Config>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryDocumentStore::new("Vault"));
        let sink = Arc::new(RecordingAlertSink::default());
        let (tx, rx) = watch::channel(config);
        let scheduler = Scheduler::new(store.clone(), sink.clone(), rx);
        Self {
            scheduler,
            store,
            sink,
            config: tx,
        }
    }
}
