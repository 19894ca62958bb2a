//! Duewatch: due-date notifications for a vault of markdown notes
//!
//! Notes declare a due date in their front-matter header. Duewatch keeps a
//! registry of those dates and raises an alert once each one has passed,
//! exactly once per declaration.
//!
//! # Core Concepts
//!
//! - **Declarations**: a front-matter key (default `due`) holding a timestamp
//! - **Records**: registered declarations with a stable id and a fired flag
//! - **Sweeps**: passes that deliver every unfired record whose instant has passed
//!
//! # Example
//!
//! ```
//! use duewatch::{IdentityDeriver, NotificationRegistry};
//!
//! let registry = NotificationRegistry::new(IdentityDeriver::new("Vault"));
//! assert!(registry.is_empty());
//! ```

pub mod alert;
pub mod config;
pub mod extract;
pub mod registry;
pub mod scheduler;
pub mod store;

pub use alert::{Alert, AlertSink, CommandAlertSink, LogAlertSink};
pub use config::{
    Config, ConfigError, ConfigResult, JsonSettingsStore, MemorySettingsStore, PartialConfig,
    SettingsService, SettingsStore,
};
pub use extract::{extract_due, parse_timestamp, DueAt, DueDeclaration, ExtractError};
pub use registry::{
    IdentityDeriver, IdentityScope, MergeOutcome, NotificationId, NotificationRecord,
    NotificationRegistry, PendingNotification,
};
pub use scheduler::{RegisterError, RegistrationReport, Scheduler, SchedulerHandle, SweepReport};
pub use store::{
    DocumentRef, DocumentStore, FsDocumentStore, MemoryDocumentStore, StoreError, StoreEvent,
    StoreResult,
};
pub use tokio_util::sync::CancellationToken;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
