//! Configuration and settings persistence
//!
//! [`Config`] is loaded once at startup by merging whatever a
//! [`SettingsStore`] holds over the defaults. [`SettingsService`] owns the
//! live value, persists every edit, and broadcasts changes to the scheduler
//! over a `tokio::sync::watch` channel.

mod settings;

pub use settings::{JsonSettingsStore, MemorySettingsStore, SettingsStore};

use crate::registry::IdentityScope;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

/// Front-matter key holding the due date unless configured otherwise.
pub const DEFAULT_DUE_KEY: &str = "due";

/// Minutes between periodic sweeps unless configured otherwise.
pub const DEFAULT_SWEEP_INTERVAL_MINUTES: u64 = 1;

/// Errors from loading or saving settings
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid setting: {0}")]
    Invalid(String),

    #[error("No settings directory available on this platform")]
    NoSettingsDir,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Front-matter key read as the due date
    pub due_key: String,
    /// Minutes between periodic sweeps
    pub sweep_interval_minutes: u64,
    /// Overrides the vault name used in notification ids
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vault_name: Option<String>,
    /// What notification ids are scoped to
    pub identity_scope: IdentityScope,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            due_key: DEFAULT_DUE_KEY.to_string(),
            sweep_interval_minutes: DEFAULT_SWEEP_INTERVAL_MINUTES,
            vault_name: None,
            identity_scope: IdentityScope::default(),
        }
    }
}

impl Config {
    /// Overlay the keys present in `partial` onto the defaults.
    pub fn merged(partial: PartialConfig) -> Self {
        let mut config = Self::default();
        config.apply(partial);
        config
    }

    /// Overlay the keys present in `partial` onto `self`.
    pub fn apply(&mut self, partial: PartialConfig) {
        if let Some(due_key) = partial.due_key {
            self.due_key = due_key;
        }
        if let Some(minutes) = partial.sweep_interval_minutes {
            self.sweep_interval_minutes = minutes;
        }
        if let Some(vault_name) = partial.vault_name {
            self.vault_name = Some(vault_name);
        }
        if let Some(scope) = partial.identity_scope {
            self.identity_scope = scope;
        }
    }

    /// Sweep period, never shorter than one minute.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_minutes.max(1) * 60)
    }
}

/// Settings as persisted; absent keys fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialConfig {
    #[serde(default, alias = "dueKey")]
    pub due_key: Option<String>,
    #[serde(default, alias = "interval")]
    pub sweep_interval_minutes: Option<u64>,
    #[serde(default)]
    pub vault_name: Option<String>,
    #[serde(default)]
    pub identity_scope: Option<IdentityScope>,
}

/// Owns the live configuration and persists edits.
pub struct SettingsService {
    store: Arc<dyn SettingsStore>,
    tx: watch::Sender<Config>,
}

impl SettingsService {
    /// Load settings from `store` and merge them over the defaults.
    ///
    /// A failed load is logged and the defaults are used.
    pub async fn load(store: Arc<dyn SettingsStore>) -> Self {
        let config = match store.load().await {
            Ok(Some(partial)) => Config::merged(partial),
            Ok(None) => Config::default(),
            Err(e) => {
                warn!(error = %e, "cannot load settings, using defaults");
                Config::default()
            }
        };
        let (tx, _) = watch::channel(config);
        Self { store, tx }
    }

    pub fn current(&self) -> Config {
        self.tx.borrow().clone()
    }

    /// Receiver that observes every future edit.
    pub fn subscribe(&self) -> watch::Receiver<Config> {
        self.tx.subscribe()
    }

    /// Change the front-matter key and persist immediately.
    pub async fn set_due_key(&self, due_key: impl Into<String>) -> ConfigResult<()> {
        let due_key = due_key.into().trim().to_string();
        if due_key.is_empty() {
            return Err(ConfigError::Invalid("due key cannot be empty".to_string()));
        }
        self.update(|config| config.due_key = due_key).await
    }

    /// Change the sweep period and persist immediately.
    pub async fn set_sweep_interval(&self, minutes: u64) -> ConfigResult<()> {
        if minutes == 0 {
            return Err(ConfigError::Invalid(
                "sweep interval must be at least one minute".to_string(),
            ));
        }
        self.update(|config| config.sweep_interval_minutes = minutes).await
    }

    /// Apply `edit`, persist the result, then publish it.
    pub async fn update(&self, edit: impl FnOnce(&mut Config)) -> ConfigResult<()> {
        let mut next = self.current();
        edit(&mut next);
        self.store.save(&next).await?;
        info!(due_key = %next.due_key, interval = next.sweep_interval_minutes, "settings saved");
        self.tx.send_replace(next);
        Ok(())
    }
}
