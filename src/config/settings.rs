//! Settings persistence backends

use super::{Config, ConfigError, ConfigResult, PartialConfig};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Where settings live between runs.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Load saved settings. `Ok(None)` means nothing has been saved yet.
    async fn load(&self) -> ConfigResult<Option<PartialConfig>>;

    /// Persist the full configuration.
    async fn save(&self, config: &Config) -> ConfigResult<()>;
}

/// Settings stored as a JSON file.
#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data dir>/duewatch/settings.json`
    /// (`~/.local/share/duewatch/settings.json` on Linux).
    pub fn default_path() -> ConfigResult<PathBuf> {
        let data_dir = dirs::data_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
            .ok_or(ConfigError::NoSettingsDir)?;
        Ok(data_dir.join("duewatch").join("settings.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SettingsStore for JsonSettingsStore {
    async fn load(&self) -> ConfigResult<Option<PartialConfig>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&raw)?))
    }

    async fn save(&self, config: &Config) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(config)?;
        // Readers never observe a partially written file.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Settings held in memory for the life of the process.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    saved: Mutex<Option<PartialConfig>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_partial(partial: PartialConfig) -> Self {
        Self {
            saved: Mutex::new(Some(partial)),
        }
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load(&self) -> ConfigResult<Option<PartialConfig>> {
        Ok(self.saved.lock().await.clone())
    }

    async fn save(&self, config: &Config) -> ConfigResult<()> {
        *self.saved.lock().await = Some(PartialConfig {
            due_key: Some(config.due_key.clone()),
            sweep_interval_minutes: Some(config.sweep_interval_minutes),
            vault_name: config.vault_name.clone(),
            identity_scope: Some(config.identity_scope),
        });
        Ok(())
    }
}
