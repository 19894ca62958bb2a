//! Stable notification identity
//!
//! An id is a SHA-256 digest over the vault name and the due instant, so
//! re-parsing an unchanged note reproduces it and moving the due date
//! produces a new one.

use crate::extract::DueAt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Identifier of a tracked notification (64 lowercase hex chars).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(String);

impl NotificationId {
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the digest is scoped to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityScope {
    /// Vault name + due instant. Two notes due at the same instant share
    /// an id; harmless because lookups are always scoped by path.
    #[default]
    Vault,
    /// Vault name + document path + due instant.
    Document,
}

/// Derives notification ids for one vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityDeriver {
    vault_name: String,
    scope: IdentityScope,
}

impl IdentityDeriver {
    pub fn new(vault_name: impl Into<String>) -> Self {
        Self {
            vault_name: vault_name.into(),
            scope: IdentityScope::Vault,
        }
    }

    pub fn with_scope(mut self, scope: IdentityScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn vault_name(&self) -> &str {
        &self.vault_name
    }

    pub fn scope(&self) -> IdentityScope {
        self.scope
    }

    pub fn derive(&self, path: &str, due_at: &DueAt) -> NotificationId {
        let mut hasher = Sha256::new();
        hasher.update(self.vault_name.as_bytes());
        if self.scope == IdentityScope::Document {
            hasher.update(path.as_bytes());
        }
        hasher.update(due_at.identity_key().as_bytes());
        NotificationId(hex::encode(hasher.finalize()))
    }
}
