//! Package engine boundary
//!
//! The engine owns the authoritative configuration: sources, global settings
//! and feature flags. Records here use the engine's own field names and keep
//! secrets encrypted; `crate::mapper` turns them into the local model.
//!
//! Calls are synchronous from the caller's point of view.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};

mod file;

#[cfg(test)]
pub(crate) mod fake;

pub use file::FileEngine;

// ─────────────────────────────────────────────────────────────────────────────
// Engine records
// ─────────────────────────────────────────────────────────────────────────────

/// A source entry as persisted by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSource {
    pub id: String,
    pub value: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    /// Encrypted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
    /// Encrypted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_password: Option<String>,
    #[serde(default)]
    pub visible_to_admin_only: bool,
    #[serde(default)]
    pub bypass_proxy: bool,
    #[serde(default)]
    pub allow_self_service: bool,
}

/// A feature entry as persisted by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineFeature {
    pub name: String,
    pub enabled: bool,
    #[serde(default)]
    pub set_explicitly: bool,
    #[serde(default)]
    pub description: String,
}

/// A config entry as persisted by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSetting {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub description: String,
}

/// Package metadata as reported by a feed; people lists are comma-delimited
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnginePackage {
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub authors: String,
    #[serde(default)]
    pub owners: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub project_url: Option<String>,
    #[serde(default)]
    pub download_count: u64,
    #[serde(default)]
    pub is_prerelease: bool,
}

/// Everything the engine reports in one read
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    #[serde(default)]
    pub sources: Vec<EngineSource>,
    #[serde(default)]
    pub features: Vec<EngineFeature>,
    #[serde(default)]
    pub settings: Vec<EngineSetting>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine trait
// ─────────────────────────────────────────────────────────────────────────────

/// Read/write access to the engine's persisted configuration
pub trait ConfigEngine: Send + Sync {
    fn list_sources(&self) -> Result<Vec<EngineSource>, EngineError>;
    fn list_features(&self) -> Result<Vec<EngineFeature>, EngineError>;
    fn list_settings(&self) -> Result<Vec<EngineSetting>, EngineError>;

    fn set_feature(&self, name: &str, enabled: bool) -> Result<(), EngineError>;
    fn set_setting(&self, key: &str, value: &str) -> Result<(), EngineError>;

    /// Add or fully replace a source (secrets already encrypted)
    fn set_source(&self, source: &EngineSource) -> Result<(), EngineError>;

    /// Remove a source; removing an absent source succeeds
    fn remove_source(&self, id: &str) -> Result<(), EngineError>;

    /// Read all three collections
    fn snapshot(&self) -> Result<EngineSnapshot, EngineError> {
        Ok(EngineSnapshot {
            sources: self.list_sources()?,
            features: self.list_features()?,
            settings: self.list_settings()?,
        })
    }
}
