//! Local configuration model
//!
//! These are the toolkit-independent records kept in the local mirror.
//! Every field added after the first release must carry `#[serde(default)]`
//! so documents written by older builds still load.

use serde::{Deserialize, Serialize};

/// A package source as seen by the client (secrets already decrypted)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub certificate: Option<String>,
    #[serde(default)]
    pub certificate_password: Option<String>,
    #[serde(default)]
    pub visible_to_admins_only: bool,
    #[serde(default)]
    pub bypass_proxy: bool,
    #[serde(default)]
    pub allow_self_service: bool,
}

impl SourceConfig {
    /// Create an enabled source with no credentials
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            disabled: false,
            priority: 0,
            user_name: None,
            password: None,
            certificate: None,
            certificate_password: None,
            visible_to_admins_only: false,
            bypass_proxy: false,
            allow_self_service: false,
        }
    }

    pub fn enabled(&self) -> bool {
        !self.disabled
    }

    pub fn has_credentials(&self) -> bool {
        self.user_name.is_some() || self.password.is_some()
    }
}

/// A global engine setting. Absence of a key means "use the engine default".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub description: String,
}

/// A named boolean toggle controlling optional engine behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlag {
    pub name: String,
    pub enabled: bool,
    #[serde(default)]
    pub description: String,
    /// Whether the user (rather than the engine default) chose the current state
    #[serde(default)]
    pub set_explicitly: bool,
}

/// Package metadata in client form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub owners: Vec<String>,
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
