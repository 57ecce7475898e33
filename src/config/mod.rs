//! Configuration for the client core
//!
//! Configuration is loaded in order of precedence:
//! 1. Environment variables (highest priority)
//! 2. Config file (~/.config/cupboard/config.toml)
//! 3. Built-in defaults (lowest priority)

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

// ─────────────────────────────────────────────────────────────────────────────
// Submodules
// ─────────────────────────────────────────────────────────────────────────────

mod logging;
mod serialization;


pub use logging::{FileLogging, LogRotation, LoggingConfig};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Directory name used under the platform config/data roots
const APP_DIR: &str = "cupboard";

// ─────────────────────────────────────────────────────────────────────────────
// Application Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Local mirror database file
    pub db_path: PathBuf,

    /// Engine configuration document
    pub engine_config: PathBuf,

    /// Secret codec settings
    pub secrets: SecretsConfig,

    /// Background refresh settings
    pub refresh: RefreshConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            engine_config: default_engine_config(),
            secrets: SecretsConfig::default(),
            refresh: RefreshConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Secret codec settings
#[derive(Debug, Clone)]
pub struct SecretsConfig {
    /// Entropy mixed into the secret key; secrets written under one entropy
    /// cannot be read under another
    pub entropy: String,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            entropy: crate::secret::DEFAULT_ENTROPY.to_string(),
        }
    }
}

/// Background refresh settings
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Seconds between refreshes in watch mode
    pub interval_secs: u64,
    /// Refresh once before running any command
    pub on_startup: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            on_startup: true,
        }
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

/// Platform data directory for this app, falling back to ./data
pub(crate) fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|p| p.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("./data"))
}

fn default_db_path() -> PathBuf {
    data_dir().join("data.db")
}

fn default_engine_config() -> PathBuf {
    dirs::config_dir()
        .map(|p| p.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("engine.json")
}

// ─────────────────────────────────────────────────────────────────────────────
// File Configuration (deserialization layer)
// ─────────────────────────────────────────────────────────────────────────────

/// Config file structure
#[derive(Debug, Deserialize, Default)]
pub(crate) struct FileConfig {
    pub db_path: Option<String>,
    pub engine_config: Option<String>,

    /// Optional [secrets] section
    pub secrets: Option<FileSecrets>,

    /// Optional [refresh] section
    pub refresh: Option<FileRefresh>,

    /// Optional [logging] section
    pub logging: Option<FileLogging>,
}

#[derive(Debug, Deserialize, Default)]
pub(crate) struct FileSecrets {
    pub entropy: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub(crate) struct FileRefresh {
    pub interval_secs: Option<u64>,
    pub on_startup: Option<bool>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration Loading
// ─────────────────────────────────────────────────────────────────────────────

impl Config {
    /// Get the config file path: ~/.config/cupboard/config.toml
    /// Uses Unix-style ~/.config on all platforms for consistency
    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|p| p.join(".config").join(APP_DIR).join("config.toml"))
    }

    /// Create config file with defaults if it doesn't exist
    /// Called during startup to help users discover configuration options
    pub fn ensure_config_exists() {
        let Some(path) = Self::config_path() else {
            return;
        };

        if path.exists() {
            return;
        }

        if let Some(parent) = path.parent() {
            if std::fs::create_dir_all(parent).is_err() {
                return; // Config is optional
            }
        }

        if let Err(e) = std::fs::write(&path, Self::default().to_toml()) {
            tracing::debug!("Could not write config template {}: {}", path.display(), e);
        }
    }

    /// Load file config if it exists
    ///
    /// A file that exists but cannot be read or parsed is an error: a broken
    /// config should fail fast, not silently fall back to defaults.
    fn load_file_config() -> Result<FileConfig> {
        let Some(path) = Self::config_path() else {
            return Ok(FileConfig::default());
        };

        match std::fs::read_to_string(&path) {
            Ok(contents) => Self::parse_file_config(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileConfig::default()),
            Err(e) => {
                Err(e).with_context(|| format!("Cannot read config file {}", path.display()))
            }
        }
    }

    pub(crate) fn parse_file_config(contents: &str) -> Result<FileConfig> {
        Ok(toml::from_str(contents)?)
    }

    /// Load configuration: env vars > file > defaults
    pub fn from_env() -> Result<Self> {
        let file = Self::load_file_config()?;
        Ok(Self::resolve(file, |name| std::env::var(name).ok()))
    }

    /// Merge a parsed file with an environment lookup
    pub(crate) fn resolve<F>(file: FileConfig, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        // Store path: env > file > default
        let db_path = env("CUPBOARD_DB_PATH")
            .or(file.db_path)
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        // Engine config: env > file > default
        let engine_config = env("CUPBOARD_ENGINE_CONFIG")
            .or(file.engine_config)
            .map(PathBuf::from)
            .unwrap_or(defaults.engine_config);

        let file_secrets = file.secrets.unwrap_or_default();
        let secrets = SecretsConfig {
            entropy: env("CUPBOARD_SECRET_ENTROPY")
                .or(file_secrets.entropy)
                .unwrap_or(defaults.secrets.entropy),
        };

        let file_refresh = file.refresh.unwrap_or_default();
        let refresh = RefreshConfig {
            interval_secs: env("CUPBOARD_REFRESH_SECS")
                .and_then(|v| v.parse().ok())
                .or(file_refresh.interval_secs)
                .unwrap_or(defaults.refresh.interval_secs),
            on_startup: file_refresh
                .on_startup
                .unwrap_or(defaults.refresh.on_startup),
        };

        let mut logging = LoggingConfig::from_file(file.logging);
        if let Some(level) = env("CUPBOARD_LOG_LEVEL") {
            logging.level = level;
        }

        Self {
            db_path,
            engine_config,
            secrets,
            refresh,
            logging,
        }
    }
}
