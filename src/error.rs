//! Error taxonomy for the configuration core
//!
//! Four failure kinds matter to callers:
//! - `SecretDecryption`: an encrypted credential could not be read back
//! - `StoreUnavailable`: the local mirror file is unusable (fatal at startup)
//! - `UnknownFeature`: a toggle was requested for a feature the engine never reported
//! - `EngineUnavailable`: the package engine refused or failed a call (recoverable)

use thiserror::Error;

/// Errors surfaced by the codec, mapper, store and service
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("secret could not be decrypted: {0}")]
    SecretDecryption(String),

    #[error("local store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("unknown feature '{0}'")]
    UnknownFeature(String),

    #[error("package engine unavailable: {0}")]
    EngineUnavailable(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Failures reported by an engine adapter
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine configuration I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("engine configuration is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("engine rejected the change: {0}")]
    Rejected(String),
}

impl From<EngineError> for ConfigError {
    fn from(err: EngineError) -> Self {
        ConfigError::EngineUnavailable(err.to_string())
    }
}

impl From<rusqlite::Error> for ConfigError {
    fn from(err: rusqlite::Error) -> Self {
        ConfigError::StoreUnavailable(err.to_string())
    }
}

impl From<r2d2::Error> for ConfigError {
    fn from(err: r2d2::Error) -> Self {
        ConfigError::StoreUnavailable(format!("connection pool: {err}"))
    }
}
