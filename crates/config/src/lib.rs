//! # Config — store settings from the environment
//!
//! ```text
//! PROGLOG_STORE_PATH   store file path            (default: "store.log")
//! PROGLOG_BUFFER_KB    write buffer size in KiB   (default: 8, must be >= 1)
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Variable holding the store file path.
pub const ENV_STORE_PATH: &str = "PROGLOG_STORE_PATH";
/// Variable holding the write buffer size in KiB.
pub const ENV_BUFFER_KB: &str = "PROGLOG_BUFFER_KB";

/// Store file path used when `PROGLOG_STORE_PATH` is unset.
pub const DEFAULT_STORE_PATH: &str = "store.log";
/// Write buffer size in KiB used when `PROGLOG_BUFFER_KB` is unset.
pub const DEFAULT_BUFFER_KB: usize = 8;

/// A variable was set but could not be used.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid {key}={value:?}: {reason}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

/// Settings needed to open a record store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Path of the store file; created if missing.
    pub path: PathBuf,
    /// Write buffer capacity in bytes.
    pub buffer_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_STORE_PATH),
            buffer_capacity: DEFAULT_BUFFER_KB * 1024,
        }
    }
}

impl StoreConfig {
    /// Reads the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Unset keys
    /// fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = lookup(ENV_STORE_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH));

        let buffer_kb = match lookup(ENV_BUFFER_KB) {
            Some(raw) => {
                let kb: usize = raw.trim().parse().map_err(|e| ConfigError {
                    key: ENV_BUFFER_KB,
                    value: raw.clone(),
                    reason: format!("{}", e),
                })?;
                if kb == 0 {
                    return Err(ConfigError {
                        key: ENV_BUFFER_KB,
                        value: raw,
                        reason: "must be at least 1".to_string(),
                    });
                }
                kb
            }
            None => DEFAULT_BUFFER_KB,
        };

        let buffer_capacity = buffer_kb.checked_mul(1024).ok_or_else(|| ConfigError {
            key: ENV_BUFFER_KB,
            value: buffer_kb.to_string(),
            reason: "too large".to_string(),
        })?;

        Ok(Self {
            path,
            buffer_capacity,
        })
    }
}
