//! Repository configuration
//!
//! A single JSON file:
//!
//! ```json
//! {
//!     "store_path": "./vdm/store.json",
//!     "default_author": "admin",
//!     "log_level": "warn"
//! }
//! ```
//!
//! Only `store_path` is required. `default_author` is for library callers
//! that begin transactions; the CLI commands are read-only.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::Severity;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "VDM_CONFIG_READ",
            ConfigError::Parse(_) => "VDM_CONFIG_PARSE",
            ConfigError::Invalid(_) => "VDM_CONFIG_INVALID",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// File the store image is kept in (required)
    pub store_path: PathBuf,

    /// Author set on transactions begun through
    /// `Repository::with_default_author` (optional, default "admin").
    /// The CLI only reads history and never begins one.
    #[serde(default = "default_author")]
    pub default_author: String,

    /// Minimum log severity (optional, default "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_author() -> String {
    "admin".to_string()
}

fn default_log_level() -> String {
    Severity::Info.as_str().to_ascii_lowercase()
}

impl RepositoryConfig {
    /// Config with defaults for everything but the store path.
    pub fn new(store_path: impl Into<PathBuf>) -> Self {
        Self {
            store_path: store_path.into(),
            default_author: default_author(),
            log_level: default_log_level(),
        }
    }

    /// Reads, parses and validates a config file.
    ///
    /// Nothing is logged here: the caller applies `log_level` first.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: RepositoryConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("store_path must not be empty".into()));
        }
        if self.default_author.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "default_author must not be empty".into(),
            ));
        }
        self.severity()?;
        Ok(())
    }

    /// `log_level` as a severity.
    pub fn severity(&self) -> Result<Severity, ConfigError> {
        Severity::from_str(&self.log_level).map_err(|_| {
            ConfigError::Invalid(format!("Unknown log_level: '{}'", self.log_level))
        })
    }
}
