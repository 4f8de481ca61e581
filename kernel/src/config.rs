// Configuration
//
// Backend selection and adapter switches, loadable from JSON. Every
// field has a default so partial documents are accepted.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::adapter::AdapterOptions;
use crate::log::{BackendKind, LogOptions};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// How the process-wide log is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub backend: BackendKind,

    /// Directory for file-backed journals.
    pub path: PathBuf,

    /// Fixed log name. A random one is generated when unset.
    pub log_name: Option<String>,

    /// Entry cache capacity; 0 disables the cache.
    pub cache_entries: usize,

    pub max_entry_size: Option<usize>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::File,
            path: PathBuf::from("db"),
            log_name: None,
            cache_entries: 1024,
            max_entry_size: None,
        }
    }
}

impl LogConfig {
    /// Fresh in-memory log with the default cache.
    pub fn in_memory() -> Self {
        Self {
            backend: BackendKind::Memory,
            ..Self::default()
        }
    }

    pub fn options(&self) -> LogOptions {
        LogOptions {
            path: self.path.clone(),
            max_entry_size: self.max_entry_size,
            cache_entries: self.cache_entries,
        }
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KvConfig {
    pub log: LogConfig,
    pub adapter: AdapterOptions,
}

impl KvConfig {
    /// Built-in configuration (used if no config is provided).
    pub fn default_config() -> Self {
        Self::default()
    }

    pub fn from_json_str(data: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(data)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&data)
    }
}
