// Append-Only Log Capability
//
// Positions, errors, and backend selection for the log that every
// record is appended to. The KV layer only ever talks to a `LogHandle`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

pub mod cache;
pub mod file;
pub mod memory;
pub mod store;

pub use cache::{CacheStats, CachedLogStore};
pub use file::FileLogStore;
pub use memory::MemoryLogStore;
pub use store::LogStore;

/// Position of an entry in the log, assigned on append.
pub type Position = u64;

/// Shared handle to an open log.
pub type LogHandle = Arc<dyn LogStore>;

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("position {0} has not been written")]
    NotWritten(Position),

    #[error("position {0} has been trimmed")]
    Invalidated(Position),

    #[error("entry of {size} bytes exceeds the {limit} byte limit")]
    EntryTooLarge { size: usize, limit: usize },

    #[error("unknown log backend `{0}`")]
    UnknownBackend(String),

    #[error("corrupt journal {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("log i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage backend a log is opened against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Entries live in process memory and vanish with it.
    Memory,

    /// Entries are journaled to `<path>/<log_name>.log`.
    File,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Memory => f.write_str("memory"),
            BackendKind::File => f.write_str("file"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(BackendKind::Memory),
            "file" => Ok(BackendKind::File),
            other => Err(LogError::UnknownBackend(other.to_string())),
        }
    }
}

/// Backend options passed to [`open_log`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOptions {
    /// Directory holding file-backed journals.
    pub path: PathBuf,

    /// Upper bound on a single entry, if any.
    pub max_entry_size: Option<usize>,

    /// Number of entries kept in the read cache. Zero disables it.
    pub cache_entries: usize,
}

/// Open a log named `log_name` on the given backend.
///
/// Memory logs are always fresh; file logs replay an existing journal
/// with the same name.
pub fn open_log(
    backend: BackendKind,
    options: &LogOptions,
    log_name: &str,
) -> Result<LogHandle, LogError> {
    let handle = match backend {
        BackendKind::Memory => {
            with_cache(MemoryLogStore::new(options.max_entry_size), options.cache_entries)
        }
        BackendKind::File => with_cache(
            FileLogStore::open(&options.path, log_name, options.max_entry_size)?,
            options.cache_entries,
        ),
    };

    info!(%backend, log_name, tail = handle.tail(), "opened log");
    Ok(handle)
}

fn with_cache<S: LogStore + 'static>(store: S, cache_entries: usize) -> LogHandle {
    if cache_entries == 0 {
        Arc::new(store)
    } else {
        Arc::new(CachedLogStore::new(store, cache_entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(path: PathBuf) -> LogOptions {
        LogOptions {
            path,
            max_entry_size: None,
            cache_entries: 4,
        }
    }

    #[test]
    fn backend_kind_parses() {
        assert_eq!("memory".parse::<BackendKind>().unwrap(), BackendKind::Memory);
        assert_eq!("file".parse::<BackendKind>().unwrap(), BackendKind::File);

        let err = "lmdb".parse::<BackendKind>().unwrap_err();
        assert!(matches!(err, LogError::UnknownBackend(name) if name == "lmdb"));
    }

    #[test]
    fn memory_logs_are_independent() {
        let opts = options(PathBuf::from("unused"));
        let a = open_log(BackendKind::Memory, &opts, "same").unwrap();
        let b = open_log(BackendKind::Memory, &opts, "same").unwrap();

        a.append(b"one").unwrap();
        assert_eq!(a.tail(), 1);
        assert_eq!(b.tail(), 0);
    }

    #[test]
    fn cache_stats_reach_the_handle() {
        let opts = options(PathBuf::from("unused"));
        let log = open_log(BackendKind::Memory, &opts, "cached").unwrap();

        let position = log.append(b"entry").unwrap();
        log.read(position).unwrap();
        log.read(position).unwrap();

        let stats = log.cache_stats().unwrap();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.entries, 1);

        let uncached = LogOptions {
            cache_entries: 0,
            ..opts
        };
        let log = open_log(BackendKind::Memory, &uncached, "plain").unwrap();
        assert!(log.cache_stats().is_none());
    }

    #[test]
    fn file_log_reopens_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(dir.path().to_path_buf());

        {
            let log = open_log(BackendKind::File, &opts, "events").unwrap();
            assert_eq!(log.append(b"first").unwrap(), 0);
            assert_eq!(log.append(b"second").unwrap(), 1);
        }

        let log = open_log(BackendKind::File, &opts, "events").unwrap();
        assert_eq!(log.tail(), 2);
        assert_eq!(log.read(1).unwrap(), b"second".to_vec());
    }
}
