// Log Handle Provider
//
// Opens the log lazily, exactly once, and hands out clones of the
// resulting handle. The process-wide provider backs `get_log`.

use parking_lot::Mutex;
use std::sync::OnceLock;
use tracing::warn;
use uuid::Uuid;

use crate::adapter::KvError;
use crate::config::LogConfig;
use crate::log::{open_log, LogHandle};

/// Returned by [`install_global`] once the process-wide provider exists.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("global log provider is already initialized")]
pub struct AlreadyInitialized;

/// Lazily opened, shared log handle.
pub struct LogProvider {
    config: LogConfig,
    handle: OnceLock<LogHandle>,
    opening: Mutex<()>,
}

impl LogProvider {
    pub fn new(config: LogConfig) -> Self {
        Self {
            config,
            handle: OnceLock::new(),
            opening: Mutex::new(()),
        }
    }

    pub fn is_open(&self) -> bool {
        self.handle.get().is_some()
    }

    /// Return the log, opening it on first call.
    ///
    /// Concurrent first callers wait on the one open; a failed open is
    /// not cached, so a later call tries again.
    pub fn get(&self) -> Result<LogHandle, KvError> {
        if let Some(handle) = self.handle.get() {
            return Ok(handle.clone());
        }

        let _opening = self.opening.lock();
        if let Some(handle) = self.handle.get() {
            return Ok(handle.clone());
        }

        let log_name = self
            .config
            .log_name
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

        let handle = open_log(self.config.backend, &self.config.options(), &log_name).map_err(
            |err| {
                warn!(
                    backend = %self.config.backend,
                    log_name = %log_name,
                    %err,
                    "failed to open log"
                );
                KvError::LogUnavailable(err)
            },
        )?;

        Ok(self.handle.get_or_init(|| handle).clone())
    }
}

static GLOBAL: OnceLock<LogProvider> = OnceLock::new();

/// Configure the process-wide provider.
///
/// Must run before the first [`get_log`]; afterwards the configuration
/// is fixed and this fails.
pub fn install_global(config: LogConfig) -> Result<(), AlreadyInitialized> {
    GLOBAL
        .set(LogProvider::new(config))
        .map_err(|_| AlreadyInitialized)
}

/// The process-wide provider, created with the default configuration
/// if none was installed.
pub fn global() -> &'static LogProvider {
    GLOBAL.get_or_init(|| LogProvider::new(LogConfig::default()))
}

/// The process-wide log handle.
pub fn get_log() -> Result<LogHandle, KvError> {
    global().get()
}
