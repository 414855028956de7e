//! Run configuration.

use crate::executor::{default_pool_size, MIN_THREADS};
use crate::traits::LoggerError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_LOG_FILE_NAME: &str = "file_inf.log";

/// Settings for one logging run.
///
/// Loadable from JSON; every field is optional there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Worker pool size (default: hardware threads, at least 2)
    pub workers: Option<usize>,

    /// Abort the run after this many milliseconds (default: no limit)
    pub timeout_ms: Option<u64>,

    /// Log file name used when only a directory is given
    pub log_file_name: String,

    /// Writer rescan period when no completion signal arrives
    pub poll_interval_ms: u64,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            workers: None,
            timeout_ms: None,
            log_file_name: DEFAULT_LOG_FILE_NAME.to_string(),
            poll_interval_ms: 50,
        }
    }
}

impl LoggerConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Kept at millisecond precision; anything shorter becomes 1 ms.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.timeout_ms = Some(millis.max(1));
        self
    }

    pub fn with_log_file_name(mut self, name: impl Into<String>) -> Self {
        self.log_file_name = name.into();
        self
    }

    /// Reads a JSON config file.
    pub fn from_json_file(path: &Path) -> Result<Self, LoggerError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| LoggerError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LoggerError> {
        if self.workers == Some(0) {
            return Err(LoggerError::Config("workers must be positive".into()));
        }
        if self.timeout_ms == Some(0) {
            return Err(LoggerError::Config("timeout_ms must be positive".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(LoggerError::Config("poll_interval_ms must be positive".into()));
        }
        let name = Path::new(&self.log_file_name);
        if self.log_file_name.is_empty() || name.file_name() != Some(name.as_os_str()) {
            return Err(LoggerError::Config(format!(
                "log_file_name must be a plain file name, got '{}'",
                self.log_file_name
            )));
        }
        Ok(())
    }

    pub fn pool_size(&self) -> usize {
        self.workers
            .map(|w| w.max(MIN_THREADS))
            .unwrap_or_else(default_pool_size)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
