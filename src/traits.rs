use crate::model::FileInfo;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors raised by the [`WorkerPool`](crate::executor::WorkerPool).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Submit on a closed worker pool")]
    Closed,
    #[error("Task panicked while running")]
    TaskPanicked,
    #[error("Task was dropped before it ran")]
    TaskDropped,
}

/// Errors surfaced by a logging run.
#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("Failed to open log file '{path}': {source}")]
    LogFileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to extract info for '{path}': {reason}")]
    Extraction { path: PathBuf, reason: String },
    #[error("Worker pool error: {0}")]
    Pool(#[from] PoolError),
    #[error("Run timed out after {0:?}")]
    Timeout(Duration),
    #[error("Run ended with {written} of {expected} lines written")]
    Incomplete { written: usize, expected: usize },
    #[error("Background task failed: {0}")]
    Join(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Computes the metadata record for one file.
///
/// Implementations never fail past this boundary: any problem (missing file,
/// unreadable content, a file removed mid-run) is reported as a record with
/// `valid == false`. Called concurrently from pool threads.
pub trait InfoExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> FileInfo;
}

impl<F> InfoExtractor for F
where
    F: Fn(&Path) -> FileInfo + Send + Sync,
{
    fn extract(&self, path: &Path) -> FileInfo {
        self(path)
    }
}
