//! Session orchestrator.
//!
//! Builds the sorted task list, then runs extraction on the worker pool while
//! the ordered writer fills the log on a blocking thread.

use crate::config::LoggerConfig;
use crate::executor::WorkerPool;
use crate::extract::Md5Extractor;
use crate::model::ProcessReport;
use crate::pipeline::writer::{completion_channel, OrderedLogWriter};
use crate::traits::{InfoExtractor, LoggerError};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

/// Logs metadata for a set of files into one alphabetically ordered file.
///
/// # Example
///
/// ```ignore
/// use fileinfo_logger::FileInfoLogger;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let logger = FileInfoLogger::new(vec!["b.txt", "a.txt"], "out.log");
///     let report = logger.process().await?;
///     println!("Logged {} files", report.files_logged);
///     Ok(())
/// }
/// ```
pub struct FileInfoLogger<E = Md5Extractor> {
    tasks: Vec<PathBuf>,
    log_path: PathBuf,
    extractor: Arc<E>,
    config: LoggerConfig,
}

impl FileInfoLogger<Md5Extractor> {
    pub fn new<I, P>(paths: I, log_path: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let log_path = log_path.into();
        let paths: Vec<PathBuf> = paths.into_iter().map(Into::into).collect();
        Self {
            tasks: build_task_list(paths, &log_path),
            log_path,
            extractor: Arc::new(Md5Extractor),
            config: LoggerConfig::default(),
        }
    }
}

impl<E> FileInfoLogger<E>
where
    E: InfoExtractor + 'static,
{
    /// Swaps the metadata extractor.
    pub fn with_extractor<X: InfoExtractor + 'static>(self, extractor: X) -> FileInfoLogger<X> {
        FileInfoLogger {
            tasks: self.tasks,
            log_path: self.log_path,
            extractor: Arc::new(extractor),
            config: self.config,
        }
    }

    pub fn with_config(mut self, config: LoggerConfig) -> Self {
        self.config = config;
        self
    }

    /// Paths that will be logged, in output order.
    pub fn task_list(&self) -> &[PathBuf] {
        &self.tasks
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Runs the whole batch.
    ///
    /// An empty task list is not an error: no log is created, and an existing
    /// one is emptied. Any
    /// file that cannot be read fails the run; lines written before the
    /// failure stay in the log.
    #[instrument(skip(self), fields(log = %self.log_path.display(), files = self.tasks.len()))]
    pub async fn process(&self) -> Result<ProcessReport, LoggerError> {
        let start = Instant::now();
        self.config.validate()?;

        if self.tasks.is_empty() {
            info!("Nothing to do");
            if self.log_path.is_file() {
                // A previous run's lines would describe files that are gone.
                OpenOptions::new()
                    .write(true)
                    .truncate(true)
                    .open(&self.log_path)
                    .map_err(|source| LoggerError::LogFileOpen {
                        path: self.log_path.clone(),
                        source,
                    })?;
            }
            return Ok(ProcessReport {
                log_path: self.log_path.clone(),
                files_logged: 0,
                total_size_bytes: 0,
                duration_ms: start.elapsed().as_millis() as u64,
            });
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.log_path)
            .map_err(|source| LoggerError::LogFileOpen {
                path: self.log_path.clone(),
                source,
            })?;

        let expected = self.tasks.len();
        let pool = Arc::new(WorkerPool::new(self.config.pool_size())?);
        let (sender, slots, completions) = completion_channel(expected);
        let cancel = Arc::new(AtomicBool::new(false));
        let aborted = Arc::new(AtomicBool::new(false));

        info!(threads = pool.size(), "Starting extraction");

        let writer_task = {
            // Weak so the writer never ends up joining pool threads.
            let pool = Arc::downgrade(&pool);
            let aborted = Arc::clone(&aborted);
            let cancel = Arc::clone(&cancel);
            let poll_interval = self.config.poll_interval();
            tokio::task::spawn_blocking(move || {
                let mut writer =
                    OrderedLogWriter::new(file, expected).with_poll_interval(poll_interval);
                let summary = writer.run(&slots, &completions, &cancel, || {
                    aborted.store(true, Ordering::SeqCst);
                    if let Some(pool) = pool.upgrade() {
                        pool.drain_pending();
                    }
                })?;
                writer.into_inner().sync_all()?;
                Ok::<_, LoggerError>(summary)
            })
        };

        for (index, path) in self.tasks.iter().enumerate() {
            if aborted.load(Ordering::SeqCst) {
                debug!(submitted = index, "Writer aborted, stop submitting");
                break;
            }
            let extractor = Arc::clone(&self.extractor);
            let sender = sender.clone();
            let path = path.clone();
            pool.submit(move || {
                let info = extractor.extract(&path);
                sender.complete(index, info);
            })?;
        }
        drop(sender);

        let joined = match self.config.timeout() {
            Some(limit) => match timeout(limit, writer_task).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(timeout_ms = limit.as_millis() as u64, "Run timed out, abandoning running tasks");
                    cancel.store(true, Ordering::SeqCst);
                    pool.drain_pending();
                    // Joining would block on a hung task; let a detached thread do it.
                    std::thread::spawn(move || drop(pool));
                    return Err(LoggerError::Timeout(limit));
                }
            },
            None => writer_task.await,
        };

        tokio::task::spawn_blocking(move || {
            pool.wait_all();
            pool.shutdown();
        })
        .await
        .map_err(|e| LoggerError::Join(format!("Pool join error: {}", e)))?;

        let summary = joined.map_err(|e| LoggerError::Join(format!("Writer join error: {}", e)))??;

        let report = ProcessReport {
            log_path: self.log_path.clone(),
            files_logged: summary.lines_written,
            total_size_bytes: summary.total_size_bytes,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            files = report.files_logged,
            size_bytes = report.total_size_bytes,
            duration_ms = report.duration_ms,
            "Log written"
        );
        Ok(report)
    }
}

/// Drops directories and the log file itself, then sorts by path.
pub fn build_task_list(paths: Vec<PathBuf>, log_path: &Path) -> Vec<PathBuf> {
    let log_identity = resolve(log_path);

    let mut tasks: Vec<PathBuf> = paths
        .into_iter()
        .filter(|path| !path.is_dir())
        .filter(|path| match (&log_identity, resolve(path)) {
            (Some(log), Some(candidate)) => *log != candidate,
            _ => true,
        })
        .collect();
    tasks.sort();
    tasks
}

/// Canonical form of `path`; for a file that does not exist yet, the
/// canonical parent joined with the file name.
fn resolve(path: &Path) -> Option<PathBuf> {
    if let Ok(canonical) = path.canonicalize() {
        return Some(canonical);
    }
    let name = path.file_name()?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Some(parent.canonicalize().ok()?.join(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FileInfo;
    use std::time::Duration;

    #[test]
    fn test_task_list_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join("b.txt"), b"b").unwrap();
        std::fs::write(root.join("a.txt"), b"a").unwrap();
        std::fs::create_dir(root.join("sub")).unwrap();
        std::fs::write(root.join("out.log"), b"").unwrap();

        let paths = vec![
            root.join("b.txt"),
            root.join("sub"),
            // Same file as the log, spelled differently.
            root.join("sub").join("..").join("out.log"),
            root.join("a.txt"),
        ];
        let tasks = build_task_list(paths, &root.join("out.log"));
        assert_eq!(tasks, vec![root.join("a.txt"), root.join("b.txt")]);
    }

    #[test]
    fn test_task_list_excludes_log_that_does_not_exist_yet() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let tasks = build_task_list(vec![root.join("new.log"), root.join("x")], &root.join("new.log"));
        assert_eq!(tasks, vec![root.join("x")]);
    }

    #[tokio::test]
    async fn test_empty_list_is_nothing_to_do() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("out.log");
        let logger = FileInfoLogger::new(Vec::<PathBuf>::new(), &log);

        let report = logger.process().await.unwrap();
        assert_eq!(report.files_logged, 0);
        assert!(!log.exists());
    }

    #[tokio::test]
    async fn test_empty_list_clears_stale_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("file_inf.log");
        std::fs::write(
            &log,
            "gone.txt, size is: 1 byte, created: 1/1/2000, MD5: 00000000000000000000000000000000\n",
        )
        .unwrap();

        // The only input is the log itself, so nothing is left to log.
        let logger = FileInfoLogger::new(vec![log.clone()], &log);
        assert!(logger.task_list().is_empty());

        let report = logger.process().await.unwrap();
        assert_eq!(report.files_logged, 0);
        assert_eq!(std::fs::read_to_string(&log).unwrap(), "");
    }

    #[tokio::test]
    async fn test_log_open_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        let log = dir.path().join("missing-dir").join("out.log");

        let logger = FileInfoLogger::new(vec![dir.path().join("a.txt")], &log);
        let err = logger.process().await.unwrap_err();
        assert!(matches!(err, LoggerError::LogFileOpen { .. }));
    }

    #[tokio::test]
    async fn test_custom_extractor() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("out.log");
        let logger = FileInfoLogger::new(vec!["/virtual/b", "/virtual/a"], &log).with_extractor(
            |path: &Path| FileInfo {
                full_path: path.to_path_buf(),
                short_name: path.display().to_string(),
                checksum: "0".repeat(32),
                created_date: "1/1/2000".to_string(),
                human_size: "1 byte".to_string(),
                size_bytes: 1,
                valid: true,
                error: None,
            },
        );

        let report = logger.process().await.unwrap();
        assert_eq!(report.files_logged, 2);
        assert_eq!(report.total_size_bytes, 2);

        let content = std::fs::read_to_string(&log).unwrap();
        let names: Vec<&str> = content.lines().map(|l| l.split(',').next().unwrap()).collect();
        assert_eq!(names, vec!["/virtual/a", "/virtual/b"]);
    }

    #[tokio::test]
    async fn test_timeout_aborts_run() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("out.log");
        let logger = FileInfoLogger::new(vec!["/virtual/slow"], &log)
            .with_extractor(|path: &Path| {
                std::thread::sleep(Duration::from_secs(3));
                FileInfo::invalid(path, "too late")
            })
            .with_config(LoggerConfig::default().with_timeout(Duration::from_millis(500)));

        let err = logger.process().await.unwrap_err();
        assert!(matches!(err, LoggerError::Timeout(limit) if limit == Duration::from_millis(500)));
    }
}
