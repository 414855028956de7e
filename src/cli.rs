//! Directory helpers behind the `fileinfo-logger` binary.

use crate::config::LoggerConfig;
use crate::traits::LoggerError;
use std::path::{Path, PathBuf};

/// Regular files directly inside `dir`; subdirectories are not entered.
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>, LoggerError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// `output` when given, otherwise `<dir>/<log_file_name>`.
pub fn resolve_log_path(dir: &Path, output: Option<PathBuf>, config: &LoggerConfig) -> PathBuf {
    output.unwrap_or_else(|| dir.join(&config.log_file_name))
}

pub fn no_files_message(dir: &Path) -> String {
    format!("There are no files in {} directory", dir.display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::FileInfoLogger;

    #[test]
    fn test_list_files_skips_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), b"b").unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("deep.txt"), b"d").unwrap();

        let files = list_files(dir.path()).unwrap();
        assert_eq!(files, vec![dir.path().join("a.txt"), dir.path().join("b.txt")]);
    }

    #[test]
    fn test_list_files_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("only-a-dir")).unwrap();
        assert!(list_files(dir.path()).unwrap().is_empty());
        assert_eq!(
            no_files_message(Path::new("/data/home")),
            "There are no files in /data/home directory"
        );
    }

    #[test]
    fn test_list_files_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = list_files(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, LoggerError::Io(_)));
    }

    #[test]
    fn test_resolve_log_path() {
        let config = LoggerConfig::default();
        assert_eq!(
            resolve_log_path(Path::new("/data"), None, &config),
            PathBuf::from("/data/file_inf.log")
        );
        assert_eq!(
            resolve_log_path(Path::new("/data"), Some(PathBuf::from("/tmp/sums.log")), &config),
            PathBuf::from("/tmp/sums.log")
        );

        let renamed = LoggerConfig::default().with_log_file_name("sums.log");
        assert_eq!(
            resolve_log_path(Path::new("/data"), None, &renamed),
            PathBuf::from("/data/sums.log")
        );
    }

    #[test]
    fn test_directory_holding_only_the_log_has_no_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggerConfig::default();
        let log = resolve_log_path(dir.path(), None, &config);
        std::fs::write(&log, b"stale\n").unwrap();

        let files = list_files(dir.path()).unwrap();
        assert_eq!(files, vec![log.clone()]);
        assert!(FileInfoLogger::new(files, &log).task_list().is_empty());
    }
}
