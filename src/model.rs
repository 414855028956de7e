use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Metadata collected for a single file.
///
/// Produced once by an [`InfoExtractor`](crate::traits::InfoExtractor) and
/// never mutated afterwards. `valid == false` means extraction failed; the
/// remaining fields are then best-effort and must not be logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub full_path: PathBuf,
    pub short_name: String,
    /// Lowercase hex MD5 digest (32 chars)
    pub checksum: String,
    /// Modification date as `D/M/YYYY`
    pub created_date: String,
    pub human_size: String,
    pub size_bytes: u64,
    pub valid: bool,
    /// Why extraction failed, if it did
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileInfo {
    /// Builds an invalid record for `path` carrying the failure reason.
    pub fn invalid(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        let full_path = path.into();
        let short_name = short_name_of(&full_path);
        Self {
            full_path,
            short_name,
            checksum: String::new(),
            created_date: String::new(),
            human_size: String::new(),
            size_bytes: 0,
            valid: false,
            error: Some(reason.into()),
        }
    }

    /// Renders the log line, trailing newline included.
    pub fn to_line(&self) -> String {
        format!(
            "{}, size is: {}, created: {}, MD5: {}\n",
            self.short_name, self.human_size, self.created_date, self.checksum
        )
    }
}

pub(crate) fn short_name_of(path: &std::path::Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Summary of a successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessReport {
    /// Where the log was written
    pub log_path: PathBuf,

    /// Number of lines written (one per file)
    pub files_logged: usize,

    /// Sum of all logged file sizes (bytes)
    pub total_size_bytes: u64,

    /// Wall time of the whole run (milliseconds)
    pub duration_ms: u64,
}
