//! Default file metadata extractor.
//!
//! Size comes from the filesystem, the checksum is an MD5 digest of the file
//! content, and the date is the last modification time in local time.

use crate::model::{short_name_of, FileInfo};
use crate::traits::InfoExtractor;
use chrono::{DateTime, Local};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::time::SystemTime;
use tracing::debug;

const READ_CHUNK: usize = 8 * 1024;

const UNITS: [(u64, &str); 5] = [
    (1 << 40, " Tera "),
    (1 << 30, " Giga "),
    (1 << 20, " Mega "),
    (1 << 10, " Kilo "),
    (1, " "),
];

/// Stat + MD5 extractor used by the command-line front end.
#[derive(Debug, Default, Clone, Copy)]
pub struct Md5Extractor;

impl InfoExtractor for Md5Extractor {
    fn extract(&self, path: &Path) -> FileInfo {
        match collect(path) {
            Ok(info) => info,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Extraction failed");
                FileInfo::invalid(path, e.to_string())
            }
        }
    }
}

fn collect(path: &Path) -> io::Result<FileInfo> {
    let metadata = std::fs::metadata(path)?;
    if !metadata.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        ));
    }
    let size_bytes = metadata.len();
    let created_date = format_date(metadata.modified()?);
    let checksum = md5_hex(path)?;

    Ok(FileInfo {
        full_path: path.to_path_buf(),
        short_name: short_name_of(path),
        checksum,
        created_date,
        human_size: human_readable_size(size_bytes),
        size_bytes,
        valid: true,
        error: None,
    })
}

/// Streams the file through MD5 and returns the lowercase hex digest.
pub fn md5_hex(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut context = md5::Context::new();
    let mut buf = [0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        context.consume(&buf[..n]);
    }
    Ok(format!("{:x}", context.compute()))
}

/// Formats a timestamp as `D/M/YYYY` in local time, no zero padding.
pub fn format_date(time: SystemTime) -> String {
    let local: DateTime<Local> = time.into();
    local.format("%-d/%-m/%Y").to_string()
}

/// Splits a byte count into Tera/Giga/Mega/Kilo/byte components.
///
/// `1029` renders as `"1 Kilo byte 5 bytes"`; zero is `"0 bytes"`.
pub fn human_readable_size(size: u64) -> String {
    if size == 0 {
        return "0 bytes".to_string();
    }

    let mut rest = size;
    let mut parts = Vec::new();
    for (unit, prefix) in UNITS {
        let count = rest / unit;
        rest %= unit;
        if count > 0 {
            let noun = if count == 1 { "byte" } else { "bytes" };
            parts.push(format!("{count}{prefix}{noun}"));
        }
    }
    parts.join(" ")
}
