//! Line-slot bookkeeping and mid-file insertion.

use std::io::{self, Read, Seek, SeekFrom, Write};

/// Byte offset of every line slot in the log, plus which slots are filled.
///
/// `offsets[i]` is where line `i` currently begins (or would begin, for an
/// empty slot). Always non-decreasing.
#[derive(Debug, Clone)]
pub struct OffsetTable {
    offsets: Vec<u64>,
    written: Vec<bool>,
    written_count: usize,
}

impl OffsetTable {
    /// Table for `slots` lines over an empty file.
    pub fn new(slots: usize) -> Self {
        Self {
            offsets: vec![0; slots],
            written: vec![false; slots],
            written_count: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn offset(&self, index: usize) -> u64 {
        self.offsets[index]
    }

    pub fn is_written(&self, index: usize) -> bool {
        self.written[index]
    }

    pub fn written_count(&self) -> usize {
        self.written_count
    }

    pub fn is_complete(&self) -> bool {
        self.written_count == self.offsets.len()
    }

    /// Records that `len` bytes now occupy slot `index`: every later slot
    /// moves forward by `len`.
    pub fn mark_inserted(&mut self, index: usize, len: u64) {
        debug_assert!(!self.written[index], "slot {index} written twice");
        for offset in &mut self.offsets[index + 1..] {
            *offset += len;
        }
        self.written[index] = true;
        self.written_count += 1;
    }
}

/// Inserts `bytes` at `offset`, pushing everything after it forward.
///
/// The tail is buffered in memory, so each call costs O(file size).
pub fn insert_at<F>(file: &mut F, offset: u64, bytes: &[u8]) -> io::Result<()>
where
    F: Read + Write + Seek,
{
    file.seek(SeekFrom::Start(offset))?;
    let mut tail = Vec::new();
    file.read_to_end(&mut tail)?;

    file.seek(SeekFrom::Start(offset))?;
    file.write_all(bytes)?;
    file.write_all(&tail)?;
    Ok(())
}
