//! Ordered log writer.
//!
//! Extraction tasks finish in any order. Each one stores its [`FileInfo`] in
//! its own slot and then sends its index over a channel. The writer is the
//! only owner of the log file and the [`OffsetTable`]: on every wake-up it
//! rescans all unwritten slots, inserts every ready line at its slot's
//! offset, and goes back to sleep. A periodic timeout wake-up covers any
//! signal that arrives before the matching slot is visible.

use crate::model::FileInfo;
use crate::pipeline::offsets::{insert_at, OffsetTable};
use crate::traits::LoggerError;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::io::{Read, Seek, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One write-once result slot per task index.
#[derive(Debug)]
pub struct ResultSlots {
    slots: Vec<OnceLock<FileInfo>>,
}

impl ResultSlots {
    pub fn new(len: usize) -> Self {
        Self {
            slots: (0..len).map(|_| OnceLock::new()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FileInfo> {
        self.slots[index].get()
    }

    /// Returns `false` if the slot was already filled.
    pub fn fill(&self, index: usize, info: FileInfo) -> bool {
        self.slots[index].set(info).is_ok()
    }
}

/// Producer half handed to every extraction task.
#[derive(Debug, Clone)]
pub struct CompletionSender {
    slots: Arc<ResultSlots>,
    tx: Sender<usize>,
}

impl CompletionSender {
    /// Publishes `info` into slot `index`, then wakes the writer.
    pub fn complete(&self, index: usize, info: FileInfo) {
        if !self.slots.fill(index, info) {
            warn!(index, "Result slot already filled, ignoring duplicate");
            return;
        }
        // The writer may have aborted and dropped the receiver.
        let _ = self.tx.send(index);
    }
}

/// Creates the shared slots and the completion channel for `len` tasks.
pub fn completion_channel(len: usize) -> (CompletionSender, Arc<ResultSlots>, Receiver<usize>) {
    let slots = Arc::new(ResultSlots::new(len));
    let (tx, rx) = crossbeam_channel::unbounded();
    let sender = CompletionSender {
        slots: Arc::clone(&slots),
        tx,
    };
    (sender, slots, rx)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Idle,
    WaitingForSignal,
    ScanningReady,
    Writing(usize),
    AllWritten,
    Aborted,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub lines_written: usize,
    pub bytes_written: u64,
    pub total_size_bytes: u64,
}

/// Single owner of the log file during a run.
pub struct OrderedLogWriter<F> {
    file: F,
    table: OffsetTable,
    state: WriterState,
    poll_interval: Duration,
    summary: WriteSummary,
    /// Every slot below this index is written.
    first_pending: usize,
}

impl<F> OrderedLogWriter<F>
where
    F: Read + Write + Seek,
{
    /// `file` must be empty; `slots` is the number of lines to expect.
    pub fn new(file: F, slots: usize) -> Self {
        Self {
            file,
            table: OffsetTable::new(slots),
            state: WriterState::Idle,
            poll_interval: DEFAULT_POLL_INTERVAL,
            summary: WriteSummary::default(),
            first_pending: 0,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn offsets(&self) -> &OffsetTable {
        &self.table
    }

    pub fn into_inner(self) -> F {
        self.file
    }

    /// Inserts `line` into slot `index` and shifts later slots.
    pub fn write_line(&mut self, index: usize, line: &str) -> std::io::Result<()> {
        self.state = WriterState::Writing(index);
        insert_at(&mut self.file, self.table.offset(index), line.as_bytes())?;
        self.table.mark_inserted(index, line.len() as u64);
        self.summary.lines_written += 1;
        self.summary.bytes_written += line.len() as u64;

        while self.first_pending < self.table.len() && self.table.is_written(self.first_pending) {
            self.first_pending += 1;
        }
        Ok(())
    }

    /// Consumes completions until every slot is written.
    ///
    /// On the first invalid result `on_abort` is called (to drop queued work)
    /// and the run fails; lines already written stay in the file. Setting
    /// `cancel` stops the loop at its next wake-up.
    pub fn run(
        &mut self,
        slots: &ResultSlots,
        completions: &Receiver<usize>,
        cancel: &AtomicBool,
        on_abort: impl FnOnce(),
    ) -> Result<WriteSummary, LoggerError> {
        self.state = WriterState::Idle;
        let expected = self.table.len();

        while !self.table.is_complete() {
            self.state = WriterState::WaitingForSignal;
            let disconnected = match completions.recv_timeout(self.poll_interval) {
                Ok(_) | Err(RecvTimeoutError::Timeout) => false,
                Err(RecvTimeoutError::Disconnected) => true,
            };
            // The scan below covers every signal queued so far.
            while completions.try_recv().is_ok() {}

            if cancel.load(Ordering::SeqCst) {
                self.state = WriterState::Aborted;
                warn!(written = self.table.written_count(), expected, "Writer cancelled");
                return Err(LoggerError::Incomplete {
                    written: self.table.written_count(),
                    expected,
                });
            }

            self.state = WriterState::ScanningReady;
            if let Err(e) = self.write_ready(slots) {
                self.state = WriterState::Aborted;
                on_abort();
                return Err(e);
            }

            if disconnected && !self.table.is_complete() {
                // Every producer is gone, so nothing else can arrive.
                self.state = WriterState::Aborted;
                return Err(LoggerError::Incomplete {
                    written: self.table.written_count(),
                    expected,
                });
            }
        }

        self.file.flush()?;
        self.state = WriterState::AllWritten;
        info!(
            lines = self.summary.lines_written,
            bytes = self.summary.bytes_written,
            "All lines written"
        );
        Ok(self.summary.clone())
    }

    fn write_ready(&mut self, slots: &ResultSlots) -> Result<(), LoggerError> {
        for index in self.first_pending..self.table.len() {
            if self.table.is_written(index) {
                continue;
            }
            let Some(info) = slots.get(index) else {
                continue;
            };

            if !info.valid {
                let reason = info
                    .error
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string());
                warn!(index, path = %info.full_path.display(), %reason, "Invalid file info, aborting");
                return Err(LoggerError::Extraction {
                    path: info.full_path.clone(),
                    reason,
                });
            }

            self.write_line(index, &info.to_line())?;
            self.summary.total_size_bytes += info.size_bytes;
            debug!(index, name = %info.short_name, "Line written");
        }
        Ok(())
    }
}
