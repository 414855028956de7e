//! Ordered logging pipeline.
//!
//! - **Offsets**: per-line byte positions and mid-file insertion via [`offsets`]
//! - **Writer**: the single owner of the log file via [`writer::OrderedLogWriter`]
//! - **Session**: task-list building and run orchestration via [`session::FileInfoLogger`]

pub mod offsets;
pub mod session;
pub mod writer;

pub use offsets::{insert_at, OffsetTable};
pub use session::{build_task_list, FileInfoLogger};
pub use writer::{
    completion_channel, CompletionSender, OrderedLogWriter, ResultSlots, WriteSummary,
    WriterState,
};
