//! # Sheetstream Stream
//!
//! Parallel streaming scheduler for spreadsheet-driven AI chat automation.
//!
//! Each column group owns a cursor over its rows. A row of one column starts
//! only after every column to its left has settled that row, so work flows
//! through the sheet as a diagonal wavefront while at most
//! `max_concurrent_windows` browser windows are open.
//!
//! ## Components
//!
//! - [`StreamScheduler`] - Event loop, stop and status
//! - [`TaskExecutor`] - Opens a window, sends the prompt, writes the answer
//! - [`ResultWriter`] - Answers, failure text, log sections and claim markers
//! - [`SlotTable`] - Window positions on screen

pub mod context;
pub mod error;
pub mod executor;
pub mod log_entry;
pub mod scheduler;
pub mod slot;
pub mod status;
pub mod url;
pub mod writer;

mod state;

pub use context::{StreamContext, StreamOptions};
pub use error::{StreamError, TaskError};
pub use executor::{OpenWindows, TaskExecutor, TaskOutcome};
pub use log_entry::{merge_log, LogSection};
pub use scheduler::StreamScheduler;
pub use slot::{quadrant, SlotTable};
pub use status::{ColumnPhase, ColumnProgress, StreamStatus, StreamSummary};
pub use crate::url::url_for;
pub use writer::{ClaimOutcome, ResultWriter};
