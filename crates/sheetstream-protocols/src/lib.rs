//! # Sheetstream Protocols
//!
//! Shared vocabulary for the sheetstream crates.
//! Contains the cell/grid/task types and the collaborator ports the
//! scheduler drives; the only implementation shipped here is the
//! in-memory sheet used for dry runs and tests.
//!
//! ## Core Ports
//!
//! - [`SheetsClient`] - Read ranges from and write cells to a spreadsheet
//! - [`AuthProvider`] - Bearer token supply
//! - [`WindowManager`] - Open/close browser windows and query the screen
//! - [`PromptDriver`] - Send a prompt into a ready tab and await the answer
//! - [`ReportBuilder`] - Turn an existing answer into a report

pub mod ai;
pub mod cell;
pub mod error;
pub mod grid;
pub mod memory;
pub mod ports;
pub mod task;

pub use ai::AiType;
pub use cell::{column_index, column_letter, CellRange, CellRef};
pub use error::PortError;
pub use grid::Grid;
pub use memory::MemorySheet;
pub use ports::{
    AuthProvider, PromptDriver, PromptRequest, PromptResponse, ReportBuilder, ScreenSize,
    SheetsClient, SpreadsheetContext, WindowBounds, WindowHandle, WindowManager,
};
pub use task::{AiTask, GroupKind, GroupRef, Prompt, ReportTask, Task, TaskId, TaskType};
