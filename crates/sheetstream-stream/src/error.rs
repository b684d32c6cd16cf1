//! Stream errors.

use std::time::Duration;

use thiserror::Error;

use sheetstream_exclusive::ExclusiveError;
use sheetstream_protocols::PortError;

/// Errors that abort a whole stream run.
#[derive(Debug, Error)]
pub enum StreamError {
    /// A stream is already being processed by this scheduler.
    #[error("Stream already running")]
    AlreadyRunning,

    /// No auth token could be obtained.
    #[error("Authentication failed: {0}")]
    Auth(#[source] PortError),

    /// The task list cannot be scheduled.
    #[error("Invalid task list: {0}")]
    InvalidTasks(String),

    /// Exclusive-control settings are unusable.
    #[error(transparent)]
    Exclusive(#[from] ExclusiveError),
}

/// Per-task failure, caught at the execution boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("Window creation failed: {0}")]
    WindowCreation(String),

    #[error("Tab {0} never became ready")]
    NotReady(u64),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Report failed: {0}")]
    Report(String),

    #[error("Prompt is empty")]
    EmptyPrompt,
}

impl TaskError {
    /// Window creation failures and empty prompts abort the task outright.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TaskError::WindowCreation(_) | TaskError::EmptyPrompt)
    }
}
