//! Progress snapshots exposed to the host.

use serde::Serialize;

/// Lifecycle of one column group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnPhase {
    /// Waiting for its cursor row to be released by the columns on its left.
    Idle,
    /// Claiming the row's log cell.
    Claiming,
    Running,
    /// Some of the row's tasks are done, the rest are still in flight.
    AwaitingWrite,
    /// No rows left.
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnProgress {
    pub group_id: String,
    /// Answer and report column letters.
    pub columns: Vec<String>,
    pub state: ColumnPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_row: Option<u32>,
    /// Rows finished.
    pub completed: usize,
    /// Rows planned.
    pub total: usize,
}

/// Live view of a stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamStatus {
    pub is_processing: bool,
    pub active_windows: usize,
    /// Tasks not yet started.
    pub queue_length: usize,
    /// Tasks whose answer was produced.
    pub processed: usize,
    /// Tasks not yet finished, started or not.
    pub pending: usize,
    /// Failed attempts, including ones later retried.
    pub errored: usize,
    pub abandoned: usize,
    pub deferred: usize,
    pub persistence_failures: usize,
    pub per_column: Vec<ColumnProgress>,
}

/// Result of [`crate::StreamScheduler::process_task_stream`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamSummary {
    pub success: bool,
    /// Group labels of the columns that ran to completion.
    pub processed_columns: Vec<String>,
    /// Windows opened over the whole stream.
    pub total_windows: usize,
    pub completed: usize,
    pub failed: usize,
    pub deferred: usize,
    pub persistence_failures: usize,
    pub stopped: bool,
}
