//! Work items produced by the planner and consumed by the scheduler.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ai::AiType;
use crate::cell::{column_letter, CellRef};

/// Stable task identity: cell plus the emission sequence of the plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(cell: CellRef, task_type: TaskType, seq: usize) -> Self {
        let tag = match task_type {
            TaskType::Ai => "ai",
            TaskType::Report => "report",
        };
        Self(format!("{cell}-{tag}-{seq}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Ai,
    Report,
}

/// Column group kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    /// One prompt, one answer column.
    Single,
    /// One prompt fanned out to three AI answer columns.
    ThreeType,
    /// Standalone report column fed by an answer column on its left.
    Report,
}

impl GroupKind {
    pub fn tag(&self) -> &'static str {
        match self {
            GroupKind::Single => "single",
            GroupKind::ThreeType => "three",
            GroupKind::Report => "report",
        }
    }
}

/// Reference to the column group a task belongs to.
///
/// `anchor` is the leftmost column of the group (first prompt column, or the
/// report column for report-only groups). Groups never overlap, so the anchor
/// identifies the group and orders groups left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupRef {
    pub anchor: u32,
    pub kind: GroupKind,
}

impl GroupRef {
    /// Deterministic per-row unit id: row, kind and anchor column.
    pub fn unit_id(&self, row: u32) -> String {
        format!("{}-{}-{}", row, self.kind.tag(), column_letter(self.anchor))
    }

    pub fn label(&self) -> String {
        format!("{}:{}", self.kind.tag(), column_letter(self.anchor))
    }
}

/// Prompt text of an AI task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Prompt {
    /// Already joined at plan time.
    Text { text: String },
    /// Read and joined from these columns of the task's row right before sending.
    Deferred { columns: Vec<u32> },
}

impl Prompt {
    pub fn text(text: impl Into<String>) -> Self {
        Prompt::Text { text: text.into() }
    }
}

/// Send a prompt to one AI and write its answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiTask {
    pub id: TaskId,
    /// Answer cell.
    pub cell: CellRef,
    pub ai: AiType,
    pub prompt: Prompt,
    pub prompt_columns: Vec<u32>,
    pub group: GroupRef,
    pub group_id: String,
    pub multi_ai: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Special operation such as "Deep Research".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_column: Option<u32>,
}

/// Build a report from an answer that is already in the sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportTask {
    pub id: TaskId,
    /// Report cell.
    pub cell: CellRef,
    /// Answer cell the report is synthesised from.
    pub source: CellRef,
    pub group: GroupRef,
    pub group_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Task {
    Ai(AiTask),
    Report(ReportTask),
}

impl Task {
    pub fn id(&self) -> &TaskId {
        match self {
            Task::Ai(t) => &t.id,
            Task::Report(t) => &t.id,
        }
    }

    pub fn cell(&self) -> CellRef {
        match self {
            Task::Ai(t) => t.cell,
            Task::Report(t) => t.cell,
        }
    }

    pub fn row(&self) -> u32 {
        self.cell().row
    }

    pub fn group(&self) -> GroupRef {
        match self {
            Task::Ai(t) => t.group,
            Task::Report(t) => t.group,
        }
    }

    pub fn group_id(&self) -> &str {
        match self {
            Task::Ai(t) => &t.group_id,
            Task::Report(t) => &t.group_id,
        }
    }

    pub fn task_type(&self) -> TaskType {
        match self {
            Task::Ai(_) => TaskType::Ai,
            Task::Report(_) => TaskType::Report,
        }
    }

    pub fn is_multi_ai(&self) -> bool {
        matches!(self, Task::Ai(t) if t.multi_ai)
    }

    pub fn as_ai(&self) -> Option<&AiTask> {
        match self {
            Task::Ai(t) => Some(t),
            Task::Report(_) => None,
        }
    }
}
