//! Task generation.
//!
//! Groups are visited left to right and rows top to bottom, so the emitted
//! list is column-major. Generation only reads the grid, so running it
//! twice over the same grid yields identical lists.

use serde::Serialize;
use tracing::{debug, info};

use sheetstream_config::{StructureConfig, WorkRowMode};
use sheetstream_protocols::{AiTask, CellRef, GroupKind, Grid, Prompt, ReportTask, Task, TaskId, TaskType};

use crate::directive::DirectiveScope;
use crate::structure::{ColumnGroup, SheetStructure, SpecialRows};

const FAILURE_MARKERS: [&str; 3] = ["error", "failed", "×"];

/// Whether a cell already holds a usable answer.
///
/// Blank cells and cells carrying an error marker are eligible for
/// (re)processing.
pub fn is_answered(value: &str) -> bool {
    let text = value.trim();
    if text.is_empty() {
        return false;
    }
    let lower = text.to_lowercase();
    !FAILURE_MARKERS.iter().any(|m| lower.contains(m))
}

/// Tasks plus counters describing what was left out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    pub tasks: Vec<Task>,
    pub work_rows: usize,
    pub skipped_rows: usize,
    pub skipped_groups: usize,
    pub skipped_empty_prompts: usize,
    pub skipped_answered: usize,
}

impl GenerationReport {
    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks
    }
}

pub struct TaskGenerator {
    work_row_mode: WorkRowMode,
    defer_prompts: bool,
}

impl TaskGenerator {
    pub fn new(config: &StructureConfig) -> Self {
        Self {
            work_row_mode: config.work_row_mode,
            defer_prompts: config.resolve_prompts_at_execution,
        }
    }

    pub fn generate(&self, grid: &Grid, structure: &SheetStructure) -> GenerationReport {
        let mut report = GenerationReport::default();

        let row_selection = structure.controls.selection(DirectiveScope::Row);
        let column_selection = structure.controls.selection(DirectiveScope::Column);

        let mut rows = Vec::new();
        for row in self.work_rows(grid, &structure.special_rows) {
            if row_selection.allows(row) {
                rows.push(row);
            } else {
                report.skipped_rows += 1;
            }
        }
        report.work_rows = rows.len();

        for group in &structure.groups {
            let (start, end) = group.span();
            if !column_selection.allows_span(start, end) {
                debug!("Group {} skipped by column directive", group.group.label());
                report.skipped_groups += 1;
                continue;
            }
            for &row in &rows {
                self.emit_row(grid, group, row, &mut report);
            }
        }

        info!(
            "Generated {} tasks over {} rows ({} answered, {} empty prompts, {} groups skipped)",
            report.tasks.len(),
            report.work_rows,
            report.skipped_answered,
            report.skipped_empty_prompts,
            report.skipped_groups
        );
        report
    }

    fn work_rows(&self, grid: &Grid, special: &SpecialRows) -> Vec<u32> {
        let width = grid.width();
        ((special.last() + 1)..=grid.row_count())
            .filter(|&row| match self.work_row_mode {
                WorkRowMode::NonBlank => (0..width).any(|c| !grid.value(row, c).trim().is_empty()),
                WorkRowMode::Numbered => grid
                    .value(row, 0)
                    .trim()
                    .parse::<u64>()
                    .is_ok_and(|n| n > 0),
            })
            .collect()
    }

    fn emit_row(&self, grid: &Grid, group: &ColumnGroup, row: u32, report: &mut GenerationReport) {
        let unit = group.group.unit_id(row);

        if group.kind() != GroupKind::Report {
            let parts: Vec<&str> = group
                .prompt_columns
                .iter()
                .map(|&c| grid.value(row, c).trim())
                .filter(|v| !v.is_empty())
                .collect();
            if parts.is_empty() {
                report.skipped_empty_prompts += 1;
                return;
            }
            let prompt = if self.defer_prompts {
                Prompt::Deferred {
                    columns: group.prompt_columns.clone(),
                }
            } else {
                Prompt::text(parts.join("\n"))
            };

            for answer in &group.answer_columns {
                let cell = CellRef::new(answer.column, row);
                if is_answered(grid.get(cell)) {
                    report.skipped_answered += 1;
                    continue;
                }
                let seq = report.tasks.len();
                report.tasks.push(Task::Ai(AiTask {
                    id: TaskId::new(cell, TaskType::Ai, seq),
                    cell,
                    ai: answer.ai,
                    prompt: prompt.clone(),
                    prompt_columns: group.prompt_columns.clone(),
                    group: group.group,
                    group_id: unit.clone(),
                    multi_ai: group.is_multi_ai(),
                    model: answer.model.clone(),
                    feature: answer.feature.clone(),
                    log_column: group.log_column,
                }));
            }
        }

        if let (Some(report_column), Some(source_column)) = (group.report_column, group.report_source()) {
            let cell = CellRef::new(report_column, row);
            let source = CellRef::new(source_column, row);
            if is_answered(grid.get(source)) && grid.get(cell).trim().is_empty() {
                let seq = report.tasks.len();
                report.tasks.push(Task::Report(ReportTask {
                    id: TaskId::new(cell, TaskType::Report, seq),
                    cell,
                    source,
                    group: group.group,
                    group_id: unit,
                }));
            }
        }
    }
}

impl Default for TaskGenerator {
    fn default() -> Self {
        Self::new(&StructureConfig::default())
    }
}

#[cfg(test)]
#[path = "generator_tests.rs"]
mod tests;
