//! Sheet structure analysis.
//!
//! Locates the special rows by their column-A labels, scans the menu row
//! left to right into [`ColumnGroup`]s and collects control directives.

use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use sheetstream_config::StructureConfig;
use sheetstream_protocols::{column_index, column_letter, AiType, GroupKind, GroupRef, Grid};

use crate::directive::{ControlSet, DirectiveParser, DirectiveScope};

/// One-based indices of the sentinel rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpecialRows {
    pub menu: u32,
    pub ai: u32,
    pub model: u32,
    pub function: u32,
}

impl SpecialRows {
    /// Last special row; work rows start below it.
    pub fn last(&self) -> u32 {
        self.menu.max(self.ai).max(self.model).max(self.function)
    }
}

/// An answer column and the per-column overrides read from the special rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerColumn {
    pub ai: AiType,
    pub column: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,
}

/// Contiguous span of columns processed together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnGroup {
    pub group: GroupRef,
    pub prompt_columns: Vec<u32>,
    /// In fixed AI order for three-type groups.
    pub answer_columns: Vec<AnswerColumn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_column: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_column: Option<u32>,
    /// Answer column feeding a report-only group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_column: Option<u32>,
}

impl ColumnGroup {
    pub fn kind(&self) -> GroupKind {
        self.group.kind
    }

    pub fn is_multi_ai(&self) -> bool {
        self.group.kind == GroupKind::ThreeType
    }

    /// Inclusive column span covered by the group.
    pub fn span(&self) -> (u32, u32) {
        let columns = self
            .prompt_columns
            .iter()
            .copied()
            .chain(self.answer_columns.iter().map(|a| a.column))
            .chain(self.report_column)
            .chain(self.log_column);
        let (mut start, mut end) = (u32::MAX, 0);
        for column in columns {
            start = start.min(column);
            end = end.max(column);
        }
        if start == u32::MAX {
            (self.group.anchor, self.group.anchor)
        } else {
            (start, end)
        }
    }

    /// Answer column whose content gates the report.
    pub fn report_source(&self) -> Option<u32> {
        self.source_column
            .or_else(|| self.answer_columns.first().map(|a| a.column))
    }
}

/// Non-fatal findings about the sheet layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructureWarning {
    MissingSpecialRow { label: String, assumed_row: u32 },
    InvalidControlColumn { value: String },
    TooManyPromptColumns { column: u32 },
    GroupWithoutAnswer { column: u32 },
    StrayAnswer { column: u32 },
    ReportWithoutSource { column: u32 },
    UnknownAi { column: u32, text: String },
    ExtraAnswerColumn { column: u32 },
    /// A three-type group whose answer labels are out of order.
    MisplacedAnswer { column: u32, ai: AiType },
    /// A three-type group lacking an answer column for `ai`.
    MissingAnswer { anchor: u32, ai: AiType },
}

impl fmt::Display for StructureWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructureWarning::MissingSpecialRow { label, assumed_row } => {
                write!(f, "'{label}' row not found, assuming row {assumed_row}")
            }
            StructureWarning::InvalidControlColumn { value } => {
                write!(f, "control column '{value}' is not a column letter, using B")
            }
            StructureWarning::TooManyPromptColumns { column } => {
                write!(f, "prompt column {} exceeds the per-group limit", column_letter(*column))
            }
            StructureWarning::GroupWithoutAnswer { column } => {
                write!(f, "prompt at {} has no answer column", column_letter(*column))
            }
            StructureWarning::StrayAnswer { column } => {
                write!(f, "answer column {} has no prompt", column_letter(*column))
            }
            StructureWarning::ReportWithoutSource { column } => {
                write!(f, "report column {} has no answer column to its left", column_letter(*column))
            }
            StructureWarning::UnknownAi { column, text } => {
                write!(f, "unrecognised AI '{text}' at {}, using ChatGPT", column_letter(*column))
            }
            StructureWarning::ExtraAnswerColumn { column } => {
                write!(f, "extra answer column {} ignored", column_letter(*column))
            }
            StructureWarning::MisplacedAnswer { column, ai } => {
                write!(f, "{ai} answer at {} is out of order", column_letter(*column))
            }
            StructureWarning::MissingAnswer { anchor, ai } => {
                write!(f, "three-type group at {} has no {ai} answer", column_letter(*anchor))
            }
        }
    }
}

/// Result of [`StructureAnalyzer::analyze`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetStructure {
    pub special_rows: SpecialRows,
    /// Ordered by anchor column.
    pub groups: Vec<ColumnGroup>,
    pub controls: ControlSet,
    pub warnings: Vec<StructureWarning>,
}

#[derive(Debug, Default)]
struct PendingGroup {
    prompts: Vec<u32>,
    answers: Vec<(u32, Option<AiType>)>,
    report: Option<u32>,
    log: Option<u32>,
}

pub struct StructureAnalyzer {
    config: StructureConfig,
    directives: DirectiveParser,
}

impl StructureAnalyzer {
    pub fn new(config: StructureConfig) -> Self {
        let directives = DirectiveParser::new(&config);
        Self { config, directives }
    }

    pub fn config(&self) -> &StructureConfig {
        &self.config
    }

    pub fn analyze(&self, grid: &Grid) -> SheetStructure {
        let mut warnings = Vec::new();
        let special_rows = self.find_special_rows(grid, &mut warnings);
        let groups = self.scan_groups(grid, &special_rows, &mut warnings);
        let controls = self.collect_controls(grid, &special_rows, &mut warnings);

        for warning in &warnings {
            warn!("Sheet structure: {}", warning);
        }
        debug!(
            "Analyzed sheet: {} groups, {} directives, work rows start at {}",
            groups.len(),
            controls.directives().len(),
            special_rows.last() + 1
        );

        SheetStructure {
            special_rows,
            groups,
            controls,
            warnings,
        }
    }

    fn find_special_rows(&self, grid: &Grid, warnings: &mut Vec<StructureWarning>) -> SpecialRows {
        let defaults = &self.config.default_rows;
        let mut find = |label: &str, fallback: u32| -> u32 {
            let wanted = label.trim().to_lowercase();
            let limit = self.config.scan_rows.min(grid.row_count());
            match (1..=limit).find(|&row| grid.value(row, 0).trim().to_lowercase() == wanted) {
                Some(row) => row,
                None => {
                    warnings.push(StructureWarning::MissingSpecialRow {
                        label: label.to_string(),
                        assumed_row: fallback,
                    });
                    fallback
                }
            }
        };
        SpecialRows {
            menu: find(&self.config.menu_label, defaults.menu),
            ai: find(&self.config.ai_label, defaults.ai),
            model: find(&self.config.model_label, defaults.model),
            function: find(&self.config.function_label, defaults.function),
        }
    }

    fn scan_groups(
        &self,
        grid: &Grid,
        rows: &SpecialRows,
        warnings: &mut Vec<StructureWarning>,
    ) -> Vec<ColumnGroup> {
        let prompt_label = self.config.prompt_label.trim().to_lowercase();
        let answer_label = self.config.answer_label.trim().to_lowercase();
        let report_label = self.config.report_label.trim().to_lowercase();
        let log_label = self.config.log_label.trim().to_lowercase();

        let mut groups = Vec::new();
        let mut pending: Option<PendingGroup> = None;
        let mut held_log: Option<u32> = None;
        let mut last_answer: Option<u32> = None;

        // Column A holds the row labels.
        for column in 1..grid.width() {
            let header = grid.value(rows.menu, column).trim().to_lowercase();

            if !prompt_label.is_empty() && header.starts_with(&prompt_label) {
                match pending.as_mut() {
                    Some(group) if group.answers.is_empty() => {
                        if group.prompts.len() < self.config.max_prompt_columns {
                            group.prompts.push(column);
                        } else {
                            warnings.push(StructureWarning::TooManyPromptColumns { column });
                        }
                    }
                    _ => {
                        self.close(grid, rows, pending.take(), &mut groups, warnings);
                        pending = Some(PendingGroup {
                            prompts: vec![column],
                            log: held_log.take(),
                            ..Default::default()
                        });
                    }
                }
            } else if !report_label.is_empty() && header.contains(&report_label) {
                match pending.as_mut() {
                    Some(group) if !group.answers.is_empty() && group.report.is_none() => {
                        group.report = Some(column);
                    }
                    _ => {
                        self.close(grid, rows, pending.take(), &mut groups, warnings);
                        match last_answer {
                            Some(source) => groups.push(ColumnGroup {
                                group: GroupRef {
                                    anchor: column,
                                    kind: GroupKind::Report,
                                },
                                prompt_columns: Vec::new(),
                                answer_columns: Vec::new(),
                                report_column: Some(column),
                                log_column: None,
                                source_column: Some(source),
                            }),
                            None => warnings.push(StructureWarning::ReportWithoutSource { column }),
                        }
                    }
                }
            } else if !answer_label.is_empty() && header.contains(&answer_label) {
                match pending.as_mut() {
                    Some(group) if group.report.is_none() => {
                        group.answers.push((column, AiType::from_label(&header)));
                    }
                    _ => {
                        self.close(grid, rows, pending.take(), &mut groups, warnings);
                        warnings.push(StructureWarning::StrayAnswer { column });
                    }
                }
                last_answer = Some(column);
            } else if !log_label.is_empty() && header == log_label {
                match pending.as_mut() {
                    Some(group) if group.answers.is_empty() && group.log.is_none() => {
                        group.log = Some(column);
                    }
                    _ => {
                        self.close(grid, rows, pending.take(), &mut groups, warnings);
                        held_log = Some(column);
                    }
                }
            } else {
                self.close(grid, rows, pending.take(), &mut groups, warnings);
                held_log = None;
            }
        }
        self.close(grid, rows, pending.take(), &mut groups, warnings);

        groups.sort_by_key(|g| g.group.anchor);
        groups
    }

    fn close(
        &self,
        grid: &Grid,
        rows: &SpecialRows,
        pending: Option<PendingGroup>,
        groups: &mut Vec<ColumnGroup>,
        warnings: &mut Vec<StructureWarning>,
    ) {
        let Some(pending) = pending else {
            return;
        };
        let Some(&anchor) = pending.prompts.first() else {
            return;
        };
        if pending.answers.is_empty() {
            warnings.push(StructureWarning::GroupWithoutAnswer { column: anchor });
            return;
        }

        let ai_cell = grid.value(rows.ai, anchor);
        let kind = if self.is_three_type(ai_cell) {
            GroupKind::ThreeType
        } else {
            GroupKind::Single
        };

        let assigned = match kind {
            GroupKind::ThreeType => assign_three_type(anchor, &pending.answers, warnings),
            _ => {
                let (column, header_ai) = pending.answers[0];
                for &(extra, _) in &pending.answers[1..] {
                    warnings.push(StructureWarning::ExtraAnswerColumn { column: extra });
                }
                let ai_text = if ai_cell.trim().is_empty() {
                    grid.value(rows.ai, column)
                } else {
                    ai_cell
                };
                let ai = header_ai.unwrap_or_else(|| single_ai(ai_text, anchor, warnings));
                vec![(ai, column)]
            }
        };

        let answer_columns = assigned
            .into_iter()
            .map(|(ai, column)| AnswerColumn {
                ai,
                column,
                model: override_cell(grid, rows.model, column, anchor),
                feature: override_cell(grid, rows.function, column, anchor),
            })
            .collect();

        groups.push(ColumnGroup {
            group: GroupRef { anchor, kind },
            prompt_columns: pending.prompts,
            answer_columns,
            report_column: pending.report,
            log_column: pending.log,
            source_column: None,
        });
    }

    fn is_three_type(&self, ai_cell: &str) -> bool {
        let text = ai_cell.trim().to_lowercase();
        if text.is_empty() {
            return false;
        }
        let label = self.config.three_type_label.trim().to_lowercase();
        (!label.is_empty() && text.contains(&label))
            || AiType::THREE_TYPE_ORDER
                .iter()
                .all(|ai| text.contains(&ai.label().to_lowercase()))
    }

    fn collect_controls(
        &self,
        grid: &Grid,
        rows: &SpecialRows,
        warnings: &mut Vec<StructureWarning>,
    ) -> ControlSet {
        let mut controls = ControlSet::default();

        let control_column = match column_index(&self.config.control_column) {
            Some(column) => column,
            None => {
                warnings.push(StructureWarning::InvalidControlColumn {
                    value: self.config.control_column.clone(),
                });
                1
            }
        };
        for row in 1..=grid.row_count() {
            if let Some(directive) =
                self.directives
                    .parse(DirectiveScope::Row, grid.value(row, control_column), row)
            {
                controls.push(directive);
            }
        }

        for row in 1..=rows.last().min(grid.row_count()) {
            for column in 1..grid.width() {
                if let Some(directive) =
                    self.directives
                        .parse(DirectiveScope::Column, grid.value(row, column), column)
                {
                    controls.push(directive);
                }
            }
        }

        controls
    }
}

impl Default for StructureAnalyzer {
    fn default() -> Self {
        Self::new(StructureConfig::default())
    }
}

/// Map answer columns onto ChatGPT, Claude, Gemini.
///
/// Labelled columns claim their AI; generic columns fill the remaining AIs in
/// fixed order. Missing AIs are warned about and the group is kept.
fn assign_three_type(
    anchor: u32,
    answers: &[(u32, Option<AiType>)],
    warnings: &mut Vec<StructureWarning>,
) -> Vec<(AiType, u32)> {
    let order = AiType::THREE_TYPE_ORDER;
    let mut slots: [Option<u32>; 3] = [None; 3];
    let mut generic = Vec::new();

    for (position, &(column, label)) in answers.iter().enumerate() {
        match label.and_then(|ai| order.iter().position(|o| *o == ai)) {
            Some(index) if slots[index].is_none() => {
                if index != position {
                    warnings.push(StructureWarning::MisplacedAnswer {
                        column,
                        ai: order[index],
                    });
                }
                slots[index] = Some(column);
            }
            _ => generic.push(column),
        }
    }

    let mut generic = generic.into_iter();
    for slot in slots.iter_mut().filter(|s| s.is_none()) {
        match generic.next() {
            Some(column) => *slot = Some(column),
            None => break,
        }
    }
    for column in generic {
        warnings.push(StructureWarning::ExtraAnswerColumn { column });
    }

    order
        .iter()
        .zip(slots)
        .filter_map(|(ai, slot)| match slot {
            Some(column) => Some((*ai, column)),
            None => {
                warnings.push(StructureWarning::MissingAnswer { anchor, ai: *ai });
                None
            }
        })
        .collect()
}

fn single_ai(ai_cell: &str, column: u32, warnings: &mut Vec<StructureWarning>) -> AiType {
    let text = ai_cell.trim();
    if text.is_empty() {
        return AiType::default();
    }
    AiType::from_label(text).unwrap_or_else(|| {
        warnings.push(StructureWarning::UnknownAi {
            column,
            text: text.to_string(),
        });
        AiType::default()
    })
}

/// Special-row value at the answer column, else at the prompt column.
fn override_cell(grid: &Grid, row: u32, column: u32, anchor: u32) -> Option<String> {
    [column, anchor]
        .into_iter()
        .map(|c| grid.value(row, c).trim())
        .find(|v| !v.is_empty())
        .map(String::from)
}

#[cfg(test)]
#[path = "structure_tests.rs"]
mod tests;
