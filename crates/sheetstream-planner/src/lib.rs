//! # Sheetstream Planner
//!
//! Turns a semi-structured sheet into an ordered work plan.
//!
//! 1. [`StructureAnalyzer`] finds the special rows, the column groups and the
//!    row/column control directives.
//! 2. [`TaskGenerator`] walks groups left to right and rows top to bottom and
//!    emits one task per unanswered answer cell, plus report tasks.
//!
//! Column-major, row-ascending output order is what the scheduler's
//! wavefront relies on.

pub mod directive;
pub mod generator;
pub mod structure;

pub use directive::{ControlDirective, ControlSet, DirectiveKind, DirectiveParser, DirectiveScope, Selection};
pub use generator::{is_answered, GenerationReport, TaskGenerator};
pub use structure::{AnswerColumn, ColumnGroup, SheetStructure, SpecialRows, StructureAnalyzer, StructureWarning};
