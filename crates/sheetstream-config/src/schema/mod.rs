//! Configuration schema definitions.

use serde::{Deserialize, Serialize};

mod schema_runtime;
mod schema_structure;

pub use schema_runtime::*;
pub use schema_structure::*;

/// Shared default helper used by submodules.
pub(crate) fn default_true() -> bool {
    true
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sheet: SheetConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub exclusive: ExclusiveConfig,

    #[serde(default)]
    pub structure: StructureConfig,

    #[serde(default)]
    pub urls: UrlConfig,
}

/// Target spreadsheet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SheetConfig {
    #[serde(default)]
    pub spreadsheet_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_gid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_name: Option<String>,
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
