//! Sheet layout conventions and AI URLs.

use serde::{Deserialize, Serialize};

/// How work rows are recognised below the special rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkRowMode {
    /// Any row with a non-blank cell.
    #[default]
    NonBlank,
    /// Column A must hold a positive integer.
    Numbered,
}

/// Row indices assumed when a sentinel label is missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultRows {
    #[serde(default = "default_menu_row")]
    pub menu: u32,
    #[serde(default = "default_ai_row")]
    pub ai: u32,
    #[serde(default = "default_model_row")]
    pub model: u32,
    #[serde(default = "default_function_row")]
    pub function: u32,
}

fn default_menu_row() -> u32 {
    1
}

fn default_ai_row() -> u32 {
    2
}

fn default_model_row() -> u32 {
    3
}

fn default_function_row() -> u32 {
    4
}

impl Default for DefaultRows {
    fn default() -> Self {
        Self {
            menu: default_menu_row(),
            ai: default_ai_row(),
            model: default_model_row(),
            function: default_function_row(),
        }
    }
}

/// Labels and phrases the structure analyzer looks for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureConfig {
    #[serde(default = "default_menu_label")]
    pub menu_label: String,
    #[serde(default = "default_ai_label")]
    pub ai_label: String,
    #[serde(default = "default_model_label")]
    pub model_label: String,
    #[serde(default = "default_function_label")]
    pub function_label: String,

    #[serde(default = "default_prompt_label")]
    pub prompt_label: String,
    #[serde(default = "default_answer_label")]
    pub answer_label: String,
    #[serde(default = "default_report_label")]
    pub report_label: String,
    #[serde(default = "default_log_label")]
    pub log_label: String,

    /// AI-row text marking a three-type fan-out group.
    #[serde(default = "default_three_type_label")]
    pub three_type_label: String,

    #[serde(default = "default_row_only")]
    pub row_only_phrase: String,
    #[serde(default = "default_row_from")]
    pub row_from_phrase: String,
    #[serde(default = "default_row_until")]
    pub row_until_phrase: String,
    #[serde(default = "default_column_only")]
    pub column_only_phrase: String,
    #[serde(default = "default_column_from")]
    pub column_from_phrase: String,
    #[serde(default = "default_column_until")]
    pub column_until_phrase: String,

    /// Column holding row-scope directives.
    #[serde(default = "default_control_column")]
    pub control_column: String,

    /// Rows scanned for sentinel labels.
    #[serde(default = "default_scan_rows")]
    pub scan_rows: u32,

    #[serde(default)]
    pub work_row_mode: WorkRowMode,

    #[serde(default = "default_max_prompt_columns")]
    pub max_prompt_columns: usize,

    /// Emit deferred prompts resolved right before sending.
    #[serde(default)]
    pub resolve_prompts_at_execution: bool,

    #[serde(default)]
    pub default_rows: DefaultRows,
}

fn default_menu_label() -> String {
    "menu".to_string()
}

fn default_ai_label() -> String {
    "ai".to_string()
}

fn default_model_label() -> String {
    "model".to_string()
}

fn default_function_label() -> String {
    "function".to_string()
}

fn default_prompt_label() -> String {
    "prompt".to_string()
}

fn default_answer_label() -> String {
    "answer".to_string()
}

fn default_report_label() -> String {
    "reportify".to_string()
}

fn default_log_label() -> String {
    "log".to_string()
}

fn default_three_type_label() -> String {
    "3 kinds (ChatGPT/Gemini/Claude)".to_string()
}

fn default_row_only() -> String {
    "only this row".to_string()
}

fn default_row_from() -> String {
    "from this row".to_string()
}

fn default_row_until() -> String {
    "stop after this row".to_string()
}

fn default_column_only() -> String {
    "only this column".to_string()
}

fn default_column_from() -> String {
    "from this column".to_string()
}

fn default_column_until() -> String {
    "stop after this column".to_string()
}

fn default_control_column() -> String {
    "B".to_string()
}

fn default_scan_rows() -> u32 {
    10
}

fn default_max_prompt_columns() -> usize {
    5
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            menu_label: default_menu_label(),
            ai_label: default_ai_label(),
            model_label: default_model_label(),
            function_label: default_function_label(),
            prompt_label: default_prompt_label(),
            answer_label: default_answer_label(),
            report_label: default_report_label(),
            log_label: default_log_label(),
            three_type_label: default_three_type_label(),
            row_only_phrase: default_row_only(),
            row_from_phrase: default_row_from(),
            row_until_phrase: default_row_until(),
            column_only_phrase: default_column_only(),
            column_from_phrase: default_column_from(),
            column_until_phrase: default_column_until(),
            control_column: default_control_column(),
            scan_rows: default_scan_rows(),
            work_row_mode: WorkRowMode::default(),
            max_prompt_columns: default_max_prompt_columns(),
            resolve_prompts_at_execution: false,
            default_rows: DefaultRows::default(),
        }
    }
}

/// Landing URL per AI service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlConfig {
    #[serde(default = "default_chatgpt_url")]
    pub chatgpt: String,
    #[serde(default = "default_claude_url")]
    pub claude: String,
    #[serde(default = "default_gemini_url")]
    pub gemini: String,
    #[serde(default = "default_genspark_url")]
    pub genspark: String,
}

fn default_chatgpt_url() -> String {
    "https://chatgpt.com/".to_string()
}

fn default_claude_url() -> String {
    "https://claude.ai/new".to_string()
}

fn default_gemini_url() -> String {
    "https://gemini.google.com/app".to_string()
}

fn default_genspark_url() -> String {
    "https://www.genspark.ai/agents?type=moa_chat".to_string()
}

impl UrlConfig {
    /// Base URL for an AI key (`chatgpt`, `claude`, ...).
    pub fn base_for(&self, key: &str) -> Option<&str> {
        match key {
            "chatgpt" => Some(&self.chatgpt),
            "claude" => Some(&self.claude),
            "gemini" => Some(&self.gemini),
            "genspark" => Some(&self.genspark),
            _ => None,
        }
    }
}

impl Default for UrlConfig {
    fn default() -> Self {
        Self {
            chatgpt: default_chatgpt_url(),
            claude: default_claude_url(),
            gemini: default_gemini_url(),
            genspark: default_genspark_url(),
        }
    }
}
