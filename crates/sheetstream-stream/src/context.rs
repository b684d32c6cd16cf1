//! Collaborators and per-run options.

use std::sync::Arc;

use sheetstream_protocols::{
    AuthProvider, PromptDriver, ReportBuilder, ScreenSize, SheetsClient, SpreadsheetContext, WindowManager,
};

/// Everything the scheduler talks to, injected at construction.
#[derive(Clone)]
pub struct StreamContext {
    pub sheets: Arc<dyn SheetsClient>,
    pub windows: Arc<dyn WindowManager>,
    pub driver: Arc<dyn PromptDriver>,
    pub reports: Arc<dyn ReportBuilder>,
    pub auth: Arc<dyn AuthProvider>,
}

/// Options of one `process_task_stream` call.
#[derive(Debug, Clone, Default)]
pub struct StreamOptions {
    /// Replace windows and prompts with a randomised delay and a synthetic
    /// answer. Results are still written.
    pub test_mode: bool,
    /// Tab to bring back to the front when the stream ends.
    pub origin_tab: Option<u64>,
}

/// Fixed inputs shared by every job of a run.
#[derive(Debug, Clone)]
pub(crate) struct RunSettings {
    pub spreadsheet: SpreadsheetContext,
    pub test_mode: bool,
    pub screen: ScreenSize,
}
