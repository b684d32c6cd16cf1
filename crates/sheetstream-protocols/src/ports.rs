//! Collaborator ports consumed by the scheduler.
//!
//! Each port is a narrow async trait so hosts can plug in REST clients,
//! browser automation or in-memory fakes.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ai::AiType;
use crate::cell::{CellRange, CellRef};
use crate::error::PortError;
use crate::task::ReportTask;

/// Which spreadsheet and sheet the stream reads and writes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadsheetContext {
    pub spreadsheet_id: String,
    #[serde(default)]
    pub sheet_gid: Option<String>,
    #[serde(default)]
    pub sheet_name: Option<String>,
}

impl SpreadsheetContext {
    pub fn new(spreadsheet_id: impl Into<String>) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            ..Default::default()
        }
    }
}

/// Spreadsheet access.
#[async_trait]
pub trait SheetsClient: Send + Sync {
    /// Read an A1 range as rows of strings.
    async fn read_range(
        &self,
        ctx: &SpreadsheetContext,
        range: &str,
    ) -> Result<Vec<Vec<String>>, PortError>;

    /// Write one cell; returns once the write is acknowledged.
    async fn write_cell(
        &self,
        ctx: &SpreadsheetContext,
        cell: &str,
        value: &str,
    ) -> Result<(), PortError>;

    /// Read a single cell, empty when the range comes back empty.
    async fn read_cell(&self, ctx: &SpreadsheetContext, cell: CellRef) -> Result<String, PortError> {
        let range = CellRange::single(cell).to_string();
        let rows = self.read_range(ctx, &range).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|r| r.into_iter().next())
            .unwrap_or_default())
    }
}

/// Bearer token supply, refreshed transparently by the implementation.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn token(&self) -> Result<String, PortError>;
}

/// Screen dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

/// Window placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowBounds {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// Handle to an opened browser window and its single tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowHandle {
    pub window_id: u64,
    pub tab_id: u64,
}

/// Browser window management.
#[async_trait]
pub trait WindowManager: Send + Sync {
    async fn open_window(&self, url: &str, bounds: WindowBounds) -> Result<WindowHandle, PortError>;

    async fn close_window(&self, window_id: u64) -> Result<(), PortError>;

    async fn screen_bounds(&self) -> Result<ScreenSize, PortError>;

    /// Bring an existing tab to the front.
    async fn focus_tab(&self, tab_id: u64) -> Result<(), PortError> {
        let _ = tab_id;
        Ok(())
    }
}

/// A prompt bound for one AI tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    pub ai: AiType,
    pub text: String,
    pub model: Option<String>,
    pub feature: Option<String>,
}

/// What the hosted page returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptResponse {
    pub success: bool,
    pub text: String,
}

/// DOM-level automation of a hosted AI page, treated as atomic.
#[async_trait]
pub trait PromptDriver: Send + Sync {
    /// Whether the tab's content script has signalled readiness.
    async fn is_ready(&self, tab_id: u64) -> Result<bool, PortError>;

    async fn send_prompt(
        &self,
        tab_id: u64,
        request: &PromptRequest,
        timeout: Duration,
    ) -> Result<PromptResponse, PortError>;
}

/// Report synthesis from an existing answer.
#[async_trait]
pub trait ReportBuilder: Send + Sync {
    /// Returns the value to store in the report cell (a document link or text).
    async fn build_report(&self, task: &ReportTask, answer: &str) -> Result<String, PortError>;
}
