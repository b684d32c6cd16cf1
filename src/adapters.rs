//! Dry-run collaborators and path helpers for the CLI.
//!
//! The CLI never drives a real browser: windows are counted, prompts are
//! echoed back, and reports are built from the answer's first line.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use sheetstream_protocols::{
    AuthProvider, PortError, PromptDriver, PromptRequest, PromptResponse, ReportBuilder,
    ReportTask, ScreenSize, WindowBounds, WindowHandle, WindowManager,
};

/// Get the .sheetstream directory path.
pub(crate) fn sheetstream_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".sheetstream"))
        .unwrap_or_else(|| PathBuf::from(".sheetstream"))
}

/// Window manager that only hands out ids.
#[derive(Default)]
pub(crate) struct SimulatedWindows {
    next_id: AtomicU64,
}

#[async_trait]
impl WindowManager for SimulatedWindows {
    async fn open_window(&self, url: &str, bounds: WindowBounds) -> Result<WindowHandle, PortError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            "Window {} opened at {} ({}x{}+{}+{})",
            id, url, bounds.width, bounds.height, bounds.left, bounds.top
        );
        Ok(WindowHandle { window_id: id, tab_id: id })
    }

    async fn close_window(&self, window_id: u64) -> Result<(), PortError> {
        debug!("Window {} closed", window_id);
        Ok(())
    }

    async fn screen_bounds(&self) -> Result<ScreenSize, PortError> {
        Ok(ScreenSize { width: 1920, height: 1080 })
    }
}

/// Prompt driver that answers with the prompt itself after a short pause.
pub(crate) struct EchoDriver {
    pub delay: Duration,
}

#[async_trait]
impl PromptDriver for EchoDriver {
    async fn is_ready(&self, _tab_id: u64) -> Result<bool, PortError> {
        Ok(true)
    }

    async fn send_prompt(
        &self,
        tab_id: u64,
        request: &PromptRequest,
        _timeout: Duration,
    ) -> Result<PromptResponse, PortError> {
        debug!("Tab {} received {} chars for {}", tab_id, request.text.len(), request.ai);
        tokio::time::sleep(self.delay).await;
        Ok(PromptResponse {
            success: true,
            text: format!("[dry run] {}: {}", request.ai, request.text),
        })
    }
}

pub(crate) struct FirstLineReports;

#[async_trait]
impl ReportBuilder for FirstLineReports {
    async fn build_report(&self, task: &ReportTask, answer: &str) -> Result<String, PortError> {
        let headline = answer.lines().next().unwrap_or_default().trim();
        Ok(format!("Report from {}: {}", task.source, headline))
    }
}

pub(crate) struct StaticAuth;

#[async_trait]
impl AuthProvider for StaticAuth {
    async fn token(&self) -> Result<String, PortError> {
        Ok("dry-run".to_string())
    }
}
