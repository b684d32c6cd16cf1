//! Result writer: answers, failure text, log sections and claim markers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use sheetstream_exclusive::{ClaimState, ExclusiveGuard};
use sheetstream_protocols::{CellRef, PortError, SheetsClient, SpreadsheetContext};

use crate::error::TaskError;
use crate::log_entry::{merge_log, LogSection};

/// Result of claiming a row's log cell.
#[derive(Debug)]
pub enum ClaimOutcome {
    Claimed,
    /// Another worker holds a live marker.
    Deferred { holder: String, wait: Duration },
    /// The cell could not be read or written; the row proceeds unclaimed.
    Unclaimed(PortError),
}

/// Serialises every write to a log cell so read-merge-write never loses a
/// concurrent section.
pub struct ResultWriter {
    sheets: Arc<dyn SheetsClient>,
    guard: Arc<ExclusiveGuard>,
    log_locks: Mutex<HashMap<CellRef, Arc<AsyncMutex<()>>>>,
}

impl ResultWriter {
    pub fn new(sheets: Arc<dyn SheetsClient>, guard: Arc<ExclusiveGuard>) -> Self {
        Self {
            sheets,
            guard,
            log_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn guard(&self) -> &ExclusiveGuard {
        &self.guard
    }

    pub async fn read(&self, ctx: &SpreadsheetContext, cell: CellRef) -> Result<String, PortError> {
        self.sheets.read_cell(ctx, cell).await
    }

    pub async fn write_answer(
        &self,
        ctx: &SpreadsheetContext,
        cell: CellRef,
        text: &str,
    ) -> Result<(), PortError> {
        debug!("Writing {} chars to {}", text.len(), cell);
        self.sheets.write_cell(ctx, &cell.to_string(), text).await
    }

    /// Write `"{failure_text}: {error}"` into an abandoned cell.
    pub async fn write_failure(
        &self,
        ctx: &SpreadsheetContext,
        cell: CellRef,
        failure_text: &str,
        error: &TaskError,
    ) -> Result<(), PortError> {
        let value = format!("{failure_text}: {error}");
        self.sheets.write_cell(ctx, &cell.to_string(), &value).await
    }

    /// Merge `section` into the log cell.
    ///
    /// A claim marker on the first line stays there; the row releases it
    /// once all of its tasks are done.
    pub async fn append_log(
        &self,
        ctx: &SpreadsheetContext,
        cell: CellRef,
        section: &LogSection,
    ) -> Result<(), PortError> {
        let lock = self.log_lock(cell);
        let _held = lock.lock().await;
        let existing = self.sheets.read_cell(ctx, cell).await?;
        let (marker, body) = self.split_marker(&existing);
        let merged = merge_log(body, section);
        let value = match marker {
            Some(marker) => format!("{marker}\n\n{merged}"),
            None => merged,
        };
        self.sheets.write_cell(ctx, &cell.to_string(), &value).await
    }

    /// Put this worker's marker on the first line of the log cell.
    ///
    /// The marker is read back after writing; losing a race to another
    /// worker defers the row.
    pub async fn claim(&self, ctx: &SpreadsheetContext, cell: CellRef, feature: Option<&str>) -> ClaimOutcome {
        let lock = self.log_lock(cell);
        let _held = lock.lock().await;

        let current = match self.sheets.read_cell(ctx, cell).await {
            Ok(value) => value,
            Err(e) => return ClaimOutcome::Unclaimed(e),
        };
        match self.guard.evaluate(&current, Utc::now()) {
            ClaimState::Held { holder, wait } => return ClaimOutcome::Deferred { holder, wait },
            ClaimState::Stale { holder } => {
                warn!(
                    "Taking over stale marker in {} (holder: {})",
                    cell,
                    holder.as_deref().unwrap_or("unknown")
                );
            }
            ClaimState::Free | ClaimState::Own => {}
        }

        let marker = self.guard.claim_marker(feature);
        let (_, body) = self.split_marker(&current);
        let value = if body.is_empty() {
            marker.clone()
        } else {
            format!("{marker}\n\n{body}")
        };
        if let Err(e) = self.sheets.write_cell(ctx, &cell.to_string(), &value).await {
            return ClaimOutcome::Unclaimed(e);
        }

        match self.sheets.read_cell(ctx, cell).await {
            Ok(readback) => match self.guard.evaluate(&readback, Utc::now()) {
                ClaimState::Held { holder, wait } => ClaimOutcome::Deferred { holder, wait },
                _ => ClaimOutcome::Claimed,
            },
            Err(e) => {
                debug!("Marker read-back for {} failed: {}", cell, e);
                ClaimOutcome::Claimed
            }
        }
    }

    /// Remove this worker's marker, keeping any log sections below it.
    pub async fn release(&self, ctx: &SpreadsheetContext, cell: CellRef) -> Result<(), PortError> {
        let lock = self.log_lock(cell);
        let _held = lock.lock().await;
        let current = self.sheets.read_cell(ctx, cell).await?;
        if self.guard.evaluate(&current, Utc::now()) != ClaimState::Own {
            return Ok(());
        }
        let (_, body) = self.split_marker(&current);
        self.sheets.write_cell(ctx, &cell.to_string(), body).await
    }

    /// Drop the per-cell locks once a stream is over.
    pub fn reset(&self) {
        self.log_locks.lock().clear();
    }

    fn log_lock(&self, cell: CellRef) -> Arc<AsyncMutex<()>> {
        self.log_locks
            .lock()
            .entry(cell)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Split a leading marker line off the log sections below it.
    fn split_marker<'a>(&self, text: &'a str) -> (Option<&'a str>, &'a str) {
        let trimmed = text.trim();
        let (first, rest) = trimmed.split_once('\n').unwrap_or((trimmed, ""));
        if first.trim().starts_with(self.guard.prefix()) {
            (Some(first.trim()), rest.trim())
        } else {
            (None, trimmed)
        }
    }
}
