//! In-memory spreadsheet for dry runs and tests.

use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::cell::{CellRange, CellRef};
use crate::error::PortError;
use crate::grid::Grid;
use crate::ports::{SheetsClient, SpreadsheetContext};

/// Grid-backed [`SheetsClient`]. Ignores the spreadsheet context.
pub struct MemorySheet {
    grid: RwLock<Grid>,
    writes: RwLock<Vec<(CellRef, String)>>,
    failing: RwLock<HashSet<CellRef>>,
}

impl MemorySheet {
    pub fn new(grid: Grid) -> Self {
        Self {
            grid: RwLock::new(grid),
            writes: RwLock::new(Vec::new()),
            failing: RwLock::new(HashSet::new()),
        }
    }

    /// Snapshot of the current grid.
    pub fn snapshot(&self) -> Grid {
        self.grid.read().clone()
    }

    pub fn value(&self, cell: CellRef) -> String {
        self.grid.read().get(cell).to_string()
    }

    /// Every acknowledged write, in order.
    pub fn writes(&self) -> Vec<(CellRef, String)> {
        self.writes.read().clone()
    }

    /// Make writes to `cell` fail until cleared.
    pub fn fail_writes_to(&self, cell: CellRef) {
        self.failing.write().insert(cell);
    }

    pub fn clear_failures(&self) {
        self.failing.write().clear();
    }
}

impl Default for MemorySheet {
    fn default() -> Self {
        Self::new(Grid::default())
    }
}

#[async_trait]
impl SheetsClient for MemorySheet {
    async fn read_range(
        &self,
        _ctx: &SpreadsheetContext,
        range: &str,
    ) -> Result<Vec<Vec<String>>, PortError> {
        let range: CellRange = range.parse()?;
        Ok(self.grid.read().range(range))
    }

    async fn write_cell(
        &self,
        _ctx: &SpreadsheetContext,
        cell: &str,
        value: &str,
    ) -> Result<(), PortError> {
        let cell: CellRef = cell.parse()?;
        if self.failing.read().contains(&cell) {
            return Err(PortError::Sheets(format!("write to {cell} rejected")));
        }
        debug!("Memory sheet write {} ({} chars)", cell, value.len());
        self.grid.write().set(cell, value);
        self.writes.write().push((cell, value.to_string()));
        Ok(())
    }
}
