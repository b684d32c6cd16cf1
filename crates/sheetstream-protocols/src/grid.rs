//! In-memory 2D view of sheet values.

use serde::{Deserialize, Serialize};

use crate::cell::{CellRange, CellRef};

/// Row-major cell values. Rows are addressed one-based, columns zero-based,
/// matching [`CellRef`]. Reads outside the populated area yield `""`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grid {
    rows: Vec<Vec<String>>,
}

impl Grid {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// Build a grid from string slices, convenient for fixtures.
    pub fn from_rows<R, S>(rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rows: rows
                .into_iter()
                .map(|r| r.into_iter().map(Into::into).collect())
                .collect(),
        }
    }

    /// Number of populated rows.
    pub fn row_count(&self) -> u32 {
        self.rows.len() as u32
    }

    /// Widest row length.
    pub fn width(&self) -> u32 {
        self.rows.iter().map(|r| r.len()).max().unwrap_or(0) as u32
    }

    /// Value at `(row, column)`, empty when out of range.
    pub fn value(&self, row: u32, column: u32) -> &str {
        if row == 0 {
            return "";
        }
        self.rows
            .get((row - 1) as usize)
            .and_then(|r| r.get(column as usize))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn get(&self, cell: CellRef) -> &str {
        self.value(cell.row, cell.column)
    }

    /// Set a cell, growing the grid as needed.
    pub fn set(&mut self, cell: CellRef, value: impl Into<String>) {
        let row = (cell.row.max(1) - 1) as usize;
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
        let cols = &mut self.rows[row];
        let col = cell.column as usize;
        if cols.len() <= col {
            cols.resize(col + 1, String::new());
        }
        cols[col] = value.into();
    }

    /// Copy out a rectangular range.
    pub fn range(&self, range: CellRange) -> Vec<Vec<String>> {
        (range.start.row..=range.end.row)
            .map(|row| {
                (range.start.column..=range.end.column)
                    .map(|col| self.value(row, col).to_string())
                    .collect()
            })
            .collect()
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }
}
