//! A1-style cell addressing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PortError;

/// Convert a zero-based column index to its letter form (`0` -> `A`, `26` -> `AA`).
pub fn column_letter(index: u32) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push((b'A' + rem) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Convert a column letter (case-insensitive) to its zero-based index.
pub fn column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    let mut n: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let v = (c.to_ascii_uppercase() as u8 - b'A') as u32 + 1;
        n = n.checked_mul(26)?.checked_add(v)?;
    }
    Some(n - 1)
}

/// A single cell: zero-based column, one-based row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellRef {
    pub column: u32,
    pub row: u32,
}

impl CellRef {
    pub fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Column in letter form.
    pub fn column_letter(&self) -> String {
        column_letter(self.column)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letter(self.column), self.row)
    }
}

impl FromStr for CellRef {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        // Drop a sheet qualifier such as `'Sheet 1'!D9`.
        let s = s.rsplit('!').next().unwrap_or(s).replace('$', "");
        let split = s
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| PortError::InvalidRange(s.to_string()))?;
        let (letters, digits) = s.split_at(split);
        let column = column_index(letters).ok_or_else(|| PortError::InvalidRange(s.to_string()))?;
        let row: u32 = digits
            .parse()
            .map_err(|_| PortError::InvalidRange(s.to_string()))?;
        if row == 0 {
            return Err(PortError::InvalidRange(s.to_string()));
        }
        Ok(Self { column, row })
    }
}

/// An inclusive rectangular range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub start: CellRef,
    pub end: CellRef,
}

impl CellRange {
    pub fn single(cell: CellRef) -> Self {
        Self { start: cell, end: cell }
    }

    pub fn width(&self) -> u32 {
        self.end.column - self.start.column + 1
    }

    pub fn height(&self) -> u32 {
        self.end.row - self.start.row + 1
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}:{}", self.start, self.end)
        }
    }
}

impl FromStr for CellRange {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s.rsplit('!').next().unwrap_or(s);
        match body.split_once(':') {
            Some((a, b)) => {
                let a: CellRef = a.parse()?;
                let b: CellRef = b.parse()?;
                Ok(Self {
                    start: CellRef::new(a.column.min(b.column), a.row.min(b.row)),
                    end: CellRef::new(a.column.max(b.column), a.row.max(b.row)),
                })
            }
            None => Ok(Self::single(body.parse()?)),
        }
    }
}
