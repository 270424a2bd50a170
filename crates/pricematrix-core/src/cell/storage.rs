//! Cell storage implementation
//!
//! Sparse row-based storage: only written cells are kept, in a
//! `BTreeMap<row, BTreeMap<col, CellData>>` so iteration is row-major and
//! whole rows or columns can be shifted for structural edits.

use std::collections::BTreeMap;

use super::CellValue;

/// Complete state of a single cell
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CellData {
    /// Text exactly as the user entered it (formula or literal)
    pub raw: String,
    /// Last computed value
    pub value: CellValue,
    /// Set while the cached value awaits recalculation
    pub dirty: bool,
    /// Human-readable explanation for parse failures
    pub diagnostic: Option<String>,
}

impl CellData {
    /// Create a literal cell from its raw text
    pub fn literal<S: Into<String>>(raw: S) -> Self {
        let raw = raw.into();
        let value = CellValue::parse_literal(&raw);
        Self {
            raw,
            value,
            dirty: false,
            diagnostic: None,
        }
    }

    /// Create a formula cell whose value is not yet computed
    pub fn formula<S: Into<String>>(raw: S) -> Self {
        Self {
            raw: raw.into(),
            value: CellValue::Empty,
            dirty: true,
            diagnostic: None,
        }
    }

    /// Whether the raw text is a formula
    pub fn is_formula(&self) -> bool {
        is_formula_text(&self.raw)
    }
}

/// Text starting with `=` is a formula
pub fn is_formula_text(raw: &str) -> bool {
    raw.starts_with('=')
}

/// Sparse row-based storage for matrix cells
#[derive(Debug, Clone, Default)]
pub struct CellStorage {
    rows: BTreeMap<u32, BTreeMap<u16, CellData>>,
}

impl CellStorage {
    /// Create a new empty cell storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cell
    pub fn get(&self, row: u32, col: u16) -> Option<&CellData> {
        self.rows.get(&row).and_then(|r| r.get(&col))
    }

    /// Get a mutable cell
    pub fn get_mut(&mut self, row: u32, col: u16) -> Option<&mut CellData> {
        self.rows.get_mut(&row).and_then(|r| r.get_mut(&col))
    }

    /// Store a cell, replacing any previous one
    pub fn set(&mut self, row: u32, col: u16, data: CellData) -> Option<CellData> {
        self.rows.entry(row).or_default().insert(col, data)
    }

    /// Remove a cell
    pub fn remove(&mut self, row: u32, col: u16) -> Option<CellData> {
        let result = self.rows.get_mut(&row).and_then(|r| r.remove(&col));

        if self.rows.get(&row).map_or(false, |r| r.is_empty()) {
            self.rows.remove(&row);
        }

        result
    }

    /// Clear all cells
    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Get the number of stored cells
    pub fn cell_count(&self) -> usize {
        self.rows.values().map(|r| r.len()).sum()
    }

    /// Check if storage is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Bounds of stored cells as `(min_row, min_col, max_row, max_col)`
    pub fn used_bounds(&self) -> Option<(u32, u16, u32, u16)> {
        let min_row = *self.rows.keys().next()?;
        let max_row = *self.rows.keys().next_back()?;

        let mut min_col = u16::MAX;
        let mut max_col = 0u16;

        for row_data in self.rows.values() {
            if let Some(&col) = row_data.keys().next() {
                min_col = min_col.min(col);
            }
            if let Some(&col) = row_data.keys().next_back() {
                max_col = max_col.max(col);
            }
        }

        Some((min_row, min_col, max_row, max_col))
    }

    /// Iterate over all cells in row order
    pub fn iter(&self) -> impl Iterator<Item = (u32, u16, &CellData)> {
        self.rows
            .iter()
            .flat_map(|(&row, cols)| cols.iter().map(move |(&col, data)| (row, col, data)))
    }

    /// Iterate mutably over all cells in row order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u32, u16, &mut CellData)> {
        self.rows.iter_mut().flat_map(|(&row, cols)| {
            cols.iter_mut()
                .map(move |(&col, data)| (row, col, data))
        })
    }

    /// Iterate over cells in a specific row
    pub fn iter_row(&self, row: u32) -> impl Iterator<Item = (u16, &CellData)> {
        self.rows
            .get(&row)
            .into_iter()
            .flat_map(|cols| cols.iter().map(|(&col, data)| (col, data)))
    }

    // === Structural shifts ===

    /// Shift rows at or below `at` down by one
    pub fn insert_row(&mut self, at: u32) {
        let moved = self.rows.split_off(&at);
        for (row, cols) in moved {
            self.rows.insert(row + 1, cols);
        }
    }

    /// Drop row `at` and shift the rows below it up by one
    ///
    /// Returns the removed cells.
    pub fn delete_row(&mut self, at: u32) -> Vec<(u16, CellData)> {
        let mut moved = self.rows.split_off(&at);
        let removed = moved
            .remove(&at)
            .map(|cols| cols.into_iter().collect())
            .unwrap_or_default();
        for (row, cols) in moved {
            self.rows.insert(row - 1, cols);
        }
        removed
    }

    /// Shift columns at or right of `at` right by one
    pub fn insert_col(&mut self, at: u16) {
        for cols in self.rows.values_mut() {
            let moved = cols.split_off(&at);
            for (col, data) in moved {
                cols.insert(col + 1, data);
            }
        }
    }

    /// Drop column `at` and shift the columns right of it left by one
    ///
    /// Returns the removed cells.
    pub fn delete_col(&mut self, at: u16) -> Vec<(u32, CellData)> {
        let mut removed = Vec::new();
        for (&row, cols) in self.rows.iter_mut() {
            let mut moved = cols.split_off(&at);
            if let Some(data) = moved.remove(&at) {
                removed.push((row, data));
            }
            for (col, data) in moved {
                cols.insert(col - 1, data);
            }
        }
        self.rows.retain(|_, cols| !cols.is_empty());
        removed
    }
}
