//! The matrix store: a named, bounded, sparse grid of cells

use tracing::debug;

use crate::cell::{is_formula_text, CellData, CellStorage, CellValue};
use crate::error::{Error, Result};
use crate::MAX_MATRIX_NAME_LEN;

static EMPTY: CellValue = CellValue::Empty;

/// Upper bounds for writes into a matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MatrixLimits {
    /// Number of usable rows
    pub max_rows: u32,
    /// Number of usable columns
    pub max_cols: u16,
}

impl Default for MatrixLimits {
    fn default() -> Self {
        Self {
            max_rows: 5000,
            max_cols: 500,
        }
    }
}

impl MatrixLimits {
    pub fn new(max_rows: u32, max_cols: u16) -> Self {
        Self { max_rows, max_cols }
    }

    /// Fail with an out-of-range error unless `row` is usable
    pub fn check_row(&self, row: u32) -> Result<()> {
        if row >= self.max_rows {
            return Err(Error::RowOutOfRange {
                index: row,
                max: self.max_rows,
            });
        }
        Ok(())
    }

    /// Fail with an out-of-range error unless `col` is usable
    pub fn check_col(&self, col: u16) -> Result<()> {
        if col >= self.max_cols {
            return Err(Error::ColumnOutOfRange {
                index: col as u32,
                max: self.max_cols as u32,
            });
        }
        Ok(())
    }

    pub fn check(&self, row: u32, col: u16) -> Result<()> {
        self.check_row(row)?;
        self.check_col(col)
    }
}

/// Validate a matrix name
pub fn validate_matrix_name(name: &str) -> Result<()> {
    if name.trim().is_empty() || name.trim() != name || name.chars().count() > MAX_MATRIX_NAME_LEN
    {
        return Err(Error::InvalidMatrixName(name.to_string()));
    }
    Ok(())
}

/// A named price matrix
///
/// Owns every cell it contains. Besides the sparse storage it tracks its
/// dimensions: they grow to cover every written cell and shift with row and
/// column inserts and deletes.
#[derive(Debug, Clone)]
pub struct Matrix {
    name: String,
    cells: CellStorage,
    limits: MatrixLimits,
    rows: u32,
    cols: u16,
}

impl Matrix {
    /// Create an empty matrix
    pub fn new<S: Into<String>>(name: S, limits: MatrixLimits) -> Result<Self> {
        let name = name.into();
        validate_matrix_name(&name)?;
        Ok(Self {
            name,
            cells: CellStorage::new(),
            limits,
            rows: 0,
            cols: 0,
        })
    }

    /// Get the matrix name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn limits(&self) -> MatrixLimits {
        self.limits
    }

    /// Dimensions as `(rows, cols)`
    pub fn dimensions(&self) -> (u32, u16) {
        (self.rows, self.cols)
    }

    /// Set explicit dimensions; they must fit the limits and cover every cell
    pub fn set_dimensions(&mut self, rows: u32, cols: u16) -> Result<()> {
        if rows > self.limits.max_rows {
            return Err(Error::RowOutOfRange {
                index: rows,
                max: self.limits.max_rows,
            });
        }
        if cols > self.limits.max_cols {
            return Err(Error::ColumnOutOfRange {
                index: cols as u32,
                max: self.limits.max_cols as u32,
            });
        }
        if let Some((_, _, max_row, max_col)) = self.cells.used_bounds() {
            if max_row >= rows || max_col >= cols {
                return Err(Error::other(format!(
                    "dimensions {}x{} do not cover cell at row {}, column {}",
                    rows, cols, max_row, max_col
                )));
            }
        }
        self.rows = rows;
        self.cols = cols;
        Ok(())
    }

    // === Cell Access ===

    /// Get a cell by row and column indices
    pub fn cell(&self, row: u32, col: u16) -> Option<&CellData> {
        self.cells.get(row, col)
    }

    /// Cached value of a cell; absent cells are empty
    pub fn value(&self, row: u32, col: u16) -> &CellValue {
        self.cells.get(row, col).map_or(&EMPTY, |c| &c.value)
    }

    /// Raw text of a cell; absent cells have none
    pub fn raw(&self, row: u32, col: u16) -> &str {
        self.cells.get(row, col).map_or("", |c| c.raw.as_str())
    }

    /// Store raw input text
    ///
    /// Literal text is interpreted immediately; formula text is stored with
    /// a pending (dirty) value for the owner to parse and evaluate. Empty
    /// text removes the cell. Returns the previous cell, if any.
    pub fn set_raw(&mut self, row: u32, col: u16, raw: &str) -> Result<Option<CellData>> {
        self.limits.check(row, col)?;

        if raw.is_empty() {
            return Ok(self.cells.remove(row, col));
        }

        let data = if is_formula_text(raw) {
            CellData::formula(raw)
        } else {
            CellData::literal(raw)
        };
        self.rows = self.rows.max(row + 1);
        self.cols = self.cols.max(col + 1);
        Ok(self.cells.set(row, col, data))
    }

    /// Remove a cell
    pub fn remove(&mut self, row: u32, col: u16) -> Option<CellData> {
        self.cells.remove(row, col)
    }

    /// Store a computed value and mark the cell fresh
    pub fn set_value(&mut self, row: u32, col: u16, value: CellValue) {
        if let Some(cell) = self.cells.get_mut(row, col) {
            cell.value = value;
            cell.dirty = false;
        }
    }

    /// Mark a cell as awaiting recalculation
    pub fn mark_dirty(&mut self, row: u32, col: u16) {
        if let Some(cell) = self.cells.get_mut(row, col) {
            cell.dirty = true;
        }
    }

    /// Attach or clear a diagnostic message
    pub fn set_diagnostic(&mut self, row: u32, col: u16, diagnostic: Option<String>) {
        if let Some(cell) = self.cells.get_mut(row, col) {
            cell.diagnostic = diagnostic;
        }
    }

    /// Cells whose values await recalculation, row-major
    pub fn dirty_cells(&self) -> Vec<(u32, u16)> {
        self.cells
            .iter()
            .filter(|(_, _, c)| c.dirty)
            .map(|(r, c, _)| (r, c))
            .collect()
    }

    /// Iterate over all cells in row order
    pub fn iter(&self) -> impl Iterator<Item = (u32, u16, &CellData)> {
        self.cells.iter()
    }

    /// Iterate mutably over all cells in row order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u32, u16, &mut CellData)> {
        self.cells.iter_mut()
    }

    /// Number of stored cells
    pub fn cell_count(&self) -> usize {
        self.cells.cell_count()
    }

    /// Number of formula cells
    pub fn formula_count(&self) -> usize {
        self.cells.iter().filter(|(_, _, c)| c.is_formula()).count()
    }

    /// Remove every cell and reset the dimensions
    pub fn clear(&mut self) {
        self.cells.clear();
        self.rows = 0;
        self.cols = 0;
    }

    // === Structural edits ===

    /// Insert an empty row before `at`
    ///
    /// Fails without changing anything when `at` is beyond the limits or a
    /// stored cell would be pushed past the last usable row.
    pub fn insert_row(&mut self, at: u32) -> Result<()> {
        self.limits.check_row(at)?;
        if let Some((_, _, max_row, _)) = self.cells.used_bounds() {
            if max_row >= at {
                self.limits.check_row(max_row + 1)?;
            }
        }
        self.cells.insert_row(at);
        if at < self.rows {
            self.rows = (self.rows + 1).min(self.limits.max_rows);
        }
        debug!(matrix = %self.name, at, "inserted row");
        Ok(())
    }

    /// Delete row `at`, returning the cells it held
    pub fn delete_row(&mut self, at: u32) -> Result<Vec<(u16, CellData)>> {
        self.limits.check_row(at)?;
        let removed = self.cells.delete_row(at);
        if at < self.rows {
            self.rows -= 1;
        }
        debug!(matrix = %self.name, at, removed = removed.len(), "deleted row");
        Ok(removed)
    }

    /// Insert an empty column before `at`
    pub fn insert_col(&mut self, at: u16) -> Result<()> {
        self.limits.check_col(at)?;
        if let Some((_, _, _, max_col)) = self.cells.used_bounds() {
            if max_col >= at {
                self.limits.check_col(max_col + 1)?;
            }
        }
        self.cells.insert_col(at);
        if at < self.cols {
            self.cols = (self.cols + 1).min(self.limits.max_cols);
        }
        debug!(matrix = %self.name, at, "inserted column");
        Ok(())
    }

    /// Delete column `at`, returning the cells it held
    pub fn delete_col(&mut self, at: u16) -> Result<Vec<(u32, CellData)>> {
        self.limits.check_col(at)?;
        let removed = self.cells.delete_col(at);
        if at < self.cols {
            self.cols -= 1;
        }
        debug!(matrix = %self.name, at, removed = removed.len(), "deleted column");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CellError;
    use pretty_assertions::assert_eq;

    fn matrix() -> Matrix {
        Matrix::new("Prices", MatrixLimits::default()).unwrap()
    }

    #[test]
    fn test_names_are_validated() {
        assert!(Matrix::new("", MatrixLimits::default()).is_err());
        assert!(Matrix::new(" padded", MatrixLimits::default()).is_err());
        assert!(Matrix::new("Tier pricing", MatrixLimits::default()).is_ok());
    }

    #[test]
    fn test_set_raw_literals_and_formulas() {
        let mut m = matrix();
        m.set_raw(0, 0, "12").unwrap();
        m.set_raw(0, 1, "=A1*2").unwrap();

        assert_eq!(m.value(0, 0), &CellValue::Number(12.0));
        assert!(m.cell(0, 1).unwrap().dirty);
        assert_eq!(m.dirty_cells(), vec![(0, 1)]);
        assert_eq!(m.dimensions(), (1, 2));
        assert_eq!(m.formula_count(), 1);

        m.set_value(0, 1, CellValue::Number(24.0));
        assert!(m.dirty_cells().is_empty());
    }

    #[test]
    fn test_empty_raw_clears() {
        let mut m = matrix();
        m.set_raw(2, 2, "x").unwrap();
        let previous = m.set_raw(2, 2, "").unwrap();
        assert_eq!(previous.map(|c| c.raw), Some("x".to_string()));
        assert!(m.cell(2, 2).is_none());
        assert_eq!(m.value(2, 2), &CellValue::Empty);
    }

    #[test]
    fn test_writes_beyond_limits_fail() {
        let mut m = Matrix::new("Small", MatrixLimits::new(10, 5)).unwrap();
        let err = m.set_raw(10, 0, "1").unwrap_err();
        assert!(err.is_out_of_range());
        let err = m.set_raw(0, 5, "1").unwrap_err();
        assert!(err.is_out_of_range());
        assert_eq!(m.cell_count(), 0);
    }

    #[test]
    fn test_insert_row_respects_limits() {
        let mut m = Matrix::new("Small", MatrixLimits::new(3, 3)).unwrap();
        m.set_raw(2, 0, "last").unwrap();

        assert!(m.insert_row(0).unwrap_err().is_out_of_range());
        assert_eq!(m.raw(2, 0), "last");

        // Inserting below every used cell is fine
        m.set_raw(2, 0, "").unwrap();
        m.set_raw(0, 0, "first").unwrap();
        m.insert_row(1).unwrap();
        assert_eq!(m.raw(0, 0), "first");
    }

    #[test]
    fn test_structural_edits_shift_dimensions() {
        let mut m = matrix();
        m.set_raw(1, 1, "5").unwrap();
        assert_eq!(m.dimensions(), (2, 2));

        m.insert_row(0).unwrap();
        m.insert_col(0).unwrap();
        assert_eq!(m.dimensions(), (3, 3));
        assert_eq!(m.raw(2, 2), "5");

        let removed = m.delete_row(2).unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(m.dimensions(), (2, 3));
        m.delete_col(0).unwrap();
        assert_eq!(m.dimensions(), (2, 2));
        assert_eq!(m.cell_count(), 0);
    }

    #[test]
    fn test_set_dimensions_must_cover_cells() {
        let mut m = matrix();
        m.set_raw(4, 4, "1").unwrap();
        assert!(m.set_dimensions(4, 10).is_err());
        assert!(m.set_dimensions(10, 10).is_ok());
        assert!(m.set_dimensions(6000, 10).unwrap_err().is_out_of_range());
        assert_eq!(m.dimensions(), (10, 10));
    }

    #[test]
    fn test_error_values_are_kept() {
        let mut m = matrix();
        m.set_raw(0, 0, "=1/0").unwrap();
        m.set_value(0, 0, CellValue::Error(CellError::DivideByZero));
        assert_eq!(m.value(0, 0).error(), Some(CellError::DivideByZero));
    }
}
