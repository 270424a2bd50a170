//! The engine session: named matrices, recalculation on write, and history
//!
//! Every mutator takes `&mut self` and recalculates before it returns, so a
//! read after a write always sees current values.
//!
//! # Example
//!
//! ```rust
//! use pricematrix::{CellError, EngineOptions, Session};
//!
//! let mut session = Session::new(EngineOptions::default());
//! session.add_matrix("Prices").unwrap();
//!
//! session.set_cell("Prices", 0, 0, "5").unwrap();
//! session.set_cell("Prices", 0, 1, "=A1*2").unwrap();
//! session.set_cell("Prices", 0, 0, "10").unwrap();
//! assert_eq!(session.get_cell("Prices", 0, 1).unwrap().display_value, "20");
//!
//! let result = session.set_cell("Prices", 1, 0, "=A2").unwrap();
//! assert_eq!(result.cell.error, Some(CellError::CircularReference));
//!
//! assert!(session.undo());
//! assert!(session.get_cell("Prices", 1, 0).unwrap().is_blank());
//! ```

use pricematrix_core::{validate_matrix_name, CellAddress, Error, Result};
use pricematrix_formula::{CellKey, StructuralEdit};
use tracing::{debug, warn};

use crate::options::EngineOptions;
use crate::recalc::{CancellationToken, RecalcStats};
use crate::sheet::Sheet;
use crate::snapshot::SessionSnapshot;
use crate::undo::{Transaction, UndoStack};
use crate::view::{CellResult, CellView};

/// An editing session over one or more named matrices
#[derive(Debug)]
pub struct Session {
    options: EngineOptions,
    /// Matrices in creation order
    sheets: Vec<Sheet>,
    history: UndoStack,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

impl Session {
    /// Create an empty session
    pub fn new(options: EngineOptions) -> Self {
        Self {
            history: UndoStack::with_max_size(options.undo_limit),
            options,
            sheets: Vec::new(),
        }
    }

    /// Create a session holding the matrices of a snapshot
    pub fn from_snapshot(snapshot: &SessionSnapshot, options: EngineOptions) -> Result<Self> {
        let mut session = Self::new(options);
        session.deserialize(snapshot)?;
        Ok(session)
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    // === Matrices ===

    /// Add an empty matrix
    pub fn add_matrix(&mut self, name: &str) -> Result<()> {
        validate_matrix_name(name)?;
        if self.position(name).is_some() {
            return Err(Error::DuplicateMatrixName(name.to_string()));
        }
        self.sheets.push(Sheet::new(name, self.options.limits)?);
        debug!(matrix = name, "matrix added");
        Ok(())
    }

    /// Remove a matrix and every history step that touched it
    pub fn remove_matrix(&mut self, name: &str) -> Result<()> {
        let index = self.index_of(name)?;
        self.sheets.remove(index);
        self.history.forget_matrix(name);
        debug!(matrix = name, "matrix removed");
        Ok(())
    }

    /// Matrix names in creation order
    pub fn matrix_names(&self) -> Vec<&str> {
        self.sheets.iter().map(Sheet::name).collect()
    }

    /// Read access to a matrix and its formulas
    pub fn sheet(&self, name: &str) -> Result<&Sheet> {
        self.index_of(name).map(|i| &self.sheets[i])
    }

    fn sheet_mut(&mut self, name: &str) -> Result<&mut Sheet> {
        let index = self.index_of(name)?;
        Ok(&mut self.sheets[index])
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.sheets.iter().position(|s| s.name() == name)
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.position(name)
            .ok_or_else(|| Error::MatrixNotFound(name.to_string()))
    }

    // === Cells ===

    /// Write raw text into a cell and recalculate what depends on it
    pub fn set_cell(&mut self, matrix: &str, row: u32, col: u16, raw: &str) -> Result<CellResult> {
        self.set_cell_with(matrix, row, col, raw, &CancellationToken::new())
    }

    /// [`set_cell`](Self::set_cell) with a cancellation token for the recalculation
    pub fn set_cell_with(
        &mut self,
        matrix: &str,
        row: u32,
        col: u16,
        raw: &str,
        token: &CancellationToken,
    ) -> Result<CellResult> {
        let description = if raw.is_empty() {
            format!("clear {}", CellAddress::new(row, col))
        } else {
            format!("edit {}", CellAddress::new(row, col))
        };
        let stats = self.apply_edits(matrix, &[(row, col, raw)], description, token)?;
        let cell = self.sheet(matrix)?.view(row, col);
        Ok(CellResult { cell, stats })
    }

    /// Write several cells as one undo step, with a single recalculation
    ///
    /// Nothing is written if any coordinate is out of range.
    pub fn set_cells(&mut self, matrix: &str, edits: &[(u32, u16, &str)]) -> Result<RecalcStats> {
        let description = format!("edit {} cells", edits.len());
        self.apply_edits(matrix, edits, description, &CancellationToken::new())
    }

    /// Remove a cell
    pub fn clear_cell(&mut self, matrix: &str, row: u32, col: u16) -> Result<CellResult> {
        self.set_cell(matrix, row, col, "")
    }

    fn apply_edits(
        &mut self,
        matrix: &str,
        edits: &[(u32, u16, &str)],
        description: String,
        token: &CancellationToken,
    ) -> Result<RecalcStats> {
        let sheet = self.sheet_mut(matrix)?;
        let keys: Vec<CellKey> = edits
            .iter()
            .map(|&(row, col, _)| CellKey::new(row, col))
            .collect();
        let before = sheet.record_cells(description, &keys);

        let roots = sheet.write(edits)?;
        let stats = sheet.recalc_from(&roots, token);
        debug!(
            matrix,
            cells = edits.len(),
            evaluated = stats.cells_evaluated,
            "cells updated"
        );

        self.history.push(before);
        Ok(stats)
    }

    /// View a cell; absent cells come back blank
    pub fn get_cell(&self, matrix: &str, row: u32, col: u16) -> Result<CellView> {
        let sheet = self.sheet(matrix)?;
        sheet.matrix().limits().check(row, col)?;
        Ok(sheet.view(row, col))
    }

    /// View a cell by its A1 reference, e.g. `"B3"`
    pub fn get_cell_a1(&self, matrix: &str, reference: &str) -> Result<CellView> {
        let addr = CellAddress::parse(reference)?;
        self.get_cell(matrix, addr.row, addr.col)
    }

    // === Recalculation ===

    /// Re-evaluate every formula of a matrix
    pub fn recalculate(&mut self, matrix: &str) -> Result<RecalcStats> {
        self.recalculate_with(matrix, &CancellationToken::new())
    }

    pub fn recalculate_with(&mut self, matrix: &str, token: &CancellationToken) -> Result<RecalcStats> {
        let sheet = self.sheet_mut(matrix)?;
        Ok(sheet.recalc_all(token))
    }

    // === Structural edits ===

    /// Insert an empty row before `index`
    pub fn insert_row(&mut self, matrix: &str, index: u32) -> Result<RecalcStats> {
        self.apply_structural(matrix, StructuralEdit::InsertRow(index))
    }

    /// Delete row `index`; references to it become `#REF!`
    pub fn delete_row(&mut self, matrix: &str, index: u32) -> Result<RecalcStats> {
        self.apply_structural(matrix, StructuralEdit::DeleteRow(index))
    }

    /// Insert an empty column before `index`
    pub fn insert_column(&mut self, matrix: &str, index: u16) -> Result<RecalcStats> {
        self.apply_structural(matrix, StructuralEdit::InsertColumn(index))
    }

    /// Delete column `index`; references to it become `#REF!`
    pub fn delete_column(&mut self, matrix: &str, index: u16) -> Result<RecalcStats> {
        self.apply_structural(matrix, StructuralEdit::DeleteColumn(index))
    }

    fn apply_structural(&mut self, matrix: &str, edit: StructuralEdit) -> Result<RecalcStats> {
        let sheet = self.sheet_mut(matrix)?;
        let before = sheet.record_matrix(edit.describe());

        sheet.apply_structural(edit)?;
        let stats = sheet.recalc_all(&CancellationToken::new());

        self.history.push(before);
        Ok(stats)
    }

    // === Snapshots ===

    /// Raw text, dimensions and circular cells of every matrix
    pub fn serialize(&self) -> SessionSnapshot {
        SessionSnapshot {
            matrices: self.sheets.iter().map(Sheet::snapshot).collect(),
        }
    }

    /// Replace every matrix with the snapshot's and recalculate
    ///
    /// The snapshot is validated in full before anything is replaced.
    /// History is cleared.
    pub fn deserialize(&mut self, snapshot: &SessionSnapshot) -> Result<()> {
        let mut sheets: Vec<Sheet> = Vec::with_capacity(snapshot.matrices.len());
        for matrix in &snapshot.matrices {
            if sheets.iter().any(|s| s.name() == matrix.name) {
                return Err(Error::InvalidSnapshot(format!(
                    "duplicate matrix name {:?}",
                    matrix.name
                )));
            }
            let mut sheet = Sheet::from_snapshot(matrix, self.options.limits)?;
            sheet.recalc_all(&CancellationToken::new());
            sheets.push(sheet);
        }

        self.sheets = sheets;
        self.history.clear();
        debug!(matrices = self.sheets.len(), "session loaded");
        Ok(())
    }

    // === History ===

    /// Revert the most recent operation; false when there is none
    pub fn undo(&mut self) -> bool {
        let Some(transaction) = self.history.pop_undo() else {
            return false;
        };
        match self.revert(&transaction) {
            Ok(inverse) => {
                debug!(description = %transaction.description, "undo");
                self.history.push_redo(inverse);
                true
            }
            Err(err) => {
                warn!(description = %transaction.description, error = %err, "undo failed");
                false
            }
        }
    }

    /// Replay the most recently undone operation; false when there is none
    pub fn redo(&mut self) -> bool {
        let Some(transaction) = self.history.pop_redo() else {
            return false;
        };
        match self.revert(&transaction) {
            Ok(inverse) => {
                debug!(description = %transaction.description, "redo");
                self.history.push_undo_for_redo(inverse);
                true
            }
            Err(err) => {
                warn!(description = %transaction.description, error = %err, "redo failed");
                false
            }
        }
    }

    /// Put a matrix back as recorded and return the record of how it was
    fn revert(&mut self, transaction: &Transaction) -> Result<Transaction> {
        let sheet = self.sheet_mut(&transaction.matrix)?;
        let inverse = sheet.inverse_of(transaction);
        sheet.restore(transaction)?;
        let stats = sheet.recalc_all(&CancellationToken::new());
        debug!(
            matrix = %transaction.matrix,
            cells = transaction.cell_count(),
            evaluated = stats.cells_evaluated,
            "history step restored"
        );
        Ok(inverse)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Description of the step [`undo`](Self::undo) would revert
    pub fn undo_description(&self) -> Option<&str> {
        self.history.undo_description()
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.history.redo_description()
    }
}
