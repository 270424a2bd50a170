//! A matrix together with its parsed formulas and dependency graph
//!
//! The matrix keeps raw text and cached values. The sheet keeps everything
//! derived from the formula text: the parsed expression of every accepted
//! formula, the formulas rejected for closing a cycle, and the dependency
//! graph among accepted formulas.

use std::collections::BTreeMap;

use ahash::{AHashMap, AHashSet};
use pricematrix_core::{
    is_formula_text, CellAddress, CellError, CellValue, Matrix, MatrixLimits, Result,
};
use pricematrix_formula::{
    collect_precedents, evaluate_cell, parse_formula, translate_references, CellKey, CellLookup,
    CellResolver, DependencyGraph, FormulaExpr, StructuralEdit,
};
use tracing::{debug, trace, warn};

use crate::snapshot::{CellSnapshot, MatrixSnapshot};
use crate::undo::{Change, Transaction};
use crate::view::CellView;

const CIRCULAR_DIAGNOSTIC: &str = "Circular reference: the formula depends on its own result";

/// One matrix of a session
#[derive(Debug, Clone)]
pub struct Sheet {
    matrix: Matrix,
    /// Accepted formulas
    formulas: AHashMap<CellKey, FormulaExpr>,
    /// Formulas kept out of the graph because they would close a cycle
    circular: BTreeMap<CellKey, FormulaExpr>,
    graph: DependencyGraph,
}

impl Sheet {
    pub(crate) fn new(name: &str, limits: MatrixLimits) -> Result<Self> {
        Ok(Self::from_matrix(Matrix::new(name, limits)?, &[]))
    }

    /// Wrap a matrix whose formula cells have not been parsed yet
    ///
    /// `circular` lists the cells to keep rejected, as recorded when the
    /// matrix was captured.
    pub(crate) fn from_matrix(matrix: Matrix, circular: &[CellKey]) -> Self {
        let mut sheet = Self {
            matrix,
            formulas: AHashMap::new(),
            circular: BTreeMap::new(),
            graph: DependencyGraph::new(),
        };
        sheet.rebuild(circular);
        sheet
    }

    /// Load a captured matrix
    pub(crate) fn from_snapshot(snapshot: &MatrixSnapshot, limits: MatrixLimits) -> Result<Self> {
        let matrix = snapshot.to_matrix(limits)?;
        Ok(Self::from_matrix(matrix, &snapshot.circular_keys()))
    }

    /// Raw contents, dimensions and rejected cells of this matrix
    pub fn snapshot(&self) -> MatrixSnapshot {
        MatrixSnapshot::capture(&self.matrix, &self.circular_cells())
    }

    pub fn name(&self) -> &str {
        self.matrix.name()
    }

    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Parsed formula of a cell, accepted or circular
    pub fn formula(&self, row: u32, col: u16) -> Option<&FormulaExpr> {
        let key = CellKey::new(row, col);
        self.formulas.get(&key).or_else(|| self.circular.get(&key))
    }

    /// Whether the formula at this cell was rejected for closing a cycle
    pub fn is_circular(&self, row: u32, col: u16) -> bool {
        self.circular.contains_key(&CellKey::new(row, col))
    }

    /// Rejected formula cells, row-major
    pub fn circular_cells(&self) -> Vec<CellKey> {
        self.circular.keys().copied().collect()
    }

    /// Number of cells currently holding an error value
    pub fn error_count(&self) -> usize {
        self.matrix
            .iter()
            .filter(|(_, _, cell)| cell.value.is_error())
            .count()
    }

    pub(crate) fn accepted_formulas(&self) -> impl Iterator<Item = (&CellKey, &FormulaExpr)> {
        self.formulas.iter()
    }

    pub(crate) fn is_accepted(&self, key: &CellKey) -> bool {
        self.formulas.contains_key(key)
    }

    pub(crate) fn accepted_formula(&self, key: &CellKey) -> Option<&FormulaExpr> {
        self.formulas.get(key)
    }

    pub(crate) fn store_value(&mut self, key: CellKey, value: CellValue) {
        self.matrix.set_value(key.row, key.col, value);
    }

    pub(crate) fn mark_dirty(&mut self, key: CellKey) {
        self.matrix.mark_dirty(key.row, key.col);
    }

    // === Reading ===

    /// View a cell, evaluating a stale formula on demand
    ///
    /// Nothing is written back; the view reports `pending` instead.
    pub fn view(&self, row: u32, col: u16) -> CellView {
        let address = CellAddress::new(row, col);
        let Some(cell) = self.matrix.cell(row, col) else {
            return CellView::new(address, String::new(), CellValue::Empty, None, false);
        };

        let key = CellKey::new(row, col);
        let (value, pending) = match self.formulas.get(&key) {
            Some(expr) if cell.dirty => (evaluate_cell(key, expr, self), true),
            _ => (cell.value.clone(), cell.dirty),
        };
        CellView::new(address, cell.raw.clone(), value, cell.diagnostic.clone(), pending)
    }

    // === Writing ===

    /// Store raw text for a batch of cells and rewire the graph
    ///
    /// All coordinates are checked first, so an out-of-range edit changes
    /// nothing. Returns the cells whose dependents need recalculating,
    /// including rejected formulas that this batch healed.
    pub(crate) fn write(&mut self, edits: &[(u32, u16, &str)]) -> Result<Vec<CellKey>> {
        let limits = self.matrix.limits();
        for &(row, col, _) in edits {
            limits.check(row, col)?;
        }

        let mut roots = Vec::with_capacity(edits.len());
        for &(row, col, raw) in edits {
            self.matrix.set_raw(row, col, raw)?;
            let key = CellKey::new(row, col);
            self.detach(key);
            if is_formula_text(raw) {
                self.attach(key, false);
            }
            trace!(matrix = %self.name(), cell = %key, raw, "cell written");
            roots.push(key);
        }

        roots.extend(self.retry_circular());
        Ok(roots)
    }

    fn detach(&mut self, key: CellKey) {
        self.graph.remove_precedents(key);
        self.formulas.remove(&key);
        self.circular.remove(&key);
    }

    /// Parse the formula stored at `key` and wire it into the graph
    ///
    /// With `force_circular` the formula is rejected without a cycle check.
    fn attach(&mut self, key: CellKey, force_circular: bool) {
        let (row, col) = (key.row, key.col);
        self.matrix.set_diagnostic(row, col, None);

        let parsed = parse_formula(self.matrix.raw(row, col));
        match parsed {
            Err(err) => {
                debug!(matrix = %self.name(), cell = %key, error = %err, "formula rejected");
                self.matrix
                    .set_value(row, col, CellValue::Error(err.cell_error()));
                self.matrix.set_diagnostic(row, col, Some(err.to_string()));
            }
            Ok(expr) => {
                let precedents = collect_precedents(&expr, &self.matrix.limits());
                if force_circular || self.graph.would_create_cycle(key, &precedents) {
                    warn!(matrix = %self.name(), cell = %key, "circular reference rejected");
                    self.matrix
                        .set_value(row, col, CellValue::Error(CellError::CircularReference));
                    self.matrix
                        .set_diagnostic(row, col, Some(CIRCULAR_DIAGNOSTIC.to_string()));
                    self.circular.insert(key, expr);
                } else {
                    self.graph.set_precedents(key, &precedents);
                    self.formulas.insert(key, expr);
                    self.matrix.mark_dirty(row, col);
                }
            }
        }
    }

    /// Accept rejected formulas that no longer close a cycle
    fn retry_circular(&mut self) -> Vec<CellKey> {
        let mut healed = Vec::new();
        let limits = self.matrix.limits();
        for key in self.circular_cells() {
            let Some(precedents) = self
                .circular
                .get(&key)
                .map(|expr| collect_precedents(expr, &limits))
            else {
                continue;
            };
            if self.graph.would_create_cycle(key, &precedents) {
                continue;
            }
            if let Some(expr) = self.circular.remove(&key) {
                self.graph.set_precedents(key, &precedents);
                self.formulas.insert(key, expr);
                self.matrix.set_diagnostic(key.row, key.col, None);
                self.matrix.mark_dirty(key.row, key.col);
                debug!(matrix = %self.name(), cell = %key, "circular reference resolved");
                healed.push(key);
            }
        }
        healed
    }

    /// Re-parse every formula and rebuild the graph from scratch
    ///
    /// Cells listed in `circular` are rejected without a cycle check; the
    /// rest are accepted in row-major order. A listed cell that no longer
    /// closes a cycle is accepted afterwards. Every accepted formula is left
    /// dirty.
    pub(crate) fn rebuild(&mut self, circular: &[CellKey]) {
        self.graph.clear();
        self.formulas.clear();
        self.circular.clear();

        let forced: AHashSet<CellKey> = circular.iter().copied().collect();
        let keys: Vec<CellKey> = self
            .matrix
            .iter()
            .filter(|(_, _, cell)| cell.is_formula())
            .map(|(row, col, _)| CellKey::new(row, col))
            .collect();

        for &key in keys.iter().filter(|k| !forced.contains(k)) {
            self.attach(key, false);
        }
        for &key in keys.iter().filter(|k| forced.contains(k)) {
            self.attach(key, true);
        }
        self.retry_circular();

        debug_assert!(self.graph.check_consistency());
        debug!(
            matrix = %self.name(),
            formulas = self.formulas.len(),
            circular = self.circular.len(),
            edges = self.graph.edge_count(),
            "dependency graph rebuilt"
        );
    }

    // === Structural edits ===

    /// Shift storage for a row or column edit and rewrite every formula
    ///
    /// Fails without changing anything when the edit is out of range.
    /// Afterwards the graph is rebuilt and every formula is dirty. Rejected
    /// cells move with the edit and stay rejected.
    pub(crate) fn apply_structural(&mut self, edit: StructuralEdit) -> Result<()> {
        let circular: Vec<CellKey> = self
            .circular
            .keys()
            .filter_map(|&key| edit.move_key(key))
            .collect();

        match edit {
            StructuralEdit::InsertRow(at) => self.matrix.insert_row(at)?,
            StructuralEdit::DeleteRow(at) => {
                self.matrix.delete_row(at)?;
            }
            StructuralEdit::InsertColumn(at) => self.matrix.insert_col(at)?,
            StructuralEdit::DeleteColumn(at) => {
                self.matrix.delete_col(at)?;
            }
        }

        let mut rewritten = 0usize;
        for (_, _, cell) in self.matrix.iter_mut() {
            if !cell.is_formula() {
                continue;
            }
            // Unparseable text has no references to move
            let Ok(expr) = parse_formula(&cell.raw) else {
                continue;
            };
            if let Some(moved) = translate_references(&expr, edit) {
                cell.raw = moved.to_formula_string();
                rewritten += 1;
            }
        }

        debug!(matrix = %self.name(), edit = %edit.describe(), rewritten, "structural edit applied");
        self.rebuild(&circular);
        Ok(())
    }

    // === History ===

    /// Undo record for an edit of `keys`
    pub(crate) fn record_cells(&self, description: String, keys: &[CellKey]) -> Transaction {
        let mut keys = keys.to_vec();
        keys.sort();
        keys.dedup();
        let cells = keys
            .into_iter()
            .map(|key| CellSnapshot {
                row: key.row,
                col: key.col,
                raw: self.matrix.raw(key.row, key.col).to_string(),
            })
            .collect();
        self.record(description, Change::Cells(cells))
    }

    /// Undo record holding the whole matrix
    pub(crate) fn record_matrix(&self, description: String) -> Transaction {
        self.record(description, Change::Matrix(self.snapshot()))
    }

    fn record(&self, description: String, change: Change) -> Transaction {
        Transaction {
            description,
            matrix: self.name().to_string(),
            change,
            dimensions: self.matrix.dimensions(),
            circular: self.circular_cells(),
        }
    }

    /// The record that would put the sheet back as it is now, shaped like `transaction`
    pub(crate) fn inverse_of(&self, transaction: &Transaction) -> Transaction {
        match &transaction.change {
            Change::Cells(cells) => {
                let keys: Vec<CellKey> = cells.iter().map(|c| CellKey::new(c.row, c.col)).collect();
                self.record_cells(transaction.description.clone(), &keys)
            }
            Change::Matrix(_) => self.record_matrix(transaction.description.clone()),
        }
    }

    /// Put back the state recorded in `transaction`
    ///
    /// Leaves every accepted formula dirty for a full recalculation.
    pub(crate) fn restore(&mut self, transaction: &Transaction) -> Result<()> {
        match &transaction.change {
            Change::Cells(cells) => {
                for cell in cells {
                    self.matrix.set_raw(cell.row, cell.col, &cell.raw)?;
                }
            }
            Change::Matrix(snapshot) => {
                self.matrix.clear();
                for cell in &snapshot.cells {
                    self.matrix.set_raw(cell.row, cell.col, &cell.raw)?;
                }
            }
        }
        let (rows, cols) = transaction.dimensions;
        self.matrix.set_dimensions(rows, cols)?;
        self.rebuild(&transaction.circular);
        Ok(())
    }
}

impl CellResolver for Sheet {
    fn lookup(&self, row: u32, col: u16) -> CellLookup<'_> {
        if let Some(cell) = self.matrix.cell(row, col) {
            if cell.dirty {
                if let Some(expr) = self.formulas.get(&CellKey::new(row, col)) {
                    return CellLookup::Pending(expr);
                }
            }
        }
        CellLookup::Value(self.matrix.value(row, col))
    }

    fn limits(&self) -> MatrixLimits {
        self.matrix.limits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sheet() -> Sheet {
        Sheet::new("Prices", MatrixLimits::default()).unwrap()
    }

    #[test]
    fn test_write_wires_precedents() {
        let mut s = sheet();
        s.write(&[(0, 0, "5"), (0, 1, "=A1*2"), (0, 2, "=SUM(A1:B1)")])
            .unwrap();

        let a1 = CellKey::new(0, 0);
        let mut dependents: Vec<CellKey> = s.graph().get_dependents(a1).collect();
        dependents.sort();
        assert_eq!(dependents, vec![CellKey::new(0, 1), CellKey::new(0, 2)]);
        assert!(s.graph().check_consistency());
    }

    #[test]
    fn test_view_evaluates_pending_formula() {
        let mut s = sheet();
        s.write(&[(0, 0, "5"), (0, 1, "=A1*2")]).unwrap();

        let view = s.view(0, 1);
        assert!(view.pending);
        assert_eq!(view.value, CellValue::Number(10.0));
        assert_eq!(s.matrix().value(0, 1), &CellValue::Empty);
    }

    #[test]
    fn test_parse_error_keeps_text_and_diagnostic() {
        let mut s = sheet();
        s.write(&[(0, 0, "=SUM(1,")]).unwrap();

        let view = s.view(0, 0);
        assert_eq!(view.raw_text, "=SUM(1,");
        assert_eq!(view.error, Some(CellError::Parse));
        assert!(view.diagnostic.is_some());
        assert!(!view.pending);
    }

    #[test]
    fn test_cycle_is_rejected_then_healed() {
        let mut s = sheet();
        s.write(&[(0, 0, "=B1")]).unwrap();
        s.write(&[(0, 1, "=A1")]).unwrap();
        assert!(s.is_circular(0, 1));
        assert_eq!(s.graph().edge_count(), 1);

        let roots = s.write(&[(0, 0, "7")]).unwrap();
        assert!(!s.is_circular(0, 1));
        assert!(roots.contains(&CellKey::new(0, 1)));
        assert_eq!(s.view(0, 1).value, CellValue::Number(7.0));
    }

    #[test]
    fn test_out_of_range_batch_changes_nothing() {
        let mut s = Sheet::new("Small", MatrixLimits::new(2, 2)).unwrap();
        let err = s.write(&[(0, 0, "1"), (5, 0, "2")]).unwrap_err();
        assert!(err.is_out_of_range());
        assert_eq!(s.matrix().cell_count(), 0);
    }

    #[test]
    fn test_rebuild_honours_forced_circular_cells() {
        let mut s = sheet();
        s.write(&[(0, 0, "=B1"), (0, 1, "=A1")]).unwrap();
        assert_eq!(s.circular_cells(), vec![CellKey::new(0, 1)]);

        s.rebuild(&[CellKey::new(0, 0)]);
        assert_eq!(s.circular_cells(), vec![CellKey::new(0, 0)]);
        assert!(s.graph().check_consistency());
    }

    #[test]
    fn test_structural_edit_keeps_rejected_cell() {
        let mut s = sheet();
        s.write(&[(0, 1, "=A1")]).unwrap();
        s.write(&[(0, 0, "=IFERROR(B1,5)")]).unwrap();
        assert_eq!(s.circular_cells(), vec![CellKey::new(0, 0)]);

        s.apply_structural(StructuralEdit::InsertRow(0)).unwrap();
        assert_eq!(s.circular_cells(), vec![CellKey::new(1, 0)]);
        assert_eq!(s.matrix().raw(1, 1), "=A2");

        s.apply_structural(StructuralEdit::DeleteRow(1)).unwrap();
        assert!(s.circular_cells().is_empty());
        assert!(s.graph().check_consistency());
    }

    #[test]
    fn test_structural_edit_rewrites_formula_text() {
        let mut s = sheet();
        s.write(&[(0, 0, "=B1+1"), (0, 1, "5")]).unwrap();
        s.apply_structural(StructuralEdit::InsertColumn(0)).unwrap();

        assert_eq!(s.matrix().raw(0, 1), "=C1+1");
        assert_eq!(s.matrix().raw(0, 2), "5");
        assert_eq!(s.view(0, 1).value, CellValue::Number(6.0));
    }
}
