//! Undo/redo history
//!
//! Every mutating session operation pushes one [`Transaction`] holding what
//! the affected matrix looked like before it ran. Undoing a transaction
//! captures the current state as its inverse and pushes that onto the redo
//! stack, and the other way round for redo.

use std::collections::VecDeque;

use pricematrix_formula::CellKey;

use crate::options::DEFAULT_UNDO_LIMIT;
use crate::snapshot::{CellSnapshot, MatrixSnapshot};

/// State needed to put a matrix back
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Previous raw text of the cells an edit touched; empty text was absent
    Cells(Vec<CellSnapshot>),
    /// Whole matrix before a row or column insert or delete
    Matrix(MatrixSnapshot),
}

/// One undoable user-visible operation
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    /// Human-readable description (e.g. "edit B3", "insert row 4")
    pub description: String,
    /// Name of the matrix the operation changed
    pub matrix: String,
    pub change: Change,
    /// Dimensions before the operation
    pub dimensions: (u32, u16),
    /// Formula cells flagged as circular before the operation
    pub circular: Vec<CellKey>,
}

impl Transaction {
    /// Number of cells the transaction restores
    pub fn cell_count(&self) -> usize {
        match &self.change {
            Change::Cells(cells) => cells.len(),
            Change::Matrix(snapshot) => snapshot.cells.len(),
        }
    }
}

/// Bounded undo and redo stacks
#[derive(Debug)]
pub struct UndoStack {
    /// Transactions that can be undone (most recent at back)
    undo_stack: VecDeque<Transaction>,
    /// Transactions that were undone and can be redone (most recent at back)
    redo_stack: VecDeque<Transaction>,
    max_size: usize,
}

impl UndoStack {
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_UNDO_LIMIT)
    }

    /// A history that keeps at most `max_size` steps; 0 disables it
    pub fn with_max_size(max_size: usize) -> Self {
        UndoStack {
            undo_stack: VecDeque::with_capacity(max_size.min(DEFAULT_UNDO_LIMIT)),
            redo_stack: VecDeque::new(),
            max_size,
        }
    }

    /// Record a new operation; clears the redo stack
    pub fn push(&mut self, transaction: Transaction) {
        self.redo_stack.clear();
        Self::push_bounded(&mut self.undo_stack, transaction, self.max_size);
    }

    /// Push onto the undo stack without clearing redo (used by redo)
    pub fn push_undo_for_redo(&mut self, transaction: Transaction) {
        Self::push_bounded(&mut self.undo_stack, transaction, self.max_size);
    }

    /// Push onto the redo stack (used by undo)
    pub fn push_redo(&mut self, transaction: Transaction) {
        Self::push_bounded(&mut self.redo_stack, transaction, self.max_size);
    }

    fn push_bounded(stack: &mut VecDeque<Transaction>, transaction: Transaction, max_size: usize) {
        if max_size == 0 {
            return;
        }
        while stack.len() >= max_size {
            stack.pop_front();
        }
        stack.push_back(transaction);
    }

    pub fn pop_undo(&mut self) -> Option<Transaction> {
        self.undo_stack.pop_back()
    }

    pub fn pop_redo(&mut self) -> Option<Transaction> {
        self.redo_stack.pop_back()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Description of the next undo step
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|t| t.description.as_str())
    }

    /// Description of the next redo step
    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.back().map(|t| t.description.as_str())
    }

    /// Drop every step that touches the named matrix
    pub fn forget_matrix(&mut self, name: &str) {
        self.undo_stack.retain(|t| t.matrix != name);
        self.redo_stack.retain(|t| t.matrix != name);
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// `(undo, redo)` stack sizes
    pub fn stack_sizes(&self) -> (usize, usize) {
        (self.undo_stack.len(), self.redo_stack.len())
    }
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new()
    }
}
