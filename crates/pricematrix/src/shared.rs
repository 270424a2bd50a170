//! A session shared between threads
//!
//! Reads take the read lock and every mutator takes the write lock, so a
//! reader never observes a half-applied edit, structural change or undo.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use pricematrix_core::{Error, Result};

use crate::recalc::{CancellationToken, RecalcStats};
use crate::session::Session;
use crate::snapshot::SessionSnapshot;
use crate::view::{CellResult, CellView};

/// Cloneable handle to a [`Session`] behind a read-write lock
#[derive(Debug, Clone, Default)]
pub struct SharedSession {
    inner: Arc<RwLock<Session>>,
}

impl SharedSession {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(RwLock::new(session)),
        }
    }

    /// Lock for reading
    pub fn read(&self) -> Result<RwLockReadGuard<'_, Session>> {
        self.inner
            .read()
            .map_err(|_| Error::other("session lock poisoned"))
    }

    /// Lock for writing
    pub fn write(&self) -> Result<RwLockWriteGuard<'_, Session>> {
        self.inner
            .write()
            .map_err(|_| Error::other("session lock poisoned"))
    }

    pub fn get_cell(&self, matrix: &str, row: u32, col: u16) -> Result<CellView> {
        self.read()?.get_cell(matrix, row, col)
    }

    pub fn set_cell(&self, matrix: &str, row: u32, col: u16, raw: &str) -> Result<CellResult> {
        self.write()?.set_cell(matrix, row, col, raw)
    }

    /// Write with a token another thread can use to cancel the recalculation
    pub fn set_cell_with(
        &self,
        matrix: &str,
        row: u32,
        col: u16,
        raw: &str,
        token: &CancellationToken,
    ) -> Result<CellResult> {
        self.write()?.set_cell_with(matrix, row, col, raw, token)
    }

    pub fn set_cells(&self, matrix: &str, edits: &[(u32, u16, &str)]) -> Result<RecalcStats> {
        self.write()?.set_cells(matrix, edits)
    }

    pub fn undo(&self) -> Result<bool> {
        Ok(self.write()?.undo())
    }

    pub fn redo(&self) -> Result<bool> {
        Ok(self.write()?.redo())
    }

    pub fn serialize(&self) -> Result<SessionSnapshot> {
        Ok(self.read()?.serialize())
    }
}
