//! Error types for pricematrix-core

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in pricematrix-core
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Invalid cell address format
    #[error("Invalid cell address: {0}")]
    InvalidAddress(String),

    /// Invalid cell range format
    #[error("Invalid cell range: {0}")]
    InvalidRange(String),

    /// Row index beyond the matrix bounds
    #[error("Row index {index} out of range (max rows: {max})")]
    RowOutOfRange { index: u32, max: u32 },

    /// Column index beyond the matrix bounds
    #[error("Column index {index} out of range (max columns: {max})")]
    ColumnOutOfRange { index: u32, max: u32 },

    /// Matrix not found by name
    #[error("Matrix not found: {0}")]
    MatrixNotFound(String),

    /// Invalid matrix name
    #[error("Invalid matrix name: {0:?}")]
    InvalidMatrixName(String),

    /// Duplicate matrix name
    #[error("Matrix name already exists: {0}")]
    DuplicateMatrixName(String),

    /// A snapshot could not be decoded or described impossible state
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// Whether this error reports an index beyond the matrix bounds
    pub fn is_out_of_range(&self) -> bool {
        matches!(
            self,
            Error::RowOutOfRange { .. } | Error::ColumnOutOfRange { .. }
        )
    }
}
