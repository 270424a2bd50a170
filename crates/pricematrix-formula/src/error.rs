//! Formula error types

use pricematrix_core::CellError;
use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur during formula parsing or evaluation
///
/// Parse-time failures are stored in the cell as an error value together
/// with this error's message as a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaError {
    /// Formula parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Function name not in the library
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Wrong number of arguments
    #[error("Wrong number of arguments for {function}: expected {expected}, got {actual}")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    /// Reference outside the addressable grid
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// Formula evaluation error
    #[error("Evaluation error: {0}")]
    Evaluation(String),
}

impl FormulaError {
    /// The error code a cell shows for this failure
    pub fn cell_error(&self) -> CellError {
        match self {
            FormulaError::UnknownFunction(_) => CellError::UnknownFunction,
            FormulaError::InvalidReference(_) => CellError::BrokenReference,
            FormulaError::Evaluation(_) => CellError::TypeMismatch,
            FormulaError::Parse(_) | FormulaError::ArgumentCount { .. } => CellError::Parse,
        }
    }
}
