//! # pricematrix-core
//!
//! Core data structures for the pricematrix formula engine.
//!
//! This crate provides the fundamental types used throughout pricematrix:
//! - [`CellValue`] and [`CellError`] - Computed values, errors included
//! - [`CellAddress`] and [`CellRange`] - A1 addressing and ranges
//! - [`CellData`] and [`CellStorage`] - Raw text, cached value, sparse storage
//! - [`Matrix`] - A named, bounded grid that owns its cells
//!
//! ## Example
//!
//! ```rust
//! use pricematrix_core::{CellValue, Matrix, MatrixLimits};
//!
//! let mut matrix = Matrix::new("Prices", MatrixLimits::default()).unwrap();
//! matrix.set_raw(0, 0, "19.99").unwrap();
//! matrix.set_raw(0, 1, "Widget").unwrap();
//!
//! assert_eq!(matrix.value(0, 0), &CellValue::Number(19.99));
//! assert_eq!(matrix.value(0, 1), &CellValue::text("Widget"));
//! ```

pub mod cell;
pub mod error;
pub mod matrix;

pub use cell::{
    format_number, is_formula_text, parse_number, CellAddress, CellData, CellError, CellRange,
    CellRangeIterator, CellStorage, CellValue, ValueType,
};
pub use error::{Error, Result};
pub use matrix::{validate_matrix_name, Matrix, MatrixLimits};

/// Highest row number expressible in A1 notation
pub const MAX_ROWS: u32 = 1_048_576;

/// Highest column count expressible in A1 notation (`XFD`)
pub const MAX_COLS: u16 = 16_384;

/// Maximum length of a matrix name
pub const MAX_MATRIX_NAME_LEN: usize = 64;
