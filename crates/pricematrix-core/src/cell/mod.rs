//! Cell-related types and utilities
//!
//! This module contains:
//! - [`CellValue`] - The computed value of a cell
//! - [`CellAddress`] - A cell's location (e.g., "A1")
//! - [`CellRange`] - A range of cells (e.g., "A1:B10")
//! - [`CellData`] - Raw text, cached value and recalculation state

mod address;
mod storage;
mod value;

pub use address::{CellAddress, CellRange, CellRangeIterator};
pub use storage::{is_formula_text, CellData, CellStorage};
pub use value::{format_number, parse_number, CellError, CellValue, ValueType};
