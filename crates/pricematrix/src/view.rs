//! What collaborators see of a cell

use pricematrix_core::{CellAddress, CellError, CellValue, ValueType};

use crate::recalc::RecalcStats;

/// A read-only view of one cell
#[derive(Debug, Clone, PartialEq)]
pub struct CellView {
    pub address: CellAddress,
    /// Text exactly as entered; empty for an absent cell
    pub raw_text: String,
    pub value: CellValue,
    /// The value as text: numbers canonical, errors as their code
    pub display_value: String,
    pub error: Option<CellError>,
    pub value_type: ValueType,
    /// Why a formula could not be used, if it could not
    pub diagnostic: Option<String>,
    /// The stored value was stale and `value` was computed on demand
    pub pending: bool,
}

impl CellView {
    pub(crate) fn new(
        address: CellAddress,
        raw_text: String,
        value: CellValue,
        diagnostic: Option<String>,
        pending: bool,
    ) -> Self {
        Self {
            address,
            raw_text,
            display_value: value.to_string(),
            error: value.error(),
            value_type: value.value_type(),
            value,
            diagnostic,
            pending,
        }
    }

    /// Whether nothing is stored at this address
    pub fn is_blank(&self) -> bool {
        self.raw_text.is_empty()
    }

    pub fn is_formula(&self) -> bool {
        self.raw_text.starts_with('=')
    }
}

/// Outcome of a cell write: the cell afterwards and the recalculation it caused
#[derive(Debug, Clone, PartialEq)]
pub struct CellResult {
    pub cell: CellView,
    pub stats: RecalcStats,
}
