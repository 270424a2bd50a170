//! # pricematrix
//!
//! An in-memory price matrix engine with spreadsheet-style formulas.
//!
//! A [`Session`] owns named matrices of cells. Each cell holds raw text: a
//! literal (number, `TRUE`/`FALSE`, text) or a formula starting with `=`.
//! Writes are recalculated before they return, following the dependency
//! graph so only affected cells are evaluated.
//!
//! ## Features
//!
//! - Formulas with arithmetic, comparison, `&`, ranges and a closed set of
//!   aggregate, logical, lookup, text and date functions
//! - Errors as cell values (`#DIV/0!`, `#REF!`, `#CIRC!`, ...) that
//!   propagate through formulas and can be caught with `IFERROR`
//! - Circular formulas are kept as text and flagged instead of rejected
//! - Row and column inserts and deletes that rewrite formula references
//! - Undo/redo and JSON snapshots
//! - Optional level-parallel recalculation (`parallel` feature)
//!
//! ## Example
//!
//! ```rust
//! use pricematrix::prelude::*;
//!
//! let mut session = Session::default();
//! session.add_matrix("Prices").unwrap();
//!
//! session.set_cells("Prices", &[
//!     (0, 0, "Widget"), (0, 1, "12.50"),
//!     (1, 0, "Gadget"), (1, 1, "8"),
//!     (2, 1, "=SUM(B1:B2)"),
//! ]).unwrap();
//!
//! let total = session.get_cell_a1("Prices", "B3").unwrap();
//! assert_eq!(total.value, CellValue::Number(20.5));
//!
//! session.insert_row("Prices", 0).unwrap();
//! assert_eq!(session.get_cell_a1("Prices", "B4").unwrap().raw_text, "=SUM(B2:B3)");
//! ```

pub mod options;
pub mod prelude;
pub mod recalc;
pub mod session;
pub mod shared;
pub mod sheet;
pub mod snapshot;
pub mod undo;
pub mod view;

pub use options::EngineOptions;
pub use recalc::{CancellationToken, RecalcStats};
pub use session::Session;
pub use shared::SharedSession;
pub use sheet::Sheet;
pub use snapshot::{CellSnapshot, MatrixSnapshot, SessionSnapshot};
pub use undo::{Transaction, UndoStack};
pub use view::{CellResult, CellView};

// Re-export core types
pub use pricematrix_core::{
    CellAddress, CellError, CellRange, CellValue, Error, Matrix, MatrixLimits, Result, ValueType,
    MAX_COLS, MAX_ROWS,
};

// Re-export formula types
pub use pricematrix_formula::{
    parse_formula, CellKey, FormulaError, FormulaExpr, FormulaValue, FunctionRegistry,
    StructuralEdit,
};
