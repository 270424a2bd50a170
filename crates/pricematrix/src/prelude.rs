//! Prelude module - common imports for pricematrix users
//!
//! ```rust
//! use pricematrix::prelude::*;
//! ```

pub use crate::{
    CancellationToken, CellAddress, CellError, CellRange, CellResult, CellValue, CellView,
    EngineOptions, Error, MatrixLimits, RecalcStats, Result, Session, SessionSnapshot,
    SharedSession, ValueType,
};
