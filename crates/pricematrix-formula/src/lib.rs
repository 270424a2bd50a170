//! # pricematrix-formula
//!
//! Formula parser and evaluator for pricematrix.
//!
//! This crate provides:
//! - Formula parsing (text → AST) and canonical rendering (AST → text)
//! - Formula evaluation (AST → value) through a [`CellResolver`]
//! - The built-in function library
//! - Dependency tracking for calculation chains
//! - Reference rewriting for row and column insertion and deletion
//!
//! ## Example
//!
//! ```rust
//! use pricematrix_core::CellValue;
//! use pricematrix_formula::{evaluate_cell, parse_formula, CellKey, NoCells};
//!
//! let ast = parse_formula("=ROUND(2.675, 2) * 2").unwrap();
//! let value = evaluate_cell(CellKey::new(0, 0), &ast, &NoCells);
//! assert_eq!(value, CellValue::Number(5.36));
//! ```

pub mod ast;
pub mod dependency;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod parser;
pub mod translate;

pub use ast::{BinaryOperator, FormulaExpr, UnaryOperator};
pub use dependency::{collect_precedents, CellKey, DependencyGraph};
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{
    compare_values, evaluate, evaluate_cell, CellLookup, CellResolver, FormulaValue, NoCells,
};
pub use functions::{ErrorPolicy, FunctionDef, FunctionRegistry};
pub use parser::parse_formula;
pub use translate::{translate_references, StructuralEdit};
