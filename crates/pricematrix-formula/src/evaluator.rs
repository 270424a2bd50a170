//! Formula evaluator
//!
//! Evaluates formula ASTs to produce values. Cells are read through
//! [`CellResolver`], so the evaluator never sees how a matrix stores them.

use std::cmp::Ordering;

use pricematrix_core::{format_number, parse_number, CellError, CellValue, MatrixLimits};
use tracing::warn;

use crate::ast::{BinaryOperator, FormulaExpr, UnaryOperator};
use crate::dependency::CellKey;
use crate::error::{FormulaError, FormulaResult};
use crate::functions::FunctionRegistry;

static EMPTY: CellValue = CellValue::Empty;

/// Value types during formula evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaValue {
    Number(f64),
    Text(String),
    Boolean(bool),
    Error(CellError),
    /// A range, row-major
    Array(Vec<Vec<FormulaValue>>),
    Empty,
}

impl FormulaValue {
    /// The error this value holds, if it is a scalar error
    pub fn error(&self) -> Option<CellError> {
        match self {
            FormulaValue::Error(e) => Some(*e),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, FormulaValue::Error(_))
    }

    /// First error in row-major order, looking inside arrays
    pub fn first_error(&self) -> Option<CellError> {
        match self {
            FormulaValue::Error(e) => Some(*e),
            FormulaValue::Array(rows) => rows.iter().flatten().find_map(FormulaValue::error),
            _ => None,
        }
    }

    /// Scalars yield themselves, arrays yield their elements row-major
    pub fn flatten(&self) -> Box<dyn Iterator<Item = &FormulaValue> + '_> {
        match self {
            FormulaValue::Array(rows) => Box::new(rows.iter().flatten()),
            other => Box::new(std::iter::once(other)),
        }
    }

    /// Numeric coercion for operators and scalar function arguments
    ///
    /// Blank is 0, booleans are 1/0 and text must parse as a number.
    pub fn to_number(&self) -> Result<f64, CellError> {
        match self {
            FormulaValue::Number(n) => Ok(*n),
            FormulaValue::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            FormulaValue::Empty => Ok(0.0),
            FormulaValue::Text(s) => parse_number(s).ok_or(CellError::TypeMismatch),
            FormulaValue::Error(e) => Err(*e),
            FormulaValue::Array(_) => Err(CellError::TypeMismatch),
        }
    }

    /// Truth coercion for conditions
    ///
    /// Empty text and blank are false; `TRUE`/`FALSE` text is accepted.
    pub fn to_bool(&self) -> Result<bool, CellError> {
        match self {
            FormulaValue::Boolean(b) => Ok(*b),
            FormulaValue::Number(n) => Ok(*n != 0.0),
            FormulaValue::Empty => Ok(false),
            FormulaValue::Text(s) if s.is_empty() => Ok(false),
            FormulaValue::Text(s) if s.eq_ignore_ascii_case("TRUE") => Ok(true),
            FormulaValue::Text(s) if s.eq_ignore_ascii_case("FALSE") => Ok(false),
            FormulaValue::Text(_) => Err(CellError::TypeMismatch),
            FormulaValue::Error(e) => Err(*e),
            FormulaValue::Array(_) => Err(CellError::TypeMismatch),
        }
    }

    /// Text coercion for `&` and text functions
    pub fn to_text(&self) -> Result<String, CellError> {
        match self {
            FormulaValue::Text(s) => Ok(s.clone()),
            FormulaValue::Number(n) => Ok(format_number(*n)),
            FormulaValue::Boolean(b) => Ok(if *b { "TRUE" } else { "FALSE" }.to_string()),
            FormulaValue::Empty => Ok(String::new()),
            FormulaValue::Error(e) => Err(*e),
            FormulaValue::Array(_) => Err(CellError::TypeMismatch),
        }
    }

    /// Convert a finished result into a cell value
    ///
    /// A formula that evaluates to a blank shows 0; a whole range cannot be
    /// stored in one cell.
    pub fn into_cell_value(self) -> CellValue {
        match self {
            FormulaValue::Number(n) => CellValue::Number(n),
            FormulaValue::Text(s) => CellValue::Text(s),
            FormulaValue::Boolean(b) => CellValue::Boolean(b),
            FormulaValue::Error(e) => CellValue::Error(e),
            FormulaValue::Empty => CellValue::Number(0.0),
            FormulaValue::Array(_) => CellValue::Error(CellError::TypeMismatch),
        }
    }
}

impl From<&CellValue> for FormulaValue {
    fn from(value: &CellValue) -> Self {
        match value {
            CellValue::Empty => FormulaValue::Empty,
            CellValue::Number(n) => FormulaValue::Number(*n),
            CellValue::Text(s) => FormulaValue::Text(s.clone()),
            CellValue::Boolean(b) => FormulaValue::Boolean(*b),
            CellValue::Error(e) => FormulaValue::Error(*e),
        }
    }
}

impl From<f64> for FormulaValue {
    fn from(n: f64) -> Self {
        FormulaValue::Number(n)
    }
}

impl From<bool> for FormulaValue {
    fn from(b: bool) -> Self {
        FormulaValue::Boolean(b)
    }
}

impl From<String> for FormulaValue {
    fn from(s: String) -> Self {
        FormulaValue::Text(s)
    }
}

impl From<CellError> for FormulaValue {
    fn from(e: CellError) -> Self {
        FormulaValue::Error(e)
    }
}

impl<T: Into<FormulaValue>> From<Result<T, CellError>> for FormulaValue {
    fn from(result: Result<T, CellError>) -> Self {
        match result {
            Ok(v) => v.into(),
            Err(e) => FormulaValue::Error(e),
        }
    }
}

/// What a cell holds when the evaluator reads it
#[derive(Debug, Clone, Copy)]
pub enum CellLookup<'a> {
    /// A literal or an up-to-date formula result
    Value(&'a CellValue),
    /// A formula whose cached value is stale
    Pending(&'a FormulaExpr),
}

/// Read access to the cells a formula refers to
pub trait CellResolver {
    fn lookup(&self, row: u32, col: u16) -> CellLookup<'_>;

    /// Cells past these limits are always blank; ranges are cut at them
    fn limits(&self) -> MatrixLimits {
        MatrixLimits::default()
    }
}

/// Resolver for formulas evaluated outside any matrix; every cell is blank
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCells;

impl CellResolver for NoCells {
    fn lookup(&self, _row: u32, _col: u16) -> CellLookup<'_> {
        CellLookup::Value(&EMPTY)
    }
}

/// Evaluate the formula of cell `key` into its new cell value
///
/// `key` is on the visiting stack for the whole evaluation, so a formula
/// that reaches itself through stale cells yields `#CIRC!`.
pub fn evaluate_cell<R: CellResolver + ?Sized>(
    key: CellKey,
    expr: &FormulaExpr,
    resolver: &R,
) -> CellValue {
    let mut visiting = vec![key];
    match evaluate(expr, resolver, &mut visiting) {
        Ok(value) => value.into_cell_value(),
        Err(err) => {
            warn!(cell = %key, error = %err, "formula evaluation failed");
            CellValue::Error(err.cell_error())
        }
    }
}

/// Evaluate an expression
///
/// `visiting` holds the cells whose evaluation is in progress. Formula-level
/// failures come back as `Ok(FormulaValue::Error(..))`; `Err` means the AST
/// itself is unusable.
pub fn evaluate<R: CellResolver + ?Sized>(
    expr: &FormulaExpr,
    resolver: &R,
    visiting: &mut Vec<CellKey>,
) -> FormulaResult<FormulaValue> {
    match expr {
        // === Literals ===
        FormulaExpr::Number(n) => Ok(FormulaValue::Number(*n)),
        FormulaExpr::String(s) => Ok(FormulaValue::Text(s.clone())),
        FormulaExpr::Boolean(b) => Ok(FormulaValue::Boolean(*b)),
        FormulaExpr::Error(e) => Ok(FormulaValue::Error(*e)),

        // === References ===
        FormulaExpr::CellRef(addr) => resolve_cell(addr.row, addr.col, resolver, visiting),

        FormulaExpr::RangeRef(range) => {
            let limits = resolver.limits();
            let Some(range) = range.clamped(limits.max_rows, limits.max_cols) else {
                return Ok(FormulaValue::Array(vec![vec![FormulaValue::Empty]]));
            };
            let mut rows = Vec::with_capacity(range.row_count() as usize);
            for row in range.start.row..=range.end.row {
                let mut values = Vec::with_capacity(range.col_count() as usize);
                for col in range.start.col..=range.end.col {
                    values.push(resolve_cell(row, col, resolver, visiting)?);
                }
                rows.push(values);
            }
            Ok(FormulaValue::Array(rows))
        }

        // === Operators ===
        FormulaExpr::BinaryOp { op, left, right } => {
            let left = evaluate(left, resolver, visiting)?;
            let right = evaluate(right, resolver, visiting)?;
            Ok(evaluate_binary_op(*op, &left, &right))
        }

        FormulaExpr::UnaryOp { op, operand } => {
            let value = evaluate(operand, resolver, visiting)?;
            Ok(evaluate_unary_op(*op, &value))
        }

        // === Functions ===
        FormulaExpr::Function { name, args } => evaluate_function(name, args, resolver, visiting),
    }
}

/// Read one cell, evaluating it first if its value is stale
fn resolve_cell<R: CellResolver + ?Sized>(
    row: u32,
    col: u16,
    resolver: &R,
    visiting: &mut Vec<CellKey>,
) -> FormulaResult<FormulaValue> {
    match resolver.lookup(row, col) {
        CellLookup::Value(value) => Ok(value.into()),
        CellLookup::Pending(expr) => {
            let key = CellKey::new(row, col);
            if visiting.contains(&key) {
                return Ok(FormulaValue::Error(CellError::CircularReference));
            }
            visiting.push(key);
            let result = evaluate(expr, resolver, visiting);
            visiting.pop();
            // Read the way a stored result would be read back
            Ok(FormulaValue::from(&result?.into_cell_value()))
        }
    }
}

/// Check an operand: errors propagate and ranges are not scalars
fn scalar_operand(value: &FormulaValue) -> Result<&FormulaValue, CellError> {
    match value {
        FormulaValue::Error(e) => Err(*e),
        FormulaValue::Array(_) => Err(CellError::TypeMismatch),
        v => Ok(v),
    }
}

/// Evaluate a binary operation
fn evaluate_binary_op(op: BinaryOperator, left: &FormulaValue, right: &FormulaValue) -> FormulaValue {
    let operands = scalar_operand(left).and_then(|l| Ok((l, scalar_operand(right)?)));
    let (left, right) = match operands {
        Ok(pair) => pair,
        Err(e) => return FormulaValue::Error(e),
    };

    match op {
        BinaryOperator::Add
        | BinaryOperator::Subtract
        | BinaryOperator::Multiply
        | BinaryOperator::Divide
        | BinaryOperator::Power => arithmetic(op, left, right).into(),

        BinaryOperator::Concat => left
            .to_text()
            .and_then(|l| Ok(l + &right.to_text()?))
            .into(),

        BinaryOperator::Equal => (compare_values(left, right) == Ordering::Equal).into(),
        BinaryOperator::NotEqual => (compare_values(left, right) != Ordering::Equal).into(),
        BinaryOperator::LessThan => (compare_values(left, right) == Ordering::Less).into(),
        BinaryOperator::LessEqual => (compare_values(left, right) != Ordering::Greater).into(),
        BinaryOperator::GreaterThan => (compare_values(left, right) == Ordering::Greater).into(),
        BinaryOperator::GreaterEqual => (compare_values(left, right) != Ordering::Less).into(),
    }
}

fn arithmetic(
    op: BinaryOperator,
    left: &FormulaValue,
    right: &FormulaValue,
) -> Result<f64, CellError> {
    let l = left.to_number()?;
    let r = right.to_number()?;
    let result = match op {
        BinaryOperator::Add => l + r,
        BinaryOperator::Subtract => l - r,
        BinaryOperator::Multiply => l * r,
        BinaryOperator::Divide => {
            if r == 0.0 {
                return Err(CellError::DivideByZero);
            }
            l / r
        }
        BinaryOperator::Power => {
            if l == 0.0 && r < 0.0 {
                return Err(CellError::DivideByZero);
            }
            l.powf(r)
        }
        _ => return Err(CellError::TypeMismatch),
    };

    if result.is_finite() {
        Ok(result)
    } else {
        Err(CellError::Num)
    }
}

/// Compare two scalar values for ordering
///
/// Numbers sort before text, text before booleans. Text compares
/// case-insensitively. A blank compares as 0, `""` or FALSE depending on
/// the other side.
pub fn compare_values(left: &FormulaValue, right: &FormulaValue) -> Ordering {
    use FormulaValue::*;

    fn rank(v: &FormulaValue) -> u8 {
        match v {
            Number(_) | Empty => 0,
            Text(_) => 1,
            Boolean(_) => 2,
            Error(_) | Array(_) => 3,
        }
    }

    match (left, right) {
        (Empty, Empty) => Ordering::Equal,
        (Number(l), Number(r)) => l.partial_cmp(r).unwrap_or(Ordering::Equal),
        (Number(l), Empty) => l.partial_cmp(&0.0).unwrap_or(Ordering::Equal),
        (Empty, Number(r)) => 0.0f64.partial_cmp(r).unwrap_or(Ordering::Equal),
        (Text(l), Text(r)) => l.to_lowercase().cmp(&r.to_lowercase()),
        (Text(l), Empty) => {
            if l.is_empty() {
                Ordering::Equal
            } else {
                Ordering::Greater
            }
        }
        (Empty, Text(r)) => {
            if r.is_empty() {
                Ordering::Equal
            } else {
                Ordering::Less
            }
        }
        (Boolean(l), Boolean(r)) => l.cmp(r),
        (Boolean(l), Empty) => l.cmp(&false),
        (Empty, Boolean(r)) => false.cmp(r),
        (l, r) => rank(l).cmp(&rank(r)),
    }
}

/// Evaluate a unary operation
fn evaluate_unary_op(op: UnaryOperator, value: &FormulaValue) -> FormulaValue {
    match op {
        UnaryOperator::Negate => scalar_operand(value)
            .and_then(FormulaValue::to_number)
            .map(|n| -n)
            .into(),
    }
}

/// Evaluate a function call
fn evaluate_function<R: CellResolver + ?Sized>(
    name: &str,
    args: &[FormulaExpr],
    resolver: &R,
    visiting: &mut Vec<CellKey>,
) -> FormulaResult<FormulaValue> {
    let Some(func) = FunctionRegistry::global().get(name) else {
        return Ok(FormulaValue::Error(CellError::UnknownFunction));
    };

    func.check_arity(args.len())?;

    // Evaluate arguments
    let mut evaluated_args = Vec::with_capacity(args.len());
    for arg in args {
        evaluated_args.push(evaluate(arg, resolver, visiting)?);
    }

    match func.call(&evaluated_args) {
        Ok(value) => Ok(value),
        Err(FormulaError::Evaluation(msg)) => {
            warn!(function = func.name, %msg, "function failed");
            Ok(FormulaValue::Error(CellError::TypeMismatch))
        }
        Err(other) => Err(other),
    }
}
