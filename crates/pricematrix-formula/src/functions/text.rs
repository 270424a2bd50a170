//! Text functions
//!
//! Lengths and positions count characters, not bytes.

use pricematrix_core::CellError;

use crate::error::FormulaResult;
use crate::evaluator::FormulaValue;

fn take_left(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

fn take_right(s: &str, n: usize) -> String {
    let len = s.chars().count();
    if n >= len {
        return s.to_string();
    }
    s.chars().skip(len - n).collect()
}

/// Character count argument, 1 when omitted; negative is `#VALUE!`
fn num_chars(arg: Option<&FormulaValue>) -> Result<usize, CellError> {
    let n = match arg {
        Some(v) => v.to_number()?.trunc(),
        None => 1.0,
    };
    if n < 0.0 {
        Err(CellError::TypeMismatch)
    } else {
        Ok(n as usize)
    }
}

/// CONCAT(text1, [text2], ...)
///
/// Ranges are joined row-major, blanks contribute nothing.
pub fn fn_concat(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let mut result = String::new();
    for value in args.iter().flat_map(FormulaValue::flatten) {
        match value.to_text() {
            Ok(s) => result.push_str(&s),
            Err(e) => return Ok(FormulaValue::Error(e)),
        }
    }
    Ok(FormulaValue::Text(result))
}

/// LEFT(text, [num_chars])
pub fn fn_left(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let result = args[0]
        .to_text()
        .and_then(|s| Ok(take_left(&s, num_chars(args.get(1))?)));
    Ok(result.into())
}

/// RIGHT(text, [num_chars])
pub fn fn_right(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let result = args[0]
        .to_text()
        .and_then(|s| Ok(take_right(&s, num_chars(args.get(1))?)));
    Ok(result.into())
}

/// LEN(text)
pub fn fn_len(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(args[0]
        .to_text()
        .map(|s| s.chars().count() as f64)
        .into())
}

/// UPPER(text)
pub fn fn_upper(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(args[0].to_text().map(|s| s.to_uppercase()).into())
}

/// LOWER(text)
pub fn fn_lower(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(args[0].to_text().map(|s| s.to_lowercase()).into())
}
