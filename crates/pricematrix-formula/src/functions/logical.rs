//! Logical functions

use pricematrix_core::CellError;

use crate::error::FormulaResult;
use crate::evaluator::FormulaValue;

/// IF(condition, value_if_true, [value_if_false])
///
/// Only an error in the condition is propagated; the branch that is not
/// taken may hold anything.
pub fn fn_if(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let condition = match args[0].to_bool() {
        Ok(b) => b,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };

    if condition {
        Ok(args[1].clone())
    } else {
        Ok(args.get(2).cloned().unwrap_or(FormulaValue::Boolean(false)))
    }
}

/// Truth values AND/OR read from their arguments
///
/// Ranges contribute numbers and booleans only; direct arguments are
/// coerced. No truth values at all is `#VALUE!`.
fn truth_values(args: &[FormulaValue]) -> Result<Vec<bool>, CellError> {
    let mut values = Vec::new();
    for arg in args {
        match arg {
            FormulaValue::Array(rows) => {
                for cell in rows.iter().flatten() {
                    match cell {
                        FormulaValue::Number(n) => values.push(*n != 0.0),
                        FormulaValue::Boolean(b) => values.push(*b),
                        _ => {}
                    }
                }
            }
            scalar => values.push(scalar.to_bool()?),
        }
    }

    if values.is_empty() {
        Err(CellError::TypeMismatch)
    } else {
        Ok(values)
    }
}

/// AND(logical1, [logical2], ...)
pub fn fn_and(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(truth_values(args).map(|v| v.iter().all(|b| *b)).into())
}

/// OR(logical1, [logical2], ...)
pub fn fn_or(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(truth_values(args).map(|v| v.iter().any(|b| *b)).into())
}

/// NOT(logical)
pub fn fn_not(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(args[0].to_bool().map(|b| !b).into())
}

/// IFERROR(value, value_if_error)
///
/// Replaces errors only; 0, `""` and FALSE pass through.
pub fn fn_iferror(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    if args[0].is_error() {
        Ok(args[1].clone())
    } else {
        Ok(args[0].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_if_condition_error_propagates() {
        let args = [
            FormulaValue::Error(CellError::BrokenReference),
            FormulaValue::Number(1.0),
            FormulaValue::Number(2.0),
        ];
        assert_eq!(
            fn_if(&args).unwrap(),
            FormulaValue::Error(CellError::BrokenReference)
        );
    }

    #[test]
    fn test_if_returns_error_branch_when_taken() {
        let args = [
            FormulaValue::Boolean(false),
            FormulaValue::Number(1.0),
            FormulaValue::Error(CellError::NotAvailable),
        ];
        assert_eq!(
            fn_if(&args).unwrap(),
            FormulaValue::Error(CellError::NotAvailable)
        );
    }

    #[test]
    fn test_iferror_keeps_falsy_values() {
        for value in [
            FormulaValue::Number(0.0),
            FormulaValue::Text(String::new()),
            FormulaValue::Boolean(false),
        ] {
            let args = [value.clone(), FormulaValue::Text("fallback".into())];
            assert_eq!(fn_iferror(&args).unwrap(), value);
        }
    }

    #[test]
    fn test_and_or_over_empty_range() {
        let args = [FormulaValue::Array(vec![vec![FormulaValue::Empty]])];
        assert_eq!(
            fn_and(&args).unwrap(),
            FormulaValue::Error(CellError::TypeMismatch)
        );
        assert_eq!(
            fn_or(&args).unwrap(),
            FormulaValue::Error(CellError::TypeMismatch)
        );
    }
}
