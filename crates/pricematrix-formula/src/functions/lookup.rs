//! Lookup functions
//!
//! Ranges arrive as row-major arrays. A scalar where a table is expected
//! is treated as a 1x1 table.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::mem::discriminant;

use pricematrix_core::CellError;

use crate::error::FormulaResult;
use crate::evaluator::{compare_values, FormulaValue};

static BLANK: FormulaValue = FormulaValue::Empty;

/// How a lookup key is matched against candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchMode {
    Exact,
    /// Largest candidate not above the key
    NextSmaller,
    /// Smallest candidate not below the key
    NextLarger,
}

fn grid(v: &FormulaValue) -> Cow<'_, [Vec<FormulaValue>]> {
    match v {
        FormulaValue::Array(rows) => Cow::Borrowed(rows.as_slice()),
        scalar => Cow::Owned(vec![vec![scalar.clone()]]),
    }
}

fn array_dims(arr: &[Vec<FormulaValue>]) -> (usize, usize) {
    let rows = arr.len();
    let cols = arr.first().map(|r| r.len()).unwrap_or(0);
    (rows, cols)
}

/// 1-based index argument; non-positive is `#VALUE!`
fn positive_index(v: &FormulaValue) -> Result<usize, CellError> {
    let n = v.to_number()?.trunc();
    if n < 1.0 {
        Err(CellError::TypeMismatch)
    } else {
        Ok(n as usize)
    }
}

/// Position of the candidate matching `key`
///
/// Only candidates of the key's own type take part. The approximate modes
/// scan every candidate and on ties keep the later one, which is the
/// sorted-data answer.
fn find_position<'a>(
    key: &FormulaValue,
    candidates: impl IntoIterator<Item = &'a FormulaValue>,
    mode: MatchMode,
) -> Option<usize> {
    let mut best: Option<(usize, &FormulaValue)> = None;

    for (i, candidate) in candidates.into_iter().enumerate() {
        if discriminant(candidate) != discriminant(key) {
            continue;
        }
        let ord = compare_values(candidate, key);
        match mode {
            MatchMode::Exact => {
                if ord == Ordering::Equal {
                    return Some(i);
                }
            }
            MatchMode::NextSmaller => {
                let better = best.map_or(true, |(_, b)| compare_values(candidate, b) != Ordering::Less);
                if ord != Ordering::Greater && better {
                    best = Some((i, candidate));
                }
            }
            MatchMode::NextLarger => {
                let better = best.map_or(true, |(_, b)| compare_values(candidate, b) != Ordering::Greater);
                if ord != Ordering::Less && better {
                    best = Some((i, candidate));
                }
            }
        }
    }

    best.map(|(i, _)| i)
}

fn lookup_mode(arg: Option<&FormulaValue>) -> Result<MatchMode, CellError> {
    match arg {
        Some(v) if v.to_bool()? => Ok(MatchMode::NextSmaller),
        _ => Ok(MatchMode::Exact),
    }
}

/// VLOOKUP(lookup_value, table_array, col_index_num, [range_lookup])
///
/// Exact match unless `range_lookup` is TRUE.
pub fn fn_vlookup(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(table_lookup(args, Orientation::Vertical).unwrap_or_else(FormulaValue::Error))
}

/// HLOOKUP(lookup_value, table_array, row_index_num, [range_lookup])
pub fn fn_hlookup(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(table_lookup(args, Orientation::Horizontal).unwrap_or_else(FormulaValue::Error))
}

#[derive(Clone, Copy)]
enum Orientation {
    Vertical,
    Horizontal,
}

fn table_lookup(args: &[FormulaValue], orientation: Orientation) -> Result<FormulaValue, CellError> {
    let key = &args[0];
    if matches!(key, FormulaValue::Array(_)) {
        return Err(CellError::TypeMismatch);
    }

    let table = grid(&args[1]);
    let (rows, cols) = array_dims(&table);
    let index = positive_index(&args[2])?;
    let mode = lookup_mode(args.get(3))?;

    match orientation {
        Orientation::Vertical => {
            if index > cols {
                return Err(CellError::BrokenReference);
            }
            let keys = table.iter().map(|row| row.first().unwrap_or(&BLANK));
            let pos = find_position(key, keys, mode).ok_or(CellError::NotAvailable)?;
            Ok(table[pos][index - 1].clone())
        }
        Orientation::Horizontal => {
            if index > rows {
                return Err(CellError::BrokenReference);
            }
            let keys = table.first().map(|row| row.as_slice()).unwrap_or(&[]);
            let pos = find_position(key, keys, mode).ok_or(CellError::NotAvailable)?;
            Ok(table[index - 1][pos].clone())
        }
    }
}

/// INDEX(array, row_num, [column_num])
///
/// For a single row or column the one index selects along it.
pub fn fn_index(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(index_value(args).unwrap_or_else(FormulaValue::Error))
}

fn index_value(args: &[FormulaValue]) -> Result<FormulaValue, CellError> {
    let arr = grid(&args[0]);
    let (rows, cols) = array_dims(&arr);
    let first = positive_index(&args[1])?;

    let (r, c) = match args.get(2) {
        Some(col) => (first, positive_index(col)?),
        None if rows == 1 => (1, first),
        None if cols == 1 => (first, 1),
        None => return Err(CellError::BrokenReference),
    };

    arr.get(r - 1)
        .and_then(|row| row.get(c - 1))
        .cloned()
        .ok_or(CellError::BrokenReference)
}

/// MATCH(lookup_value, lookup_array, [match_type])
///
/// `match_type` 0 is exact, 1 (the default) the largest value not above
/// the key, -1 the smallest value not below it. Returns a 1-based position.
pub fn fn_match(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(match_position(args).unwrap_or_else(FormulaValue::Error))
}

fn match_position(args: &[FormulaValue]) -> Result<FormulaValue, CellError> {
    let key = &args[0];
    if matches!(key, FormulaValue::Array(_)) {
        return Err(CellError::TypeMismatch);
    }

    let arr = grid(&args[1]);
    let (rows, cols) = array_dims(&arr);
    if rows != 1 && cols != 1 {
        return Err(CellError::NotAvailable);
    }

    let match_type = match args.get(2) {
        Some(v) => v.to_number()?,
        None => 1.0,
    };
    let mode = if match_type > 0.0 {
        MatchMode::NextSmaller
    } else if match_type < 0.0 {
        MatchMode::NextLarger
    } else {
        MatchMode::Exact
    };

    find_position(key, arr.iter().flatten(), mode)
        .map(|pos| FormulaValue::Number((pos + 1) as f64))
        .ok_or(CellError::NotAvailable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn n(v: f64) -> FormulaValue {
        FormulaValue::Number(v)
    }

    fn t(s: &str) -> FormulaValue {
        FormulaValue::Text(s.to_string())
    }

    #[test]
    fn test_find_position_modes() {
        let values = [n(10.0), n(20.0), n(20.0), n(30.0)];
        assert_eq!(find_position(&n(20.0), &values, MatchMode::Exact), Some(1));
        assert_eq!(find_position(&n(25.0), &values, MatchMode::NextSmaller), Some(2));
        assert_eq!(find_position(&n(25.0), &values, MatchMode::NextLarger), Some(3));
        assert_eq!(find_position(&n(5.0), &values, MatchMode::NextSmaller), None);
        assert_eq!(find_position(&n(35.0), &values, MatchMode::NextLarger), None);
    }

    #[test]
    fn test_find_position_skips_other_types() {
        let values = [t("10"), FormulaValue::Boolean(true), n(10.0)];
        assert_eq!(find_position(&n(10.0), &values, MatchMode::Exact), Some(2));
        assert_eq!(find_position(&t("B"), &[t("a"), t("b")], MatchMode::Exact), Some(1));
    }

    #[test]
    fn test_vlookup_error_in_result_column() {
        let table = FormulaValue::Array(vec![
            vec![t("a"), FormulaValue::Error(CellError::DivideByZero)],
            vec![t("b"), n(2.0)],
        ]);
        assert_eq!(
            fn_vlookup(&[t("b"), table.clone(), n(2.0)]).unwrap(),
            n(2.0)
        );
        assert_eq!(
            fn_vlookup(&[t("a"), table, n(2.0)]).unwrap(),
            FormulaValue::Error(CellError::DivideByZero)
        );
    }

    #[test]
    fn test_index_on_scalar() {
        assert_eq!(fn_index(&[n(7.0), n(1.0)]).unwrap(), n(7.0));
        assert_eq!(
            fn_index(&[n(7.0), n(2.0)]).unwrap(),
            FormulaValue::Error(CellError::BrokenReference)
        );
    }
}
