//! Math and aggregate functions

use std::str::FromStr;

use pricematrix_core::CellError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::FormulaResult;
use crate::evaluator::FormulaValue;

/// Numbers an aggregate reads from its arguments
///
/// Direct scalars go through numeric coercion; inside ranges only numbers
/// count and text, booleans and blanks are skipped.
fn aggregate_numbers(args: &[FormulaValue]) -> Result<Vec<f64>, CellError> {
    let mut numbers = Vec::new();
    for arg in args {
        match arg {
            FormulaValue::Array(rows) => {
                for cell in rows.iter().flatten() {
                    match cell {
                        FormulaValue::Number(n) => numbers.push(*n),
                        FormulaValue::Error(e) => return Err(*e),
                        _ => {}
                    }
                }
            }
            scalar => numbers.push(scalar.to_number()?),
        }
    }
    Ok(numbers)
}

/// SUM function
pub fn fn_sum(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(aggregate_numbers(args).map(|n| n.iter().sum::<f64>()).into())
}

/// AVERAGE function
pub fn fn_average(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let numbers = match aggregate_numbers(args) {
        Ok(numbers) => numbers,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };

    if numbers.is_empty() {
        Ok(FormulaValue::Error(CellError::DivideByZero))
    } else {
        Ok(FormulaValue::Number(
            numbers.iter().sum::<f64>() / numbers.len() as f64,
        ))
    }
}

/// MIN function; 0 when there is nothing to compare
pub fn fn_min(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(aggregate_numbers(args)
        .map(|n| n.into_iter().reduce(f64::min).unwrap_or(0.0))
        .into())
}

/// MAX function; 0 when there is nothing to compare
pub fn fn_max(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(aggregate_numbers(args)
        .map(|n| n.into_iter().reduce(f64::max).unwrap_or(0.0))
        .into())
}

/// COUNT function
///
/// Counts numbers. Errors, text and blanks are skipped rather than
/// propagated. A direct argument also counts when it is a boolean or
/// numeric text.
pub fn fn_count(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let mut count = 0usize;

    for arg in args {
        match arg {
            FormulaValue::Array(rows) => {
                count += rows
                    .iter()
                    .flatten()
                    .filter(|cell| matches!(cell, FormulaValue::Number(_)))
                    .count();
            }
            FormulaValue::Number(_) | FormulaValue::Boolean(_) => count += 1,
            FormulaValue::Text(s) if pricematrix_core::parse_number(s).is_some() => count += 1,
            _ => {}
        }
    }

    Ok(FormulaValue::Number(count as f64))
}

/// ABS(number)
pub fn fn_abs(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(args[0].to_number().map(f64::abs).into())
}

/// ROUND(number, num_digits)
///
/// Rounds in decimal, halves away from zero. Negative digits round to the
/// left of the decimal point.
pub fn fn_round(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    let number = match args[0].to_number() {
        Ok(n) => n,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };
    let digits = match args[1].to_number() {
        Ok(d) => d.trunc(),
        Err(e) => return Ok(FormulaValue::Error(e)),
    };

    Ok(FormulaValue::Number(round_half_away(number, digits)))
}

/// Most digits a `Decimal` can hold after the point
const MAX_SCALE: f64 = 28.0;

fn round_half_away(number: f64, digits: f64) -> f64 {
    // Shortest round-trip text, so 2.675 is read as written
    let Ok(value) = Decimal::from_str(&number.to_string()) else {
        return round_with_multiplier(number, digits);
    };

    if digits >= 0.0 {
        let dp = digits.min(MAX_SCALE) as u32;
        return value
            .round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
            .to_f64()
            .unwrap_or(number);
    }

    if -digits > MAX_SCALE {
        return 0.0;
    }
    let mut factor = Decimal::ONE;
    for _ in 0..(-digits as u32) {
        factor *= Decimal::TEN;
    }
    let scaled = (value / factor).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    scaled
        .checked_mul(factor)
        .and_then(|d| d.to_f64())
        .unwrap_or_else(|| round_with_multiplier(number, digits))
}

fn round_with_multiplier(number: f64, digits: f64) -> f64 {
    if digits >= 0.0 && number.abs() >= 1e15 {
        return number;
    }
    let multiplier = 10_f64.powi(digits.clamp(-308.0, 308.0) as i32);
    let result = (number * multiplier).round() / multiplier;
    if result.is_finite() {
        result
    } else {
        number
    }
}
