//! Date functions
//!
//! Dates are serial day numbers in the 1900 date system: serial 1 is
//! 1900-01-01 and serial 60 is the non-existent 1900-02-29, kept so serials
//! agree with spreadsheets that carry the historical leap-year bug.

use chrono::{Datelike, Duration, NaiveDate};
use pricematrix_core::CellError;

use crate::error::FormulaResult;
use crate::evaluator::FormulaValue;

/// Serial of 9999-12-31, the last representable date
const MAX_SERIAL: i64 = 2_958_465;

/// The fictional leap day
const LEAP_BUG_SERIAL: i64 = 60;

fn epoch() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1899, 12, 31)
}

fn month_start_serial(year: i32, month: u32) -> Option<i64> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let days = (first - epoch()?).num_days();
    Some(if days >= LEAP_BUG_SERIAL { days + 1 } else { days })
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    if year == 1900 && month == 2 {
        return Some(29);
    }
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    u32::try_from((next - first).num_days()).ok()
}

/// Serial for a year and a month offset that may run past either end of the year
fn serial_from_parts(year: i64, month0: i64, day: i64) -> Result<f64, CellError> {
    let total = year.saturating_mul(12).saturating_add(month0);
    let y = i32::try_from(total.div_euclid(12)).map_err(|_| CellError::Num)?;
    let m = total.rem_euclid(12) as u32 + 1;
    let start = month_start_serial(y, m).ok_or(CellError::Num)?;
    let serial = start.saturating_add(day.saturating_sub(1));
    if (0..=MAX_SERIAL).contains(&serial) {
        Ok(serial as f64)
    } else {
        Err(CellError::Num)
    }
}

/// (year, month, day) of a serial; serial 0 is the day before 1900-01-01
fn ymd_from_serial(serial: f64) -> Result<(i32, u32, u32), CellError> {
    let serial = serial.trunc() as i64;
    match serial {
        s if !(0..=MAX_SERIAL).contains(&s) => Err(CellError::Num),
        0 => Ok((1900, 1, 0)),
        LEAP_BUG_SERIAL => Ok((1900, 2, 29)),
        s => {
            let offset = if s > LEAP_BUG_SERIAL { s - 1 } else { s };
            let date = epoch()
                .and_then(|e| e.checked_add_signed(Duration::days(offset)))
                .ok_or(CellError::Num)?;
            Ok((date.year(), date.month(), date.day()))
        }
    }
}

fn serial_arg(v: &FormulaValue) -> Result<(i32, u32, u32), CellError> {
    ymd_from_serial(v.to_number()?)
}

/// DATE(year, month, day)
///
/// Years 0-1899 are offset by 1900. Months and days outside their usual
/// range roll over into neighbouring months and years.
pub fn fn_date(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(date_serial(args).into())
}

fn date_serial(args: &[FormulaValue]) -> Result<f64, CellError> {
    let mut year = args[0].to_number()?.trunc() as i64;
    let month = args[1].to_number()?.trunc() as i64;
    let day = args[2].to_number()?.trunc() as i64;

    if (0..1900).contains(&year) {
        year += 1900;
    }
    if !(0..=9999).contains(&year) {
        return Err(CellError::Num);
    }

    serial_from_parts(year, month.saturating_sub(1), day)
}

/// YEAR(serial)
pub fn fn_year(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(serial_arg(&args[0]).map(|(y, _, _)| y as f64).into())
}

/// MONTH(serial)
pub fn fn_month(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(serial_arg(&args[0]).map(|(_, m, _)| m as f64).into())
}

/// DAY(serial)
pub fn fn_day(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(serial_arg(&args[0]).map(|(_, _, d)| d as f64).into())
}

/// DAYS(end_date, start_date)
pub fn fn_days(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(days_between(args).into())
}

fn days_between(args: &[FormulaValue]) -> Result<f64, CellError> {
    let end = args[0].to_number()?;
    let start = args[1].to_number()?;
    ymd_from_serial(end)?;
    ymd_from_serial(start)?;
    Ok(end.trunc() - start.trunc())
}

/// EDATE(start_date, months)
///
/// The day is clamped to the length of the target month, so Jan 31 plus
/// one month is the last day of February.
pub fn fn_edate(args: &[FormulaValue]) -> FormulaResult<FormulaValue> {
    Ok(edate_serial(args).into())
}

fn edate_serial(args: &[FormulaValue]) -> Result<f64, CellError> {
    let (year, month, day) = serial_arg(&args[0])?;
    let months = args[1].to_number()?.trunc() as i64;
    let month0 = (month as i64 - 1).saturating_add(months);

    let total = (year as i64 * 12).saturating_add(month0);
    let target_year = i32::try_from(total.div_euclid(12)).map_err(|_| CellError::Num)?;
    let target_month = total.rem_euclid(12) as u32 + 1;
    let last = days_in_month(target_year, target_month).ok_or(CellError::Num)?;

    serial_from_parts(year as i64, month0, day.clamp(1, last) as i64)
}
