//! Calendar helpers for monthly and annual panels.
//!
//! Periods are month starts. Annual portfolios are formed on July 1.

use crate::error::{DataError, Result};
use chrono::{Datelike, Months, NaiveDate};

/// Month of the annual portfolio formation.
pub const FORMATION_MONTH: u32 = 7;

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Shift a date by a signed number of months.
///
/// Days past the end of the target month are clamped to its last day.
pub fn add_months(date: NaiveDate, months: i32) -> Result<NaiveDate> {
    let shifted = if months >= 0 {
        date.checked_add_months(Months::new(months.unsigned_abs()))
    } else {
        date.checked_sub_months(Months::new(months.unsigned_abs()))
    };
    shifted.ok_or_else(|| DataError::Parse(format!("{} shifted by {} months is out of range", date, months)))
}

/// July 1 of `year`.
pub fn formation_day(year: i32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, FORMATION_MONTH, 1)
        .ok_or_else(|| DataError::Parse(format!("no formation date in year {}", year)))
}

/// Formation date of the annual portfolio a monthly return belongs to.
///
/// January to June map to July 1 of the previous year, July to December
/// to July 1 of the same year.
pub fn formation_date(date: NaiveDate) -> Result<NaiveDate> {
    if date.month() < FORMATION_MONTH {
        formation_day(date.year() - 1)
    } else {
        formation_day(date.year())
    }
}

/// Parse a database date.
///
/// Accepts ISO text with an optional time part (`2020-01-31`,
/// `2020-01-31 00:00:00`).
pub fn parse_date(text: &str) -> Result<NaiveDate> {
    let day = text.trim().get(..10).unwrap_or(text);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|e| DataError::Parse(format!("invalid date {:?}: {}", text, e)))
}

/// Date from a count of days since 1970-01-01.
pub fn date_from_epoch_days(days: i64) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(1970, 1, 1)
        .and_then(|epoch| epoch.checked_add_signed(chrono::Duration::days(days)))
        .ok_or_else(|| DataError::Parse(format!("epoch day {} is out of range", days)))
}
