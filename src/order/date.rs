//! Dispatch-date input (`MM/DD`, completed with the current year).

use chrono::{Datelike, NaiveDate};

use crate::error::OrderError;

/// Parse `MM/DD` in `year`. Month must be 1-12 and day 1-31, and the pair
/// must exist in that year's calendar.
pub fn parse_dispatch_date(input: &str, year: i32) -> Result<NaiveDate, OrderError> {
    let invalid = || OrderError::InvalidDate(input.trim().to_string());

    let (month, day) = input.trim().split_once('/').ok_or_else(invalid)?;
    let month = parse_part(month, 12).ok_or_else(invalid)?;
    let day = parse_part(day, 31).ok_or_else(invalid)?;

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

/// Same as [`parse_dispatch_date`] using the year of `today`.
pub fn parse_dispatch_date_from(input: &str, today: NaiveDate) -> Result<NaiveDate, OrderError> {
    parse_dispatch_date(input, today.year())
}

fn parse_part(part: &str, max: u32) -> Option<u32> {
    let part = part.trim();
    if part.is_empty() || part.len() > 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: u32 = part.parse().ok()?;
    (1..=max).contains(&value).then_some(value)
}
