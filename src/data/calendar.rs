//! Trading-day arithmetic.
//!
//! Weekends plus a configured exchange holiday list. Contracts whose expiry
//! lands on a holiday settle on the preceding session, so expiry-date
//! lookups roll through here. The holiday list comes from configuration
//! since exchanges publish it fresh each year.

use std::collections::HashSet;

use chrono::{Datelike, Duration, NaiveDate};

/// Monday through Friday and not a listed holiday.
pub fn is_trading_day(date: NaiveDate, holidays: &HashSet<NaiveDate>) -> bool {
    date.weekday().num_days_from_monday() < 5 && !holidays.contains(&date)
}

/// Latest trading day strictly before `date`.
pub fn previous_trading_day(date: NaiveDate, holidays: &HashSet<NaiveDate>) -> NaiveDate {
    let mut current = date - Duration::days(1);
    while !is_trading_day(current, holidays) {
        current -= Duration::days(1);
    }
    current
}

/// All trading days in `[start, end]`, ascending.
pub fn trading_days(
    start: NaiveDate,
    end: NaiveDate,
    holidays: &HashSet<NaiveDate>,
) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut current = start;
    while current <= end {
        if is_trading_day(current, holidays) {
            days.push(current);
        }
        current += Duration::days(1);
    }
    days
}
