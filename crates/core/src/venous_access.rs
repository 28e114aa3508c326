//! Venous access staleness.
//!
//! Nurses record the peripheral access as free text, e.g. `"MSD 22/01"` (site plus the
//! day/month it was placed, no year). An access older than the configured limit
//! (96 hours by default) is due for replacement.
//!
//! Nothing here fails: text without a usable date is reported as not stale.

use crate::constants::DEFAULT_VENOUS_ACCESS_HOURS;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::OnceLock;

/// A day/month token lifted from free text. Not guaranteed to be a real calendar date.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DayMonth {
    pub day: u32,
    pub month: u32,
}

fn day_month_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(\d{1,2})[/-](\d{1,2})").expect("regex for day/month token")
    })
}

/// Extracts the first `day/month` or `day-month` token.
pub fn parse_day_month(text: &str) -> Option<DayMonth> {
    let caps = day_month_pattern().captures(text)?;
    let day = caps.get(1)?.as_str().parse().ok()?;
    let month = caps.get(2)?.as_str().parse().ok()?;
    Some(DayMonth { day, month })
}

/// Resolves the access date against `now`.
///
/// The token is placed in the current year; if that lands in the future the access was
/// noted before the year boundary and the previous year is used. Returns `None` when the
/// token is missing or is not a valid date in the chosen year (31/02, or 29/02 rolled
/// back into a non-leap year).
pub fn access_date(text: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let DayMonth { day, month } = parse_day_month(text)?;

    let candidate = NaiveDate::from_ymd_opt(now.year(), month, day)?.and_hms_opt(0, 0, 0)?;
    if candidate <= now {
        return Some(candidate);
    }

    NaiveDate::from_ymd_opt(now.year() - 1, month, day)?.and_hms_opt(0, 0, 0)
}

/// Stale under the default 96 hour limit.
pub fn is_stale(text: &str, now: NaiveDateTime) -> bool {
    is_stale_with_limit(
        text,
        now,
        Duration::hours(i64::from(DEFAULT_VENOUS_ACCESS_HOURS)),
    )
}

/// Stale iff more than `limit` has elapsed since the access date.
pub fn is_stale_with_limit(text: &str, now: NaiveDateTime, limit: Duration) -> bool {
    match access_date(text, now) {
        Some(placed) => now - placed > limit,
        None => false,
    }
}
