//! Natural-language dates accepted when creating notes.
//!
//! Recognized forms, case-insensitive:
//!
//!     ""  now  today  yesterday  tomorrow
//!     3 days ago   in 2 weeks   last week   next week
//!     2024-01-31   2024-01-31 14:30   2024-01-31T14:30:00   RFC 3339
//!
//! Relative forms keep the time of day of the reference instant.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static RELATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(in)\s+)?(\d+)\s+(minute|hour|day|week)s?(?:\s+(ago))?$").unwrap()
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateError {
    #[error("unrecognized date: {0:?}")]
    Unrecognized(String),
}

pub fn parse_natural_date(input: &str, now: NaiveDateTime) -> Result<NaiveDateTime, DateError> {
    let normalized = input.trim().to_lowercase();

    let unrecognized = || DateError::Unrecognized(input.to_string());

    match normalized.as_str() {
        "" | "now" | "today" => return Ok(now),
        "yesterday" => return shift(now, TimeDelta::try_days(1), false).ok_or_else(unrecognized),
        "tomorrow" => return shift(now, TimeDelta::try_days(1), true).ok_or_else(unrecognized),
        "last week" => return shift(now, TimeDelta::try_weeks(1), false).ok_or_else(unrecognized),
        "next week" => return shift(now, TimeDelta::try_weeks(1), true).ok_or_else(unrecognized),
        _ => {}
    }

    if let Some(captures) = RELATIVE.captures(&normalized) {
        let future = captures.get(1).is_some();
        let past = captures.get(4).is_some();
        if future != past {
            let amount: i64 = captures[2].parse().map_err(|_| unrecognized())?;
            let delta = match &captures[3] {
                "minute" => TimeDelta::try_minutes(amount),
                "hour" => TimeDelta::try_hours(amount),
                "day" => TimeDelta::try_days(amount),
                _ => TimeDelta::try_weeks(amount),
            };
            return shift(now, delta, future).ok_or_else(unrecognized);
        }
    }

    let trimmed = input.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(date.naive_local());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(date) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(date);
        }
    }
    if let Some(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(date);
    }

    Err(DateError::Unrecognized(input.to_string()))
}

/// `now` moved by `delta`, or `None` when either leaves the representable range.
fn shift(now: NaiveDateTime, delta: Option<TimeDelta>, forward: bool) -> Option<NaiveDateTime> {
    let delta = delta?;
    if forward {
        now.checked_add_signed(delta)
    } else {
        now.checked_sub_signed(delta)
    }
}
