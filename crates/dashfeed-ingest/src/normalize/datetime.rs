// Permissive date parsing with an epoch fallback

use crate::record::RawValue;
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Formats with an explicit offset; the offset is dropped, not applied
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%A, %B %d, %Y %I:%M:%S %p",
    "%B %d, %Y %I:%M:%S %p",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%A, %B %d, %Y"];

/// Epoch milliseconds below this are more likely seconds or garbage
const MIN_EPOCH_MILLIS: i64 = 100_000_000_000;

/// `1970-01-01 00:00:00`, written for missing or unparsable timestamps
pub fn epoch() -> NaiveDateTime {
    NaiveDateTime::default()
}

/// Parse a timestamp, keeping the wall-clock time as written
pub fn parse_datetime(input: &str) -> Option<NaiveDateTime> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(input) {
        return Some(dt.naive_local());
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(input, format) {
            return Some(dt.naive_local());
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(input, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    if input.len() >= 12 && input.chars().all(|c| c.is_ascii_digit()) {
        return input.parse().ok().and_then(from_epoch_millis);
    }

    None
}

/// Epoch milliseconds as UTC wall-clock time
///
/// An epoch value carries no local offset to keep, so unlike the text forms
/// it is rendered in UTC.
fn from_epoch_millis(millis: i64) -> Option<NaiveDateTime> {
    if millis < MIN_EPOCH_MILLIS {
        return None;
    }
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

/// Parse any raw value, if it holds a recognizable timestamp
pub fn parse_raw(value: &RawValue) -> Option<NaiveDateTime> {
    match value {
        RawValue::Text(s) => parse_datetime(s),
        RawValue::Number(n) if n.is_finite() && n.fract() == 0.0 => from_epoch_millis(*n as i64),
        _ => None,
    }
}

/// Parse a raw value or fall back to the epoch sentinel. Never fails.
pub fn normalize_date(value: &RawValue) -> NaiveDateTime {
    parse_raw(value).unwrap_or_else(epoch)
}
