//! Timestamp normalization for telemetry records.
//!
//! The backend emits dates in several shapes (RFC 3339, space-separated
//! SQL-ish strings, compact `+0100` offsets, bare days, epoch milliseconds).
//! Everything is reduced to epoch milliseconds or an explicit error; there is
//! no zero or "now" fallback.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
const DAY_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unparseable timestamp: {input:?}")]
pub struct TimestampError {
    pub input: String,
}

impl TimestampError {
    fn new(input: impl Into<String>) -> Self {
        Self { input: input.into() }
    }
}

/// Normalizes a JSON timestamp (string or epoch-millisecond number).
pub fn normalize(value: &Value) -> Result<i64, TimestampError> {
    match value {
        Value::String(s) => normalize_str(s),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(whole_millis))
            .filter(|ms| to_utc(*ms).is_some())
            .ok_or_else(|| TimestampError::new(n.to_string())),
        other => Err(TimestampError::new(other.to_string())),
    }
}

/// Parses a textual timestamp. One repair pass (colon offset collapsed,
/// fractional seconds stripped) is attempted before giving up.
pub fn normalize_str(raw: &str) -> Result<i64, TimestampError> {
    let trimmed = raw.trim();
    if let Some(ms) = parse_direct(trimmed) {
        return Ok(ms);
    }

    let repaired = repair(trimmed);
    if repaired != trimmed {
        if let Some(ms) = parse_direct(&repaired) {
            return Ok(ms);
        }
    }

    Err(TimestampError::new(raw))
}

/// Converts epoch milliseconds back to a UTC instant.
pub fn to_utc(instant_ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(instant_ms)
}

/// Whole float milliseconds, refused outside the `i64` range instead of saturating.
fn whole_millis(f: f64) -> Option<i64> {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0; // 2^63
    (f.is_finite() && f.fract() == 0.0 && (-LIMIT..LIMIT).contains(&f)).then(|| f as i64)
}

fn parse_direct(s: &str) -> Option<i64> {
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.timestamp_millis());
        }
    }

    // Offset-less values are taken as UTC.
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }

    NaiveDate::parse_from_str(s, DAY_FORMAT)
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
}

fn repair(s: &str) -> String {
    collapse_offset_colon(&strip_fraction(s))
}

/// `...+01:00` -> `...+0100`
fn collapse_offset_colon(s: &str) -> String {
    let bytes = s.as_bytes();
    let n = bytes.len();
    if n >= 6 {
        let tail = &bytes[n - 6..];
        let is_offset = (tail[0] == b'+' || tail[0] == b'-')
            && tail[1].is_ascii_digit()
            && tail[2].is_ascii_digit()
            && tail[3] == b':'
            && tail[4].is_ascii_digit()
            && tail[5].is_ascii_digit();
        if is_offset {
            return format!("{}{}", &s[..n - 3], &s[n - 2..]);
        }
    }
    s.to_string()
}

/// `10:00:00.123` / `10:00:00,123` -> `10:00:00`
fn strip_fraction(s: &str) -> String {
    let bytes = s.as_bytes();
    for i in 3..bytes.len() {
        let is_separator = bytes[i] == b'.' || bytes[i] == b',';
        if is_separator
            && bytes[i - 3] == b':'
            && bytes[i - 2].is_ascii_digit()
            && bytes[i - 1].is_ascii_digit()
        {
            let mut end = i + 1;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            if end > i + 1 {
                return format!("{}{}", &s[..i], &s[end..]);
            }
        }
    }
    s.to_string()
}
