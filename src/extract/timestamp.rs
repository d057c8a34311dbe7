//! Timestamp literal parsing for drafts.
//!
//! Recognized formats: `unix` (seconds, fractions preserved), `unix_ms`,
//! `unix_us`, `unix_ns`, `rfc3339`, or any chrono strftime layout. An
//! omitted format auto-detects: numbers parse as unix seconds, strings
//! shaped like RFC3339 parse as RFC3339.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::ParseError;
use crate::extract::coerce;

// Shape check only; chrono does the strict parse.
static RFC3339_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}[Tt ]\d{2}:\d{2}:\d{2}(\.\d+)?([Zz]|[+-]\d{2}:?\d{2})?$")
        .unwrap()
});

/// Parse a matched timestamp literal with the configured format.
pub(crate) fn parse_timestamp(
    value: &Value,
    format: Option<&str>,
) -> Result<DateTime<Utc>, ParseError> {
    let format = format.filter(|f| !f.is_empty());
    let fail = || ParseError::Timestamp {
        value: coerce::canonical_text(value).unwrap_or_else(|| "null".to_string()),
        format: format.unwrap_or("auto").to_string(),
    };

    match format {
        None => match value {
            Value::Number(_) => numeric(value).and_then(from_unix_seconds).ok_or_else(fail),
            Value::String(s) if RFC3339_SHAPE.is_match(s) => parse_rfc3339(s).ok_or_else(fail),
            Value::String(_) => numeric(value).and_then(from_unix_seconds).ok_or_else(fail),
            _ => Err(fail()),
        },
        Some("unix") => numeric(value).and_then(from_unix_seconds).ok_or_else(fail),
        Some("unix_ms") => integer(value)
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(fail),
        Some("unix_us") => integer(value)
            .and_then(DateTime::from_timestamp_micros)
            .ok_or_else(fail),
        Some("unix_ns") => integer(value)
            .map(DateTime::from_timestamp_nanos)
            .ok_or_else(fail),
        Some("rfc3339") => match value {
            Value::String(s) => parse_rfc3339(s).ok_or_else(fail),
            _ => Err(fail()),
        },
        Some(layout) => match value {
            Value::String(s) => parse_layout(s, layout).ok_or_else(fail),
            _ => Err(fail()),
        },
    }
}

fn parse_rfc3339(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Strftime layout; layouts without a zone specifier are read as UTC.
fn parse_layout(text: &str, layout: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_str(text, layout) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, layout)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn from_unix_seconds(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    let mut nanos = ((seconds - whole) * 1e9).round() as i64;
    let mut whole = whole as i64;
    if nanos >= 1_000_000_000 {
        whole += 1;
        nanos = 0;
    }
    DateTime::from_timestamp(whole, nanos as u32)
}
