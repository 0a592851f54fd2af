//! Value casting used by schema definitions, inserts and range lookups.
//!
//! Every parser returns `None` when the input is not representable; callers
//! turn that into an error naming the field and the offending value.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Largest DECIMAL precision a schema may declare.
pub const MAX_DECIMAL_PRECISION: u32 = 5;
pub const DEFAULT_DECIMAL_PRECISION: u32 = 2;

const TRUTHY: [&str; 6] = ["1", "true", "yes", "on", "y", "t"];

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

pub fn parse_integer(input: &str) -> Option<i64> {
    input.trim().parse::<i64>().ok()
}

/// Parse a decimal and scale it by `10^precision` into the integer domain.
pub fn parse_decimal(input: &str, precision: u32) -> Option<i64> {
    let value = input.trim().parse::<f64>().ok()?;
    if !value.is_finite() {
        return None;
    }
    let scaled = (value * 10f64.powi(precision as i32)).round();
    if scaled < i64::MIN as f64 || scaled > i64::MAX as f64 {
        return None;
    }
    Some(scaled as i64)
}

/// Days since 1970-01-01.
pub fn parse_date(input: &str) -> Option<i64> {
    let date = NaiveDate::parse_from_str(input.trim(), DATE_FORMAT).ok()?;
    Some((date - epoch()).num_days())
}

/// Unix seconds. Accepts the common textual layouts, RFC 3339 and a bare date.
pub fn parse_datetime(input: &str) -> Option<i64> {
    let input = input.trim();
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, format) {
            return Some(dt.and_utc().timestamp());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.timestamp());
    }
    let date = NaiveDate::parse_from_str(input, DATE_FORMAT).ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp())
}

pub fn parse_bool(input: &str) -> bool {
    let lowered = input.trim().to_ascii_lowercase();
    TRUTHY.contains(&lowered.as_str())
}

/// Split on `separator`, trimming entries, dropping empty ones and duplicates
/// while keeping first-seen order.
pub fn split_array(input: &str, separator: char) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for part in input.split(separator) {
        let part = part.trim();
        if !part.is_empty() && !values.iter().any(|v| v == part) {
            values.push(part.to_string());
        }
    }
    values
}

pub fn format_date(days: i64) -> String {
    TimeDelta::try_days(days)
        .and_then(|delta| epoch().checked_add_signed(delta))
        .map(|date| date.format(DATE_FORMAT).to_string())
        .unwrap_or_else(|| days.to_string())
}

pub fn format_datetime(seconds: i64) -> String {
    DateTime::from_timestamp(seconds, 0)
        .map(|dt| dt.naive_utc().format(DATETIME_FORMAT).to_string())
        .unwrap_or_else(|| seconds.to_string())
}

pub fn format_decimal(scaled: i64, precision: u32) -> String {
    if precision == 0 {
        return scaled.to_string();
    }
    let scale = 10i128.pow(precision);
    let value = scaled as i128;
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.abs();
    format!(
        "{}{}.{:0width$}",
        sign,
        abs / scale,
        abs % scale,
        width = precision as usize
    )
}
