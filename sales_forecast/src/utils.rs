//! Utility functions for the sales_forecast crate

use crate::error::{ForecastError, Result};
use crate::frequency::Frequency;
use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime};
use serde_json::Value;

/// Timestamp parsing and formatting
pub mod date_parser {
    use crate::error::{ForecastError, Result};
    use chrono::{DateTime, NaiveDate, NaiveDateTime};

    const DATETIME_FORMATS: [&str; 8] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M",
        "%Y/%m/%d %H:%M:%S",
        "%Y/%m/%d %H:%M",
    ];

    const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

    /// Parse a timestamp in any of the accepted layouts.
    ///
    /// Offsets (RFC 3339) are normalized to UTC and dropped.
    pub fn parse_timestamp(input: &str) -> Result<NaiveDateTime> {
        let trimmed = input.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(dt.naive_utc());
        }
        for format in DATETIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Ok(dt);
            }
        }
        for format in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
                return Ok(date.and_hms_opt(0, 0, 0).unwrap_or_default());
            }
        }

        Err(ForecastError::Schema(format!(
            "Unrecognized timestamp: '{}'",
            input
        )))
    }

    /// Render a timestamp the way responses carry it
    pub fn format_timestamp(ts: &NaiveDateTime, with_time: bool) -> String {
        if with_time {
            ts.format("%Y-%m-%d %H:%M:%S").to_string()
        } else {
            ts.format("%Y-%m-%d").to_string()
        }
    }
}

/// A single raw table cell interpreted as a number
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericCell {
    /// Absent, null, empty or non-finite
    Missing,
    Number(f64),
    /// Present but not a number
    Invalid,
}

/// Interpret a raw JSON cell as a number
pub fn parse_numeric(value: Option<&Value>) -> NumericCell {
    match value {
        None | Some(Value::Null) => NumericCell::Missing,
        Some(Value::Number(n)) => match n.as_f64() {
            Some(v) if v.is_finite() => NumericCell::Number(v),
            _ => NumericCell::Missing,
        },
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return NumericCell::Missing;
            }
            match trimmed.parse::<f64>() {
                Ok(v) if v.is_finite() => NumericCell::Number(v),
                Ok(_) => NumericCell::Missing,
                Err(_) => NumericCell::Invalid,
            }
        }
        Some(_) => NumericCell::Invalid,
    }
}

/// Render a raw cell for error messages and labels
pub fn cell_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Find a column by exact name, falling back to a case-insensitive match
pub fn resolve_column(columns: &[String], wanted: &str) -> Option<String> {
    if let Some(exact) = columns.iter().find(|c| c.as_str() == wanted) {
        return Some(exact.clone());
    }
    let wanted = wanted.trim().to_lowercase();
    columns
        .iter()
        .find(|c| c.trim().to_lowercase() == wanted)
        .cloned()
}

/// Last calendar day of a month
pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1).and_then(|d| d.pred_opt())
}

fn is_month_end(date: NaiveDate) -> bool {
    last_day_of_month(date.year(), date.month()) == Some(date)
}

/// Create future timestamps for forecasting.
///
/// Steps are taken from `last_timestamp` at the given cadence. Monthly
/// steps follow the calendar: a month-end anchor stays on month ends,
/// any other day is clamped to the length of the target month.
pub fn future_timestamps(
    last_timestamp: NaiveDateTime,
    horizon: usize,
    frequency: Frequency,
) -> Result<Vec<NaiveDateTime>> {
    let mut timestamps = Vec::with_capacity(horizon);
    let month_end_anchor = is_month_end(last_timestamp.date());

    for step in 1..=horizon {
        let next = match frequency {
            Frequency::Hourly => last_timestamp.checked_add_signed(Duration::hours(step as i64)),
            Frequency::Daily => last_timestamp.checked_add_signed(Duration::days(step as i64)),
            Frequency::Weekly => last_timestamp.checked_add_signed(Duration::weeks(step as i64)),
            Frequency::Monthly => {
                let shifted = last_timestamp.checked_add_months(Months::new(step as u32));
                match shifted {
                    Some(ts) if month_end_anchor => last_day_of_month(ts.year(), ts.month())
                        .map(|date| date.and_time(ts.time())),
                    other => other,
                }
            }
        };

        match next {
            Some(ts) => timestamps.push(ts),
            None => {
                return Err(ForecastError::InvalidRequest(format!(
                    "Horizon of {} steps overflows the calendar",
                    horizon
                )))
            }
        }
    }

    Ok(timestamps)
}
