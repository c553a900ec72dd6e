//! Sampling cadence detection

use crate::data::CleanedSeries;
use crate::error::{ForecastError, Result};
use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Median gaps up to this many hours are hourly data
pub const HOURLY_MAX_GAP_HOURS: f64 = 1.5;
/// Median gaps up to this many hours are daily data
pub const DAILY_MAX_GAP_HOURS: f64 = 25.0;
/// Median gaps up to this many hours are weekly data; anything longer is monthly
pub const WEEKLY_MAX_GAP_HOURS: f64 = 200.0;

/// Sampling cadence of a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    #[serde(rename = "H")]
    Hourly,
    #[serde(rename = "D")]
    Daily,
    #[serde(rename = "W")]
    Weekly,
    #[serde(rename = "M")]
    Monthly,
}

impl Frequency {
    /// Short code used in responses
    pub fn code(&self) -> &'static str {
        match self {
            Frequency::Hourly => "H",
            Frequency::Daily => "D",
            Frequency::Weekly => "W",
            Frequency::Monthly => "M",
        }
    }

    /// Human-readable unit of one step
    pub fn granularity(&self) -> &'static str {
        match self {
            Frequency::Hourly => "hours",
            Frequency::Daily => "days",
            Frequency::Weekly => "weeks",
            Frequency::Monthly => "months",
        }
    }

    pub fn is_hourly(&self) -> bool {
        matches!(self, Frequency::Hourly)
    }

    /// Number of forecast steps covering `days` days.
    ///
    /// Hourly data steps 24 times per day; the other cadences take `days`
    /// as a count of their own periods.
    pub fn steps_for_days(&self, days: usize) -> usize {
        match self {
            Frequency::Hourly => days.saturating_mul(24),
            _ => days,
        }
    }

    /// Map a median gap in hours onto a cadence
    pub fn from_gap_hours(gap_hours: f64) -> Self {
        if gap_hours <= HOURLY_MAX_GAP_HOURS {
            Frequency::Hourly
        } else if gap_hours <= DAILY_MAX_GAP_HOURS {
            Frequency::Daily
        } else if gap_hours <= WEEKLY_MAX_GAP_HOURS {
            Frequency::Weekly
        } else {
            Frequency::Monthly
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Frequency {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "h" | "hour" | "hourly" | "hours" => Ok(Frequency::Hourly),
            "d" | "day" | "daily" | "days" => Ok(Frequency::Daily),
            "w" | "week" | "weekly" | "weeks" => Ok(Frequency::Weekly),
            "m" | "month" | "monthly" | "months" => Ok(Frequency::Monthly),
            other => Err(ForecastError::InvalidRequest(format!(
                "Unknown frequency '{}'. Expected one of: H, D, W, M",
                other
            ))),
        }
    }
}

/// Detects the cadence of a series from its timestamps
#[derive(Debug, Default, Clone, Copy)]
pub struct FrequencyDetector;

impl FrequencyDetector {
    pub fn detect(series: &CleanedSeries) -> Result<Frequency> {
        Self::detect_timestamps(&series.timestamps())
    }

    /// Detect the cadence of sorted timestamps.
    ///
    /// A perfectly regular hourly, daily or weekly grid, or a run of month
    /// starts or month ends, is recognized directly; otherwise the median
    /// gap decides.
    pub fn detect_timestamps(timestamps: &[NaiveDateTime]) -> Result<Frequency> {
        if timestamps.len() < 2 {
            return Err(ForecastError::InsufficientData(format!(
                "Need at least 2 timestamps to detect frequency, got {}",
                timestamps.len()
            )));
        }

        if let Some(exact) = Self::exact_cadence(timestamps) {
            return Ok(exact);
        }

        Ok(Frequency::from_gap_hours(Self::median_gap_hours(timestamps)?))
    }

    /// Median of consecutive gaps, in hours; even counts average the middle pair
    pub fn median_gap_hours(timestamps: &[NaiveDateTime]) -> Result<f64> {
        let mut gaps: Vec<f64> = timestamps
            .windows(2)
            .map(|w| (w[1] - w[0]).num_seconds() as f64 / 3600.0)
            .collect();

        if gaps.is_empty() {
            return Err(ForecastError::InsufficientData(
                "Need at least 2 timestamps to measure gaps".to_string(),
            ));
        }

        gaps.sort_by(|a, b| a.total_cmp(b));
        let mid = gaps.len() / 2;
        if gaps.len() % 2 == 0 {
            Ok((gaps[mid - 1] + gaps[mid]) / 2.0)
        } else {
            Ok(gaps[mid])
        }
    }

    fn exact_cadence(timestamps: &[NaiveDateTime]) -> Option<Frequency> {
        let first_gap = (timestamps[1] - timestamps[0]).num_seconds();
        let regular = timestamps
            .windows(2)
            .all(|w| (w[1] - w[0]).num_seconds() == first_gap);

        if regular {
            match first_gap {
                3_600 => return Some(Frequency::Hourly),
                86_400 => return Some(Frequency::Daily),
                604_800 => return Some(Frequency::Weekly),
                _ => {}
            }
        }

        let midnight = timestamps.iter().all(|ts| ts.time().num_seconds_from_midnight() == 0);
        let consecutive_months = timestamps.windows(2).all(|w| {
            let months = |ts: &NaiveDateTime| ts.year() * 12 + ts.month() as i32;
            months(&w[1]) - months(&w[0]) == 1
        });
        let month_starts = timestamps.iter().all(|ts| ts.day() == 1);
        let month_ends = timestamps.iter().all(|ts| {
            crate::utils::last_day_of_month(ts.year(), ts.month()) == Some(ts.date())
        });

        if midnight && consecutive_months && (month_starts || month_ends) {
            Some(Frequency::Monthly)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::date_parser::parse_timestamp;
    use chrono::Duration;
    use rstest::rstest;

    fn regular(start: &str, gap: Duration, n: usize) -> Vec<NaiveDateTime> {
        let start = parse_timestamp(start).unwrap();
        (0..n).map(|i| start + gap * i as i32).collect()
    }

    #[rstest]
    #[case(Duration::hours(1), Frequency::Hourly)]
    #[case(Duration::hours(24), Frequency::Daily)]
    #[case(Duration::days(7), Frequency::Weekly)]
    #[case(Duration::days(35), Frequency::Monthly)]
    fn test_detect_regular_gaps(#[case] gap: Duration, #[case] expected: Frequency) {
        let timestamps = regular("2014-01-02 00:00:00", gap, 10);
        assert_eq!(FrequencyDetector::detect_timestamps(&timestamps).unwrap(), expected);
    }

    #[test]
    fn test_detect_month_ends() {
        let timestamps: Vec<NaiveDateTime> = ["2014-01-31", "2014-02-28", "2014-03-31", "2014-04-30"]
            .iter()
            .map(|s| parse_timestamp(s).unwrap())
            .collect();
        assert_eq!(
            FrequencyDetector::detect_timestamps(&timestamps).unwrap(),
            Frequency::Monthly
        );
    }

    #[test]
    fn test_median_ignores_occasional_gaps() {
        let mut timestamps = regular("2014-01-02 08:00:00", Duration::hours(1), 6);
        timestamps.push(parse_timestamp("2014-01-03 08:00:00").unwrap());
        assert_eq!(
            FrequencyDetector::detect_timestamps(&timestamps).unwrap(),
            Frequency::Hourly
        );
    }

    #[test]
    fn test_even_gap_count_averages_middle() {
        let timestamps = vec![
            parse_timestamp("2014-01-01 00:00:00").unwrap(),
            parse_timestamp("2014-01-01 01:00:00").unwrap(),
            parse_timestamp("2014-01-02 01:00:00").unwrap(),
        ];
        let median = FrequencyDetector::median_gap_hours(&timestamps).unwrap();
        assert_eq!(median, 12.5);
        assert_eq!(Frequency::from_gap_hours(median), Frequency::Daily);
    }

    #[test]
    fn test_single_timestamp_is_insufficient() {
        let timestamps = regular("2014-01-01", Duration::hours(1), 1);
        assert!(matches!(
            FrequencyDetector::detect_timestamps(&timestamps),
            Err(ForecastError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_parse_and_steps() {
        assert_eq!("hourly".parse::<Frequency>().unwrap(), Frequency::Hourly);
        assert_eq!("W".parse::<Frequency>().unwrap(), Frequency::Weekly);
        assert!("fortnightly".parse::<Frequency>().is_err());
        assert_eq!(Frequency::Hourly.steps_for_days(1), 24);
        assert_eq!(Frequency::Daily.steps_for_days(5), 5);
    }
}
