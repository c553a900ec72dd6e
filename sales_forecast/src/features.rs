//! Feature engineering over the trailing history of one target column

use crate::data::CleanedSeries;
use crate::error::{ForecastError, Result};
use chrono::{Datelike, NaiveDateTime};
use series_math::rolling_stats;
use std::collections::BTreeMap;
use std::f64::consts::PI;

/// Lag offsets, in rows
pub const LAG_OFFSETS: [usize; 4] = [1, 3, 6, 12];
/// Rolling window lengths, in rows
pub const ROLLING_WINDOWS: [usize; 3] = [3, 6, 12];

/// Largest magnitude a sanitized model input may take
pub const SANITIZE_LIMIT: f64 = 1e6;

/// Named features of a single row
pub type FeatureVector = BTreeMap<String, f64>;

/// Column-oriented feature table aligned to the input timestamps
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    timestamps: Vec<NaiveDateTime>,
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl FeatureFrame {
    fn new(timestamps: Vec<NaiveDateTime>) -> Self {
        Self {
            timestamps,
            names: Vec::new(),
            columns: Vec::new(),
        }
    }

    fn push(&mut self, name: impl Into<String>, column: Vec<f64>) {
        self.names.push(name.into());
        self.columns.push(column);
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.columns[i].as_slice())
    }

    /// Features of row `index`
    pub fn row(&self, index: usize) -> Option<FeatureVector> {
        if index >= self.len() {
            return None;
        }
        Some(
            self.names
                .iter()
                .zip(&self.columns)
                .map(|(name, column)| (name.clone(), column[index]))
                .collect(),
        )
    }

    /// Features of the most recent row
    pub fn latest(&self) -> Option<FeatureVector> {
        self.len().checked_sub(1).and_then(|i| self.row(i))
    }
}

/// Builds calendar, lag, rolling and trend features
#[derive(Debug, Clone)]
pub struct FeatureEngineer {
    lookback: usize,
}

impl FeatureEngineer {
    pub fn new(lookback: usize) -> Result<Self> {
        if lookback == 0 {
            return Err(ForecastError::InvalidRequest(
                "Feature lookback must be at least 1".to_string(),
            ));
        }
        Ok(Self { lookback })
    }

    /// Engineer features for `target` over the trailing `lookback` rows.
    ///
    /// Lags longer than the history are replaced by the history mean,
    /// rolling windows shrink to the available length, and every remaining
    /// gap is back-filled, then forward-filled, then zeroed.
    pub fn engineer(&self, series: &CleanedSeries, target: &str) -> Result<FeatureFrame> {
        let recent = series.tail(self.lookback);
        let values = recent.channel_values(target)?;
        let n = values.len();
        let mut frame = FeatureFrame::new(recent.timestamps());

        let dates: Vec<NaiveDateTime> = frame.timestamps().to_vec();
        let months: Vec<f64> = dates.iter().map(|d| d.month() as f64).collect();
        let quarters: Vec<f64> = dates.iter().map(|d| ((d.month() - 1) / 3 + 1) as f64).collect();
        let days_of_year: Vec<f64> = dates.iter().map(|d| d.ordinal() as f64).collect();

        frame.push("year", dates.iter().map(|d| d.year() as f64).collect());
        frame.push("month", months.clone());
        frame.push("quarter", quarters.clone());
        frame.push("day_of_year", days_of_year.clone());
        frame.push(
            "week_of_year",
            dates.iter().map(|d| d.iso_week().week() as f64).collect(),
        );
        frame.push("month_sin", cyclic(&months, 12.0, f64::sin));
        frame.push("month_cos", cyclic(&months, 12.0, f64::cos));
        frame.push("quarter_sin", cyclic(&quarters, 4.0, f64::sin));
        frame.push("quarter_cos", cyclic(&quarters, 4.0, f64::cos));
        frame.push("day_sin", cyclic(&days_of_year, 365.25, f64::sin));
        frame.push("day_cos", cyclic(&days_of_year, 365.25, f64::cos));

        let mean = values.iter().sum::<f64>() / n as f64;
        for lag in LAG_OFFSETS {
            let column = if n > lag {
                (0..n)
                    .map(|i| if i >= lag { values[i - lag] } else { f64::NAN })
                    .collect()
            } else {
                vec![mean; n]
            };
            frame.push(format!("{}_lag{}", target, lag), column);
        }

        for window in ROLLING_WINDOWS {
            let stats = rolling_stats(&values, window.min(n))?;
            frame.push(format!("{}_ma{}", target, window), stats.iter().map(|s| s.mean).collect());
            frame.push(format!("{}_std{}", target, window), stats.iter().map(|s| s.std).collect());
            frame.push(format!("{}_min{}", target, window), stats.iter().map(|s| s.min).collect());
            frame.push(format!("{}_max{}", target, window), stats.iter().map(|s| s.max).collect());
        }

        frame.push("trend", (0..n).map(|i| i as f64).collect());

        let mut diff = vec![0.0; n];
        let mut pct_change = vec![0.0; n];
        for i in 1..n {
            diff[i] = values[i] - values[i - 1];
            let ratio = diff[i] / values[i - 1];
            pct_change[i] = if ratio.is_nan() { 0.0 } else { ratio };
        }
        frame.push(format!("{}_diff", target), diff);
        frame.push(format!("{}_pct_change", target), pct_change);

        for column in &mut frame.columns {
            fill_gaps(column);
        }

        Ok(frame)
    }

    /// Replace NaN with 0 and clamp infinities to `±SANITIZE_LIMIT`
    pub fn sanitize_window(window: &mut [Vec<f64>]) {
        for value in window.iter_mut().flat_map(|row| row.iter_mut()) {
            if value.is_nan() {
                *value = 0.0;
            } else if value.is_infinite() {
                *value = value.signum() * SANITIZE_LIMIT;
            }
        }
    }
}

fn cyclic(values: &[f64], period: f64, f: fn(f64) -> f64) -> Vec<f64> {
    values.iter().map(|v| f(2.0 * PI * v / period)).collect()
}

/// Infinities become gaps; gaps are back-filled, forward-filled, then zeroed
fn fill_gaps(column: &mut [f64]) {
    for value in column.iter_mut() {
        if value.is_infinite() {
            *value = f64::NAN;
        }
    }

    let mut next = f64::NAN;
    for value in column.iter_mut().rev() {
        if value.is_nan() {
            *value = next;
        } else {
            next = *value;
        }
    }

    let mut previous = f64::NAN;
    for value in column.iter_mut() {
        if value.is_nan() {
            *value = previous;
        } else {
            previous = *value;
        }
    }

    for value in column.iter_mut() {
        if value.is_nan() {
            *value = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TimeSeriesRecord;
    use crate::utils::date_parser::parse_timestamp;
    use approx::assert_relative_eq;
    use chrono::Duration;

    fn series(values: &[f64]) -> CleanedSeries {
        let start = parse_timestamp("2014-01-01 00:00:00").unwrap();
        let records = values
            .iter()
            .enumerate()
            .map(|(i, v)| TimeSeriesRecord {
                timestamp: start + Duration::hours(i as i64),
                values: vec![*v],
            })
            .collect();
        CleanedSeries::new(vec!["A".to_string()], "datum", records, vec![]).unwrap()
    }

    #[test]
    fn test_lags_are_backfilled() {
        let values: Vec<f64> = (1..=20).map(|v| v as f64).collect();
        let frame = FeatureEngineer::new(168).unwrap().engineer(&series(&values), "A").unwrap();

        let lag3 = frame.column("A_lag3").unwrap();
        assert_eq!(&lag3[..4], &[1.0, 1.0, 1.0, 1.0]);
        assert_eq!(lag3[19], 17.0);
        assert_eq!(frame.len(), 20);
    }

    #[test]
    fn test_short_history_uses_mean_for_long_lags() {
        let frame = FeatureEngineer::new(168)
            .unwrap()
            .engineer(&series(&[2.0, 4.0, 6.0]), "A")
            .unwrap();

        assert_eq!(frame.column("A_lag6").unwrap(), &[4.0, 4.0, 4.0]);
        assert_eq!(frame.column("A_ma12").unwrap()[2], 4.0);
    }

    #[test]
    fn test_pct_change_handles_zero_base() {
        let frame = FeatureEngineer::new(168)
            .unwrap()
            .engineer(&series(&[0.0, 0.0, 5.0, 10.0]), "A")
            .unwrap();

        let pct = frame.column("A_pct_change").unwrap();
        assert_eq!(pct, &[0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_lookback_limits_rows() {
        let values: Vec<f64> = (0..50).map(|v| v as f64).collect();
        let frame = FeatureEngineer::new(10).unwrap().engineer(&series(&values), "A").unwrap();

        assert_eq!(frame.len(), 10);
        let latest = frame.latest().unwrap();
        assert_eq!(latest["A_lag1"], 48.0);
        assert_eq!(latest["trend"], 9.0);
        assert_relative_eq!(latest["month_sin"], (2.0 * PI / 12.0).sin());
    }

    #[test]
    fn test_sanitize_window() {
        let mut window = vec![vec![f64::NAN, f64::INFINITY], vec![f64::NEG_INFINITY, 1.0]];
        FeatureEngineer::sanitize_window(&mut window);
        assert_eq!(window, vec![vec![0.0, 1e6], vec![-1e6, 1.0]]);
    }
}
