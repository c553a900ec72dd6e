//! Additive trend and seasonality predictor restored from fitted parameters

use super::{SeasonalPoint, SeasonalPredictor};
use crate::error::{ForecastError, Result};
use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// z-score of an 80% interval
const DEFAULT_INTERVAL_Z: f64 = 1.2816;

/// `yhat = intercept + slope_per_day * days_since(origin) + weekly[weekday] + monthly[month]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSeasonalModel {
    #[serde(default = "default_name")]
    pub name: String,
    pub origin: NaiveDateTime,
    pub intercept: f64,
    #[serde(default)]
    pub slope_per_day: f64,
    /// Seven offsets, Monday first
    #[serde(default)]
    pub weekly: Option<Vec<f64>>,
    /// Twelve offsets, January first
    #[serde(default)]
    pub monthly: Option<Vec<f64>>,
    #[serde(default)]
    pub residual_std: f64,
    #[serde(default = "default_interval_z")]
    pub interval_z: f64,
}

fn default_name() -> String {
    "trend_seasonal".to_string()
}

fn default_interval_z() -> f64 {
    DEFAULT_INTERVAL_Z
}

impl TrendSeasonalModel {
    pub fn new(origin: NaiveDateTime, intercept: f64, slope_per_day: f64) -> Self {
        Self {
            name: default_name(),
            origin,
            intercept,
            slope_per_day,
            weekly: None,
            monthly: None,
            residual_std: 0.0,
            interval_z: DEFAULT_INTERVAL_Z,
        }
    }

    pub fn with_weekly(mut self, offsets: Vec<f64>) -> Self {
        self.weekly = Some(offsets);
        self
    }

    pub fn with_monthly(mut self, offsets: Vec<f64>) -> Self {
        self.monthly = Some(offsets);
        self
    }

    pub fn with_residual_std(mut self, residual_std: f64) -> Self {
        self.residual_std = residual_std;
        self
    }

    pub fn check(&self) -> Result<()> {
        if let Some(weekly) = &self.weekly {
            if weekly.len() != 7 {
                return Err(ForecastError::MissingArtifact(format!(
                    "{} needs 7 weekly offsets, has {}",
                    self.name,
                    weekly.len()
                )));
            }
        }
        if let Some(monthly) = &self.monthly {
            if monthly.len() != 12 {
                return Err(ForecastError::MissingArtifact(format!(
                    "{} needs 12 monthly offsets, has {}",
                    self.name,
                    monthly.len()
                )));
            }
        }
        if self.residual_std < 0.0 || !self.residual_std.is_finite() {
            return Err(ForecastError::MissingArtifact(format!(
                "{} has an invalid residual_std",
                self.name
            )));
        }
        Ok(())
    }

    fn point(&self, ds: NaiveDateTime) -> Result<SeasonalPoint> {
        let days = (ds - self.origin).num_seconds() as f64 / 86_400.0;
        let mut yhat = self.intercept + self.slope_per_day * days;

        if let Some(weekly) = &self.weekly {
            yhat += offset(weekly, ds.weekday().num_days_from_monday() as usize, &self.name)?;
        }
        if let Some(monthly) = &self.monthly {
            yhat += offset(monthly, ds.month0() as usize, &self.name)?;
        }

        let half_width = self.interval_z * self.residual_std;
        Ok(SeasonalPoint {
            ds,
            yhat,
            yhat_lower: yhat - half_width,
            yhat_upper: yhat + half_width,
        })
    }
}

fn offset(offsets: &[f64], index: usize, name: &str) -> Result<f64> {
    offsets.get(index).copied().ok_or_else(|| {
        ForecastError::Inference(format!("{} has no seasonal offset at {}", name, index))
    })
}

impl SeasonalPredictor for TrendSeasonalModel {
    fn predict(&self, dates: &[NaiveDateTime]) -> Result<Vec<SeasonalPoint>> {
        dates.iter().map(|&ds| self.point(ds)).collect()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::date_parser::parse_timestamp;
    use approx::assert_relative_eq;

    #[test]
    fn test_trend_and_weekly() {
        let origin = parse_timestamp("2014-01-06").unwrap(); // Monday
        let model = TrendSeasonalModel::new(origin, 10.0, 0.5)
            .with_weekly(vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, -2.0])
            .with_residual_std(1.0);

        let points = model
            .predict(&[origin, parse_timestamp("2014-01-12").unwrap()])
            .unwrap();

        assert_relative_eq!(points[0].yhat, 11.0);
        assert_relative_eq!(points[1].yhat, 10.0 + 3.0 - 2.0);
        assert_relative_eq!(
            points[1].yhat_upper - points[1].yhat,
            DEFAULT_INTERVAL_Z,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_check_rejects_bad_offsets() {
        let model = TrendSeasonalModel::new(parse_timestamp("2014-01-01").unwrap(), 1.0, 0.0)
            .with_monthly(vec![0.0; 5]);
        assert!(model.check().is_err());
    }
}
