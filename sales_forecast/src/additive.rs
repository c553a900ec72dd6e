//! Per-channel additive forecasts for daily, weekly and monthly data

use crate::config::FallbackPolicy;
use crate::error::{ForecastError, Result};
use crate::frequency::Frequency;
use crate::models::{ModelRegistry, SeasonalPoint, SeasonalPredictor};
use crate::recursive::as_inference;
use crate::utils::future_timestamps;
use chrono::NaiveDateTime;

/// Forecast from a fitted additive predictor
#[derive(Debug, Clone, PartialEq)]
pub struct AdditiveForecast {
    pub points: Vec<SeasonalPoint>,
}

impl AdditiveForecast {
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.yhat).collect()
    }
}

/// Looks up the additive predictor for a channel and asks it for future dates
#[derive(Debug, Clone, Copy)]
pub struct AdditiveForecaster<'a> {
    registry: &'a ModelRegistry,
}

impl<'a> AdditiveForecaster<'a> {
    pub fn new(registry: &'a ModelRegistry) -> Self {
        Self { registry }
    }

    /// Forecast `horizon` periods after `last_timestamp`
    pub fn forecast(
        &self,
        channel: &str,
        frequency: Frequency,
        last_timestamp: NaiveDateTime,
        horizon: usize,
    ) -> Result<AdditiveForecast> {
        let predictor = self.registry.additive(frequency, channel)?;
        let dates = future_timestamps(last_timestamp, horizon, frequency)?;
        let points = predict_dates(predictor, &dates)?;
        Ok(AdditiveForecast { points })
    }

    /// In-sample predictions for historical dates
    pub fn fitted(
        &self,
        channel: &str,
        frequency: Frequency,
        dates: &[NaiveDateTime],
    ) -> Result<Vec<f64>> {
        let predictor = self.registry.additive(frequency, channel)?;
        Ok(predict_dates(predictor, dates)?.iter().map(|p| p.yhat).collect())
    }
}

fn predict_dates(predictor: &dyn SeasonalPredictor, dates: &[NaiveDateTime]) -> Result<Vec<SeasonalPoint>> {
    let points = predictor.predict(dates).map_err(as_inference)?;
    if points.len() != dates.len() {
        return Err(ForecastError::Inference(format!(
            "{} returned {} points for {} dates",
            predictor.name(),
            points.len(),
            dates.len()
        )));
    }
    Ok(points)
}

/// Whether an error from the additive path should fall back to the trend estimate
pub fn is_predictor_failure(err: &ForecastError) -> bool {
    matches!(
        err,
        ForecastError::UnknownCategory { .. }
            | ForecastError::MissingArtifact(_)
            | ForecastError::Inference(_)
    )
}

/// Mean of the trailing window, damped, repeated over the horizon
pub fn trend_estimate(history: &[f64], policy: &FallbackPolicy) -> f64 {
    let start = history.len().saturating_sub(policy.window);
    let recent = &history[start..];
    if recent.is_empty() {
        return 0.0;
    }
    recent.iter().sum::<f64>() / recent.len() as f64 * policy.factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrendSeasonalModel;
    use crate::utils::date_parser::parse_timestamp;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    #[test]
    fn test_forecast_uses_registered_model() {
        let origin = parse_timestamp("2014-01-01").unwrap();
        let registry = ModelRegistry::builder()
            .with_additive(
                Frequency::Daily,
                "A",
                Arc::new(TrendSeasonalModel::new(origin, 10.0, 1.0)),
            )
            .build();

        let forecast = AdditiveForecaster::new(&registry)
            .forecast("A", Frequency::Daily, origin, 3)
            .unwrap();

        assert_eq!(forecast.values(), vec![11.0, 12.0, 13.0]);
        assert_eq!(forecast.points[2].ds, parse_timestamp("2014-01-04").unwrap());
    }

    #[test]
    fn test_missing_models_are_predictor_failures() {
        let registry = ModelRegistry::default();
        let err = AdditiveForecaster::new(&registry)
            .forecast("A", Frequency::Weekly, parse_timestamp("2014-01-01").unwrap(), 2)
            .unwrap_err();
        assert!(is_predictor_failure(&err));
        assert!(!is_predictor_failure(&ForecastError::InvalidRequest("x".to_string())));
    }

    #[test]
    fn test_trend_estimate() {
        let history: Vec<f64> = (1..=40).map(|v| v as f64).collect();
        let policy = FallbackPolicy::default();
        // mean of 11..=40 is 25.5
        assert_relative_eq!(trend_estimate(&history, &policy), 25.5 * 0.9);
        assert_relative_eq!(trend_estimate(&[2.0, 4.0], &policy), 2.7);
        assert_eq!(trend_estimate(&[], &policy), 0.0);
    }
}
