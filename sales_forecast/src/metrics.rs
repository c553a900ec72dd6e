//! Metrics for evaluating forecast performance

use crate::error::{ForecastError, Result};
use serde::Serialize;

/// Accuracy of a forecast against actual values
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastMetrics {
    /// Mean Absolute Error
    pub mae: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Percentage Error, over non-zero actuals only
    pub mape: f64,
    /// Number of forecast/actual pairs evaluated
    pub points: usize,
}

impl ForecastMetrics {
    /// Metrics for an evaluation with nothing to compare
    pub fn empty() -> Self {
        Self {
            mae: 0.0,
            rmse: 0.0,
            mape: 0.0,
            points: 0,
        }
    }
}

/// Evaluate forecast accuracy against actual values
pub fn evaluate_forecast(forecast: &[f64], actual: &[f64]) -> Result<ForecastMetrics> {
    if forecast.len() != actual.len() || forecast.is_empty() {
        return Err(ForecastError::InvalidRequest(
            "Forecast and actual values must have the same non-zero length".to_string(),
        ));
    }

    let n = forecast.len() as f64;
    let errors: Vec<f64> = forecast
        .iter()
        .zip(actual)
        .map(|(&f, &a)| a - f)
        .collect();

    let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
    let mse = errors.iter().map(|e| e.powi(2)).sum::<f64>() / n;

    let (pct_sum, pct_count) = actual
        .iter()
        .zip(&errors)
        .filter(|(a, _)| **a != 0.0)
        .fold((0.0, 0usize), |(sum, count), (&a, &e)| {
            (sum + e.abs() / a.abs() * 100.0, count + 1)
        });
    let mape = if pct_count > 0 {
        pct_sum / pct_count as f64
    } else {
        0.0
    };

    Ok(ForecastMetrics {
        mae,
        rmse: mse.sqrt(),
        mape,
        points: forecast.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_evaluate_forecast() {
        let metrics = evaluate_forecast(&[10.0, 20.0, 30.0], &[12.0, 18.0, 30.0]).unwrap();

        assert_relative_eq!(metrics.mae, 4.0 / 3.0);
        assert_relative_eq!(metrics.rmse, (8.0_f64 / 3.0).sqrt());
        assert_relative_eq!(metrics.mape, (2.0 / 12.0 + 2.0 / 18.0) * 100.0 / 3.0);
        assert_eq!(metrics.points, 3);
    }

    #[test]
    fn test_mape_skips_zero_actuals() {
        let metrics = evaluate_forecast(&[1.0, 5.0], &[0.0, 10.0]).unwrap();
        assert_relative_eq!(metrics.mape, 50.0);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(evaluate_forecast(&[1.0], &[1.0, 2.0]).is_err());
        assert!(evaluate_forecast(&[], &[]).is_err());
    }
}
