//! Descriptive statistics
//!
//! Moments follow the conventions of the data-quality report:
//! - standard deviation is the population form (divides by `n`)
//! - percentiles interpolate linearly between closest ranks
//! - skewness and kurtosis are the bias-corrected sample estimators,
//!   kurtosis reported as excess over the normal distribution

use crate::{MathError, Result};
use serde::Serialize;
use statrs::statistics::{Data, Median, Statistics};

/// Summary statistics for one numeric column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptiveStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub q25: f64,
    pub q75: f64,
    /// `None` when fewer than 3 values are available
    pub skewness: Option<f64>,
    /// `None` when fewer than 4 values are available
    pub kurtosis: Option<f64>,
}

/// Compute descriptive statistics for a slice of values
pub fn describe(values: &[f64]) -> Result<DescriptiveStats> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot describe an empty series".to_string(),
        ));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(MathError::InvalidInput(
            "Series contains non-finite values".to_string(),
        ));
    }

    Ok(DescriptiveStats {
        count: values.len(),
        mean: Statistics::mean(values.iter()),
        median: Data::new(values.to_vec()).median(),
        std: Statistics::population_std_dev(values.iter()),
        min: Statistics::min(values.iter()),
        max: Statistics::max(values.iter()),
        q25: percentile(values, 25.0)?,
        q75: percentile(values, 75.0)?,
        skewness: skewness(values),
        kurtosis: kurtosis(values),
    })
}

/// Percentile with linear interpolation between closest ranks.
///
/// `q` is expressed in percent, `0.0..=100.0`.
pub fn percentile(values: &[f64], q: f64) -> Result<f64> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot take a percentile of an empty series".to_string(),
        ));
    }
    if !(0.0..=100.0).contains(&q) {
        return Err(MathError::InvalidInput(format!(
            "Percentile must be between 0 and 100, got {}",
            q
        )));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;

    Ok(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Percentage change from the first to the last value; 0 when the first value is 0
pub fn growth_rate(first: f64, last: f64) -> f64 {
    if first == 0.0 {
        0.0
    } else {
        (last - first) / first * 100.0
    }
}

fn central_sums(values: &[f64]) -> (f64, f64, f64) {
    let mean = Statistics::mean(values.iter());
    values.iter().fold((0.0, 0.0, 0.0), |(s2, s3, s4), &v| {
        let d = v - mean;
        let d2 = d * d;
        (s2 + d2, s3 + d2 * d, s4 + d2 * d2)
    })
}

/// Adjusted Fisher-Pearson skewness
fn skewness(values: &[f64]) -> Option<f64> {
    let n = values.len() as f64;
    if values.len() < 3 {
        return None;
    }

    let (s2, s3, _) = central_sums(values);
    let m2 = s2 / n;
    let m3 = s3 / n;
    if m2 <= f64::EPSILON {
        return Some(0.0);
    }

    Some((n * (n - 1.0)).sqrt() / (n - 2.0) * m3 / m2.powf(1.5))
}

/// Bias-corrected excess kurtosis
fn kurtosis(values: &[f64]) -> Option<f64> {
    let n = values.len() as f64;
    if values.len() < 4 {
        return None;
    }

    let (s2, _, s4) = central_sums(values);
    if s2 <= f64::EPSILON {
        return Some(0.0);
    }

    let numerator = n * (n + 1.0) * (n - 1.0) * s4;
    let denominator = (n - 2.0) * (n - 3.0) * s2 * s2;
    let adjustment = 3.0 * (n - 1.0).powi(2) / ((n - 2.0) * (n - 3.0));

    Some(numerator / denominator - adjustment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_describe_small_series() {
        let stats = describe(&[10.0, 20.0, 30.0]).unwrap();

        assert_eq!(stats.count, 3);
        assert_relative_eq!(stats.mean, 20.0);
        assert_relative_eq!(stats.median, 20.0);
        assert_relative_eq!(stats.min, 10.0);
        assert_relative_eq!(stats.max, 30.0);
        assert_relative_eq!(stats.q25, 15.0);
        assert_relative_eq!(stats.q75, 25.0);
        // sqrt(200 / 3)
        assert_relative_eq!(stats.std, 8.164_965_809, epsilon = 1e-6);
        assert_relative_eq!(stats.skewness.unwrap(), 0.0);
        assert!(stats.kurtosis.is_none());
    }

    #[test]
    fn test_describe_rejects_empty() {
        assert!(matches!(
            describe(&[]),
            Err(MathError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0, 100.0];
        assert_relative_eq!(percentile(&values, 25.0).unwrap(), 2.0);
        assert_relative_eq!(percentile(&values, 75.0).unwrap(), 4.0);
        assert_relative_eq!(percentile(&[1.0, 2.0], 50.0).unwrap(), 1.5);
        assert!(percentile(&values, 101.0).is_err());
    }

    #[test]
    fn test_skewness_and_kurtosis_of_skewed_series() {
        let values = [1.0, 2.0, 3.0, 4.0, 100.0];
        let stats = describe(&values).unwrap();

        // Adjusted Fisher-Pearson skewness and bias-corrected excess kurtosis
        assert_relative_eq!(stats.skewness.unwrap(), 2.232_396, epsilon = 1e-5);
        assert_relative_eq!(stats.kurtosis.unwrap(), 4.986_866, epsilon = 1e-5);
    }

    #[test]
    fn test_constant_series_has_zero_shape() {
        let stats = describe(&[5.0; 6]).unwrap();
        assert_eq!(stats.std, 0.0);
        assert_eq!(stats.skewness, Some(0.0));
        assert_eq!(stats.kurtosis, Some(0.0));
    }

    #[test]
    fn test_growth_rate() {
        assert_relative_eq!(growth_rate(10.0, 30.0), 200.0);
        assert_relative_eq!(growth_rate(50.0, 25.0), -50.0);
        assert_eq!(growth_rate(0.0, 30.0), 0.0);
    }
}
