//! Rolling window statistics
//!
//! Windows use `min_periods = 1`: the first positions are computed over
//! whatever values are available, so every position yields a value.

use crate::{MathError, Result};
use serde::Serialize;
use std::collections::VecDeque;

/// Fixed-capacity sliding window over a stream of values
#[derive(Debug, Clone)]
pub struct RollingWindow {
    period: usize,
    values: VecDeque<f64>,
    sum: f64,
}

impl RollingWindow {
    /// Create a new window holding at most `period` values
    pub fn new(period: usize) -> Result<Self> {
        if period == 0 {
            return Err(MathError::InvalidInput(
                "Period must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            period,
            values: VecDeque::with_capacity(period),
            sum: 0.0,
        })
    }

    /// Push a new value, evicting the oldest one when the window is full
    pub fn push(&mut self, value: f64) {
        self.values.push_back(value);
        self.sum += value;

        if self.values.len() > self.period {
            if let Some(old_value) = self.values.pop_front() {
                self.sum -= old_value;
            }
        }
    }

    /// Mean of the values currently in the window
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.sum / self.values.len() as f64)
    }

    /// Sample standard deviation (divides by `n - 1`); `None` below two values
    pub fn sample_std(&self) -> Option<f64> {
        if self.values.len() < 2 {
            return None;
        }

        let mean = self.values.iter().sum::<f64>() / self.values.len() as f64;
        let variance = self
            .values
            .iter()
            .map(|&v| (v - mean).powi(2))
            .sum::<f64>()
            / (self.values.len() - 1) as f64;

        Some(variance.sqrt())
    }

    pub fn min(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::max)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

/// Statistics of one window position
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RollingStats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

/// Rolling mean/std/min/max for every position of `values`.
///
/// The standard deviation is 0 where it is undefined (a single value).
pub fn rolling_stats(values: &[f64], period: usize) -> Result<Vec<RollingStats>> {
    let mut window = RollingWindow::new(period)?;

    Ok(values
        .iter()
        .map(|&value| {
            window.push(value);
            RollingStats {
                mean: window.mean().unwrap_or(value),
                std: window.sample_std().unwrap_or(0.0),
                min: window.min().unwrap_or(value),
                max: window.max().unwrap_or(value),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_window_slides() {
        let mut window = RollingWindow::new(3).unwrap();
        assert!(window.mean().is_none());

        window.push(2.0);
        window.push(4.0);
        window.push(6.0);
        assert_eq!(window.mean(), Some(4.0));

        window.push(8.0);
        assert_eq!(window.len(), 3);
        assert_eq!(window.mean(), Some(6.0));
        assert_eq!(window.min(), Some(4.0));
        assert_eq!(window.max(), Some(8.0));
    }

    #[test]
    fn test_rolling_stats_min_periods() {
        let stats = rolling_stats(&[1.0, 3.0, 5.0, 7.0], 3).unwrap();

        assert_eq!(stats.len(), 4);
        assert_eq!(stats[0].mean, 1.0);
        assert_eq!(stats[0].std, 0.0);
        assert_eq!(stats[1].mean, 2.0);
        assert_relative_eq!(stats[1].std, 2.0_f64.sqrt());
        assert_eq!(stats[3].mean, 5.0);
        assert_eq!(stats[3].min, 3.0);
        assert_eq!(stats[3].max, 7.0);
    }

    #[test]
    fn test_zero_period_rejected() {
        assert!(RollingWindow::new(0).is_err());
        assert!(rolling_stats(&[1.0], 0).is_err());
    }
}
