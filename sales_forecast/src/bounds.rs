//! Clipping forecasts into a plausible range derived from history

use crate::config::BoundPolicy;
use serde::Serialize;
use tracing::warn;

/// Which path produced a forecast; each clips differently
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundStrategy {
    /// Clamp to `[0, max + k * std]`
    Sequence,
    /// Floor at 0; values above `trigger * max` become `cap * max`
    Additive,
}

/// Bounded forecast values and how many were altered
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundedForecast {
    pub values: Vec<f64>,
    pub clipped: usize,
    pub upper: f64,
}

/// Applies a [`BoundPolicy`] to raw forecasts
#[derive(Debug, Clone, Copy)]
pub struct OutputBounder<'a> {
    policy: &'a BoundPolicy,
}

impl<'a> OutputBounder<'a> {
    pub fn new(policy: &'a BoundPolicy) -> Self {
        Self { policy }
    }

    /// Bound `forecast` against `history` of the same channel
    pub fn bound(&self, forecast: &[f64], history: &[f64], strategy: BoundStrategy) -> BoundedForecast {
        let max = historical_max(history);

        let (values, upper): (Vec<f64>, f64) = match strategy {
            BoundStrategy::Sequence => {
                let upper = max + self.policy.sequence_std_multiplier * population_std(history);
                let values = forecast
                    .iter()
                    .map(|&v| if v.is_nan() { 0.0 } else { v.min(upper).max(0.0) })
                    .collect();
                (values, upper)
            }
            BoundStrategy::Additive => {
                let trigger = self.policy.additive_cap_trigger * max;
                let cap = self.policy.additive_cap_value * max;
                let values = forecast
                    .iter()
                    .map(|&v| {
                        if v.is_nan() || v < 0.0 {
                            0.0
                        } else if v > trigger {
                            cap
                        } else {
                            v
                        }
                    })
                    .collect();
                (values, trigger)
            }
        };

        let clipped = forecast
            .iter()
            .zip(&values)
            .filter(|(raw, bounded)| raw.to_bits() != bounded.to_bits())
            .count();
        if clipped > 0 {
            warn!(clipped, upper, ?strategy, "forecast values clipped to bounds");
        }

        BoundedForecast {
            values,
            clipped,
            upper,
        }
    }
}

/// Maximum of the history, or 1 when the history is empty or not positive
fn historical_max(history: &[f64]) -> f64 {
    match history.iter().copied().reduce(f64::max) {
        Some(max) if max > 0.0 => max,
        _ => 1.0,
    }
}

/// Population standard deviation, or 1 for an empty history
fn population_std(history: &[f64]) -> f64 {
    if history.is_empty() {
        return 1.0;
    }
    let n = history.len() as f64;
    let mean = history.iter().sum::<f64>() / n;
    (history.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sequence_bounds() {
        let policy = BoundPolicy::default();
        let bounder = OutputBounder::new(&policy);
        let history = [2.0, 4.0, 6.0];
        let std = (8.0_f64 / 3.0).sqrt();

        let bounded = bounder.bound(&[-1.0, 5.0, 100.0, f64::NAN], &history, BoundStrategy::Sequence);

        assert_relative_eq!(bounded.upper, 6.0 + 2.0 * std);
        assert_eq!(bounded.values[0], 0.0);
        assert_eq!(bounded.values[1], 5.0);
        assert_relative_eq!(bounded.values[2], 6.0 + 2.0 * std);
        assert_eq!(bounded.values[3], 0.0);
        assert_eq!(bounded.clipped, 3);
    }

    #[test]
    fn test_additive_caps() {
        let policy = BoundPolicy::default();
        let bounder = OutputBounder::new(&policy);

        let bounded = bounder.bound(&[-3.0, 15.0, 21.0, f64::INFINITY], &[10.0, 5.0], BoundStrategy::Additive);

        assert_eq!(bounded.values, vec![0.0, 15.0, 15.0, 15.0]);
        assert_eq!(bounded.clipped, 3);
    }

    #[test]
    fn test_non_positive_history_uses_unit_max() {
        let policy = BoundPolicy::default();
        let bounder = OutputBounder::new(&policy);

        let bounded = bounder.bound(&[5.0], &[0.0, 0.0], BoundStrategy::Additive);
        assert_eq!(bounded.values, vec![1.5]);

        let bounded = bounder.bound(&[5.0], &[], BoundStrategy::Sequence);
        assert_eq!(bounded.upper, 3.0);
        assert_eq!(bounded.values, vec![3.0]);
    }
}
