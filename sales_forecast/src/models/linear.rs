//! Autoregressive sequence predictor restored from fitted weights

use super::SequencePredictor;
use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};

/// Per-channel linear autoregression over the most recent rows of a window.
///
/// `lag_weights[k]` multiplies the row `k + 1` steps back; weights are
/// shared across channels, `bias` is per channel (empty means zero).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearSequenceModel {
    #[serde(default = "default_name")]
    pub name: String,
    pub lag_weights: Vec<f64>,
    #[serde(default)]
    pub bias: Vec<f64>,
}

fn default_name() -> String {
    "linear_sequence".to_string()
}

impl LinearSequenceModel {
    pub fn new(lag_weights: Vec<f64>, bias: Vec<f64>) -> Result<Self> {
        let model = Self {
            name: default_name(),
            lag_weights,
            bias,
        };
        model.check()?;
        Ok(model)
    }

    /// Repeat the last row of the window
    pub fn persistence() -> Self {
        Self {
            name: "persistence".to_string(),
            lag_weights: vec![1.0],
            bias: Vec::new(),
        }
    }

    pub fn check(&self) -> Result<()> {
        if self.lag_weights.is_empty() {
            return Err(ForecastError::MissingArtifact(
                "sequence model has no lag weights".to_string(),
            ));
        }
        if self.lag_weights.iter().chain(&self.bias).any(|w| !w.is_finite()) {
            return Err(ForecastError::MissingArtifact(
                "sequence model has non-finite parameters".to_string(),
            ));
        }
        Ok(())
    }
}

impl SequencePredictor for LinearSequenceModel {
    fn predict(&self, window: &[Vec<f64>]) -> Result<Vec<f64>> {
        if window.len() < self.lag_weights.len() {
            return Err(ForecastError::Inference(format!(
                "{} needs {} rows, window has {}",
                self.name,
                self.lag_weights.len(),
                window.len()
            )));
        }

        let width = window[window.len() - 1].len();
        if !self.bias.is_empty() && self.bias.len() != width {
            return Err(ForecastError::Inference(format!(
                "{} has {} biases for {} channels",
                self.name,
                self.bias.len(),
                width
            )));
        }

        let mut output = if self.bias.is_empty() {
            vec![0.0; width]
        } else {
            self.bias.clone()
        };

        for (k, weight) in self.lag_weights.iter().enumerate() {
            let row = &window[window.len() - 1 - k];
            if row.len() != width {
                return Err(ForecastError::Inference(format!(
                    "Window rows have inconsistent widths ({} vs {})",
                    row.len(),
                    width
                )));
            }
            for (out, value) in output.iter_mut().zip(row) {
                *out += weight * value;
            }
        }

        Ok(output)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weighted_lags() {
        let model = LinearSequenceModel::new(vec![0.5, 0.25], vec![1.0, 0.0]).unwrap();
        let window = vec![vec![8.0, 4.0], vec![4.0, 8.0], vec![2.0, 2.0]];

        assert_eq!(model.predict(&window).unwrap(), vec![1.0 + 1.0 + 1.0, 1.0 + 2.0]);
    }

    #[test]
    fn test_persistence_repeats_last_row() {
        let model = LinearSequenceModel::persistence();
        assert_eq!(model.predict(&[vec![1.0], vec![3.0]]).unwrap(), vec![3.0]);
    }

    #[test]
    fn test_short_window_is_inference_error() {
        let model = LinearSequenceModel::new(vec![1.0, 1.0, 1.0], vec![]).unwrap();
        assert!(matches!(
            model.predict(&[vec![1.0]]),
            Err(ForecastError::Inference(_))
        ));
    }
}
