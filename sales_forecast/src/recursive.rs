//! Multi-step forecasting by feeding one-step predictions back as input

use crate::error::{ForecastError, Result};
use crate::models::{FeatureScaler, SequencePredictor};
use std::collections::VecDeque;
use tracing::debug;

/// Rolls a one-step sequence predictor forward over a fixed-length window
#[derive(Debug, Clone, Copy)]
pub struct RecursiveForecaster<'a> {
    predictor: &'a dyn SequencePredictor,
    scaler: &'a dyn FeatureScaler,
    seq_len: usize,
}

impl<'a> RecursiveForecaster<'a> {
    pub fn new(
        predictor: &'a dyn SequencePredictor,
        scaler: &'a dyn FeatureScaler,
        seq_len: usize,
    ) -> Result<Self> {
        if seq_len == 0 {
            return Err(ForecastError::InvalidRequest(
                "Sequence length must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            predictor,
            scaler,
            seq_len,
        })
    }

    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    /// Forecast `horizon` rows from scaled history.
    ///
    /// The last `seq_len` rows of `scaled_history` seed the window. Each
    /// prediction is appended and the oldest row dropped, so every call sees
    /// exactly `seq_len` rows. Returns inverse-scaled rows, one per step.
    pub fn forecast(&self, scaled_history: &[Vec<f64>], horizon: usize) -> Result<Vec<Vec<f64>>> {
        if scaled_history.len() < self.seq_len {
            return Err(ForecastError::InsufficientHistory {
                required: self.seq_len,
                actual: scaled_history.len(),
            });
        }
        if horizon == 0 {
            return Err(ForecastError::InvalidRequest(
                "Horizon must be at least 1".to_string(),
            ));
        }

        let width = self.scaler.n_features();
        let start = scaled_history.len() - self.seq_len;
        let mut window: VecDeque<Vec<f64>> = scaled_history[start..].iter().cloned().collect();
        if let Some(row) = window.iter().find(|row| row.len() != width) {
            return Err(ForecastError::Inference(format!(
                "Window row has {} features, expected {}",
                row.len(),
                width
            )));
        }

        let mut predictions = Vec::with_capacity(horizon);
        for step in 0..horizon {
            let next = self.predict_one(window.make_contiguous())?;
            debug!(step, predictor = self.predictor.name(), "recursive step");

            window.pop_front();
            window.push_back(next.clone());
            predictions.push(next);
        }

        self.scaler.inverse_transform(&predictions)
    }

    /// One prediction from a full window, checked for width
    pub fn predict_one(&self, window: &[Vec<f64>]) -> Result<Vec<f64>> {
        let width = self.scaler.n_features();
        let next = self.predictor.predict(window).map_err(as_inference)?;
        if next.len() != width {
            return Err(ForecastError::Inference(format!(
                "{} returned {} values, expected {}",
                self.predictor.name(),
                next.len(),
                width
            )));
        }
        Ok(next)
    }
}

/// Predictor failures surface as inference errors whatever their origin
pub(crate) fn as_inference(err: ForecastError) -> ForecastError {
    match err {
        ForecastError::Inference(_) => err,
        other => ForecastError::Inference(other.to_string()),
    }
}
