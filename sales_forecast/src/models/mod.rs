//! Predictor interfaces and the artifacts that implement them.
//!
//! Predictors are opaque to the pipeline: it only feeds them windows or
//! dates and reads back numbers. Training lives elsewhere.

use crate::error::Result;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod linear;
pub mod registry;
pub mod scaler;
pub mod seasonal;

pub use linear::LinearSequenceModel;
pub use registry::{ModelRegistry, ModelRegistryBuilder, RegistryStatus};
pub use scaler::{MinMaxScaler, ScalerArtifact, StandardScaler};
pub use seasonal::TrendSeasonalModel;

/// Maps a window of scaled channel rows to the next scaled row
pub trait SequencePredictor: Send + Sync + fmt::Debug {
    /// `window` is `seq_len` rows of width `n_channels`; the output has width `n_channels`
    fn predict(&self, window: &[Vec<f64>]) -> Result<Vec<f64>>;

    fn name(&self) -> &str;
}

/// Invertible per-channel scaling fitted at training time
pub trait FeatureScaler: Send + Sync + fmt::Debug {
    /// Number of channels the scaler was fitted on
    fn n_features(&self) -> usize;

    fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>>;

    fn inverse_transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>>;
}

/// One dated point of an additive forecast
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeasonalPoint {
    pub ds: NaiveDateTime,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
}

/// Trend plus seasonality model for a single channel at one cadence
pub trait SeasonalPredictor: Send + Sync + fmt::Debug {
    /// Predict one point per requested date, in order
    fn predict(&self, dates: &[NaiveDateTime]) -> Result<Vec<SeasonalPoint>>;

    fn name(&self) -> &str;
}
