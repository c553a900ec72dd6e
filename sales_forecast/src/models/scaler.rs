//! Scalers restored from fitted parameters

use super::FeatureScaler;
use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};

/// Min-max scaling to `feature_range`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    pub data_min: Vec<f64>,
    pub data_max: Vec<f64>,
    #[serde(default = "default_range")]
    pub feature_range: (f64, f64),
}

fn default_range() -> (f64, f64) {
    (0.0, 1.0)
}

impl MinMaxScaler {
    pub fn new(data_min: Vec<f64>, data_max: Vec<f64>) -> Result<Self> {
        let scaler = Self {
            data_min,
            data_max,
            feature_range: default_range(),
        };
        scaler.check()?;
        Ok(scaler)
    }

    /// Check the fitted parameters are consistent
    pub fn check(&self) -> Result<()> {
        if self.data_min.is_empty() || self.data_min.len() != self.data_max.len() {
            return Err(ForecastError::MissingArtifact(
                "min-max scaler needs equal, non-empty data_min and data_max".to_string(),
            ));
        }
        if self.feature_range.1 <= self.feature_range.0 {
            return Err(ForecastError::MissingArtifact(
                "min-max scaler feature_range must be increasing".to_string(),
            ));
        }
        Ok(())
    }

    /// Per-channel multiplier; constant channels get 1
    fn scale(&self, i: usize) -> f64 {
        let span = self.data_max[i] - self.data_min[i];
        let span = if span.abs() < f64::EPSILON { 1.0 } else { span };
        (self.feature_range.1 - self.feature_range.0) / span
    }
}

impl FeatureScaler for MinMaxScaler {
    fn n_features(&self) -> usize {
        self.data_min.len()
    }

    fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        map_rows(rows, self.n_features(), |i, v| {
            (v - self.data_min[i]) * self.scale(i) + self.feature_range.0
        })
    }

    fn inverse_transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        map_rows(rows, self.n_features(), |i, v| {
            (v - self.feature_range.0) / self.scale(i) + self.data_min[i]
        })
    }
}

/// Zero-mean, unit-variance scaling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self> {
        let scaler = Self { mean, scale };
        scaler.check()?;
        Ok(scaler)
    }

    pub fn check(&self) -> Result<()> {
        if self.mean.is_empty() || self.mean.len() != self.scale.len() {
            return Err(ForecastError::MissingArtifact(
                "standard scaler needs equal, non-empty mean and scale".to_string(),
            ));
        }
        Ok(())
    }

    fn scale(&self, i: usize) -> f64 {
        if self.scale[i].abs() < f64::EPSILON {
            1.0
        } else {
            self.scale[i]
        }
    }
}

impl FeatureScaler for StandardScaler {
    fn n_features(&self) -> usize {
        self.mean.len()
    }

    fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        map_rows(rows, self.n_features(), |i, v| (v - self.mean[i]) / self.scale(i))
    }

    fn inverse_transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        map_rows(rows, self.n_features(), |i, v| v * self.scale(i) + self.mean[i])
    }
}

/// On-disk scaler artifact, tagged by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScalerArtifact {
    MinMax(MinMaxScaler),
    Standard(StandardScaler),
}

impl ScalerArtifact {
    /// Check parameters and hand back the scaler behind the trait
    pub fn into_scaler(self) -> Result<Box<dyn FeatureScaler>> {
        match self {
            ScalerArtifact::MinMax(scaler) => {
                scaler.check()?;
                Ok(Box::new(scaler))
            }
            ScalerArtifact::Standard(scaler) => {
                scaler.check()?;
                Ok(Box::new(scaler))
            }
        }
    }
}

fn map_rows<F>(rows: &[Vec<f64>], width: usize, f: F) -> Result<Vec<Vec<f64>>>
where
    F: Fn(usize, f64) -> f64,
{
    rows.iter()
        .enumerate()
        .map(|(r, row)| {
            if row.len() != width {
                return Err(ForecastError::Inference(format!(
                    "Row {} has {} features, scaler expects {}",
                    r,
                    row.len(),
                    width
                )));
            }
            Ok(row.iter().enumerate().map(|(i, &v)| f(i, v)).collect())
        })
        .collect()
}
