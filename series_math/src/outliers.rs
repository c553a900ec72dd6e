//! Outlier detection rules
//!
//! Two rules are supported:
//! - IQR fences: values outside `[Q1 - 1.5 IQR, Q3 + 1.5 IQR]`
//! - Z-score: `|z| > 3` using the population mean and standard deviation

use crate::descriptive::percentile;
use crate::{MathError, Result};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::fmt;
use std::str::FromStr;

const IQR_FENCE: f64 = 1.5;
const ZSCORE_THRESHOLD: f64 = 3.0;
const VARIANCE_EPSILON: f64 = 1e-8;

/// Outlier detection method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlierMethod {
    Iqr,
    Zscore,
}

impl fmt::Display for OutlierMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutlierMethod::Iqr => write!(f, "iqr"),
            OutlierMethod::Zscore => write!(f, "zscore"),
        }
    }
}

impl FromStr for OutlierMethod {
    type Err = MathError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "iqr" => Ok(OutlierMethod::Iqr),
            "zscore" | "z-score" | "z_score" => Ok(OutlierMethod::Zscore),
            other => Err(MathError::InvalidInput(format!(
                "Unknown outlier method: {}",
                other
            ))),
        }
    }
}

/// Method-specific parameters behind the reported bounds
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutlierDetail {
    Iqr { q1: f64, q3: f64 },
    Zscore { mean: f64, std: f64, threshold: f64 },
}

/// Result of an outlier scan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierReport {
    /// Positions of flagged values, ascending
    pub indices: Vec<usize>,
    pub method: OutlierMethod,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub detail: OutlierDetail,
}

impl OutlierReport {
    /// Number of flagged values
    pub fn count(&self) -> usize {
        self.indices.len()
    }
}

/// Flag outliers in `values` with the given method
pub fn detect_outliers(values: &[f64], method: OutlierMethod) -> Result<OutlierReport> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot detect outliers in an empty series".to_string(),
        ));
    }

    match method {
        OutlierMethod::Iqr => {
            let q1 = percentile(values, 25.0)?;
            let q3 = percentile(values, 75.0)?;
            let iqr = q3 - q1;
            let lower_bound = q1 - IQR_FENCE * iqr;
            let upper_bound = q3 + IQR_FENCE * iqr;

            let indices = flag(values, |v| v < lower_bound || v > upper_bound);

            Ok(OutlierReport {
                indices,
                method,
                lower_bound,
                upper_bound,
                detail: OutlierDetail::Iqr { q1, q3 },
            })
        }
        OutlierMethod::Zscore => {
            let mean = Statistics::mean(values.iter());
            let std = Statistics::population_std_dev(values.iter());
            let scale = std + VARIANCE_EPSILON;

            let indices = flag(values, |v| ((v - mean) / scale).abs() > ZSCORE_THRESHOLD);

            Ok(OutlierReport {
                indices,
                method,
                lower_bound: mean - ZSCORE_THRESHOLD * std,
                upper_bound: mean + ZSCORE_THRESHOLD * std,
                detail: OutlierDetail::Zscore {
                    mean,
                    std,
                    threshold: ZSCORE_THRESHOLD,
                },
            })
        }
    }
}

fn flag(values: &[f64], is_outlier: impl Fn(f64) -> bool) -> Vec<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, &v)| is_outlier(v))
        .map(|(i, _)| i)
        .collect()
}
