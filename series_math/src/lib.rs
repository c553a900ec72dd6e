//! # Series Math
//!
//! Numeric building blocks for sales time series.
//! This crate provides the statistics the forecasting pipeline and the
//! data-quality report are built on:
//!
//! - Descriptive statistics (moments, percentiles, growth rate)
//! - Outlier rules (IQR fences and z-scores)
//! - Rolling windows that emit a value from the first position on

use thiserror::Error;

pub mod descriptive;
pub mod outliers;
pub mod rolling;

pub use descriptive::{describe, growth_rate, percentile, DescriptiveStats};
pub use outliers::{detect_outliers, OutlierDetail, OutlierMethod, OutlierReport};
pub use rolling::{rolling_stats, RollingStats, RollingWindow};

/// Errors that can occur in series calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for series math operations
pub type Result<T> = std::result::Result<T, MathError>;
