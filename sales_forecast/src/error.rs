//! Error types for the sales_forecast crate

use polars::prelude::PolarsError;
use thiserror::Error;

/// Custom error types for the sales_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Missing or malformed required columns
    #[error("Schema error: {0}")]
    Schema(String),

    /// Too few rows for the requested operation
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// The sequence path needs a full window of history
    #[error("Not enough history. Need at least {required} rows, got {actual}")]
    InsufficientHistory { required: usize, actual: usize },

    /// The requested channel has no fitted predictor for the frequency
    #[error("No model found for category '{category}'. Available: {available:?}")]
    UnknownCategory {
        category: String,
        available: Vec<String>,
    },

    /// A predictor artifact was never loaded
    #[error("Missing model artifact: {0}")]
    MissingArtifact(String),

    /// The opaque predictor itself failed
    #[error("Inference failure: {0}")]
    Inference(String),

    /// Request parameters out of range or unknown
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Input validation failed; every problem is listed
    #[error("Data validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Error from IO operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    Polars(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Error from the statistics kernel
    #[error("Math error: {0}")]
    Math(#[from] series_math::MathError),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::Polars(err.to_string())
    }
}

impl ForecastError {
    /// HTTP status code for this error: 4xx for caller faults, 5xx for internal ones
    pub fn status_code(&self) -> u16 {
        match self {
            ForecastError::Schema(_)
            | ForecastError::InsufficientData(_)
            | ForecastError::InsufficientHistory { .. }
            | ForecastError::InvalidRequest(_)
            | ForecastError::Validation(_)
            | ForecastError::Json(_)
            | ForecastError::Polars(_) => 400,
            ForecastError::Math(series_math::MathError::CalculationError(_)) => 500,
            ForecastError::Math(_) => 400,
            ForecastError::UnknownCategory { .. } => 404,
            ForecastError::MissingArtifact(_) => 503,
            ForecastError::Inference(_)
            | ForecastError::Io(_)
            | ForecastError::Csv(_)
            | ForecastError::Config(_) => 500,
        }
    }

    /// Whether the caller caused this error
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}
