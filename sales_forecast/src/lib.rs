//! # Sales Forecast
//!
//! Frequency-adaptive forecasting for multichannel pharmaceutical sales.
//!
//! ## Features
//!
//! - Ingest from CSV uploads (via polars) or JSON records
//! - Validation that reports every problem at once, and deterministic cleaning
//! - Cadence detection (hourly, daily, weekly, monthly) from timestamp gaps
//! - Hourly data: recursive multi-step forecasts from a sequence predictor
//! - Coarser data: per-channel additive predictors with a trend fallback
//! - Bounding of forecasts against history, and accuracy metrics
//! - Descriptive analysis: statistics, outliers, monthly aggregation
//!
//! ## Quick Start
//!
//! ```no_run
//! use sales_forecast::config::ServiceConfig;
//! use sales_forecast::data::DataLoader;
//! use sales_forecast::models::ModelRegistry;
//! use sales_forecast::orchestrator::{ForecastOrchestrator, ForecastRequest};
//!
//! # fn main() -> sales_forecast::Result<()> {
//! let config = ServiceConfig::default();
//! let registry = ModelRegistry::load_from_dir(&config.model_dir, config.channels.len())?;
//!
//! let rows = DataLoader::from_csv("salesdaily.csv")?;
//! let request = ForecastRequest::new(7).with_category("N02BE");
//! let result = ForecastOrchestrator::new(&config, &registry).forecast(&rows, &request)?;
//!
//! println!("{} {} ahead", result.forecast.values.len(), result.frequency.granularity());
//! # Ok(())
//! # }
//! ```

pub mod additive;
pub mod analysis;
pub mod bounds;
pub mod clean;
pub mod config;
pub mod data;
pub mod error;
pub mod export;
pub mod features;
pub mod frequency;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod recursive;
pub mod sample;
pub mod service;
pub mod stats;
pub mod utils;
pub mod validate;

// Re-export commonly used types
pub use crate::config::{load_config, ServiceConfig};
pub use crate::data::{CleanedSeries, DataLoader, TimeSeriesRecord};
pub use crate::error::{ForecastError, Result};
pub use crate::frequency::{Frequency, FrequencyDetector};
pub use crate::models::{FeatureScaler, ModelRegistry, SeasonalPredictor, SequencePredictor};
pub use crate::orchestrator::{ForecastOrchestrator, ForecastRequest, ForecastResult};
pub use crate::service::{ApiResponse, ForecastService};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
