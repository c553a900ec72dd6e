//! # Pharma Forecast
//!
//! Workspace facade over the forecasting crates.
//!
//! - [`series_math`]: descriptive statistics, outlier rules, rolling windows
//! - [`sales_forecast`]: the frequency-adaptive forecasting pipeline
//!
//! ## Example
//!
//! ```
//! use pharma_forecast_workspace::series_math::describe;
//!
//! let stats = describe(&[10.0, 20.0, 30.0]).unwrap();
//! assert_eq!(stats.mean, 20.0);
//! assert_eq!(stats.median, 20.0);
//! ```

pub use sales_forecast;
pub use series_math;

pub use sales_forecast::{ForecastError, ForecastService, ServiceConfig};
