//! Transport-neutral request handlers.
//!
//! Each handler takes the decoded request (CSV bytes or a JSON body) and
//! returns a status code with a JSON body. Caller faults map to 4xx with
//! the error message; internal faults map to 5xx with a generic message
//! while the detail goes to the log.

use crate::analysis::SeriesAnalyzer;
use crate::config::{load_config, ServiceConfig};
use crate::data::DataLoader;
use crate::error::{ForecastError, Result};
use crate::features::FeatureVector;
use crate::frequency::Frequency;
use crate::metrics::ForecastMetrics;
use crate::models::ModelRegistry;
use crate::orchestrator::{ForecastOrchestrator, ForecastRequest, ForecastResult, TimedValues};
use crate::utils::date_parser::format_timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use tracing::{error, info};

/// Dates and values of one series in a response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPayload {
    pub dates: Vec<String>,
    pub values: Vec<f64>,
}

impl SeriesPayload {
    fn from_timed(timed: &TimedValues, with_time: bool) -> Self {
        Self {
            dates: timed
                .timestamps
                .iter()
                .map(|ts| format_timestamp(ts, with_time))
                .collect(),
            values: timed.values.clone(),
        }
    }
}

/// Body of a successful forecast response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastResponse {
    pub historical: SeriesPayload,
    pub forecast: SeriesPayload,
    pub metrics: ForecastMetrics,
    pub granularity: &'static str,
    pub frequency: Frequency,
    pub category: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<FeatureVector>,
}

impl From<&ForecastResult> for ForecastResponse {
    fn from(result: &ForecastResult) -> Self {
        let with_time = result.frequency.is_hourly();
        Self {
            historical: SeriesPayload::from_timed(&result.historical, with_time),
            forecast: SeriesPayload::from_timed(&result.forecast, with_time),
            metrics: result.metrics,
            granularity: result.frequency.granularity(),
            frequency: result.frequency,
            category: result.category.clone(),
            fallback: result.fallback,
            warnings: result.warnings.clone(),
            features: result.features.clone(),
        }
    }
}

/// Status code and JSON body
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Map an error onto a response; internal details stay in the log
    pub fn from_error(operation: &str, err: &ForecastError) -> Self {
        let status = err.status_code();
        let message = if err.is_client_error() {
            info!(operation, error = %err, "rejected request");
            err.to_string()
        } else if status == 503 {
            error!(operation, error = %err, "model artifacts unavailable");
            "Model artifacts are not available".to_string()
        } else {
            error!(operation, error = %err, "request failed");
            format!("{} failed due to an internal error", operation)
        };

        Self {
            status,
            body: json!({ "error": message }),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DaysParam {
    Number(i64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct PredictPayload {
    #[serde(default)]
    records: Vec<Value>,
    #[serde(default)]
    days: Option<DaysParam>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    frequency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnalyzePayload {
    #[serde(default)]
    data: Vec<Value>,
    #[serde(default)]
    column: Option<String>,
}

/// Shared forecasting service: configuration plus loaded predictors.
///
/// Handlers take `&self` and may run concurrently.
#[derive(Debug, Clone)]
pub struct ForecastService {
    config: ServiceConfig,
    registry: ModelRegistry,
}

impl ForecastService {
    pub fn new(config: ServiceConfig, registry: ModelRegistry) -> Self {
        Self { config, registry }
    }

    /// Load configuration, then every artifact under its `model_dir`
    pub fn from_config_file(path: Option<&Path>) -> Result<Self> {
        let config = load_config(path)?;
        let registry = ModelRegistry::load_from_dir(&config.model_dir, config.channels.len())?;
        Ok(Self::new(config, registry))
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Forecast from an uploaded CSV file with form fields `days`, `category`
    /// and an optional `frequency` hint
    pub fn predict_csv(
        &self,
        bytes: &[u8],
        days: Option<&str>,
        category: Option<&str>,
        frequency: Option<&str>,
    ) -> ApiResponse {
        self.respond("Prediction", || {
            let days = parse_days_text(days, self.config.default_days)?;
            let rows = DataLoader::from_csv_bytes(bytes)?;

            let request = ForecastRequest {
                days,
                category: category.map(str::to_string),
                frequency_hint: parse_frequency(frequency)?,
            };
            self.run_forecast(&rows, &request)
        })
    }

    /// Forecast from a JSON body `{"records": [...], "days": n, "category": c}`
    pub fn predict_json(&self, body: &Value) -> ApiResponse {
        self.respond("Prediction", || {
            let payload: PredictPayload = serde_json::from_value(body.clone())?;
            if payload.records.is_empty() {
                return Err(ForecastError::InvalidRequest(
                    "Provide a non-empty 'records' array".to_string(),
                ));
            }

            let days = match payload.days {
                None => self.config.default_days,
                Some(DaysParam::Number(n)) => positive_days(n)?,
                Some(DaysParam::Text(text)) => parse_days_text(Some(&text), self.config.default_days)?,
            };
            let request = ForecastRequest {
                days,
                category: payload.category,
                frequency_hint: parse_frequency(payload.frequency.as_deref())?,
            };
            self.run_forecast(&payload.records, &request)
        })
    }

    /// Analyze a JSON body `{"data": [...], "column": c}`
    pub fn analyze(&self, body: &Value) -> ApiResponse {
        self.respond("Analysis", || {
            let payload: AnalyzePayload = serde_json::from_value(body.clone())?;
            let report = SeriesAnalyzer::new(&self.config).analyze(&payload.data, payload.column.as_deref())?;
            Ok(serde_json::to_value(report)?)
        })
    }

    pub fn health(&self) -> ApiResponse {
        let artifacts = self.registry.status();
        let status = if artifacts.sequence_model && artifacts.scaler {
            "ok"
        } else {
            "degraded"
        };

        ApiResponse::ok(json!({
            "status": status,
            "channels": self.config.channels,
            "timestamp_field": self.config.timestamp_field,
            "seq_len": self.config.seq_len,
            "artifacts": artifacts,
        }))
    }

    fn run_forecast(&self, rows: &[Value], request: &ForecastRequest) -> Result<Value> {
        let result = ForecastOrchestrator::new(&self.config, &self.registry).forecast(rows, request)?;
        Ok(serde_json::to_value(ForecastResponse::from(&result))?)
    }

    /// Single boundary that turns errors and panics into responses
    fn respond<F>(&self, operation: &str, handler: F) -> ApiResponse
    where
        F: FnOnce() -> Result<Value>,
    {
        match catch_unwind(AssertUnwindSafe(handler)) {
            Ok(Ok(body)) => ApiResponse::ok(body),
            Ok(Err(err)) => ApiResponse::from_error(operation, &err),
            Err(_) => {
                error!(operation, "handler panicked");
                ApiResponse {
                    status: 500,
                    body: json!({ "error": format!("{} failed due to an internal error", operation) }),
                }
            }
        }
    }
}

fn positive_days(days: i64) -> Result<usize> {
    if days <= 0 {
        return Err(ForecastError::InvalidRequest(
            "Days must be a positive integer".to_string(),
        ));
    }
    usize::try_from(days)
        .map_err(|_| ForecastError::InvalidRequest("Days is out of range".to_string()))
}

fn parse_frequency(raw: Option<&str>) -> Result<Option<Frequency>> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse::<Frequency>)
        .transpose()
}

fn parse_days_text(raw: Option<&str>, default_days: usize) -> Result<usize> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(default_days),
        Some(text) => {
            let days = text.parse::<i64>().map_err(|_| {
                ForecastError::InvalidRequest(format!("Days must be a positive integer, got '{}'", text))
            })?;
            positive_days(days)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_days() {
        assert_eq!(parse_days_text(None, 7).unwrap(), 7);
        assert_eq!(parse_days_text(Some(" 3 "), 7).unwrap(), 3);
        assert!(parse_days_text(Some("0"), 7).is_err());
        assert!(parse_days_text(Some("-2"), 7).is_err());
        assert!(parse_days_text(Some("soon"), 7).is_err());
    }

    #[test]
    fn test_internal_errors_are_generic() {
        let response = ApiResponse::from_error(
            "Prediction",
            &ForecastError::Inference("tensor shape mismatch at layer 3".to_string()),
        );
        assert_eq!(response.status, 500);
        assert_eq!(
            response.body["error"],
            json!("Prediction failed due to an internal error")
        );
    }

    #[test]
    fn test_client_errors_keep_message() {
        let response = ApiResponse::from_error(
            "Prediction",
            &ForecastError::InvalidRequest("Days must be a positive integer".to_string()),
        );
        assert_eq!(response.status, 400);
        assert_eq!(
            response.body["error"],
            json!("Invalid request: Days must be a positive integer")
        );
    }

    #[test]
    fn test_not_found_keeps_message() {
        let response = ApiResponse::from_error(
            "Prediction",
            &ForecastError::UnknownCategory {
                category: "R03".to_string(),
                available: vec!["N02BE".to_string()],
            },
        );
        assert_eq!(response.status, 404);
        assert!(response.body["error"].as_str().unwrap().contains("R03"));

        let unavailable = ApiResponse::from_error(
            "Prediction",
            &ForecastError::MissingArtifact("models/scaler.json".to_string()),
        );
        assert_eq!(unavailable.status, 503);
        assert_eq!(unavailable.body["error"], json!("Model artifacts are not available"));
    }

    #[test]
    fn test_health_reports_missing_artifacts() {
        let service = ForecastService::new(ServiceConfig::default(), ModelRegistry::default());
        let response = service.health();
        assert_eq!(response.status, 200);
        assert_eq!(response.body["status"], json!("degraded"));
        assert_eq!(response.body["artifacts"]["sequence_model"], json!(false));
    }

    #[test]
    fn test_panics_become_internal_errors() {
        let service = ForecastService::new(ServiceConfig::default(), ModelRegistry::default());
        let response = service.respond("Analysis", || panic!("boom"));
        assert_eq!(response.status, 500);
    }
}
