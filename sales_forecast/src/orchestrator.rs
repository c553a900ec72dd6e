//! End-to-end forecast pipeline.
//!
//! Hourly data goes through the sequence predictor over all channels;
//! daily, weekly and monthly data goes through per-channel additive
//! predictors, falling back to a damped trend estimate when none can answer.

use crate::additive::{is_predictor_failure, trend_estimate, AdditiveForecaster};
use crate::bounds::{BoundStrategy, OutputBounder};
use crate::clean::SeriesCleaner;
use crate::config::{ServiceConfig, ALL_CHANNELS};
use crate::data::{CleanedSeries, RawRow};
use crate::error::{ForecastError, Result};
use crate::features::{FeatureEngineer, FeatureVector};
use crate::frequency::{Frequency, FrequencyDetector};
use crate::metrics::{evaluate_forecast, ForecastMetrics};
use crate::models::ModelRegistry;
use crate::recursive::RecursiveForecaster;
use crate::utils::future_timestamps;
use crate::validate::SeriesValidator;
use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

/// Parameters of one forecast
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRequest {
    /// Horizon in days; hourly data forecasts 24 steps per day, other
    /// cadences one step per period
    pub days: usize,
    /// Channel to forecast; the first channel when absent, every channel summed for `all`
    pub category: Option<String>,
    /// Cadence to assume instead of detecting it
    pub frequency_hint: Option<Frequency>,
}

impl ForecastRequest {
    pub fn new(days: usize) -> Self {
        Self {
            days,
            category: None,
            frequency_hint: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency_hint = Some(frequency);
        self
    }
}

/// Values paired with their timestamps
#[derive(Debug, Clone, PartialEq)]
pub struct TimedValues {
    pub timestamps: Vec<NaiveDateTime>,
    pub values: Vec<f64>,
}

/// Outcome of a forecast
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastResult {
    pub historical: TimedValues,
    pub forecast: TimedValues,
    pub metrics: ForecastMetrics,
    pub frequency: Frequency,
    pub category: String,
    /// Set when the trend estimate replaced the additive predictor
    pub fallback: bool,
    /// Forecast values altered by bounding
    pub clipped: usize,
    /// Engineered features of the latest row (sequence path only)
    pub features: Option<FeatureVector>,
    pub warnings: Vec<String>,
}

/// Runs validation, cleaning, detection, forecasting and bounding
#[derive(Debug, Clone, Copy)]
pub struct ForecastOrchestrator<'a> {
    config: &'a ServiceConfig,
    registry: &'a ModelRegistry,
}

struct PathOutput {
    values: Vec<f64>,
    metrics: ForecastMetrics,
    fallback: bool,
    features: Option<FeatureVector>,
    strategy: BoundStrategy,
}

impl<'a> ForecastOrchestrator<'a> {
    pub fn new(config: &'a ServiceConfig, registry: &'a ModelRegistry) -> Self {
        Self { config, registry }
    }

    /// Forecast from raw rows
    pub fn forecast(&self, rows: &[RawRow], request: &ForecastRequest) -> Result<ForecastResult> {
        SeriesValidator::new(&self.config.timestamp_field, &self.config.channels)
            .validate(rows)
            .into_result()?;

        let series = SeriesCleaner::new(&self.config.channels, &self.config.timestamp_field)
            .with_labels(&self.config.label_fields)
            .with_missing_values(self.config.missing_values)
            .clean(rows)?;

        self.forecast_series(&series, request)
    }

    /// Forecast from an already cleaned series
    pub fn forecast_series(
        &self,
        series: &CleanedSeries,
        request: &ForecastRequest,
    ) -> Result<ForecastResult> {
        let frequency = match request.frequency_hint {
            Some(hint) => {
                debug!(frequency = %hint, "using frequency hint");
                hint
            }
            None => FrequencyDetector::detect(series)?,
        };
        let category = self.resolve_category(series, request.category.as_deref())?;
        let steps = self.horizon_steps(request.days, frequency)?;
        let last = series.last_timestamp().ok_or_else(|| {
            ForecastError::InsufficientData("Cannot forecast an empty series".to_string())
        })?;

        info!(
            rows = series.len(),
            %frequency,
            category = %category,
            steps,
            "starting forecast"
        );

        let history = series.channel_values(&category)?;
        let output = if frequency.is_hourly() {
            self.forecast_sequence(series, &category, steps)?
        } else {
            self.forecast_additive(series, &category, frequency, steps, &history)?
        };

        let bounded = OutputBounder::new(&self.config.bounds).bound(
            &output.values,
            &history,
            output.strategy,
        );
        let forecast_dates = future_timestamps(last, steps, frequency)?;

        let mut warnings = series.warnings().to_vec();
        if output.fallback {
            warnings.push("Additive model unavailable; used trend estimate".to_string());
        }
        if bounded.clipped > 0 {
            warnings.push(format!("{} forecast values were clipped", bounded.clipped));
        }

        Ok(ForecastResult {
            historical: TimedValues {
                timestamps: series.timestamps(),
                values: history,
            },
            forecast: TimedValues {
                timestamps: forecast_dates,
                values: bounded.values,
            },
            metrics: output.metrics,
            frequency,
            category,
            fallback: output.fallback,
            clipped: bounded.clipped,
            features: output.features,
            warnings,
        })
    }

    /// Absent or blank selects the first channel. An unknown name is an
    /// `InvalidRequest`; it is never replaced by the first channel.
    fn resolve_category(&self, series: &CleanedSeries, category: Option<&str>) -> Result<String> {
        let channels = series.channels();
        match category.map(str::trim).filter(|c| !c.is_empty()) {
            None => channels.first().cloned().ok_or_else(|| {
                ForecastError::Schema("No channels configured".to_string())
            }),
            Some(c) if c.eq_ignore_ascii_case(ALL_CHANNELS) => Ok(ALL_CHANNELS.to_string()),
            Some(c) if channels.iter().any(|channel| channel == c) => Ok(c.to_string()),
            Some(c) => Err(ForecastError::InvalidRequest(format!(
                "Unknown category '{}'. Expected one of: {}, {}",
                c,
                channels.join(", "),
                ALL_CHANNELS
            ))),
        }
    }

    fn horizon_steps(&self, days: usize, frequency: Frequency) -> Result<usize> {
        if days == 0 {
            return Err(ForecastError::InvalidRequest(
                "Days must be a positive integer".to_string(),
            ));
        }
        let steps = frequency.steps_for_days(days);
        if steps > self.config.max_horizon {
            return Err(ForecastError::InvalidRequest(format!(
                "Horizon of {} {} exceeds the maximum of {} steps",
                steps,
                frequency.granularity(),
                self.config.max_horizon
            )));
        }
        Ok(steps)
    }

    fn forecast_sequence(
        &self,
        series: &CleanedSeries,
        category: &str,
        steps: usize,
    ) -> Result<PathOutput> {
        let seq_len = self.config.seq_len;
        if series.len() < seq_len {
            return Err(ForecastError::InsufficientHistory {
                required: seq_len,
                actual: series.len(),
            });
        }

        let predictor = self.registry.sequence()?;
        let scaler = self.registry.scaler()?;
        if scaler.n_features() != series.channels().len() {
            return Err(ForecastError::MissingArtifact(format!(
                "scaler expects {} features but the series has {} channels",
                scaler.n_features(),
                series.channels().len()
            )));
        }

        let features = FeatureEngineer::new(self.config.feature_lookback)?
            .engineer(series, category)?
            .latest();

        let mut scaled = scaler.transform(&series.matrix())?;
        FeatureEngineer::sanitize_window(&mut scaled);

        let forecaster = RecursiveForecaster::new(predictor, scaler, seq_len)?;
        let rows = forecaster.forecast(&scaled, steps)?;
        let values = self.target_values(series, category, &rows)?;

        let metrics = self.sequence_metrics(series, category, &scaled, &forecaster)?;

        Ok(PathOutput {
            values,
            metrics,
            fallback: false,
            features,
            strategy: BoundStrategy::Sequence,
        })
    }

    /// Pick the target out of full-width rows: one channel, or their sum
    fn target_values(
        &self,
        series: &CleanedSeries,
        category: &str,
        rows: &[Vec<f64>],
    ) -> Result<Vec<f64>> {
        if category == ALL_CHANNELS {
            return Ok(rows.iter().map(|row| row.iter().sum()).collect());
        }
        let index = series.channel_index(category).ok_or_else(|| {
            ForecastError::InvalidRequest(format!("Unknown category '{}'", category))
        })?;
        rows.iter()
            .map(|row| {
                row.get(index).copied().ok_or_else(|| {
                    ForecastError::Inference(format!("Predicted row lacks channel {}", index))
                })
            })
            .collect()
    }

    /// One-step holdout over the trailing positions that have a full window before them
    fn sequence_metrics(
        &self,
        series: &CleanedSeries,
        category: &str,
        scaled: &[Vec<f64>],
        forecaster: &RecursiveForecaster<'_>,
    ) -> Result<ForecastMetrics> {
        let seq_len = forecaster.seq_len();
        let available = scaled.len().saturating_sub(seq_len);
        let points = available.min(self.config.metrics_window);
        if points == 0 {
            return Ok(ForecastMetrics::empty());
        }

        let scaler = self.registry.scaler()?;
        let start = scaled.len() - points;
        let mut predicted_rows = Vec::with_capacity(points);
        for position in start..scaled.len() {
            predicted_rows.push(forecaster.predict_one(&scaled[position - seq_len..position])?);
        }
        let predicted = self.target_values(series, category, &scaler.inverse_transform(&predicted_rows)?)?;
        let actual = series.channel_values(category)?;

        evaluate_forecast(&predicted, &actual[start..])
    }

    fn forecast_additive(
        &self,
        series: &CleanedSeries,
        category: &str,
        frequency: Frequency,
        steps: usize,
        history: &[f64],
    ) -> Result<PathOutput> {
        let forecaster = AdditiveForecaster::new(self.registry);
        let last = series.last_timestamp().ok_or_else(|| {
            ForecastError::InsufficientData("Cannot forecast an empty series".to_string())
        })?;

        let attempt = forecaster
            .forecast(category, frequency, last, steps)
            .and_then(|forecast| {
                let fitted = forecaster.fitted(category, frequency, &series.timestamps())?;
                let metrics = evaluate_forecast(&fitted, history)?;
                Ok((forecast.values(), metrics))
            });

        match attempt {
            Ok((values, metrics)) => Ok(PathOutput {
                values,
                metrics,
                fallback: false,
                features: None,
                strategy: BoundStrategy::Additive,
            }),
            Err(err) if is_predictor_failure(&err) => {
                warn!(error = %err, category, "additive predictor unavailable, using trend estimate");
                Ok(self.trend_fallback(history, steps))
            }
            Err(err) => Err(err),
        }
    }

    fn trend_fallback(&self, history: &[f64], steps: usize) -> PathOutput {
        let policy = &self.config.fallback;
        let estimate = trend_estimate(history, policy);

        let start = history.len().saturating_sub(policy.window);
        let recent = &history[start..];
        let metrics = if recent.is_empty() {
            ForecastMetrics::empty()
        } else {
            evaluate_forecast(&vec![estimate; recent.len()], recent)
                .unwrap_or_else(|_| ForecastMetrics::empty())
        };

        PathOutput {
            values: vec![estimate; steps],
            metrics,
            fallback: true,
            features: None,
            strategy: BoundStrategy::Additive,
        }
    }
}
