//! Synthetic sales tables for demos and tests

use crate::error::{ForecastError, Result};
use crate::frequency::Frequency;
use crate::utils::{date_parser::format_timestamp, future_timestamps};
use chrono::{Datelike, NaiveDateTime, Timelike};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde_json::{Map, Number, Value};
use std::f64::consts::PI;

/// Shape of a generated table
#[derive(Debug, Clone, PartialEq)]
pub struct SampleConfig {
    pub start: NaiveDateTime,
    pub frequency: Frequency,
    pub rows: usize,
    pub channels: Vec<String>,
    pub timestamp_field: String,
    /// Mean level of the first channel; later channels scale down from it
    pub base_level: f64,
    /// Standard deviation of the additive noise
    pub noise: f64,
    pub seed: u64,
}

impl SampleConfig {
    pub fn new(start: NaiveDateTime, frequency: Frequency, rows: usize, channels: Vec<String>) -> Self {
        Self {
            start,
            frequency,
            rows,
            channels,
            timestamp_field: "datum".to_string(),
            base_level: 10.0,
            noise: 1.0,
            seed: 42,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise;
        self
    }
}

/// Generate raw rows with daily, weekly and yearly seasonality plus noise.
///
/// Values are non-negative and reproducible for a given seed.
pub fn generate_rows(config: &SampleConfig) -> Result<Vec<Value>> {
    if config.rows == 0 || config.channels.is_empty() {
        return Err(ForecastError::InvalidRequest(
            "A sample needs at least one row and one channel".to_string(),
        ));
    }
    let noise = Normal::new(0.0, config.noise)
        .map_err(|e| ForecastError::InvalidRequest(format!("Invalid noise level: {}", e)))?;
    let mut rng = StdRng::seed_from_u64(config.seed);

    let mut timestamps = vec![config.start];
    timestamps.extend(future_timestamps(config.start, config.rows - 1, config.frequency)?);

    let with_time = config.frequency.is_hourly();
    Ok(timestamps
        .iter()
        .map(|ts| {
            let season = seasonal_factor(ts, config.frequency);
            let mut row = Map::new();
            row.insert(
                config.timestamp_field.clone(),
                Value::String(format_timestamp(ts, with_time)),
            );
            for (i, channel) in config.channels.iter().enumerate() {
                let level = config.base_level / (1.0 + i as f64 * 0.5);
                let value = (level * season + noise.sample(&mut rng)).max(0.0);
                let rounded = (value * 100.0).round() / 100.0;
                row.insert(
                    channel.clone(),
                    Number::from_f64(rounded).map(Value::Number).unwrap_or(Value::Null),
                );
            }
            Value::Object(row)
        })
        .collect())
}

/// Generate a table and render it as CSV bytes
pub fn generate_csv(config: &SampleConfig) -> Result<Vec<u8>> {
    let rows = generate_rows(config)?;
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec![config.timestamp_field.clone()];
    header.extend(config.channels.iter().cloned());
    writer.write_record(&header)?;

    for row in &rows {
        let record: Vec<String> = header
            .iter()
            .map(|column| match row.get(column) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => String::new(),
            })
            .collect();
        writer.write_record(&record)?;
    }

    writer
        .into_inner()
        .map_err(|e| ForecastError::Io(e.into_error()))
}

fn seasonal_factor(ts: &NaiveDateTime, frequency: Frequency) -> f64 {
    let yearly = 1.0 + 0.2 * (2.0 * PI * ts.ordinal() as f64 / 365.25).sin();
    let weekly = match ts.weekday().num_days_from_monday() {
        5 | 6 => 0.8,
        _ => 1.05,
    };
    match frequency {
        Frequency::Hourly => {
            let hour = ts.hour() as f64;
            let daily = 1.0 + 0.5 * (2.0 * PI * (hour - 6.0) / 24.0).sin();
            yearly * weekly * daily
        }
        Frequency::Daily => yearly * weekly,
        Frequency::Weekly | Frequency::Monthly => yearly,
    }
}
