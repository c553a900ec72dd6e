//! Raw table ingest and the cleaned series structure

use crate::config::ALL_CHANNELS;
use crate::error::{ForecastError, Result};
use crate::utils::date_parser;
use chrono::NaiveDateTime;
use polars::prelude::*;
use serde_json::{Map, Number, Value};
use std::collections::HashSet;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Number of rows polars inspects when inferring column types
const SCHEMA_INFERENCE_ROWS: usize = 100;

/// One raw input row; anything other than an object is rejected by validation
pub type RawRow = Value;

/// Data loader for raw sales tables
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load raw rows from a CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Vec<RawRow>> {
        let bytes = fs::read(path)?;
        Self::from_csv_bytes(&bytes)
    }

    /// Load raw rows from CSV bytes.
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Vec<RawRow>> {
        let df = CsvReader::new(Cursor::new(bytes.to_vec()))
            .infer_schema(Some(SCHEMA_INFERENCE_ROWS))
            .has_header(true)
            .with_encoding(CsvEncoding::LossyUtf8)
            .finish()?;

        debug!(rows = df.height(), columns = df.width(), "parsed CSV upload");
        Self::from_dataframe(&df)
    }

    /// Load raw rows from a JSON file holding an array of records
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Vec<RawRow>> {
        let text = fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&text)?;
        Self::from_json_records(value)
    }

    /// Accept a JSON array of records
    pub fn from_json_records(value: Value) -> Result<Vec<RawRow>> {
        match value {
            Value::Array(rows) => Ok(rows),
            other => Err(ForecastError::InvalidRequest(format!(
                "Expected an array of records, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Convert a DataFrame into raw rows: numeric columns become numbers,
    /// everything else strings, nulls stay null
    pub fn from_dataframe(df: &DataFrame) -> Result<Vec<RawRow>> {
        let mut rows = vec![Map::new(); df.height()];

        for series in df.get_columns() {
            let name = series.name().to_string();

            if series.dtype().is_numeric() {
                let floats = series.cast(&DataType::Float64)?;
                for (row, value) in rows.iter_mut().zip(floats.f64()?.into_iter()) {
                    let cell = value
                        .and_then(Number::from_f64)
                        .map(Value::Number)
                        .unwrap_or(Value::Null);
                    row.insert(name.clone(), cell);
                }
            } else {
                let text = series.cast(&DataType::Utf8)?;
                for (row, value) in rows.iter_mut().zip(text.utf8()?.into_iter()) {
                    let cell = value
                        .map(|s| Value::String(s.to_string()))
                        .unwrap_or(Value::Null);
                    row.insert(name.clone(), cell);
                }
            }
        }

        Ok(rows.into_iter().map(Value::Object).collect())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Union of column names across object rows, in first-seen order
pub fn column_names(rows: &[RawRow]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();

    for row in rows {
        if let Value::Object(map) = row {
            for key in map.keys() {
                if seen.insert(key.as_str()) {
                    names.push(key.clone());
                }
            }
        }
    }

    names
}

/// One timestamped row of channel values, aligned to the series channels
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesRecord {
    pub timestamp: NaiveDateTime,
    pub values: Vec<f64>,
}

/// A non-numeric column carried through cleaning for analysis
#[derive(Debug, Clone, PartialEq)]
pub struct LabelColumn {
    pub name: String,
    pub values: Vec<String>,
}

/// Cleaned, strictly time-ordered multichannel series.
///
/// Every record has exactly one finite value per channel and timestamps
/// are strictly increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedSeries {
    channels: Vec<String>,
    timestamp_field: String,
    records: Vec<TimeSeriesRecord>,
    labels: Vec<LabelColumn>,
    warnings: Vec<String>,
}

impl CleanedSeries {
    /// Build a series, checking its invariants
    pub fn new(
        channels: Vec<String>,
        timestamp_field: impl Into<String>,
        records: Vec<TimeSeriesRecord>,
        labels: Vec<LabelColumn>,
    ) -> Result<Self> {
        if channels.is_empty() {
            return Err(ForecastError::Schema(
                "A series needs at least one channel".to_string(),
            ));
        }
        if records.is_empty() {
            return Err(ForecastError::InsufficientData(
                "A series needs at least one record".to_string(),
            ));
        }
        for (i, record) in records.iter().enumerate() {
            if record.values.len() != channels.len() {
                return Err(ForecastError::Schema(format!(
                    "Record {} has {} values, expected {}",
                    i,
                    record.values.len(),
                    channels.len()
                )));
            }
            if record.values.iter().any(|v| !v.is_finite()) {
                return Err(ForecastError::Schema(format!(
                    "Record {} contains a non-finite value",
                    i
                )));
            }
        }
        if records.windows(2).any(|w| w[0].timestamp >= w[1].timestamp) {
            return Err(ForecastError::Schema(
                "Timestamps must be strictly increasing".to_string(),
            ));
        }
        if let Some(label) = labels.iter().find(|l| l.values.len() != records.len()) {
            return Err(ForecastError::Schema(format!(
                "Label column '{}' does not match the record count",
                label.name
            )));
        }

        Ok(Self {
            channels,
            timestamp_field: timestamp_field.into(),
            records,
            labels,
            warnings: Vec::new(),
        })
    }

    /// Attach cleaning warnings
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn timestamp_field(&self) -> &str {
        &self.timestamp_field
    }

    pub fn records(&self) -> &[TimeSeriesRecord] {
        &self.records
    }

    pub fn labels(&self) -> &[LabelColumn] {
        &self.labels
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        self.records.iter().map(|r| r.timestamp).collect()
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.records.first().map(|r| r.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.records.last().map(|r| r.timestamp)
    }

    pub fn channel_index(&self, channel: &str) -> Option<usize> {
        self.channels.iter().position(|c| c == channel)
    }

    /// Values of one channel, or the per-row sum for [`ALL_CHANNELS`]
    pub fn channel_values(&self, channel: &str) -> Result<Vec<f64>> {
        if channel.eq_ignore_ascii_case(ALL_CHANNELS) {
            return Ok(self.totals());
        }

        let index = self.channel_index(channel).ok_or_else(|| {
            ForecastError::InvalidRequest(format!(
                "Unknown column '{}'. Expected one of: {}, {}",
                channel,
                self.channels.join(", "),
                ALL_CHANNELS
            ))
        })?;

        Ok(self.records.iter().map(|r| r.values[index]).collect())
    }

    /// Per-row sum across all channels
    pub fn totals(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.values.iter().sum()).collect()
    }

    /// Row-major matrix of channel values
    pub fn matrix(&self) -> Vec<Vec<f64>> {
        self.records.iter().map(|r| r.values.clone()).collect()
    }

    /// The trailing `n` records as a new series
    pub fn tail(&self, n: usize) -> Self {
        let start = self.records.len().saturating_sub(n.max(1));
        Self {
            channels: self.channels.clone(),
            timestamp_field: self.timestamp_field.clone(),
            records: self.records[start..].to_vec(),
            labels: self
                .labels
                .iter()
                .map(|l| LabelColumn {
                    name: l.name.clone(),
                    values: l.values[start..].to_vec(),
                })
                .collect(),
            warnings: self.warnings.clone(),
        }
    }

    /// Render the series back into raw rows
    pub fn to_rows(&self) -> Vec<RawRow> {
        self.records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let mut row = Map::new();
                row.insert(
                    self.timestamp_field.clone(),
                    Value::String(date_parser::format_timestamp(&record.timestamp, true)),
                );
                for (channel, value) in self.channels.iter().zip(&record.values) {
                    let cell = Number::from_f64(*value)
                        .map(Value::Number)
                        .unwrap_or(Value::Null);
                    row.insert(channel.clone(), cell);
                }
                for label in &self.labels {
                    row.insert(label.name.clone(), Value::String(label.values[i].clone()));
                }
                Value::Object(row)
            })
            .collect()
    }
}
