//! Turning validated raw rows into a [`CleanedSeries`]

use crate::data::{column_names, CleanedSeries, LabelColumn, RawRow, TimeSeriesRecord};
use crate::error::{ForecastError, Result};
use crate::utils::{cell_to_string, date_parser, parse_numeric, resolve_column, NumericCell};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Label value used when a row has no label
pub const UNKNOWN_LABEL: &str = "unknown";

/// How channel gaps are filled once empty rows are dropped.
///
/// Whatever a strategy cannot reach (a leading gap for forward fill, a
/// channel with no values at all) ends up as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingValueStrategy {
    #[default]
    Zero,
    /// Linear between neighbours by position; trailing gaps repeat the last value
    Interpolate,
    ForwardFill,
    BackwardFill,
    Mean,
    Median,
}

impl fmt::Display for MissingValueStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MissingValueStrategy::Zero => "zero",
            MissingValueStrategy::Interpolate => "interpolate",
            MissingValueStrategy::ForwardFill => "forward_fill",
            MissingValueStrategy::BackwardFill => "backward_fill",
            MissingValueStrategy::Mean => "mean",
            MissingValueStrategy::Median => "median",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for MissingValueStrategy {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "zero" => Ok(MissingValueStrategy::Zero),
            "interpolate" | "linear" => Ok(MissingValueStrategy::Interpolate),
            "forward_fill" | "ffill" => Ok(MissingValueStrategy::ForwardFill),
            "backward_fill" | "bfill" => Ok(MissingValueStrategy::BackwardFill),
            "mean" => Ok(MissingValueStrategy::Mean),
            "median" => Ok(MissingValueStrategy::Median),
            other => Err(ForecastError::InvalidRequest(format!(
                "Unknown missing-value strategy '{}'",
                other
            ))),
        }
    }
}

/// Cleans raw rows into a strictly ordered, gap-free series
#[derive(Debug, Clone)]
pub struct SeriesCleaner<'a> {
    channels: &'a [String],
    timestamp_field: &'a str,
    label_fields: &'a [String],
    missing_values: MissingValueStrategy,
}

struct ParsedRow<'r> {
    timestamp: NaiveDateTime,
    source: usize,
    map: &'r Map<String, Value>,
}

struct PendingRow {
    timestamp: NaiveDateTime,
    values: Vec<Option<f64>>,
    labels: Vec<String>,
}

impl<'a> SeriesCleaner<'a> {
    pub fn new(channels: &'a [String], timestamp_field: &'a str) -> Self {
        Self {
            channels,
            timestamp_field,
            label_fields: &[],
            missing_values: MissingValueStrategy::default(),
        }
    }

    /// Fill channel gaps with `strategy` instead of zero
    pub fn with_missing_values(mut self, strategy: MissingValueStrategy) -> Self {
        self.missing_values = strategy;
        self
    }

    /// Carry these label columns through when present
    pub fn with_labels(mut self, label_fields: &'a [String]) -> Self {
        self.label_fields = label_fields;
        self
    }

    /// Clean raw rows.
    ///
    /// Rows are sorted by timestamp, unusable numeric cells become missing,
    /// rows with no channel value at all are dropped, duplicate timestamps keep
    /// the last occurrence, and the remaining gaps are filled per channel with
    /// the configured [`MissingValueStrategy`].
    pub fn clean(&self, rows: &[RawRow]) -> Result<CleanedSeries> {
        let columns = column_names(rows);
        let timestamp_column = resolve_column(&columns, self.timestamp_field).ok_or_else(|| {
            ForecastError::Schema(format!(
                "Data must contain a '{}' column",
                self.timestamp_field
            ))
        })?;

        let mut parsed = self.parse_timestamps(rows, &timestamp_column)?;
        parsed.sort_by_key(|row| row.timestamp);

        let missing: Vec<&str> = self
            .channels
            .iter()
            .filter(|channel| !columns.contains(channel))
            .map(|channel| channel.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(ForecastError::Schema(format!(
                "Data is missing required channel columns: {}",
                missing.join(", ")
            )));
        }

        let label_columns: Vec<(String, String)> = self
            .label_fields
            .iter()
            .filter_map(|field| resolve_column(&columns, field).map(|c| (field.clone(), c)))
            .collect();

        let mut warnings = Vec::new();
        let mut invalid_cells = 0;
        let mut dropped = 0;
        let mut kept: Vec<PendingRow> = Vec::with_capacity(parsed.len());

        for row in &parsed {
            let mut values = Vec::with_capacity(self.channels.len());
            let mut present = 0;

            for channel in self.channels {
                match parse_numeric(row.map.get(channel)) {
                    NumericCell::Number(v) => {
                        present += 1;
                        values.push(Some(v));
                    }
                    NumericCell::Invalid => {
                        invalid_cells += 1;
                        debug!(record = row.source, channel = %channel, "non-numeric cell treated as missing");
                        values.push(None);
                    }
                    NumericCell::Missing => values.push(None),
                }
            }

            if present == 0 {
                dropped += 1;
                continue;
            }

            let labels = label_columns
                .iter()
                .map(|(_, column)| normalize_label(row.map.get(column)))
                .collect();

            kept.push(PendingRow {
                timestamp: row.timestamp,
                values,
                labels,
            });
        }

        if invalid_cells > 0 {
            warnings.push(format!(
                "{} non-numeric values were treated as missing",
                invalid_cells
            ));
        }
        if dropped > 0 {
            warnings.push(format!("Dropped {} rows with no channel values", dropped));
        }

        let before = kept.len();
        let deduped = keep_last_per_timestamp(kept);
        let duplicates = before - deduped.len();
        if duplicates > 0 {
            warnings.push(format!(
                "Collapsed {} duplicate timestamps, keeping the last occurrence",
                duplicates
            ));
        }

        if deduped.is_empty() {
            return Err(ForecastError::InsufficientData(
                "No rows with channel values remain after cleaning".to_string(),
            ));
        }

        for message in &warnings {
            warn!("{}", message);
        }

        let mut labels: Vec<LabelColumn> = label_columns
            .iter()
            .map(|(field, _)| LabelColumn {
                name: field.clone(),
                values: Vec::with_capacity(deduped.len()),
            })
            .collect();
        let filled = fill_gaps(&deduped, self.channels.len(), self.missing_values);
        let mut records = Vec::with_capacity(deduped.len());
        for (row, values) in deduped.into_iter().zip(filled) {
            for (column, value) in labels.iter_mut().zip(row.labels) {
                column.values.push(value);
            }
            records.push(TimeSeriesRecord {
                timestamp: row.timestamp,
                values,
            });
        }

        Ok(CleanedSeries::new(
            self.channels.to_vec(),
            self.timestamp_field,
            records,
            labels,
        )?
        .with_warnings(warnings))
    }

    fn parse_timestamps<'r>(
        &self,
        rows: &'r [RawRow],
        timestamp_column: &str,
    ) -> Result<Vec<ParsedRow<'r>>> {
        let mut parsed = Vec::with_capacity(rows.len());
        let mut failures = Vec::new();

        for (i, row) in rows.iter().enumerate() {
            let Value::Object(map) = row else {
                failures.push(format!("record {} is not a mapping", i));
                continue;
            };

            let timestamp = match map.get(timestamp_column) {
                Some(Value::String(raw)) => date_parser::parse_timestamp(raw).ok(),
                _ => None,
            };

            match timestamp {
                Some(timestamp) => parsed.push(ParsedRow {
                    timestamp,
                    source: i,
                    map,
                }),
                None => {
                    let raw = map
                        .get(timestamp_column)
                        .map(cell_to_string)
                        .unwrap_or_else(|| "null".to_string());
                    failures.push(format!("record {} ('{}')", i, raw));
                }
            }
        }

        if failures.is_empty() {
            Ok(parsed)
        } else {
            Err(ForecastError::Schema(format!(
                "Unparsable values in column '{}': {}",
                timestamp_column,
                failures.join(", ")
            )))
        }
    }
}

fn normalize_label(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => UNKNOWN_LABEL.to_string(),
        Some(value) => {
            let text = cell_to_string(value).trim().to_lowercase();
            if text.is_empty() {
                UNKNOWN_LABEL.to_string()
            } else {
                text
            }
        }
    }
}

/// Collapse runs of equal timestamps in a sorted list, keeping the last entry
fn keep_last_per_timestamp(sorted: Vec<PendingRow>) -> Vec<PendingRow> {
    let mut out: Vec<PendingRow> = Vec::with_capacity(sorted.len());
    for entry in sorted {
        match out.last_mut() {
            Some(last) if last.timestamp == entry.timestamp => *last = entry,
            _ => out.push(entry),
        }
    }
    out
}

/// Fill every channel column and return the rows as plain values
fn fill_gaps(rows: &[PendingRow], width: usize, strategy: MissingValueStrategy) -> Vec<Vec<f64>> {
    let mut out = vec![Vec::with_capacity(width); rows.len()];
    for channel in 0..width {
        let column: Vec<Option<f64>> = rows.iter().map(|row| row.values[channel]).collect();
        for (row, value) in out.iter_mut().zip(fill_column(&column, strategy)) {
            row.push(value);
        }
    }
    out
}

fn fill_column(column: &[Option<f64>], strategy: MissingValueStrategy) -> Vec<f64> {
    let known: Vec<f64> = column.iter().flatten().copied().collect();
    let constant = |fill: f64| column.iter().map(|v| v.unwrap_or(fill)).collect::<Vec<f64>>();

    match strategy {
        MissingValueStrategy::Zero => constant(0.0),
        MissingValueStrategy::Mean if known.is_empty() => constant(0.0),
        MissingValueStrategy::Mean => constant(known.iter().sum::<f64>() / known.len() as f64),
        MissingValueStrategy::Median => {
            constant(series_math::percentile(&known, 50.0).unwrap_or(0.0))
        }
        MissingValueStrategy::ForwardFill => {
            let mut last = None;
            column
                .iter()
                .map(|v| {
                    if v.is_some() {
                        last = *v;
                    }
                    last.unwrap_or(0.0)
                })
                .collect()
        }
        MissingValueStrategy::BackwardFill => {
            let mut next = None;
            let mut filled: Vec<f64> = column
                .iter()
                .rev()
                .map(|v| {
                    if v.is_some() {
                        next = *v;
                    }
                    next.unwrap_or(0.0)
                })
                .collect();
            filled.reverse();
            filled
        }
        MissingValueStrategy::Interpolate => interpolate(column),
    }
}

fn interpolate(column: &[Option<f64>]) -> Vec<f64> {
    let mut out = Vec::with_capacity(column.len());
    let mut previous: Option<(usize, f64)> = None;

    for (i, value) in column.iter().enumerate() {
        match (value, previous) {
            (Some(v), _) => {
                out.push(*v);
                previous = Some((i, *v));
            }
            (None, None) => out.push(0.0),
            (None, Some((p, pv))) => {
                let next = column[i + 1..]
                    .iter()
                    .enumerate()
                    .find_map(|(offset, v)| v.map(|v| (i + 1 + offset, v)));
                match next {
                    Some((n, nv)) => {
                        out.push(pv + (nv - pv) * (i - p) as f64 / (n - p) as f64);
                    }
                    None => out.push(pv),
                }
            }
        }
    }
    out
}
