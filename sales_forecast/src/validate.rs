//! Structural validation of raw input rows.
//!
//! Validation never stops at the first problem; every issue found is
//! reported so a caller can fix an upload in one pass.

use crate::data::{column_names, RawRow};
use crate::error::{ForecastError, Result};
use crate::utils::{cell_to_string, date_parser, parse_numeric, resolve_column, NumericCell};
use serde::Serialize;
use serde_json::Value;

/// Number of leading rows whose cells are type-checked
const SAMPLE_ROWS: usize = 5;

/// Outcome of validating a raw table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    /// Turn a failed report into [`ForecastError::Validation`]
    pub fn into_result(self) -> Result<()> {
        if self.is_valid {
            Ok(())
        } else {
            Err(ForecastError::Validation(self.errors))
        }
    }
}

/// Checks raw rows for the columns and cell types the pipeline needs
#[derive(Debug, Clone)]
pub struct SeriesValidator<'a> {
    timestamp_field: &'a str,
    required_channels: &'a [String],
}

impl<'a> SeriesValidator<'a> {
    pub fn new(timestamp_field: &'a str, required_channels: &'a [String]) -> Self {
        Self {
            timestamp_field,
            required_channels,
        }
    }

    pub fn validate(&self, rows: &[RawRow]) -> ValidationReport {
        if rows.is_empty() {
            return ValidationReport::from_errors(vec!["Data is empty".to_string()]);
        }

        let mut errors = Vec::new();

        for (i, row) in rows.iter().enumerate() {
            if !row.is_object() {
                errors.push(format!("Record {} is not a mapping", i));
            }
        }

        let columns = column_names(rows);
        let timestamp_column = resolve_column(&columns, self.timestamp_field);
        if timestamp_column.is_none() {
            errors.push(format!("Missing timestamp column: {}", self.timestamp_field));
        }

        let missing: Vec<&str> = self
            .required_channels
            .iter()
            .filter(|channel| !columns.contains(channel))
            .map(|channel| channel.as_str())
            .collect();
        if !missing.is_empty() {
            errors.push(format!("Missing required columns: {}", missing.join(", ")));
        }

        for (i, row) in rows.iter().enumerate().take(SAMPLE_ROWS) {
            let Value::Object(map) = row else {
                continue;
            };

            if let Some(column) = &timestamp_column {
                match map.get(column) {
                    None | Some(Value::Null) => {
                        errors.push(format!("Record {} has no timestamp", i));
                    }
                    Some(Value::String(raw)) => {
                        if date_parser::parse_timestamp(raw).is_err() {
                            errors.push(format!("Record {} has invalid timestamp: {}", i, raw));
                        }
                    }
                    Some(other) => {
                        errors.push(format!(
                            "Record {} has invalid timestamp: {}",
                            i,
                            cell_to_string(other)
                        ));
                    }
                }
            }

            for channel in self.required_channels {
                if let Some(cell) = map.get(channel) {
                    if parse_numeric(Some(cell)) == NumericCell::Invalid {
                        errors.push(format!(
                            "Record {} has non-numeric value for {}: {}",
                            i,
                            channel,
                            cell_to_string(cell)
                        ));
                    }
                }
            }
        }

        ValidationReport::from_errors(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn channels() -> Vec<String> {
        vec!["A".to_string(), "B".to_string()]
    }

    #[test]
    fn test_valid_rows() {
        let channels = channels();
        let rows = vec![
            json!({"datum": "2014-01-01", "A": 1.0, "B": "2"}),
            json!({"datum": "2014-01-02", "A": null, "B": 3}),
        ];
        let report = SeriesValidator::new("datum", &channels).validate(&rows);
        assert!(report.is_valid);
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn test_empty_input() {
        let channels = channels();
        let report = SeriesValidator::new("datum", &channels).validate(&[]);
        assert_eq!(report.errors, vec!["Data is empty"]);
    }

    #[test]
    fn test_errors_accumulate() {
        let channels = channels();
        let rows = vec![
            json!({"Datum": "yesterday", "A": "lots"}),
            json!([1, 2]),
        ];
        let report = SeriesValidator::new("datum", &channels).validate(&rows);

        assert!(!report.is_valid);
        assert_eq!(report.errors.len(), 4);
        assert!(report.errors.contains(&"Record 1 is not a mapping".to_string()));
        assert!(report.errors.contains(&"Missing required columns: B".to_string()));
        assert!(report
            .errors
            .contains(&"Record 0 has invalid timestamp: yesterday".to_string()));
        assert!(report
            .errors
            .contains(&"Record 0 has non-numeric value for A: lots".to_string()));
    }

    #[test]
    fn test_missing_timestamp_column() {
        let channels = channels();
        let rows = vec![json!({"A": 1, "B": 2})];
        let result = SeriesValidator::new("datum", &channels)
            .validate(&rows)
            .into_result();

        match result {
            Err(ForecastError::Validation(errors)) => {
                assert_eq!(errors, vec!["Missing timestamp column: datum"]);
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }
}
