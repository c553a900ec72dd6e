//! Descriptive analysis of an uploaded table

use crate::clean::SeriesCleaner;
use crate::config::{ServiceConfig, ALL_CHANNELS};
use crate::data::{column_names, RawRow};
use crate::error::{ForecastError, Result};
use crate::stats::{
    Aggregation, ColumnStatistics, LabelGroup, ResampleFrequency, ResampledRow, StatsEngine,
};
use crate::utils::date_parser::format_timestamp;
use crate::utils::resolve_column;
use crate::validate::SeriesValidator;
use chrono::Timelike;
use serde::Serialize;
use series_math::{OutlierMethod, OutlierReport};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

/// Coverage of the analyzed column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataQuality {
    /// Rows left after cleaning
    pub total_records: usize,
    /// Cleaned rows whose analyzed value is positive
    pub valid_records: usize,
    pub date_range: DateRange,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub column: String,
    pub statistics: ColumnStatistics,
    pub outliers: OutlierReport,
    pub monthly_aggregation: Vec<ResampledRow>,
    /// Channel totals per product/region combination
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub label_aggregation: Vec<LabelGroup>,
    pub warnings: Vec<String>,
    pub data_quality: DataQuality,
}

/// Timestamp column tried when the configured one is absent
pub const FALLBACK_TIMESTAMP_FIELD: &str = "date";

/// Value column analyzed when the table has none of the configured channels
pub const FALLBACK_VALUE_COLUMN: &str = "sales";

/// Runs validation, cleaning and statistics over whichever configured
/// channels the table actually has, plus the requested column when it is
/// a numeric column outside the channel list
#[derive(Debug, Clone, Copy)]
pub struct SeriesAnalyzer<'a> {
    config: &'a ServiceConfig,
}

impl<'a> SeriesAnalyzer<'a> {
    pub fn new(config: &'a ServiceConfig) -> Self {
        Self { config }
    }

    /// Analyze `column`: a channel, any other numeric column, or the total
    /// when absent. Tables without configured channels fall back to a
    /// `sales` column.
    pub fn analyze(&self, rows: &[RawRow], column: Option<&str>) -> Result<AnalysisReport> {
        let columns = column_names(rows);
        let timestamp_field = self.timestamp_field(&columns);
        let requested = column.map(str::trim).filter(|c| !c.is_empty());

        let (mut present, absent): (Vec<String>, Vec<String>) = self
            .config
            .channels
            .iter()
            .cloned()
            .partition(|channel| columns.contains(channel));
        let has_channels = !present.is_empty();

        let extra = match requested {
            Some(c) if c.eq_ignore_ascii_case(ALL_CHANNELS) => None,
            Some(c) if present.iter().any(|p| p == c) => None,
            Some(c) => resolve_column(&columns, c),
            None if has_channels => None,
            None => resolve_column(&columns, FALLBACK_VALUE_COLUMN),
        }
        .filter(|name| !name.eq_ignore_ascii_case(&timestamp_field));
        if let Some(extra) = &extra {
            present.push(extra.clone());
        }

        if present.is_empty() && !rows.is_empty() {
            return Err(ForecastError::Schema(format!(
                "Data contains none of the channel columns ({}) and no '{}' column",
                self.config.channels.join(", "),
                FALLBACK_VALUE_COLUMN
            )));
        }

        SeriesValidator::new(&timestamp_field, &present)
            .validate(rows)
            .into_result()?;

        let series = SeriesCleaner::new(&present, &timestamp_field)
            .with_labels(&self.config.label_fields)
            .with_missing_values(self.config.missing_values)
            .clean(rows)?;

        let column = match (extra, requested) {
            (Some(extra), _) => extra,
            (None, Some(requested)) => requested.to_string(),
            (None, None) => ALL_CHANNELS.to_string(),
        };
        let values = series.channel_values(&column)?;

        let statistics = StatsEngine::calculate_statistics(&series, &column)?;
        let outliers = StatsEngine::detect_outliers(&series, &column, OutlierMethod::Iqr)?;
        let monthly_aggregation =
            StatsEngine::resample(&series, ResampleFrequency::Monthly, Aggregation::Sum)?;
        let label_aggregation = StatsEngine::aggregate_by_labels(&series, Aggregation::Sum)?;

        let mut warnings = series.warnings().to_vec();
        if has_channels && !absent.is_empty() {
            warnings.push(format!("Channels not present in data: {}", absent.join(", ")));
        }
        if outliers.count() > 0 {
            warnings.push(format!(
                "Found {} outliers in {} ({} method)",
                outliers.count(),
                column,
                outliers.method
            ));
        }

        let with_time = series
            .records()
            .iter()
            .any(|r| r.timestamp.time().num_seconds_from_midnight() != 0);
        let date_range = match (series.first_timestamp(), series.last_timestamp()) {
            (Some(start), Some(end)) => DateRange {
                start: format_timestamp(&start, with_time),
                end: format_timestamp(&end, with_time),
            },
            _ => {
                return Err(ForecastError::InsufficientData(
                    "No rows remain after cleaning".to_string(),
                ))
            }
        };

        info!(
            column = %column,
            records = series.len(),
            outliers = outliers.count(),
            "analysis complete"
        );

        Ok(AnalysisReport {
            column,
            statistics,
            outliers,
            monthly_aggregation,
            label_aggregation,
            warnings,
            data_quality: DataQuality {
                total_records: series.len(),
                valid_records: values.iter().filter(|&&v| v > 0.0).count(),
                date_range,
            },
        })
    }

    /// The configured timestamp column, or `date` when only that one exists
    fn timestamp_field(&self, columns: &[String]) -> String {
        let configured = &self.config.timestamp_field;
        if resolve_column(columns, configured).is_none() {
            if let Some(fallback) = resolve_column(columns, FALLBACK_TIMESTAMP_FIELD) {
                return fallback;
            }
        }
        configured.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn config() -> ServiceConfig {
        ServiceConfig {
            channels: vec!["A".to_string(), "B".to_string(), "C".to_string()],
            ..ServiceConfig::default()
        }
    }

    fn rows() -> Vec<RawRow> {
        vec![
            json!({"datum": "2014-01-30", "A": 1, "B": 0, "product": "Foo"}),
            json!({"datum": "2014-01-31", "A": 2, "B": 1}),
            json!({"datum": "2014-02-01", "A": 0, "B": 0}),
            json!({"datum": "2014-02-02", "A": 3, "B": 2}),
        ]
    }

    #[test]
    fn test_analyze_total() {
        let config = config();
        let report = SeriesAnalyzer::new(&config).analyze(&rows(), None).unwrap();

        assert_eq!(report.column, "all");
        assert_eq!(report.statistics.stats.count, 4);
        assert_eq!(report.monthly_aggregation.len(), 2);
        assert_eq!(report.data_quality.total_records, 4);
        assert_eq!(report.data_quality.valid_records, 3);
        assert_eq!(report.data_quality.date_range.start, "2014-01-30");
        assert_eq!(report.data_quality.date_range.end, "2014-02-02");
        assert!(report
            .warnings
            .contains(&"Channels not present in data: C".to_string()));
    }

    #[test]
    fn test_analyze_single_channel_report_shape() {
        let config = config();
        let report = SeriesAnalyzer::new(&config).analyze(&rows(), Some("B")).unwrap();
        let body = serde_json::to_value(&report).unwrap();

        assert_eq!(body["column"], json!("B"));
        assert_eq!(body["statistics"]["count"], json!(4));
        assert_eq!(body["monthly_aggregation"][0]["date"], json!("2014-01-31"));
        assert_eq!(body["monthly_aggregation"][0]["B"], json!(1.0));
        assert_eq!(body["monthly_aggregation"][0]["product"], json!("foo"));
        assert!(body["outliers"]["indices"].is_array());
    }

    #[test]
    fn test_analyze_rejects_unknown_column() {
        let config = config();
        assert!(matches!(
            SeriesAnalyzer::new(&config).analyze(&rows(), Some("Z")),
            Err(ForecastError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_analyze_without_channels() {
        let config = config();
        let rows = vec![json!({"datum": "2014-01-01", "X": 1})];
        assert!(matches!(
            SeriesAnalyzer::new(&config).analyze(&rows, None),
            Err(ForecastError::Schema(_))
        ));
    }

    fn sales_rows() -> Vec<RawRow> {
        vec![
            json!({"date": "2024-01-01", "sales": 10, "product": "A", "region": "N"}),
            json!({"date": "2024-01-02", "sales": 0, "product": "B", "region": "S"}),
            json!({"date": "2024-01-03", "sales": 30, "product": "A", "region": "N"}),
            json!({"date": "2024-02-01", "sales": 20, "product": "A", "region": "S"}),
            json!({"date": "not a date", "sales": 5}),
        ]
    }

    #[test]
    fn test_analyze_sales_table() {
        let config = ServiceConfig::default();
        let mut rows = sales_rows();
        rows.pop();

        let report = SeriesAnalyzer::new(&config).analyze(&rows, Some("sales")).unwrap();
        assert_eq!(report.column, "sales");
        assert_eq!(report.statistics.stats.count, 4);
        assert_eq!(report.statistics.stats.mean, 15.0);
        assert_eq!(report.data_quality.total_records, 4);
        assert_eq!(report.data_quality.valid_records, 3);
        assert_eq!(report.data_quality.date_range.start, "2024-01-01");
        assert_eq!(report.data_quality.date_range.end, "2024-02-01");
        assert_eq!(report.monthly_aggregation.len(), 2);
        assert_eq!(report.monthly_aggregation[0].values["sales"], 40.0);
        assert!(report.warnings.iter().all(|w| !w.contains("Channels not present")));
        assert_eq!(report.label_aggregation.len(), 3);
        assert_eq!(report.label_aggregation[0].labels["product"], "a");
        assert_eq!(report.label_aggregation[0].labels["region"], "n");
        assert_eq!(report.label_aggregation[0].values["sales"], 40.0);

        // the column defaults to sales when no channel is present
        let default = SeriesAnalyzer::new(&config).analyze(&rows, None).unwrap();
        assert_eq!(default.column, "sales");
        assert_eq!(default.statistics, report.statistics);
    }

    #[test]
    fn test_analyze_sales_table_rejects_bad_dates() {
        let config = ServiceConfig::default();
        assert!(matches!(
            SeriesAnalyzer::new(&config).analyze(&sales_rows(), Some("sales")),
            Err(ForecastError::Validation(_))
        ));
    }

    #[test]
    fn test_total_records_counts_cleaned_rows() {
        let config = config();
        let mut rows = rows();
        rows.push(json!({"datum": "2014-02-03", "A": null, "B": null}));

        let report = SeriesAnalyzer::new(&config).analyze(&rows, None).unwrap();
        assert_eq!(report.data_quality.total_records, 4);
    }

    #[test]
    fn test_analyze_empty_is_validation_error() {
        let config = config();
        match SeriesAnalyzer::new(&config).analyze(&[], None) {
            Err(ForecastError::Validation(errors)) => assert_eq!(errors, vec!["Data is empty"]),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }
}
