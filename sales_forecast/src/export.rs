//! Writing cleaned series to CSV or JSON

use crate::data::CleanedSeries;
use crate::error::{ForecastError, Result};
use crate::utils::date_parser::format_timestamp;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Csv => f.write_str("csv"),
            ExportFormat::Json => f.write_str("json"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(ForecastError::InvalidRequest(format!(
                "Unsupported export format '{}'. Expected csv or json",
                other
            ))),
        }
    }
}

/// Write `series` as CSV: timestamp, channels, then labels
pub fn write_csv<W: Write>(series: &CleanedSeries, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);

    let mut header = vec![series.timestamp_field().to_string()];
    header.extend(series.channels().iter().cloned());
    header.extend(series.labels().iter().map(|l| l.name.clone()));
    csv.write_record(&header)?;

    for (i, record) in series.records().iter().enumerate() {
        let mut row = vec![format_timestamp(&record.timestamp, true)];
        row.extend(record.values.iter().map(|v| v.to_string()));
        row.extend(series.labels().iter().map(|l| l.values[i].clone()));
        csv.write_record(&row)?;
    }

    csv.flush()?;
    Ok(())
}

/// Write `series` as a pretty-printed JSON array of records
pub fn write_json<W: Write>(series: &CleanedSeries, writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, &series.to_rows())?;
    Ok(())
}

/// Export to a file in the given format
pub fn export_series<P: AsRef<Path>>(series: &CleanedSeries, path: P, format: ExportFormat) -> Result<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    match format {
        ExportFormat::Csv => write_csv(series, &mut writer)?,
        ExportFormat::Json => write_json(series, &mut writer)?,
    }
    writer.flush()?;

    info!(path = %path.display(), %format, rows = series.len(), "exported series");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{LabelColumn, TimeSeriesRecord};
    use crate::utils::date_parser::parse_timestamp;
    use pretty_assertions::assert_eq;

    fn series() -> CleanedSeries {
        CleanedSeries::new(
            vec!["A".to_string(), "B".to_string()],
            "datum",
            vec![
                TimeSeriesRecord {
                    timestamp: parse_timestamp("2014-01-02 08:00:00").unwrap(),
                    values: vec![1.5, 0.0],
                },
                TimeSeriesRecord {
                    timestamp: parse_timestamp("2014-01-02 09:00:00").unwrap(),
                    values: vec![2.0, 3.0],
                },
            ],
            vec![LabelColumn {
                name: "product".to_string(),
                values: vec!["foo".to_string(), "unknown".to_string()],
            }],
        )
        .unwrap()
    }

    #[test]
    fn test_write_csv() {
        let mut buffer = Vec::new();
        write_csv(&series(), &mut buffer).unwrap();

        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "datum,A,B,product\n\
             2014-01-02 08:00:00,1.5,0,foo\n\
             2014-01-02 09:00:00,2,3,unknown\n"
        );
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ExportFormat::from_path(Path::new("out.JSON")), Some(ExportFormat::Json));
        assert_eq!(ExportFormat::from_path(Path::new("out.csv")), Some(ExportFormat::Csv));
        assert_eq!(ExportFormat::from_path(Path::new("out.txt")), None);
    }
}
