//! Descriptive statistics, outliers and resampling over cleaned series

use crate::data::CleanedSeries;
use crate::error::{ForecastError, Result};
use crate::utils::last_day_of_month;
use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use series_math::{describe, detect_outliers, growth_rate, DescriptiveStats, OutlierMethod, OutlierReport};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Summary statistics of one column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStatistics {
    pub column: String,
    #[serde(flatten)]
    pub stats: DescriptiveStats,
    /// Percent change from first to last value
    pub growth_rate: f64,
}

/// Target period of a resample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResampleFrequency {
    Daily,
    /// Weeks end on Sunday
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl ResampleFrequency {
    /// Last day of the period containing `date`; periods are labelled by it
    pub fn period_end(&self, date: NaiveDate) -> Result<NaiveDate> {
        let end = match self {
            ResampleFrequency::Daily => Some(date),
            ResampleFrequency::Weekly => {
                let days_to_sunday = 6 - date.weekday().num_days_from_monday() as i64;
                date.checked_add_signed(Duration::days(days_to_sunday))
            }
            ResampleFrequency::Monthly => last_day_of_month(date.year(), date.month()),
            ResampleFrequency::Quarterly => {
                let quarter_end_month = (date.month0() / 3 + 1) * 3;
                last_day_of_month(date.year(), quarter_end_month)
            }
            ResampleFrequency::Yearly => NaiveDate::from_ymd_opt(date.year(), 12, 31),
        };
        end.ok_or_else(|| {
            ForecastError::InvalidRequest(format!("No {} period ends after {}", self, date))
        })
    }
}

impl fmt::Display for ResampleFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            ResampleFrequency::Daily => "D",
            ResampleFrequency::Weekly => "W",
            ResampleFrequency::Monthly => "M",
            ResampleFrequency::Quarterly => "Q",
            ResampleFrequency::Yearly => "Y",
        };
        f.write_str(code)
    }
}

impl FromStr for ResampleFrequency {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "D" => Ok(ResampleFrequency::Daily),
            "W" => Ok(ResampleFrequency::Weekly),
            "M" => Ok(ResampleFrequency::Monthly),
            "Q" => Ok(ResampleFrequency::Quarterly),
            "Y" | "A" => Ok(ResampleFrequency::Yearly),
            other => Err(ForecastError::InvalidRequest(format!(
                "Unknown resample frequency '{}'. Expected one of: D, W, M, Q, Y",
                other
            ))),
        }
    }
}

/// How values inside a period are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Sum,
    Mean,
}

/// One period of a resampled series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResampledRow {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
    /// First label value seen in the period
    #[serde(flatten)]
    pub labels: BTreeMap<String, String>,
}

/// Channel aggregates of every record sharing one combination of labels
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelGroup {
    #[serde(flatten)]
    pub labels: BTreeMap<String, String>,
    pub records: usize,
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

#[derive(Debug)]
struct PeriodAccumulator {
    sums: Vec<f64>,
    count: usize,
    labels: BTreeMap<String, String>,
}

/// Stateless statistics over cleaned series
#[derive(Debug, Default, Clone, Copy)]
pub struct StatsEngine;

impl StatsEngine {
    /// Statistics of a channel, or of the per-row total for `all`
    pub fn calculate_statistics(series: &CleanedSeries, column: &str) -> Result<ColumnStatistics> {
        let values = series.channel_values(column)?;
        let stats = describe(&values)?;
        let growth = match (values.first(), values.last()) {
            (Some(&first), Some(&last)) => growth_rate(first, last),
            _ => 0.0,
        };

        Ok(ColumnStatistics {
            column: column.to_string(),
            stats,
            growth_rate: growth,
        })
    }

    pub fn detect_outliers(
        series: &CleanedSeries,
        column: &str,
        method: OutlierMethod,
    ) -> Result<OutlierReport> {
        let values = series.channel_values(column)?;
        Ok(detect_outliers(&values, method)?)
    }

    /// Group records by period and aggregate every channel.
    ///
    /// Periods without records do not appear in the output.
    pub fn resample(
        series: &CleanedSeries,
        frequency: ResampleFrequency,
        aggregation: Aggregation,
    ) -> Result<Vec<ResampledRow>> {
        let width = series.channels().len();
        let mut periods: BTreeMap<NaiveDate, PeriodAccumulator> = BTreeMap::new();

        for (i, record) in series.records().iter().enumerate() {
            let end = frequency.period_end(record.timestamp.date())?;
            let period = periods.entry(end).or_insert_with(|| PeriodAccumulator {
                sums: vec![0.0; width],
                count: 0,
                labels: series
                    .labels()
                    .iter()
                    .map(|label| (label.name.clone(), label.values[i].clone()))
                    .collect(),
            });

            for (sum, value) in period.sums.iter_mut().zip(&record.values) {
                *sum += value;
            }
            period.count += 1;
        }

        Ok(periods
            .into_iter()
            .map(|(date, period)| {
                let values = series
                    .channels()
                    .iter()
                    .zip(period.sums)
                    .map(|(channel, sum)| {
                        let value = match aggregation {
                            Aggregation::Sum => sum,
                            Aggregation::Mean => sum / period.count as f64,
                        };
                        (channel.clone(), value)
                    })
                    .collect();
                ResampledRow {
                    date,
                    values,
                    labels: period.labels,
                }
            })
            .collect())
    }

    /// Aggregate every channel per distinct combination of label values.
    ///
    /// Groups come out ordered by their label values; a series without
    /// label columns yields no groups.
    pub fn aggregate_by_labels(
        series: &CleanedSeries,
        aggregation: Aggregation,
    ) -> Result<Vec<LabelGroup>> {
        let labels = series.labels();
        if labels.is_empty() {
            return Ok(Vec::new());
        }

        let width = series.channels().len();
        let mut groups: BTreeMap<Vec<String>, (Vec<f64>, usize)> = BTreeMap::new();
        for (i, record) in series.records().iter().enumerate() {
            let key: Vec<String> = labels.iter().map(|label| label.values[i].clone()).collect();
            let (sums, count) = groups.entry(key).or_insert_with(|| (vec![0.0; width], 0));
            for (sum, value) in sums.iter_mut().zip(&record.values) {
                *sum += value;
            }
            *count += 1;
        }

        Ok(groups
            .into_iter()
            .map(|(key, (sums, count))| LabelGroup {
                labels: labels
                    .iter()
                    .map(|label| label.name.clone())
                    .zip(key)
                    .collect(),
                records: count,
                values: series
                    .channels()
                    .iter()
                    .cloned()
                    .zip(sums.into_iter().map(|sum| match aggregation {
                        Aggregation::Sum => sum,
                        Aggregation::Mean => sum / count as f64,
                    }))
                    .collect(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{LabelColumn, TimeSeriesRecord};
    use crate::utils::date_parser::parse_timestamp;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn series() -> CleanedSeries {
        let rows = [
            ("2014-01-30", 1.0, 10.0),
            ("2014-01-31", 2.0, 20.0),
            ("2014-02-01", 3.0, 30.0),
            ("2014-04-02", 4.0, 40.0),
        ];
        let records = rows
            .iter()
            .map(|(ts, a, b)| TimeSeriesRecord {
                timestamp: parse_timestamp(ts).unwrap(),
                values: vec![*a, *b],
            })
            .collect();
        let labels = vec![LabelColumn {
            name: "product".to_string(),
            values: vec!["x".into(), "y".into(), "z".into(), "w".into()],
        }];
        CleanedSeries::new(vec!["A".to_string(), "B".to_string()], "datum", records, labels).unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_statistics_of_total() {
        let stats = StatsEngine::calculate_statistics(&series(), "all").unwrap();
        assert_eq!(stats.stats.count, 4);
        assert_relative_eq!(stats.stats.mean, 27.5);
        assert_relative_eq!(stats.growth_rate, 300.0);
    }

    #[test]
    fn test_monthly_resample_skips_empty_periods() {
        let rows = StatsEngine::resample(&series(), ResampleFrequency::Monthly, Aggregation::Sum).unwrap();

        let dates: Vec<NaiveDate> = rows.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![date("2014-01-31"), date("2014-02-28"), date("2014-04-30")]);
        assert_eq!(rows[0].values["A"], 3.0);
        assert_eq!(rows[0].values["B"], 30.0);
        assert_eq!(rows[0].labels["product"], "x");
    }

    #[test]
    fn test_aggregate_by_labels() {
        let records = ["2014-01-01", "2014-01-02", "2014-01-03"]
            .iter()
            .zip([1.0, 2.0, 6.0])
            .map(|(ts, v)| TimeSeriesRecord {
                timestamp: parse_timestamp(ts).unwrap(),
                values: vec![v],
            })
            .collect();
        let labels = vec![
            LabelColumn {
                name: "product".to_string(),
                values: vec!["a".into(), "b".into(), "a".into()],
            },
            LabelColumn {
                name: "region".to_string(),
                values: vec!["n".into(), "n".into(), "n".into()],
            },
        ];
        let series = CleanedSeries::new(vec!["sales".to_string()], "date", records, labels).unwrap();

        let groups = StatsEngine::aggregate_by_labels(&series, Aggregation::Sum).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].labels["product"], "a");
        assert_eq!(groups[0].labels["region"], "n");
        assert_eq!(groups[0].records, 2);
        assert_eq!(groups[0].values["sales"], 7.0);

        let means = StatsEngine::aggregate_by_labels(&series, Aggregation::Mean).unwrap();
        assert_relative_eq!(means[0].values["sales"], 3.5);
    }

    #[test]
    fn test_aggregate_without_labels_is_empty() {
        let series = CleanedSeries::new(
            vec!["A".to_string()],
            "datum",
            vec![TimeSeriesRecord {
                timestamp: parse_timestamp("2014-01-01").unwrap(),
                values: vec![1.0],
            }],
            vec![],
        )
        .unwrap();
        assert!(StatsEngine::aggregate_by_labels(&series, Aggregation::Sum)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_mean_aggregation() {
        let rows = StatsEngine::resample(&series(), ResampleFrequency::Yearly, Aggregation::Mean).unwrap();
        assert_eq!(rows.len(), 1);
        assert_relative_eq!(rows[0].values["A"], 2.5);
    }

    #[rstest]
    #[case(ResampleFrequency::Daily, "2014-02-05", "2014-02-05")]
    #[case(ResampleFrequency::Weekly, "2014-02-05", "2014-02-09")]
    #[case(ResampleFrequency::Weekly, "2014-02-09", "2014-02-09")]
    #[case(ResampleFrequency::Monthly, "2016-02-05", "2016-02-29")]
    #[case(ResampleFrequency::Quarterly, "2014-02-05", "2014-03-31")]
    #[case(ResampleFrequency::Quarterly, "2014-11-05", "2014-12-31")]
    #[case(ResampleFrequency::Yearly, "2014-02-05", "2014-12-31")]
    fn test_period_end(#[case] frequency: ResampleFrequency, #[case] input: &str, #[case] expected: &str) {
        assert_eq!(frequency.period_end(date(input)).unwrap(), date(expected));
    }

    #[test]
    fn test_outliers_on_channel() {
        let report = StatsEngine::detect_outliers(&series(), "A", OutlierMethod::Iqr).unwrap();
        assert!(report.indices.is_empty());
        assert!(StatsEngine::detect_outliers(&series(), "Z", OutlierMethod::Iqr).is_err());
    }
}
