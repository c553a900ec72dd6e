use clap::{Parser, Subcommand};
use sales_forecast::clean::SeriesCleaner;
use sales_forecast::config::load_config;
use sales_forecast::export::{export_series, ExportFormat};
use sales_forecast::sample::{generate_csv, SampleConfig};
use sales_forecast::utils::date_parser::parse_timestamp;
use sales_forecast::{ApiResponse, DataLoader, ForecastService, Frequency, ServiceConfig};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Forecast and analyze pharmaceutical sales time series
#[derive(Debug, Parser)]
#[command(name = "sales-forecast", version, about)]
struct Cli {
    /// Configuration file (defaults to config/forecast.* when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Forecast from a CSV or JSON file
    Forecast {
        input: PathBuf,
        #[arg(long)]
        days: Option<usize>,
        #[arg(long)]
        category: Option<String>,
        /// Assume this cadence (H, D, W, M) instead of detecting it
        #[arg(long)]
        frequency: Option<String>,
    },
    /// Statistics, outliers and monthly totals of a CSV or JSON file
    Analyze {
        input: PathBuf,
        #[arg(long)]
        column: Option<String>,
    },
    /// Report configuration and loaded model artifacts
    Health,
    /// Write a synthetic sales table as CSV
    Sample {
        output: PathBuf,
        #[arg(long, default_value = "H")]
        frequency: String,
        #[arg(long, default_value_t = 336)]
        rows: usize,
        #[arg(long, default_value = "2014-01-02 00:00:00")]
        start: String,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Clean a table and write it back as CSV or JSON
    Export {
        input: PathBuf,
        output: PathBuf,
        /// csv or json; taken from the output extension when absent
        #[arg(long)]
        format: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Forecast {
            input,
            days,
            category,
            frequency,
        } => {
            let service = load_service(config)?;
            let response = if is_csv(&input) {
                let bytes = fs::read(&input)?;
                let days = days.map(|d| d.to_string());
                service.predict_csv(
                    &bytes,
                    days.as_deref(),
                    category.as_deref(),
                    frequency.as_deref(),
                )
            } else {
                let records = read_json(&input)?;
                let mut body = json!({ "records": records });
                if let Some(days) = days {
                    body["days"] = json!(days);
                }
                if let Some(category) = category {
                    body["category"] = json!(category);
                }
                if let Some(frequency) = frequency {
                    body["frequency"] = json!(frequency);
                }
                service.predict_json(&body)
            };
            finish(response)
        }
        Commands::Analyze { input, column } => {
            let rows = load_rows(&input)?;
            let service = ForecastService::new(config, Default::default());
            finish(service.analyze(&json!({ "data": rows, "column": column })))
        }
        Commands::Health => finish(load_service(config)?.health()),
        Commands::Sample {
            output,
            frequency,
            rows,
            start,
            seed,
        } => {
            let frequency: Frequency = frequency.parse()?;
            let sample = SampleConfig::new(parse_timestamp(&start)?, frequency, rows, config.channels.clone())
                .with_seed(seed);
            fs::write(&output, generate_csv(&sample)?)?;
            info!(path = %output.display(), rows, %frequency, "wrote sample table");
            Ok(())
        }
        Commands::Export {
            input,
            output,
            format,
        } => {
            let format = match format {
                Some(format) => format.parse()?,
                None => ExportFormat::from_path(&output).unwrap_or(ExportFormat::Csv),
            };
            let rows = load_rows(&input)?;
            let series = SeriesCleaner::new(&config.channels, &config.timestamp_field)
                .with_labels(&config.label_fields)
                .with_missing_values(config.missing_values)
                .clean(&rows)?;
            export_series(&series, &output, format)?;
            Ok(())
        }
    }
}

fn load_service(config: ServiceConfig) -> Result<ForecastService, Box<dyn std::error::Error>> {
    let registry = sales_forecast::ModelRegistry::load_from_dir(&config.model_dir, config.channels.len())?;
    Ok(ForecastService::new(config, registry))
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

fn read_json(path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    let value: Value = serde_json::from_str(&fs::read_to_string(path)?)?;
    // Accept either a bare array of records or an object wrapping one
    Ok(match value {
        Value::Object(mut map) => map.remove("records").unwrap_or(Value::Array(Vec::new())),
        other => other,
    })
}

fn load_rows(path: &Path) -> Result<Vec<Value>, Box<dyn std::error::Error>> {
    if is_csv(path) {
        Ok(DataLoader::from_csv(path)?)
    } else {
        Ok(DataLoader::from_json_records(read_json(path)?)?)
    }
}

fn finish(response: ApiResponse) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(&response.body)?);
    if !response.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
