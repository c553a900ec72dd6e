//! Service configuration
//!
//! Values come from defaults, an optional config file and `FORECAST__`
//! prefixed environment variables (e.g. `FORECAST__SEQ_LEN=24`), in that order.

use crate::clean::MissingValueStrategy;
use crate::error::{ForecastError, Result};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Channel name that targets the per-row sum across every channel
pub const ALL_CHANNELS: &str = "all";

const DEFAULT_CONFIG_FILE: &str = "config/forecast";
const ENV_PREFIX: &str = "FORECAST";

/// ATC product codes tracked by the sales dataset
pub const DEFAULT_CHANNELS: [&str; 8] = [
    "M01AB", "M01AE", "N02BA", "N02BE", "N05B", "N05C", "R03", "R06",
];

/// Clipping multipliers applied to forecasts.
///
/// These are approximate defaults, not derived values; tune them against real data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundPolicy {
    /// Sequence path upper bound is `max + sequence_std_multiplier * std`
    pub sequence_std_multiplier: f64,
    /// Additive values above `additive_cap_trigger * max` are replaced
    pub additive_cap_trigger: f64,
    /// Replacement value for capped additive values, as a multiple of `max`
    pub additive_cap_value: f64,
}

impl Default for BoundPolicy {
    fn default() -> Self {
        Self {
            sequence_std_multiplier: 2.0,
            additive_cap_trigger: 2.0,
            additive_cap_value: 1.5,
        }
    }
}

/// Trend estimate used when an additive predictor cannot answer.
///
/// Approximate defaults, like [`BoundPolicy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackPolicy {
    /// Number of trailing observations averaged
    pub window: usize,
    /// Damping factor applied to the average
    pub factor: f64,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            window: 30,
            factor: 0.9,
        }
    }
}

/// Top-level configuration of the forecasting service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Channel (product) columns, in the order the sequence model was trained on
    pub channels: Vec<String>,
    /// Name of the timestamp column in incoming tables
    pub timestamp_field: String,
    /// Optional non-numeric columns kept for analysis reports
    pub label_fields: Vec<String>,
    /// Gap filling applied while cleaning
    pub missing_values: MissingValueStrategy,
    /// Window length the sequence predictor was trained with
    pub seq_len: usize,
    /// Horizon in days when a request does not specify one
    pub default_days: usize,
    /// Upper bound on forecast steps per request
    pub max_horizon: usize,
    /// Trailing rows used for feature engineering
    pub feature_lookback: usize,
    /// Trailing positions used for one-step holdout metrics
    pub metrics_window: usize,
    /// Directory holding model artifacts
    pub model_dir: PathBuf,
    pub log_level: String,
    pub bounds: BoundPolicy,
    pub fallback: FallbackPolicy,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            channels: DEFAULT_CHANNELS.iter().map(|c| c.to_string()).collect(),
            timestamp_field: "datum".to_string(),
            label_fields: vec!["product".to_string(), "region".to_string()],
            missing_values: MissingValueStrategy::Zero,
            seq_len: 168,
            default_days: 7,
            max_horizon: 1000,
            feature_lookback: 168,
            metrics_window: 24,
            model_dir: PathBuf::from("models"),
            log_level: "info".to_string(),
            bounds: BoundPolicy::default(),
            fallback: FallbackPolicy::default(),
        }
    }
}

impl ServiceConfig {
    /// Check invariants the pipeline relies on
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.channels.is_empty() {
            problems.push("at least one channel is required".to_string());
        }
        let mut seen = HashSet::new();
        for channel in &self.channels {
            if !seen.insert(channel.as_str()) {
                problems.push(format!("duplicate channel '{}'", channel));
            }
            if channel.eq_ignore_ascii_case(ALL_CHANNELS) {
                problems.push(format!("'{}' is reserved and cannot name a channel", ALL_CHANNELS));
            }
        }
        if self.timestamp_field.trim().is_empty() {
            problems.push("timestamp_field must not be empty".to_string());
        }
        if self.seq_len == 0 {
            problems.push("seq_len must be at least 1".to_string());
        }
        if self.default_days == 0 {
            problems.push("default_days must be at least 1".to_string());
        }
        if self.max_horizon == 0 {
            problems.push("max_horizon must be at least 1".to_string());
        }
        if self.feature_lookback == 0 {
            problems.push("feature_lookback must be at least 1".to_string());
        }
        if self.fallback.window == 0 {
            problems.push("fallback.window must be at least 1".to_string());
        }
        let multipliers = [
            ("bounds.sequence_std_multiplier", self.bounds.sequence_std_multiplier),
            ("bounds.additive_cap_trigger", self.bounds.additive_cap_trigger),
            ("bounds.additive_cap_value", self.bounds.additive_cap_value),
            ("fallback.factor", self.fallback.factor),
        ];
        for (name, value) in multipliers {
            if !value.is_finite() || value < 0.0 {
                problems.push(format!("{} must be a non-negative number", name));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ForecastError::Config(ConfigError::Message(problems.join("; "))))
        }
    }

    /// Position of a channel in the configured channel list
    pub fn channel_index(&self, channel: &str) -> Option<usize> {
        self.channels.iter().position(|c| c == channel)
    }
}

/// Load configuration from `path` (or `config/forecast.*` when absent) and the environment
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig> {
    let file_source = match path {
        Some(path) => File::from(path).required(true),
        None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let settings = Config::builder()
        .add_source(file_source)
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: ServiceConfig = settings.try_deserialize()?;
    config.validate()?;
    debug!(
        seq_len = config.seq_len,
        channels = config.channels.len(),
        "loaded service configuration"
    );

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.channels.len(), 8);
        assert_eq!(config.channel_index("N02BE"), Some(3));
        assert_eq!(config.bounds.additive_cap_value, 1.5);
        assert_eq!(config.fallback.window, 30);
    }

    #[test]
    fn test_validate_collects_every_problem() {
        let config = ServiceConfig {
            channels: vec!["A".to_string(), "A".to_string(), "all".to_string()],
            seq_len: 0,
            ..ServiceConfig::default()
        };

        match config.validate() {
            Err(ForecastError::Config(err)) => {
                let message = err.to_string();
                assert!(message.contains("duplicate channel 'A'"));
                assert!(message.contains("reserved"));
                assert!(message.contains("seq_len"));
            }
            other => panic!("Expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "seq_len = 24").unwrap();
        writeln!(file, "missing_values = \"forward_fill\"").unwrap();
        writeln!(file, "channels = [\"A\", \"B\"]").unwrap();
        writeln!(file, "[fallback]").unwrap();
        writeln!(file, "factor = 0.8").unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.seq_len, 24);
        assert_eq!(config.missing_values, MissingValueStrategy::ForwardFill);
        assert_eq!(config.channels, vec!["A", "B"]);
        assert_eq!(config.fallback.factor, 0.8);
        assert_eq!(config.fallback.window, 30);
        assert_eq!(config.timestamp_field, "datum");
    }
}
