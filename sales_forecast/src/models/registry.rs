//! Registry of loaded predictors, read-only once built

use super::{
    FeatureScaler, LinearSequenceModel, ScalerArtifact, SeasonalPredictor, SequencePredictor,
    TrendSeasonalModel,
};
use crate::error::{ForecastError, Result};
use crate::frequency::Frequency;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Artifact file names inside a model directory
pub const SCALER_FILE: &str = "scaler.json";
pub const SEQUENCE_FILE: &str = "sequence.json";

/// Additive models for one frequency, keyed by channel
pub type AdditiveBundle = HashMap<String, Arc<dyn SeasonalPredictor>>;

/// Immutable set of predictors shared by concurrent requests
#[derive(Debug, Default, Clone)]
pub struct ModelRegistry {
    sequence: Option<Arc<dyn SequencePredictor>>,
    scaler: Option<Arc<dyn FeatureScaler>>,
    additive: HashMap<Frequency, AdditiveBundle>,
}

/// Artifact availability for health checks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistryStatus {
    pub sequence_model: bool,
    pub scaler: bool,
    pub scaler_features: Option<usize>,
    /// Channels with an additive model, by frequency code
    pub additive: BTreeMap<String, Vec<String>>,
}

impl ModelRegistry {
    pub fn builder() -> ModelRegistryBuilder {
        ModelRegistryBuilder::default()
    }

    pub fn sequence(&self) -> Result<&dyn SequencePredictor> {
        self.sequence
            .as_deref()
            .ok_or_else(|| ForecastError::MissingArtifact("sequence model".to_string()))
    }

    pub fn scaler(&self) -> Result<&dyn FeatureScaler> {
        self.scaler
            .as_deref()
            .ok_or_else(|| ForecastError::MissingArtifact("feature scaler".to_string()))
    }

    /// Additive predictor for `channel` at `frequency`
    pub fn additive(&self, frequency: Frequency, channel: &str) -> Result<&dyn SeasonalPredictor> {
        let bundle = self.additive.get(&frequency).ok_or_else(|| {
            ForecastError::MissingArtifact(format!("additive models for frequency {}", frequency))
        })?;

        bundle.get(channel).map(|model| model.as_ref()).ok_or_else(|| {
            let mut available: Vec<String> = bundle.keys().cloned().collect();
            available.sort();
            ForecastError::UnknownCategory {
                category: channel.to_string(),
                available,
            }
        })
    }

    pub fn status(&self) -> RegistryStatus {
        RegistryStatus {
            sequence_model: self.sequence.is_some(),
            scaler: self.scaler.is_some(),
            scaler_features: self.scaler.as_ref().map(|s| s.n_features()),
            additive: self
                .additive
                .iter()
                .map(|(frequency, bundle)| {
                    let mut channels: Vec<String> = bundle.keys().cloned().collect();
                    channels.sort();
                    (frequency.code().to_string(), channels)
                })
                .collect(),
        }
    }

    /// Load every artifact found in `dir`.
    ///
    /// Missing files are skipped with a warning; malformed files are errors.
    /// A scaler whose width differs from `n_channels` is rejected.
    pub fn load_from_dir<P: AsRef<Path>>(dir: P, n_channels: usize) -> Result<Self> {
        let dir = dir.as_ref();
        let mut builder = Self::builder();

        let scaler_path = dir.join(SCALER_FILE);
        if scaler_path.exists() {
            let artifact: ScalerArtifact = serde_json::from_str(&fs::read_to_string(&scaler_path)?)?;
            let scaler = artifact.into_scaler()?;
            if scaler.n_features() != n_channels {
                return Err(ForecastError::MissingArtifact(format!(
                    "scaler at {} expects {} features but {} channels are configured",
                    scaler_path.display(),
                    scaler.n_features(),
                    n_channels
                )));
            }
            builder = builder.with_scaler(Arc::from(scaler));
        } else {
            warn!(path = %scaler_path.display(), "no feature scaler artifact");
        }

        let sequence_path = dir.join(SEQUENCE_FILE);
        if sequence_path.exists() {
            let model: LinearSequenceModel =
                serde_json::from_str(&fs::read_to_string(&sequence_path)?)?;
            model.check()?;
            builder = builder.with_sequence(Arc::new(model));
        } else {
            warn!(path = %sequence_path.display(), "no sequence model artifact");
        }

        for frequency in [Frequency::Daily, Frequency::Weekly, Frequency::Monthly] {
            let path = dir.join(additive_file_name(frequency));
            if !path.exists() {
                warn!(path = %path.display(), "no additive models for frequency {}", frequency);
                continue;
            }
            let models: BTreeMap<String, TrendSeasonalModel> =
                serde_json::from_str(&fs::read_to_string(&path)?)?;
            for (channel, model) in models {
                model.check()?;
                builder = builder.with_additive(frequency, channel, Arc::new(model));
            }
        }

        let registry = builder.build();
        let status = registry.status();
        info!(
            sequence = status.sequence_model,
            scaler = status.scaler,
            additive_frequencies = status.additive.len(),
            "model registry loaded from {}",
            dir.display()
        );

        Ok(registry)
    }
}

/// File holding the additive models of one frequency, e.g. `additive_D.json`
pub fn additive_file_name(frequency: Frequency) -> String {
    format!("additive_{}.json", frequency.code())
}

/// Builder for [`ModelRegistry`]
#[derive(Debug, Default)]
pub struct ModelRegistryBuilder {
    registry: ModelRegistry,
}

impl ModelRegistryBuilder {
    pub fn with_sequence(mut self, model: Arc<dyn SequencePredictor>) -> Self {
        self.registry.sequence = Some(model);
        self
    }

    pub fn with_scaler(mut self, scaler: Arc<dyn FeatureScaler>) -> Self {
        self.registry.scaler = Some(scaler);
        self
    }

    pub fn with_additive(
        mut self,
        frequency: Frequency,
        channel: impl Into<String>,
        model: Arc<dyn SeasonalPredictor>,
    ) -> Self {
        self.registry
            .additive
            .entry(frequency)
            .or_default()
            .insert(channel.into(), model);
        self
    }

    pub fn build(self) -> ModelRegistry {
        self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StandardScaler;
    use crate::utils::date_parser::parse_timestamp;
    use std::io::Write;

    fn additive_model() -> Arc<dyn SeasonalPredictor> {
        Arc::new(TrendSeasonalModel::new(
            parse_timestamp("2014-01-01").unwrap(),
            5.0,
            0.0,
        ))
    }

    #[test]
    fn test_empty_registry_reports_missing() {
        let registry = ModelRegistry::default();
        assert!(matches!(registry.sequence(), Err(ForecastError::MissingArtifact(_))));
        assert!(matches!(registry.scaler(), Err(ForecastError::MissingArtifact(_))));
        assert!(matches!(
            registry.additive(Frequency::Daily, "A"),
            Err(ForecastError::MissingArtifact(_))
        ));
    }

    #[test]
    fn test_unknown_category_lists_available() {
        let registry = ModelRegistry::builder()
            .with_additive(Frequency::Daily, "B", additive_model())
            .with_additive(Frequency::Daily, "A", additive_model())
            .build();

        assert!(registry.additive(Frequency::Daily, "A").is_ok());
        match registry.additive(Frequency::Daily, "C") {
            Err(ForecastError::UnknownCategory { category, available }) => {
                assert_eq!(category, "C");
                assert_eq!(available, vec!["A", "B"]);
            }
            other => panic!("Expected unknown category, got {:?}", other),
        }
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();

        let mut scaler = fs::File::create(dir.path().join(SCALER_FILE)).unwrap();
        write!(scaler, r#"{{"kind": "standard", "mean": [0.0, 0.0], "scale": [1.0, 2.0]}}"#).unwrap();

        let mut sequence = fs::File::create(dir.path().join(SEQUENCE_FILE)).unwrap();
        write!(sequence, r#"{{"lag_weights": [1.0]}}"#).unwrap();

        let mut daily = fs::File::create(dir.path().join(additive_file_name(Frequency::Daily))).unwrap();
        write!(
            daily,
            r#"{{"A": {{"origin": "2014-01-01T00:00:00", "intercept": 3.0}}}}"#
        )
        .unwrap();

        let registry = ModelRegistry::load_from_dir(dir.path(), 2).unwrap();
        let status = registry.status();

        assert!(status.sequence_model);
        assert_eq!(status.scaler_features, Some(2));
        assert_eq!(status.additive["D"], vec!["A"]);
        assert!(registry.additive(Frequency::Weekly, "A").is_err());
    }

    #[test]
    fn test_load_rejects_scaler_width_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let scaler = StandardScaler::new(vec![0.0], vec![1.0]).unwrap();
        let artifact = ScalerArtifact::Standard(scaler);
        fs::write(
            dir.path().join(SCALER_FILE),
            serde_json::to_string(&artifact).unwrap(),
        )
        .unwrap();

        assert!(matches!(
            ModelRegistry::load_from_dir(dir.path(), 8),
            Err(ForecastError::MissingArtifact(_))
        ));
    }
}
