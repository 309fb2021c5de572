//! Pipeline configuration
//!
//! The defaults are the fixed model configurations of the pipeline. A TOML
//! file may restate them (for example to change the log level); any section
//! left out falls back to its default.

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use tracing_subscriber::EnvFilter;
use std::path::Path;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub training: TrainingConfig,
    pub models: ModelConfig,
    pub forecast: ForecastSettings,
    pub logging: LoggingConfig,
}

/// Split and sample-size settings for the training controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Fraction of usable rows held out for scoring
    pub test_ratio: f64,
    /// Seed for the split and every seeded model
    pub random_seed: u64,
    /// Minimum usable rows before training is attempted
    pub min_training_rows: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_ratio: 0.2,
            random_seed: 42,
            min_training_rows: 10,
        }
    }
}

/// Model bank settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Trees in the bagged ensemble
    pub forest_estimators: usize,
    /// Stages in the boosted ensemble
    pub boosting_stages: usize,
    /// Shrinkage applied to each boosting stage
    pub learning_rate: f64,
    /// Depth of every boosting tree
    pub boosting_max_depth: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            forest_estimators: 100,
            boosting_stages: 100,
            learning_rate: 0.1,
            boosting_max_depth: 3,
        }
    }
}

/// Forecast engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastSettings {
    /// Half-width of the confidence band as a fraction of the point estimate
    pub confidence_ratio: f64,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            confidence_ratio: 0.1,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ForecastConfig {
    /// Install the global subscriber at `logging.level`
    pub fn init_logging(&self) -> std::result::Result<(), String> {
        crate::logging::init_tracing(&self.logging)
    }

    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ForecastConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let training = &self.training;
        if !(training.test_ratio > 0.0 && training.test_ratio < 1.0) {
            return Err(ForecastError::ConfigError(format!(
                "training.test_ratio must be between 0 and 1, got {}",
                training.test_ratio
            )));
        }
        if training.min_training_rows < 2 {
            return Err(ForecastError::ConfigError(
                "training.min_training_rows must be at least 2".to_string(),
            ));
        }

        let models = &self.models;
        if models.forest_estimators == 0 || models.boosting_stages == 0 {
            return Err(ForecastError::ConfigError(
                "ensembles need at least one tree".to_string(),
            ));
        }
        if models.boosting_max_depth == 0 {
            return Err(ForecastError::ConfigError(
                "models.boosting_max_depth must be positive".to_string(),
            ));
        }
        if !(models.learning_rate > 0.0 && models.learning_rate <= 1.0) {
            return Err(ForecastError::ConfigError(format!(
                "models.learning_rate must be in (0, 1], got {}",
                models.learning_rate
            )));
        }

        let ratio = self.forecast.confidence_ratio;
        if !(0.0..1.0).contains(&ratio) {
            return Err(ForecastError::ConfigError(format!(
                "forecast.confidence_ratio must be in [0, 1), got {}",
                ratio
            )));
        }

        EnvFilter::try_new(&self.logging.level).map_err(|e| {
            ForecastError::ConfigError(format!(
                "logging.level '{}' is not a valid filter: {}",
                self.logging.level, e
            ))
        })?;

        Ok(())
    }
}
