//! Error types for the demand_forecast crate

use demand_math::MathError;
use polars::prelude::PolarsError;
use thiserror::Error;

/// Custom error types for the demand_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Input records are missing required fields or violate record invariants
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Too few usable rows to train
    #[error("Insufficient data for training (minimum {required} records required, got {available})")]
    InsufficientData { required: usize, available: usize },

    /// A fitted model was required but none is available
    #[error("Model is not trained")]
    UnfittedModel,

    /// Numerical failure while fitting or predicting
    #[error("Computation error: {0}")]
    ComputationError(String),

    /// Error from invalid configuration values
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error from the model blob codec
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),

    /// Error from the numeric kernels
    #[error("Math error: {0}")]
    MathError(#[from] MathError),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}

impl From<toml::de::Error> for ForecastError {
    fn from(err: toml::de::Error) -> Self {
        ForecastError::ConfigError(err.to_string())
    }
}
