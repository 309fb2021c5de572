//! # Demand Math
//!
//! Numeric building blocks for the demand forecasting pipeline.
//! This crate provides the sliding-window statistics used for lag and
//! moving-average features, an ordinary least squares solver and a
//! standard scaler.

use thiserror::Error;

pub mod moving_averages;
pub mod regression;
pub mod scaling;

pub use moving_averages::{lagged, rolling_mean, SimpleMovingAverage};
pub use regression::LeastSquares;
pub use scaling::StandardScaler;

/// Errors that can occur in numeric calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for numeric operations
pub type Result<T> = std::result::Result<T, MathError>;
