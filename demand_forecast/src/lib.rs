//! # Demand Forecast
//!
//! Per-store, per-SKU demand forecasting for retail sales records.
//!
//! ## Features
//!
//! - Two upload shapes (retail and legacy) normalized into one record type
//! - Summary statistics over a polars view of the records
//! - Calendar, price, promotion, lag and moving-average features
//! - A bank of regressors (random forest, gradient boosting, linear
//!   regression) scored on a held-out split; the best R² wins
//! - Daily forecasts with a proportional confidence band
//! - Store dashboards and promotion listings
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chrono::NaiveDate;
//! use demand_forecast::{ForecastService, PredictionRequest};
//!
//! # fn main() -> demand_forecast::Result<()> {
//! let service = ForecastService::default();
//! let uploaded = serde_json::from_str(r#"[
//!     {"date": "2024-01-01", "product_id": "P1", "demand_value": 12}
//! ]"#)?;
//! service.load_raw(uploaded);
//!
//! let report = service.train()?;
//! println!("active model: {}", report.active_model);
//!
//! let start = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
//! let end = NaiveDate::from_ymd_opt(2024, 2, 7).unwrap();
//! for day in service.predict(&PredictionRequest::new("P1", start, end)) {
//!     println!("{} {:.1}", day.prediction_date, day.predicted_demand);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod features;
pub mod forecast;
pub mod insights;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod records;
pub mod service;
pub mod training;
pub mod utils;

// Re-export commonly used types
pub use crate::config::ForecastConfig;
pub use crate::error::{ForecastError, Result};
pub use crate::forecast::{
    BulkPrediction, BulkPredictionRequest, ForecastEngine, PredictionRequest, PredictionResult,
};
pub use crate::metrics::RegressionMetrics;
pub use crate::models::{Model, ModelKind, Regressor};
pub use crate::records::{DataStatistics, DemandRecord, RawRecord, RecordStore};
pub use crate::service::{ForecastService, ModelInfo, Snapshot};
pub use crate::training::{TrainedState, TrainingController, TrainingReport};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
