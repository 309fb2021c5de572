//! # Demand Forecast Workspace
//!
//! Umbrella crate re-exporting the workspace members.
//!
//! - [`demand_math`]: moving averages, lags, least squares, scaling
//! - [`demand_forecast`]: records, features, model bank and forecasts
//!
//! ## Example
//!
//! ```
//! use demand_forecast_workspace::demand_forecast::ForecastService;
//!
//! let service = ForecastService::default();
//! assert!(!service.is_trained());
//! assert_eq!(service.statistics().total_records, 0);
//! ```

pub use demand_forecast;
pub use demand_math;
