//! Daily demand forecasts from the fitted state
//!
//! The most recent feature row of the requested entity is used as a static
//! template: each forecast day copies it with new calendar fields. Lag and
//! moving-average inputs are not rolled forward between days.

use crate::error::Result;
use crate::features::{FeatureBuilder, FeatureRow};
use crate::records::RecordStore;
use crate::training::TrainedState;
use crate::utils::daily_range;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

fn default_true() -> bool {
    true
}

/// Forecast request for one product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub product_id: String,
    #[serde(default)]
    pub store: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default = "default_true")]
    pub include_confidence_interval: bool,
    /// Caller-supplied context; not used by the models
    #[serde(default)]
    pub additional_features: BTreeMap<String, serde_json::Value>,
}

impl PredictionRequest {
    pub fn new(product_id: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            product_id: product_id.into(),
            store: None,
            start_date,
            end_date,
            include_confidence_interval: true,
            additional_features: BTreeMap::new(),
        }
    }

    pub fn with_store(mut self, store: impl Into<String>) -> Self {
        self.store = Some(store.into());
        self
    }

    pub fn without_confidence_interval(mut self) -> Self {
        self.include_confidence_interval = false;
        self
    }
}

/// Forecast for one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub product_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
    pub prediction_date: NaiveDate,
    pub predicted_demand: f64,
    pub confidence_lower: f64,
    pub confidence_upper: f64,
    /// Held-out R² of the model that produced the forecast
    pub model_accuracy: Option<f64>,
}

/// Forecast request for several SKUs of one store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkPredictionRequest {
    #[serde(default)]
    pub store: Option<String>,
    pub skus: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkDateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkSummary {
    pub total_skus: usize,
    pub predicted_skus: usize,
    pub date_range: BulkDateRange,
}

/// Per-SKU forecasts; SKUs without records are left out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkPrediction {
    pub predictions: BTreeMap<String, Vec<PredictionResult>>,
    pub summary: BulkSummary,
}

/// Turns a fitted state into daily forecasts
#[derive(Debug, Clone)]
pub struct ForecastEngine {
    confidence_ratio: f64,
}

impl Default for ForecastEngine {
    fn default() -> Self {
        Self::new(0.1)
    }
}

impl ForecastEngine {
    /// `confidence_ratio` is the half-width of the band relative to the forecast
    pub fn new(confidence_ratio: f64) -> Self {
        Self { confidence_ratio }
    }

    /// One result per day of the request, or nothing when the data or the
    /// fitted state cannot serve it
    pub fn predict(
        &self,
        state: Option<&TrainedState>,
        store: &RecordStore,
        request: &PredictionRequest,
    ) -> Vec<PredictionResult> {
        let state = match state {
            Some(state) => state,
            None => {
                warn!(product_id = %request.product_id, "Prediction requested before training");
                return Vec::new();
            }
        };
        if request.start_date > request.end_date {
            return Vec::new();
        }

        match self.try_predict(state, store, request) {
            Ok(results) => {
                debug!(
                    product_id = %request.product_id,
                    days = results.len(),
                    "Generated forecast"
                );
                results
            }
            Err(e) => {
                warn!(product_id = %request.product_id, error = %e, "Prediction failed");
                Vec::new()
            }
        }
    }

    /// Independent forecasts for each requested SKU
    pub fn predict_bulk(
        &self,
        state: Option<&TrainedState>,
        store: &RecordStore,
        request: &BulkPredictionRequest,
    ) -> BulkPrediction {
        let mut predictions = BTreeMap::new();

        for sku in &request.skus {
            if store.records_for(sku, request.store.as_deref()).is_empty() {
                continue;
            }

            let mut single = PredictionRequest::new(sku.clone(), request.start_date, request.end_date);
            single.store = request.store.clone();
            predictions.insert(sku.clone(), self.predict(state, store, &single));
        }

        let predicted_skus = predictions.values().filter(|days| !days.is_empty()).count();

        BulkPrediction {
            summary: BulkSummary {
                total_skus: request.skus.len(),
                predicted_skus,
                date_range: BulkDateRange {
                    start: request.start_date,
                    end: request.end_date,
                },
            },
            predictions,
        }
    }

    fn try_predict(
        &self,
        state: &TrainedState,
        store: &RecordStore,
        request: &PredictionRequest,
    ) -> Result<Vec<PredictionResult>> {
        let rows = FeatureBuilder::build(store.records())?;
        let template = match latest_row(&rows, &request.product_id, request.store.as_deref()) {
            Some(row) => row,
            None => return Ok(Vec::new()),
        };

        let days = daily_range(request.start_date, request.end_date);
        let synthesized: Vec<FeatureRow> = days
            .iter()
            .filter_map(|day| day.and_hms_opt(0, 0, 0))
            .map(|date| FeatureBuilder::synthesize(template, date))
            .collect();

        let raw = state.predict_rows(&synthesized)?;
        let accuracy = state.active_r2();

        Ok(synthesized
            .iter()
            .zip(raw.iter())
            .map(|(row, &value)| {
                let predicted = value.max(0.0);
                let (lower, upper) = if request.include_confidence_interval {
                    let margin = predicted * self.confidence_ratio;
                    ((predicted - margin).max(0.0), predicted + margin)
                } else {
                    (predicted, predicted)
                };

                PredictionResult {
                    product_id: request.product_id.clone(),
                    store: request.store.clone(),
                    prediction_date: row.sales_date.date(),
                    predicted_demand: predicted,
                    confidence_lower: lower,
                    confidence_upper: upper,
                    model_accuracy: accuracy,
                }
            })
            .collect())
    }
}

fn latest_row<'a>(rows: &'a [FeatureRow], sku: &str, store: Option<&str>) -> Option<&'a FeatureRow> {
    rows.iter()
        .rev()
        .find(|row| row.sku == sku && store.map_or(true, |s| row.store == s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelConfig, TrainingConfig};
    use crate::records::DemandRecord;
    use crate::training::TrainingController;
    use chrono::Duration;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    fn fitted() -> (RecordStore, TrainedState) {
        let start = date(1).and_hms_opt(0, 0, 0).unwrap();
        let records: Vec<DemandRecord> = (0..30)
            .map(|i| {
                let qty = 20.0 + (i % 3) as f64;
                DemandRecord::new(start + Duration::days(i), "S1", "A", qty, qty * 2.0)
            })
            .collect();

        let mut store = RecordStore::new();
        assert!(store.load(records));
        let controller = TrainingController::new(
            TrainingConfig::default(),
            ModelConfig {
                forest_estimators: 5,
                boosting_stages: 5,
                ..ModelConfig::default()
            },
        );
        let state = controller.train(store.records()).unwrap();
        (store, state)
    }

    #[test]
    fn test_band_and_day_count() {
        let (store, state) = fitted();
        let engine = ForecastEngine::default();
        let request = PredictionRequest::new("A", date(10), date(16)).with_store("S1");

        let results = engine.predict(Some(&state), &store, &request);
        assert_eq!(results.len(), 7);
        for result in &results {
            assert!(result.predicted_demand >= 0.0);
            assert!(result.confidence_lower <= result.predicted_demand);
            assert!(result.predicted_demand <= result.confidence_upper);
            assert_eq!(result.model_accuracy, state.active_r2());
        }
        assert_eq!(results[0].prediction_date, date(10));
        assert_eq!(results[6].prediction_date, date(16));
    }

    #[test]
    fn test_collapsed_band() {
        let (store, state) = fitted();
        let request = PredictionRequest::new("A", date(10), date(10)).without_confidence_interval();

        let results = ForecastEngine::default().predict(Some(&state), &store, &request);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].confidence_lower, results[0].predicted_demand);
        assert_eq!(results[0].confidence_upper, results[0].predicted_demand);
    }

    #[test]
    fn test_empty_cases() {
        let (store, state) = fitted();
        let engine = ForecastEngine::default();

        let untrained = PredictionRequest::new("A", date(1), date(2));
        assert!(engine.predict(None, &store, &untrained).is_empty());

        let unknown = PredictionRequest::new("nope", date(1), date(2));
        assert!(engine.predict(Some(&state), &store, &unknown).is_empty());

        let reversed = PredictionRequest::new("A", date(5), date(1));
        assert!(engine.predict(Some(&state), &store, &reversed).is_empty());

        let other_store = PredictionRequest::new("A", date(1), date(2)).with_store("S2");
        assert!(engine.predict(Some(&state), &store, &other_store).is_empty());
    }

    #[test]
    fn test_request_defaults_from_json() {
        let request: PredictionRequest = serde_json::from_value(serde_json::json!({
            "product_id": "A",
            "start_date": "2024-05-01",
            "end_date": "2024-05-03"
        }))
        .unwrap();
        assert!(request.include_confidence_interval);
        assert_eq!(request.store, None);
    }
}
