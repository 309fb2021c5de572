//! Shared forecasting service: owns the loaded records and the fitted state
//!
//! The records and the state fitted on them are published together as one
//! [`Snapshot`]. Readers clone the snapshot `Arc` and release the lock at
//! once. Loading, training and restoring a model are serialized by one guard,
//! and each builds its new snapshot completely before publishing it.

use crate::config::ForecastConfig;
use crate::error::{ForecastError, Result};
use crate::forecast::{
    BulkPrediction, BulkPredictionRequest, ForecastEngine, PredictionRequest, PredictionResult,
};
use crate::insights::{self, PromotionEvent, SkuSummary, StoreDashboard};
use crate::models::ModelKind;
use crate::records::{DataStatistics, DemandRecord, RawRecord, RecordStore};
use crate::training::{ModelScore, TrainedState, TrainingController, TrainingReport};
use chrono::NaiveDate;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

const MODEL_FORMAT_VERSION: u32 = 1;

/// State of the fitted models as seen by callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub is_trained: bool,
    pub active_model: Option<ModelKind>,
    pub models_trained: Vec<ModelKind>,
    pub feature_columns: Vec<String>,
    pub metrics: Vec<ModelScore>,
}

#[derive(Serialize)]
struct ModelBlobRef<'a> {
    format_version: u32,
    state: &'a TrainedState,
}

#[derive(Deserialize)]
struct ModelBlob {
    format_version: u32,
    state: TrainedState,
}

/// Loaded records paired with the state fitted on them, if any
#[derive(Debug, Default)]
pub struct Snapshot {
    pub records: Arc<RecordStore>,
    pub state: Option<Arc<TrainedState>>,
}

pub struct ForecastService {
    config: ForecastConfig,
    controller: TrainingController,
    engine: ForecastEngine,
    snapshot: RwLock<Arc<Snapshot>>,
    guard: Mutex<()>,
}

impl Default for ForecastService {
    fn default() -> Self {
        Self::with_config_unchecked(ForecastConfig::default())
    }
}

impl ForecastService {
    /// Service configured by `config`, which must pass validation
    pub fn new(config: ForecastConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_config_unchecked(config))
    }

    fn with_config_unchecked(config: ForecastConfig) -> Self {
        Self {
            controller: TrainingController::new(config.training.clone(), config.models.clone()),
            engine: ForecastEngine::new(config.forecast.confidence_ratio),
            config,
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            guard: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Replace the loaded records and drop any fitted state.
    /// On `false` nothing changes.
    pub fn load(&self, records: Vec<DemandRecord>) -> bool {
        let mut store = RecordStore::new();
        if !store.load(records) {
            return false;
        }
        self.publish_records(store);
        true
    }

    /// [`load`](Self::load) for upload-shaped records
    pub fn load_raw(&self, inputs: Vec<RawRecord>) -> bool {
        let mut store = RecordStore::new();
        if !store.load_raw(inputs) {
            return false;
        }
        self.publish_records(store);
        true
    }

    fn publish_records(&self, store: RecordStore) {
        let _guard = self.guard.lock();
        let next = Arc::new(Snapshot {
            records: Arc::new(store),
            state: None,
        });
        let previous = std::mem::replace(&mut *self.snapshot.write(), next);
        if previous.state.is_some() {
            info!("Discarded fitted models after reload");
        }
    }

    /// Records and fitted state as last published
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.read())
    }

    /// Snapshot of the loaded records
    pub fn records(&self) -> Arc<RecordStore> {
        Arc::clone(&self.snapshot().records)
    }

    fn trained(&self) -> Option<Arc<TrainedState>> {
        self.snapshot().state.clone()
    }

    pub fn statistics(&self) -> DataStatistics {
        self.records().statistics()
    }

    /// Fit the model bank on the loaded records and publish the result
    pub fn train(&self) -> Result<TrainingReport> {
        let _guard = self.guard.lock();
        let records = self.records();

        let state = self.controller.train(records.records())?;
        let report = state.report();
        info!(
            active_model = %report.active_model,
            training_samples = report.training_samples,
            test_samples = report.test_samples,
            "Training complete"
        );

        *self.snapshot.write() = Arc::new(Snapshot {
            records,
            state: Some(Arc::new(state)),
        });
        Ok(report)
    }

    pub fn is_trained(&self) -> bool {
        self.snapshot.read().state.is_some()
    }

    pub fn predict(&self, request: &PredictionRequest) -> Vec<PredictionResult> {
        let snapshot = self.snapshot();
        self.engine
            .predict(snapshot.state.as_deref(), &snapshot.records, request)
    }

    pub fn predict_bulk(&self, request: &BulkPredictionRequest) -> BulkPrediction {
        let snapshot = self.snapshot();
        self.engine
            .predict_bulk(snapshot.state.as_deref(), &snapshot.records, request)
    }

    pub fn model_info(&self) -> ModelInfo {
        match self.trained() {
            Some(state) => {
                let report = state.report();
                ModelInfo {
                    is_trained: true,
                    active_model: Some(report.active_model),
                    models_trained: report.models_trained,
                    feature_columns: report.feature_columns,
                    metrics: report.metrics,
                }
            }
            None => ModelInfo {
                is_trained: false,
                active_model: None,
                models_trained: Vec::new(),
                feature_columns: Vec::new(),
                metrics: Vec::new(),
            },
        }
    }

    /// Encode the fitted state as an opaque blob
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let state = self.trained().ok_or(ForecastError::UnfittedModel)?;
        let blob = ModelBlobRef {
            format_version: MODEL_FORMAT_VERSION,
            state: &state,
        };
        Ok(serde_json::to_vec(&blob)?)
    }

    /// Restore a state produced by [`serialize`](Self::serialize)
    pub fn deserialize(&self, bytes: &[u8]) -> Result<()> {
        let blob: ModelBlob = serde_json::from_slice(bytes)?;
        if blob.format_version != MODEL_FORMAT_VERSION {
            return Err(ForecastError::ValidationError(format!(
                "Unsupported model format version {}",
                blob.format_version
            )));
        }

        let _guard = self.guard.lock();
        info!(active_model = %blob.state.active_model(), "Restored fitted models");
        let records = self.records();
        *self.snapshot.write() = Arc::new(Snapshot {
            records,
            state: Some(Arc::new(blob.state)),
        });
        Ok(())
    }

    /// Distinct stores in first-seen order
    pub fn stores(&self) -> Vec<String> {
        insights::stores(&self.records())
    }

    pub fn store_skus(&self, store: &str) -> Vec<SkuSummary> {
        insights::store_skus(&self.records(), store)
    }

    pub fn store_dashboard(&self, store: &str, today: NaiveDate) -> Option<StoreDashboard> {
        insights::store_dashboard(&self.records(), store, today)
    }

    pub fn promotions(&self) -> Vec<PromotionEvent> {
        insights::promotions(&self.records())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn records(n: i64) -> Vec<DemandRecord> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..n)
            .map(|i| DemandRecord::new(start + Duration::days(i), "S1", "A", 5.0 + i as f64, 10.0))
            .collect()
    }

    fn quick_service() -> ForecastService {
        let mut config = ForecastConfig::default();
        config.models.forest_estimators = 5;
        config.models.boosting_stages = 5;
        ForecastService::new(config).unwrap()
    }

    #[test]
    fn test_reload_drops_fitted_state() {
        let service = quick_service();
        assert!(service.load(records(20)));
        service.train().unwrap();
        assert!(service.is_trained());

        assert!(service.load(records(25)));
        assert!(!service.is_trained());
        assert!(!service.model_info().is_trained);
    }

    #[test]
    fn test_rejected_load_keeps_state() {
        let service = quick_service();
        assert!(service.load(records(20)));
        service.train().unwrap();

        let mut bad = records(3);
        bad[1].act_sales = f64::NAN;
        assert!(!service.load(bad));
        assert!(service.is_trained());
        assert_eq!(service.records().len(), 20);
    }

    #[test]
    fn test_snapshot_pairs_records_with_their_state() {
        let service = quick_service();
        assert!(service.load(records(20)));
        service.train().unwrap();
        let before = service.snapshot();

        assert!(service.load(records(25)));
        let after = service.snapshot();

        assert_eq!(before.records.len(), 20);
        assert!(before.state.is_some());
        assert_eq!(after.records.len(), 25);
        assert!(after.state.is_none());

        let request = PredictionRequest::new(
            "A",
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 3).unwrap(),
        );
        let engine = ForecastEngine::default();
        assert_eq!(
            engine
                .predict(before.state.as_deref(), &before.records, &request)
                .len(),
            3
        );
        assert!(service.predict(&request).is_empty());
    }

    #[test]
    fn test_restored_state_keeps_loaded_records() {
        let service = quick_service();
        assert!(service.load(records(20)));
        service.train().unwrap();
        let blob = service.serialize().unwrap();

        assert!(service.load(records(22)));
        service.deserialize(&blob).unwrap();
        let snapshot = service.snapshot();
        assert_eq!(snapshot.records.len(), 22);
        assert!(snapshot.state.is_some());
    }

    #[test]
    fn test_serialize_requires_training() {
        let service = quick_service();
        assert!(matches!(
            service.serialize(),
            Err(ForecastError::UnfittedModel)
        ));
        assert!(service.deserialize(b"not json").is_err());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = ForecastConfig::default();
        config.training.test_ratio = 0.0;
        assert!(ForecastService::new(config).is_err());
    }
}
