//! Training controller: features, split, model bank, selection

use crate::config::{ModelConfig, TrainingConfig};
use crate::error::{ForecastError, Result};
use crate::features::{FeatureBuilder, FeatureRow, FeatureSpace};
use crate::metrics::{evaluate_regression, RegressionMetrics};
use crate::models::{model_bank, Model, ModelKind, Regressor};
use crate::records::DemandRecord;
use crate::utils::train_test_split;
use ndarray::{Array1, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Held-out score of one bank entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelScore {
    pub model: ModelKind,
    pub metrics: RegressionMetrics,
}

/// Summary returned by a successful training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub metrics: Vec<ModelScore>,
    pub active_model: ModelKind,
    pub models_trained: Vec<ModelKind>,
    pub training_samples: usize,
    pub test_samples: usize,
    pub feature_columns: Vec<String>,
}

/// Everything needed to predict: schema, encoders and every fitted model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedState {
    feature_space: FeatureSpace,
    models: Vec<Model>,
    active_model: ModelKind,
    scores: Vec<ModelScore>,
    training_samples: usize,
    test_samples: usize,
}

impl TrainedState {
    pub fn feature_space(&self) -> &FeatureSpace {
        &self.feature_space
    }

    pub fn active_model(&self) -> ModelKind {
        self.active_model
    }

    pub fn scores(&self) -> &[ModelScore] {
        &self.scores
    }

    /// Held-out R² of the active model
    pub fn active_r2(&self) -> Option<f64> {
        self.scores
            .iter()
            .find(|s| s.model == self.active_model)
            .map(|s| s.metrics.r2)
    }

    /// Raw active-model predictions for feature rows
    pub fn predict_rows(&self, rows: &[FeatureRow]) -> Result<Array1<f64>> {
        let model = self
            .models
            .iter()
            .find(|m| m.kind() == self.active_model)
            .ok_or(ForecastError::UnfittedModel)?;

        let x = self.feature_space.encode(rows);
        model.predict(x.view())
    }

    /// Report view of this state
    pub fn report(&self) -> TrainingReport {
        TrainingReport {
            metrics: self.scores.clone(),
            active_model: self.active_model,
            models_trained: self.models.iter().map(Model::kind).collect(),
            training_samples: self.training_samples,
            test_samples: self.test_samples,
            feature_columns: self.feature_space.column_names(),
        }
    }
}

/// Fits the model bank and selects the best entry by held-out R²
#[derive(Debug, Clone, Default)]
pub struct TrainingController {
    training: TrainingConfig,
    models: ModelConfig,
}

impl TrainingController {
    pub fn new(training: TrainingConfig, models: ModelConfig) -> Self {
        Self { training, models }
    }

    pub fn train(&self, records: &[DemandRecord]) -> Result<TrainedState> {
        let rows: Vec<FeatureRow> = FeatureBuilder::build(records)?
            .into_iter()
            .filter(|row| row.quantity_sold.is_finite())
            .collect();

        let required = self.training.min_training_rows;
        if rows.len() < required {
            return Err(ForecastError::InsufficientData {
                required,
                available: rows.len(),
            });
        }

        let feature_space = FeatureSpace::fit(&rows);
        let x = feature_space.encode(&rows);
        let y: Array1<f64> = rows.iter().map(|row| row.quantity_sold).collect();

        let seed = self.training.random_seed;
        let (train_idx, test_idx) = train_test_split(rows.len(), self.training.test_ratio, seed);
        let x_train = x.select(Axis(0), &train_idx);
        let y_train = y.select(Axis(0), &train_idx);
        let x_test = x.select(Axis(0), &test_idx);
        let y_test = y.select(Axis(0), &test_idx);

        info!(
            training_rows = train_idx.len(),
            test_rows = test_idx.len(),
            features = feature_space.columns().len(),
            "Training model bank"
        );

        let mut models = Vec::new();
        let mut scores = Vec::new();
        for mut model in model_bank(&self.models, seed) {
            let kind = model.kind();
            let computation = |e: ForecastError| {
                ForecastError::ComputationError(format!("{} failed: {}", kind, e))
            };

            model.fit(x_train.view(), y_train.view()).map_err(computation)?;
            let predicted = model.predict(x_test.view()).map_err(computation)?;
            let metrics =
                evaluate_regression(&predicted.to_vec(), &y_test.to_vec()).map_err(computation)?;

            debug!(model = %kind, %metrics, "Scored model");
            scores.push(ModelScore {
                model: kind,
                metrics,
            });
            models.push(model);
        }

        let active_model = select_best(&scores).ok_or_else(|| {
            ForecastError::ComputationError("No model could be scored".to_string())
        })?;
        info!(model = %active_model, "Selected active model");

        Ok(TrainedState {
            feature_space,
            models,
            active_model,
            scores,
            training_samples: train_idx.len(),
            test_samples: test_idx.len(),
        })
    }
}

/// Highest R²; the earliest entry wins ties
fn select_best(scores: &[ModelScore]) -> Option<ModelKind> {
    let mut best: Option<&ModelScore> = None;
    for score in scores {
        if best.map_or(true, |b| score.metrics.r2 > b.metrics.r2) {
            best = Some(score);
        }
    }
    best.map(|s| s.model)
}
