//! Regression strategies for demand prediction

use crate::config::ModelConfig;
use crate::error::{ForecastError, Result};
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod boosting;
pub mod forest;
pub mod linear;
pub mod tree;

pub use boosting::GradientBoosting;
pub use forest::RandomForest;
pub use linear::LinearModel;
pub use tree::RegressionTree;

/// Common contract of every regression strategy
pub trait Regressor {
    /// Fit on a `rows x features` matrix and its targets
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()>;

    /// Predict one value per row
    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>>;

    /// Whether `fit` has succeeded
    fn is_fitted(&self) -> bool;
}

/// Names of the bank entries, in training order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    RandomForest,
    GradientBoosting,
    LinearRegression,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [
        ModelKind::RandomForest,
        ModelKind::GradientBoosting,
        ModelKind::LinearRegression,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::RandomForest => "random_forest",
            ModelKind::GradientBoosting => "gradient_boosting",
            ModelKind::LinearRegression => "linear_regression",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        ModelKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ForecastError::ValidationError(format!("Unknown model: {}", s)))
    }
}

/// A configured regression strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Model {
    Linear(LinearModel),
    BaggedTrees(RandomForest),
    BoostedTrees(GradientBoosting),
}

impl Model {
    /// Unfitted strategy for `kind`, configured from `config`
    pub fn build(kind: ModelKind, config: &ModelConfig, seed: u64) -> Self {
        match kind {
            ModelKind::RandomForest => Model::BaggedTrees(
                RandomForest::new(config.forest_estimators).with_random_state(seed),
            ),
            ModelKind::GradientBoosting => Model::BoostedTrees(
                GradientBoosting::new()
                    .with_n_estimators(config.boosting_stages)
                    .with_learning_rate(config.learning_rate)
                    .with_max_depth(config.boosting_max_depth)
                    .with_random_state(seed),
            ),
            ModelKind::LinearRegression => Model::Linear(LinearModel::new()),
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            Model::Linear(_) => ModelKind::LinearRegression,
            Model::BaggedTrees(_) => ModelKind::RandomForest,
            Model::BoostedTrees(_) => ModelKind::GradientBoosting,
        }
    }

    fn inner(&self) -> &dyn Regressor {
        match self {
            Model::Linear(m) => m,
            Model::BaggedTrees(m) => m,
            Model::BoostedTrees(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Regressor {
        match self {
            Model::Linear(m) => m,
            Model::BaggedTrees(m) => m,
            Model::BoostedTrees(m) => m,
        }
    }
}

impl Regressor for Model {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        self.inner().predict(x)
    }

    fn is_fitted(&self) -> bool {
        self.inner().is_fitted()
    }
}

/// Every strategy of the bank, unfitted, in training order
pub fn model_bank(config: &ModelConfig, seed: u64) -> Vec<Model> {
    ModelKind::ALL
        .into_iter()
        .map(|kind| Model::build(kind, config, seed))
        .collect()
}
