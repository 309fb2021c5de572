//! Gradient boosted regression trees (squared error)
//!
//! 1. Start from the mean target
//! 2. Each stage fits a shallow tree to the current residuals
//! 3. Predictions add `learning_rate * tree_prediction` per stage

use super::tree::{check_feature_count, check_training_shapes, RegressionTree};
use super::Regressor;
use crate::error::{ForecastError, Result};
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    n_estimators: usize,
    learning_rate: f64,
    max_depth: usize,
    random_state: u64,
    init_prediction: f64,
    n_features: usize,
    estimators: Vec<RegressionTree>,
}

impl GradientBoosting {
    /// 100 stages, learning rate 0.1, depth 3
    pub fn new() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            random_state: 42,
            init_prediction: 0.0,
            n_features: 0,
            estimators: Vec::new(),
        }
    }

    pub fn with_n_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_random_state(mut self, random_state: u64) -> Self {
        self.random_state = random_state;
        self
    }

    pub fn n_estimators(&self) -> usize {
        self.estimators.len()
    }
}

impl Default for GradientBoosting {
    fn default() -> Self {
        Self::new()
    }
}

impl Regressor for GradientBoosting {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        check_training_shapes(x, y)?;
        if self.n_estimators == 0 {
            return Err(ForecastError::ValidationError(
                "Boosting needs at least one stage".to_string(),
            ));
        }

        let init = y.mean().unwrap_or(0.0);
        let mut current = Array1::from_elem(y.len(), init);
        let mut estimators = Vec::with_capacity(self.n_estimators);

        for stage in 0..self.n_estimators {
            let residuals = &y - &current;

            let mut tree = RegressionTree::new(self.random_state.wrapping_add(stage as u64))
                .with_max_depth(self.max_depth);
            tree.fit(x, residuals.view())?;

            current = current + tree.predict(x)? * self.learning_rate;
            estimators.push(tree);
        }

        self.init_prediction = init;
        self.n_features = x.ncols();
        self.estimators = estimators;
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted() {
            return Err(ForecastError::UnfittedModel);
        }
        check_feature_count(self.n_features, x)?;

        let mut predicted = Array1::from_elem(x.nrows(), self.init_prediction);
        for tree in &self.estimators {
            predicted = predicted + tree.predict(x)? * self.learning_rate;
        }
        Ok(predicted)
    }

    fn is_fitted(&self) -> bool {
        !self.estimators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;

    #[test]
    fn test_single_stage_shrinks_toward_mean() {
        let x = Array2::from_shape_vec((4, 1), vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        let y = ndarray::array![0.0, 0.0, 10.0, 10.0];

        let mut model = GradientBoosting::new()
            .with_n_estimators(1)
            .with_learning_rate(0.5);
        model.fit(x.view(), y.view()).unwrap();

        let predicted = model.predict(x.view()).unwrap();
        // mean 5, residuals +-5, half a step
        assert_abs_diff_eq!(predicted[0], 2.5, epsilon = 1e-12);
        assert_abs_diff_eq!(predicted[3], 7.5, epsilon = 1e-12);
    }

    #[test]
    fn test_training_error_decreases_with_stages() {
        let x = Array2::from_shape_fn((40, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(40, |i| (i as f64 / 4.0).powi(2));

        let sse = |stages: usize| {
            let mut model = GradientBoosting::new().with_n_estimators(stages);
            model.fit(x.view(), y.view()).unwrap();
            let predicted = model.predict(x.view()).unwrap();
            (&predicted - &y).mapv(|e| e * e).sum()
        };

        assert!(sse(50) < sse(5));
    }

    #[test]
    fn test_unfitted_boosting() {
        assert!(matches!(
            GradientBoosting::new().predict(Array2::zeros((2, 1)).view()),
            Err(ForecastError::UnfittedModel)
        ));
    }
}
