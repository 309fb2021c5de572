//! Bagged regression trees

use super::tree::{check_feature_count, check_training_shapes, RegressionTree};
use super::Regressor;
use crate::error::{ForecastError, Result};
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Random forest regressor: every tree sees a bootstrap sample and all
/// features; the forest predicts the mean of its trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    n_estimators: usize,
    random_state: u64,
    n_features: usize,
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            n_estimators,
            random_state: 42,
            n_features: 0,
            trees: Vec::new(),
        }
    }

    /// Tree `i` draws its bootstrap sample and feature order from seed `random_state + i`
    pub fn with_random_state(mut self, random_state: u64) -> Self {
        self.random_state = random_state;
        self
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for RandomForest {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        check_training_shapes(x, y)?;
        if self.n_estimators == 0 {
            return Err(ForecastError::ValidationError(
                "A forest needs at least one tree".to_string(),
            ));
        }

        let n = x.nrows();
        let mut trees = Vec::with_capacity(self.n_estimators);
        for i in 0..self.n_estimators {
            let seed = self.random_state.wrapping_add(i as u64);
            let mut rng = StdRng::seed_from_u64(seed);
            let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();

            let mut tree = RegressionTree::new(seed);
            tree.fit_samples(x, y, bootstrap)?;
            trees.push(tree);
        }

        self.n_features = x.ncols();
        self.trees = trees;
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted() {
            return Err(ForecastError::UnfittedModel);
        }
        check_feature_count(self.n_features, x)?;

        let mut total = Array1::<f64>::zeros(x.nrows());
        for tree in &self.trees {
            total += &tree.predict(x)?;
        }
        Ok(total / self.trees.len() as f64)
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn linear_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((50, 2), |(i, j)| if j == 0 { i as f64 } else { (i % 5) as f64 });
        let y = Array1::from_shape_fn(50, |i| 3.0 * i as f64);
        (x, y)
    }

    #[test]
    fn test_forest_tracks_signal() {
        let (x, y) = linear_data();
        let mut forest = RandomForest::new(20);
        forest.fit(x.view(), y.view()).unwrap();
        assert_eq!(forest.n_trees(), 20);

        let predicted = forest.predict(array![[10.0, 0.0], [40.0, 0.0]].view()).unwrap();
        assert!((predicted[0] - 30.0).abs() < 10.0);
        assert!((predicted[1] - 120.0).abs() < 10.0);
        assert!(predicted[1] > predicted[0]);
    }

    #[test]
    fn test_forest_is_deterministic() {
        let (x, y) = linear_data();
        let mut a = RandomForest::new(5).with_random_state(7);
        let mut b = RandomForest::new(5).with_random_state(7);
        a.fit(x.view(), y.view()).unwrap();
        b.fit(x.view(), y.view()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_trees_are_fully_grown() {
        let (x, y) = linear_data();
        let mut forest = RandomForest::new(3);
        forest.fit(x.view(), y.view()).unwrap();
        // a bootstrap of 50 distinct targets keeps far more than 16 of them
        assert!(forest.trees.iter().all(|tree| tree.depth() >= 4));
    }

    #[test]
    fn test_unfitted_forest() {
        let forest = RandomForest::new(3);
        assert!(matches!(
            forest.predict(Array2::zeros((1, 2)).view()),
            Err(ForecastError::UnfittedModel)
        ));
    }
}
