//! Ordinary least squares on standardized features

use super::Regressor;
use crate::error::{ForecastError, Result};
use demand_math::{LeastSquares, StandardScaler};
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// Linear regression with intercept. The scaler is fitted on the training
/// matrix and applied before every fit and prediction; rank-deficient
/// columns receive a zero coefficient.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    scaler: StandardScaler,
    solution: Option<LeastSquares>,
}

impl LinearModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    /// Coefficients in standardized units
    pub fn coefficients(&self) -> Option<&[f64]> {
        self.solution.as_ref().map(|s| s.coefficients())
    }
}

impl Regressor for LinearModel {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(x)?;
        let solution = LeastSquares::fit(scaled.view(), y)?;

        self.scaler = scaler;
        self.solution = Some(solution);
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        let solution = self.solution.as_ref().ok_or(ForecastError::UnfittedModel)?;
        let scaled = self.scaler.transform(x)?;
        Ok(solution.predict(scaled.view())?)
    }

    fn is_fitted(&self) -> bool {
        self.solution.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    #[test]
    fn test_recovers_linear_relation() {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| if j == 0 { i as f64 } else { 100.0 });
        let y = Array1::from_shape_fn(30, |i| 2.0 * i as f64 + 1.0);

        let mut model = LinearModel::new();
        model.fit(x.view(), y.view()).unwrap();

        let predicted = model.predict(array![[40.0, 100.0]].view()).unwrap();
        assert_abs_diff_eq!(predicted[0], 81.0, epsilon = 1e-8);
        assert_abs_diff_eq!(model.coefficients().unwrap()[1], 0.0);
    }

    #[test]
    fn test_unfitted_linear_model() {
        assert!(matches!(
            LinearModel::new().predict(Array2::zeros((1, 1)).view()),
            Err(ForecastError::UnfittedModel)
        ));
    }
}
