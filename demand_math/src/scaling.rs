//! Feature standardization (z-score scaling)

use crate::{MathError, Result};
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Standard scaler: `(x - mean) / std` per column.
///
/// Columns with zero variance keep a scale of 1.0 so they map to zero
/// instead of producing NaN.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    /// Create an unfitted scaler
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn column means and population standard deviations
    pub fn fit(&mut self, x: ArrayView2<f64>) -> Result<()> {
        if x.nrows() == 0 {
            return Err(MathError::InsufficientData(
                "Cannot fit a scaler with zero samples".to_string(),
            ));
        }

        let n = x.nrows() as f64;
        let mut means = Vec::with_capacity(x.ncols());
        let mut scales = Vec::with_capacity(x.ncols());

        for column in x.axis_iter(Axis(1)) {
            let mean = column.sum() / n;
            let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let std = variance.sqrt();

            means.push(mean);
            scales.push(if std > f64::EPSILON { std } else { 1.0 });
        }

        self.means = means;
        self.scales = scales;
        Ok(())
    }

    /// Apply the learned scaling
    pub fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted() {
            return Err(MathError::CalculationError(
                "Scaler has not been fitted".to_string(),
            ));
        }

        if x.ncols() != self.means.len() {
            return Err(MathError::InvalidInput(format!(
                "Scaler was fitted on {} columns, got {}",
                self.means.len(),
                x.ncols()
            )));
        }

        let mut scaled = x.to_owned();
        for (j, mut column) in scaled.axis_iter_mut(Axis(1)).enumerate() {
            let (mean, scale) = (self.means[j], self.scales[j]);
            column.mapv_inplace(|v| (v - mean) / scale);
        }

        Ok(scaled)
    }

    /// Fit on `x` and return the scaled copy
    pub fn fit_transform(&mut self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    /// Whether `fit` has been called successfully
    pub fn is_fitted(&self) -> bool {
        !self.means.is_empty()
    }

    /// Learned column means
    pub fn means(&self) -> &[f64] {
        &self.means
    }

    /// Learned column scales
    pub fn scales(&self) -> &[f64] {
        &self.scales
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_standardize_columns() {
        let x = array![[10.0, 1.0], [20.0, 1.0], [30.0, 1.0], [40.0, 1.0], [50.0, 1.0]];
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(x.view()).unwrap();

        let column = scaled.column(0);
        let mean = column.sum() / column.len() as f64;
        let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / column.len() as f64;
        assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(variance.sqrt(), 1.0, epsilon = 1e-12);

        // Constant column is centered, not divided by zero
        assert!(scaled.column(1).iter().all(|v| *v == 0.0));
        assert_eq!(scaler.scales()[1], 1.0);
    }

    #[test]
    fn test_transform_uses_training_statistics() {
        let mut scaler = StandardScaler::new();
        scaler.fit(array![[0.0], [2.0]].view()).unwrap();

        let scaled = scaler.transform(array![[4.0]].view()).unwrap();
        assert_abs_diff_eq!(scaled[[0, 0]], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_unfitted_and_mismatched() {
        let scaler = StandardScaler::new();
        assert!(scaler.transform(array![[1.0]].view()).is_err());

        let mut scaler = StandardScaler::new();
        scaler.fit(array![[1.0, 2.0]].view()).unwrap();
        assert!(scaler.transform(array![[1.0]].view()).is_err());
    }
}
