//! Metrics for evaluating regression fits on held-out rows

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};

/// Held-out accuracy of one model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Mean Absolute Error
    pub mae: f64,
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Coefficient of determination
    pub r2: f64,
}

/// Score `predicted` against `actual`.
///
/// When `actual` is constant the R² denominator vanishes; R² is then 1.0 for
/// a perfect prediction and 0.0 otherwise.
pub fn evaluate_regression(predicted: &[f64], actual: &[f64]) -> Result<RegressionMetrics> {
    if predicted.len() != actual.len() || predicted.is_empty() {
        return Err(ForecastError::ValidationError(
            "Predicted and actual values must have the same non-zero length".to_string(),
        ));
    }
    if predicted.iter().any(|p| !p.is_finite()) {
        return Err(ForecastError::ComputationError(
            "Model produced a non-finite prediction".to_string(),
        ));
    }

    let n = actual.len() as f64;

    let errors: Vec<f64> = predicted
        .iter()
        .zip(actual.iter())
        .map(|(&p, &a)| a - p)
        .collect();

    let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
    let sse = errors.iter().map(|e| e.powi(2)).sum::<f64>();
    let mse = sse / n;
    let rmse = mse.sqrt();

    let mean = actual.iter().sum::<f64>() / n;
    let sst = actual.iter().map(|a| (a - mean).powi(2)).sum::<f64>();
    let r2 = if sst > 0.0 {
        1.0 - sse / sst
    } else if sse == 0.0 {
        1.0
    } else {
        0.0
    };

    Ok(RegressionMetrics { mae, mse, rmse, r2 })
}

impl std::fmt::Display for RegressionMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MAE {:.4}, MSE {:.4}, RMSE {:.4}, R2 {:.4}",
            self.mae, self.mse, self.rmse, self.r2
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_known_values() {
        let metrics = evaluate_regression(&[2.0, 4.0, 6.0], &[1.0, 4.0, 7.0]).unwrap();
        assert_abs_diff_eq!(metrics.mae, 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(metrics.mse, 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(metrics.rmse, (2.0f64 / 3.0).sqrt(), epsilon = 1e-12);
        // sst = 18, sse = 2
        assert_abs_diff_eq!(metrics.r2, 1.0 - 2.0 / 18.0, epsilon = 1e-12);
    }

    #[test]
    fn test_constant_target() {
        let perfect = evaluate_regression(&[3.0, 3.0], &[3.0, 3.0]).unwrap();
        assert_eq!(perfect.r2, 1.0);

        let off = evaluate_regression(&[3.5, 3.0], &[3.0, 3.0]).unwrap();
        assert_eq!(off.r2, 0.0);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(evaluate_regression(&[], &[]).is_err());
        assert!(evaluate_regression(&[1.0], &[1.0, 2.0]).is_err());
        assert!(matches!(
            evaluate_regression(&[f64::NAN], &[1.0]),
            Err(ForecastError::ComputationError(_))
        ));
    }
}
