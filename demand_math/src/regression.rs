//! Ordinary least squares regression
//!
//! Solves the normal equations of the centered problem with Gauss-Jordan
//! elimination and partial pivoting. Columns that are linearly dependent on
//! earlier ones (constant columns included) receive a zero coefficient, so a
//! rank-deficient design still yields a least-squares solution.

use crate::{MathError, Result};
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Relative pivot tolerance below which a column is treated as dependent
const PIVOT_TOLERANCE: f64 = 1e-10;

/// Fitted multiple linear regression `y = intercept + x · coefficients`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeastSquares {
    coefficients: Vec<f64>,
    intercept: f64,
}

impl LeastSquares {
    /// Fit the regression to a design matrix (`n_samples × n_features`) and targets
    pub fn fit(x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<Self> {
        let (n_samples, n_features) = x.dim();

        if n_samples != y.len() {
            return Err(MathError::InvalidInput(format!(
                "Design matrix has {} rows but target has {} values",
                n_samples,
                y.len()
            )));
        }

        if n_samples == 0 {
            return Err(MathError::InsufficientData(
                "Cannot fit a regression with zero samples".to_string(),
            ));
        }

        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| MathError::CalculationError("Cannot average columns".to_string()))?;
        let y_mean = y.sum() / n_samples as f64;

        let centered_x = &x - &x_mean;
        let centered_y = y.mapv(|v| v - y_mean);

        let gram = centered_x.t().dot(&centered_x);
        let moment = centered_x.t().dot(&centered_y);

        let mut system: Vec<Vec<f64>> = (0..n_features)
            .map(|row| {
                let mut line: Vec<f64> = gram.row(row).to_vec();
                line.push(moment[row]);
                line
            })
            .collect();

        let coefficients = solve_with_pivoting(&mut system, n_features)?;

        let intercept = y_mean
            - coefficients
                .iter()
                .zip(x_mean.iter())
                .map(|(c, m)| c * m)
                .sum::<f64>();

        if !intercept.is_finite() {
            return Err(MathError::CalculationError(
                "Regression produced a non-finite intercept".to_string(),
            ));
        }

        Ok(Self {
            coefficients,
            intercept,
        })
    }

    /// Predict targets for each row of `x`
    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.coefficients.len() {
            return Err(MathError::InvalidInput(format!(
                "Expected {} features, got {}",
                self.coefficients.len(),
                x.ncols()
            )));
        }

        let coefficients = ArrayView1::from(&self.coefficients[..]);
        Ok(x.dot(&coefficients) + self.intercept)
    }

    /// Get the fitted coefficients, one per feature
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Get the fitted intercept
    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

/// Gauss-Jordan elimination on an augmented `n × (n + 1)` system.
///
/// Free variables (columns without a usable pivot) are set to zero.
fn solve_with_pivoting(system: &mut [Vec<f64>], n: usize) -> Result<Vec<f64>> {
    let scale = (0..n)
        .map(|i| system[i][i].abs())
        .fold(1.0_f64, f64::max);
    let tolerance = PIVOT_TOLERANCE * scale;

    let mut pivot_rows: Vec<Option<usize>> = vec![None; n];
    let mut row = 0;

    for col in 0..n {
        if row == n {
            break;
        }

        let (best, magnitude) = (row..n)
            .map(|r| (r, system[r][col].abs()))
            .fold((row, -1.0), |acc, cand| if cand.1 > acc.1 { cand } else { acc });

        if magnitude <= tolerance {
            continue;
        }

        system.swap(row, best);

        let pivot = system[row][col];
        for value in system[row].iter_mut() {
            *value /= pivot;
        }

        for other in 0..n {
            if other == row {
                continue;
            }
            let factor = system[other][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..=n {
                let delta = factor * system[row][k];
                system[other][k] -= delta;
            }
        }

        pivot_rows[col] = Some(row);
        row += 1;
    }

    let solution: Vec<f64> = pivot_rows
        .iter()
        .map(|pivot| pivot.map_or(0.0, |r| system[r][n]))
        .collect();

    if solution.iter().any(|v| !v.is_finite()) {
        return Err(MathError::CalculationError(
            "Least squares solution is not finite".to_string(),
        ));
    }

    Ok(solution)
}
