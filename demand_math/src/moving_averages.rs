//! Sliding-window calculations over ordered observations
//!
//! Contains:
//! - Simple Moving Average (SMA) with an incremental update API
//! - `rolling_mean`, the SMA evaluated at every position of a series
//! - `lagged`, the series shifted back by a fixed number of observations

use crate::{MathError, Result};
use std::collections::VecDeque;

/// Simple Moving Average (SMA) implementation
#[derive(Debug, Clone)]
pub struct SimpleMovingAverage {
    period: usize,
    values: VecDeque<f64>,
}

impl SimpleMovingAverage {
    /// Create a new Simple Moving Average with the specified period
    pub fn new(period: usize) -> Result<Self> {
        if period == 0 {
            return Err(MathError::InvalidInput(
                "Period must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            period,
            values: VecDeque::with_capacity(period),
        })
    }

    /// Push a new observation into the window
    pub fn update(&mut self, value: f64) {
        self.values.push_back(value);

        if self.values.len() > self.period {
            self.values.pop_front();
        }
    }

    /// Whether a full window has been observed
    pub fn is_ready(&self) -> bool {
        self.values.len() >= self.period
    }

    /// Get the current SMA value
    pub fn value(&self) -> Result<f64> {
        if !self.is_ready() {
            return Err(MathError::InsufficientData(format!(
                "Not enough data for SMA calculation. Need {} values, have {}.",
                self.period,
                self.values.len()
            )));
        }

        Ok(self.values.iter().sum::<f64>() / self.period as f64)
    }

    /// Get the current period
    pub fn period(&self) -> usize {
        self.period
    }

    /// Reset the SMA, clearing all values
    pub fn reset(&mut self) {
        self.values.clear();
    }
}

/// Mean of the `window` observations ending at each position.
///
/// Positions before the first full window are `None`.
pub fn rolling_mean(values: &[f64], window: usize) -> Result<Vec<Option<f64>>> {
    let mut sma = SimpleMovingAverage::new(window)?;

    Ok(values
        .iter()
        .map(|&value| {
            sma.update(value);
            sma.value().ok()
        })
        .collect())
}

/// The series shifted back by `lag` observations (`None` where no earlier value exists).
pub fn lagged(values: &[f64], lag: usize) -> Result<Vec<Option<f64>>> {
    if lag == 0 {
        return Err(MathError::InvalidInput(
            "Lag must be greater than zero".to_string(),
        ));
    }

    Ok((0..values.len())
        .map(|i| if i >= lag { Some(values[i - lag]) } else { None })
        .collect())
}
