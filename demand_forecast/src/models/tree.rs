//! CART regression tree
//!
//! Splits minimize the summed squared error of the two children. Candidate
//! thresholds are midpoints between consecutive distinct feature values and
//! leaves predict the mean target of their samples. Features are visited in
//! a seeded random order at each node; among equally good splits the first
//! one visited is kept.

use super::Regressor;
use crate::error::{ForecastError, Result};
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

struct Split {
    feature: usize,
    threshold: f64,
    child_error: f64,
}

const MIN_SAMPLES_SPLIT: usize = 2;

/// Regression tree stored as a node arena; the root is node 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    max_depth: Option<usize>,
    seed: u64,
    n_features: usize,
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    /// Unlimited depth, nodes split down to two samples
    pub fn new(seed: u64) -> Self {
        Self {
            max_depth: None,
            seed,
            n_features: 0,
            nodes: Vec::new(),
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Depth of the fitted tree (a single leaf has depth 0)
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], index: usize) -> usize {
            match &nodes[index] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
            }
        }

        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }

    /// Fit on the rows named by `samples`; repeated indices act as weights
    pub(crate) fn fit_samples(
        &mut self,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        samples: Vec<usize>,
    ) -> Result<()> {
        check_training_shapes(x, y)?;
        if samples.is_empty() {
            return Err(ForecastError::ValidationError(
                "Cannot fit a tree on zero samples".to_string(),
            ));
        }

        self.n_features = x.ncols();
        self.nodes.clear();

        let mut rng = StdRng::seed_from_u64(self.seed);
        self.grow(x, y, samples, 0, &mut rng);
        Ok(())
    }

    fn grow(
        &mut self,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        samples: Vec<usize>,
        depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        let index = self.nodes.len();
        let value = samples.iter().map(|&i| y[i]).sum::<f64>() / samples.len() as f64;
        self.nodes.push(TreeNode::Leaf { value });

        let depth_reached = self.max_depth.map_or(false, |max| depth >= max);
        if depth_reached || samples.len() < MIN_SAMPLES_SPLIT {
            return index;
        }

        let node_error = squared_error(&samples, y);
        if node_error <= f64::EPSILON {
            return index;
        }

        let split = match best_split(x, y, &samples, rng) {
            Some(split) if split.child_error < node_error => split,
            _ => return index,
        };

        let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
            .iter()
            .partition(|&&i| x[[i, split.feature]] <= split.threshold);
        if left_samples.is_empty() || right_samples.is_empty() {
            return index;
        }

        let left = self.grow(x, y, left_samples, depth + 1, rng);
        let right = self.grow(x, y, right_samples, depth + 1, rng);
        self.nodes[index] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        index
    }

    fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

impl Regressor for RegressionTree {
    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        self.fit_samples(x, y, (0..x.nrows()).collect())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted() {
            return Err(ForecastError::UnfittedModel);
        }
        check_feature_count(self.n_features, x)?;

        Ok(x.rows().into_iter().map(|row| self.predict_row(row)).collect())
    }

    fn is_fitted(&self) -> bool {
        !self.nodes.is_empty()
    }
}

pub(crate) fn check_training_shapes(x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(ForecastError::ValidationError(
            "Training matrix must be non-empty".to_string(),
        ));
    }
    if x.nrows() != y.len() {
        return Err(ForecastError::ValidationError(format!(
            "Feature rows ({}) don't match target length ({})",
            x.nrows(),
            y.len()
        )));
    }
    Ok(())
}

pub(crate) fn check_feature_count(expected: usize, x: ArrayView2<f64>) -> Result<()> {
    if x.ncols() != expected {
        return Err(ForecastError::ValidationError(format!(
            "Expected {} feature columns, got {}",
            expected,
            x.ncols()
        )));
    }
    Ok(())
}

fn squared_error(samples: &[usize], y: ArrayView1<f64>) -> f64 {
    let n = samples.len() as f64;
    let sum: f64 = samples.iter().map(|&i| y[i]).sum();
    let sum_sq: f64 = samples.iter().map(|&i| y[i] * y[i]).sum();
    (sum_sq - sum * sum / n).max(0.0)
}

fn best_split(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    samples: &[usize],
    rng: &mut StdRng,
) -> Option<Split> {
    let mut features: Vec<usize> = (0..x.ncols()).collect();
    features.shuffle(rng);

    let mut best: Option<Split> = None;
    for feature in features {
        if let Some(candidate) = best_split_for_feature(x, y, samples, feature) {
            if best
                .as_ref()
                .map_or(true, |b| candidate.child_error < b.child_error)
            {
                best = Some(candidate);
            }
        }
    }
    best
}

fn best_split_for_feature(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    samples: &[usize],
    feature: usize,
) -> Option<Split> {
    let mut sorted: Vec<(f64, f64)> = samples.iter().map(|&i| (x[[i, feature]], y[i])).collect();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

    let n = sorted.len();
    let total_sum: f64 = sorted.iter().map(|(_, t)| t).sum();
    let total_sq: f64 = sorted.iter().map(|(_, t)| t * t).sum();

    let mut left_sum = 0.0;
    let mut left_sq = 0.0;
    let mut best: Option<Split> = None;

    for k in 0..n - 1 {
        let (value, target) = sorted[k];
        left_sum += target;
        left_sq += target * target;

        let next = sorted[k + 1].0;
        if next <= value {
            continue;
        }

        let n_left = (k + 1) as f64;
        let n_right = (n - k - 1) as f64;
        let right_sum = total_sum - left_sum;
        let right_sq = total_sq - left_sq;
        let child_error = (left_sq - left_sum * left_sum / n_left).max(0.0)
            + (right_sq - right_sum * right_sum / n_right).max(0.0);

        if best.as_ref().map_or(true, |b| child_error < b.child_error) {
            let midpoint = value + (next - value) / 2.0;
            let threshold = if midpoint < next { midpoint } else { value };
            best = Some(Split {
                feature,
                threshold,
                child_error,
            });
        }
    }

    best
}
