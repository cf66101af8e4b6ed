//! ElasticNet regression fitted by cyclic coordinate descent.
//!
//! Objective (same parametrisation as scikit-learn):
//!
//! ```text
//! 1/(2n) * ||y - Xw - b||^2 + alpha * l1_ratio * ||w||_1
//!     + 0.5 * alpha * (1 - l1_ratio) * ||w||^2
//! ```
//!
//! The intercept is not penalised: features and target are centered before the
//! descent and the intercept is recovered from the means afterwards.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("invalid hyperparameter: {0}")]
    InvalidParam(String),

    #[error("no training rows")]
    EmptyData,

    #[error("shape mismatch: {0}")]
    Shape(String),

    #[error("non-finite input: {0}")]
    NonFinite(String),

    #[error("model is not fitted")]
    NotFitted,
}

/// Fitted state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fitted {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    /// Coordinate-descent sweeps performed.
    pub n_iter: usize,
    pub converged: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElasticNet {
    pub alpha: f64,
    pub l1_ratio: f64,
    pub max_iter: usize,
    pub tol: f64,
    pub fitted: Option<Fitted>,
}

impl Default for ElasticNet {
    fn default() -> Self {
        Self::new(1.0, 0.5)
    }
}

impl ElasticNet {
    pub fn new(alpha: f64, l1_ratio: f64) -> Self {
        Self {
            alpha,
            l1_ratio,
            max_iter: 1000,
            tol: 1e-4,
            fitted: None,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    pub fn coefficients(&self) -> Option<&[f64]> {
        self.fitted.as_ref().map(|f| f.coefficients.as_slice())
    }

    pub fn intercept(&self) -> Option<f64> {
        self.fitted.as_ref().map(|f| f.intercept)
    }

    fn check_params(&self) -> Result<(), ModelError> {
        if !self.alpha.is_finite() || self.alpha < 0.0 {
            return Err(ModelError::InvalidParam(format!(
                "alpha must be a non-negative number, got {}",
                self.alpha
            )));
        }
        if !(0.0..=1.0).contains(&self.l1_ratio) {
            return Err(ModelError::InvalidParam(format!(
                "l1_ratio must be in [0, 1], got {}",
                self.l1_ratio
            )));
        }
        if self.max_iter == 0 {
            return Err(ModelError::InvalidParam("max_iter must be positive".into()));
        }
        Ok(())
    }

    /// Fit on row-major features `x` and targets `y`.
    pub fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<&mut Self, ModelError> {
        self.check_params()?;
        let n_samples = x.len();
        if n_samples == 0 {
            return Err(ModelError::EmptyData);
        }
        if n_samples != y.len() {
            return Err(ModelError::Shape(format!(
                "{n_samples} feature rows but {} targets",
                y.len()
            )));
        }
        let n_features = x[0].len();
        if let Some(bad) = x.iter().position(|row| row.len() != n_features) {
            return Err(ModelError::Shape(format!(
                "row {bad} has {} features, expected {n_features}",
                x[bad].len()
            )));
        }
        if let Some(bad) = x.iter().position(|row| row.iter().any(|v| !v.is_finite())) {
            return Err(ModelError::NonFinite(format!("feature row {bad}")));
        }
        if let Some(bad) = y.iter().position(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite(format!("target {bad}")));
        }

        let n = n_samples as f64;
        let x_mean: Vec<f64> = (0..n_features)
            .map(|j| x.iter().map(|row| row[j]).sum::<f64>() / n)
            .collect();
        let y_mean = y.iter().sum::<f64>() / n;

        // Column-major centered copy: the descent walks one feature at a time.
        let columns: Vec<Vec<f64>> = (0..n_features)
            .map(|j| x.iter().map(|row| row[j] - x_mean[j]).collect())
            .collect();
        let col_norms: Vec<f64> = columns
            .iter()
            .map(|c| c.iter().map(|v| v * v).sum())
            .collect();

        let l1 = self.alpha * self.l1_ratio * n;
        let l2 = self.alpha * (1.0 - self.l1_ratio) * n;

        let mut w = vec![0.0; n_features];
        let mut residual: Vec<f64> = y.iter().map(|v| v - y_mean).collect();
        let mut n_iter = 0;
        let mut converged = n_features == 0;

        while !converged && n_iter < self.max_iter {
            n_iter += 1;
            let mut max_delta = 0.0_f64;
            let mut max_weight = 0.0_f64;

            for j in 0..n_features {
                let denom = col_norms[j] + l2;
                let old = w[j];
                let new = if denom <= f64::EPSILON {
                    0.0
                } else {
                    let rho = dot(&columns[j], &residual) + col_norms[j] * old;
                    soft_threshold(rho, l1) / denom
                };
                let delta = new - old;
                if delta != 0.0 {
                    for (r, xij) in residual.iter_mut().zip(&columns[j]) {
                        *r -= delta * xij;
                    }
                    w[j] = new;
                }
                max_delta = max_delta.max(delta.abs());
                max_weight = max_weight.max(new.abs());
            }

            converged = max_weight == 0.0 || max_delta / max_weight < self.tol;
        }

        let intercept = y_mean - dot(&w, &x_mean);
        self.fitted = Some(Fitted {
            coefficients: w,
            intercept,
            n_iter,
            converged,
        });
        Ok(self)
    }

    pub fn predict_one(&self, row: &[f64]) -> Result<f64, ModelError> {
        let fitted = self.fitted.as_ref().ok_or(ModelError::NotFitted)?;
        if row.len() != fitted.coefficients.len() {
            return Err(ModelError::Shape(format!(
                "row has {} features, model expects {}",
                row.len(),
                fitted.coefficients.len()
            )));
        }
        Ok(dot(&fitted.coefficients, row) + fitted.intercept)
    }

    pub fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        x.iter().map(|row| self.predict_one(row)).collect()
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}
