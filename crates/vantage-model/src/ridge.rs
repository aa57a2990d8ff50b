//! Ridge regression.

use crate::linalg::ridge_fit;
use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};
use vantage_traits::{Result, VantageError};

/// Regularization strengths tried during tuning.
pub const RIDGE_ALPHAS: [f64; 5] = [0.01, 0.1, 1.0, 10.0, 100.0];

/// A fitted ridge regression with intercept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ridge {
    /// L2 penalty.
    pub alpha: f64,
    /// Slope per feature.
    pub coef: Vec<f64>,
    /// Intercept.
    pub intercept: f64,
}

impl Ridge {
    /// Fit on `(x, y)`.
    ///
    /// # Errors
    ///
    /// Returns [`VantageError::ComputationFailure`] if the system is singular.
    pub fn fit(x: ArrayView2<'_, f64>, y: &Array1<f64>, alpha: f64) -> Result<Self> {
        let (coef, intercept) = ridge_fit(x, y.view(), alpha)
            .ok_or_else(|| VantageError::computation("ridge", "singular normal equations"))?;
        Ok(Self {
            alpha,
            coef: coef.to_vec(),
            intercept,
        })
    }

    /// Predict every row of `x`.
    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Array1<f64> {
        x.dot(&Array1::from_vec(self.coef.clone())) + self.intercept
    }
}
