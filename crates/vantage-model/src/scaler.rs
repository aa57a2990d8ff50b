//! Median / inter-quartile-range feature scaling.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use vantage_traits::stats::quantile;
use vantage_traits::{Result, VantageError};

/// Robust feature scaler: `(x - median) / IQR`, column-wise.
///
/// A column with zero IQR keeps a scale of one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustScaler {
    /// Per-column median.
    pub center: Vec<f64>,
    /// Per-column inter-quartile range.
    pub scale: Vec<f64>,
}

impl RobustScaler {
    /// Fit on the rows of `x`.
    ///
    /// # Errors
    ///
    /// Returns [`VantageError::DataInsufficiency`] if `x` has no rows.
    pub fn fit(x: ArrayView2<'_, f64>) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(VantageError::DataInsufficiency(
                "cannot fit scaler on zero rows".to_string(),
            ));
        }
        let mut center = Vec::with_capacity(x.ncols());
        let mut scale = Vec::with_capacity(x.ncols());
        for col in x.axis_iter(Axis(1)) {
            let values = col.to_vec();
            let q1 = quantile(&values, 0.25).unwrap_or(0.0);
            let med = quantile(&values, 0.5).unwrap_or(0.0);
            let q3 = quantile(&values, 0.75).unwrap_or(0.0);
            let iqr = q3 - q1;
            center.push(med);
            scale.push(if iqr.abs() < f64::EPSILON { 1.0 } else { iqr });
        }
        Ok(Self { center, scale })
    }

    /// Number of features the scaler was fitted on.
    pub fn n_features(&self) -> usize {
        self.center.len()
    }

    /// Scale `x`.
    ///
    /// # Errors
    ///
    /// Returns [`VantageError::InvalidData`] on a column count mismatch.
    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.n_features() {
            return Err(VantageError::InvalidData(format!(
                "scaler fitted on {} features, got {}",
                self.n_features(),
                x.ncols()
            )));
        }
        let center = Array1::from_vec(self.center.clone());
        let scale = Array1::from_vec(self.scale.clone());
        Ok((&x - &center) / &scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_fit_median_iqr() {
        let x = array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0], [4.0, 5.0], [100.0, 5.0]];
        let s = RobustScaler::fit(x.view()).unwrap();
        assert_relative_eq!(s.center[0], 3.0);
        assert_relative_eq!(s.scale[0], 2.0);
        // constant column
        assert_relative_eq!(s.scale[1], 1.0);
        let t = s.transform(x.view()).unwrap();
        assert_relative_eq!(t[[0, 0]], -1.0);
        assert_relative_eq!(t[[4, 1]], 0.0);
    }

    #[test]
    fn test_refit_on_validation_changes_parameters() {
        let train = array![[0.0], [1.0], [2.0], [3.0]];
        let validation = array![[10.0], [20.0], [30.0], [40.0]];
        let a = RobustScaler::fit(train.view()).unwrap();
        let b = RobustScaler::fit(validation.view()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_transform_width_mismatch() {
        let s = RobustScaler::fit(array![[1.0, 2.0]].view()).unwrap();
        assert!(s.transform(array![[1.0]].view()).is_err());
    }
}
