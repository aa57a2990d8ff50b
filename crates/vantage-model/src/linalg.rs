//! Small dense linear algebra for the linear models.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

/// Solve `a x = b` for a symmetric positive-definite `a` by Cholesky
/// factorization. Returns `None` if `a` is not positive definite.
pub fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if a.ncols() != n || b.len() != n {
        return None;
    }
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if sum <= 1e-12 {
                    return None;
                }
                l[[i, i]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }

    // forward: l y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let s: f64 = (0..i).map(|k| l[[i, k]] * y[k]).sum();
        y[i] = (b[i] - s) / l[[i, i]];
    }
    // backward: l^T x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let s: f64 = (i + 1..n).map(|k| l[[k, i]] * x[k]).sum();
        x[i] = (y[i] - s) / l[[i, i]];
    }
    Some(x)
}

/// Least squares with an intercept and an L2 penalty on the slopes.
///
/// Returns `(coefficients, intercept)`, or `None` if the normal equations
/// are singular.
pub fn ridge_fit(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>, alpha: f64) -> Option<(Array1<f64>, f64)> {
    let n = x.nrows();
    if n == 0 || y.len() != n {
        return None;
    }
    let x_mean = x.mean_axis(Axis(0))?;
    let y_mean = y.mean()?;
    let xc = &x - &x_mean;
    let yc = &y - y_mean;

    let mut gram = xc.t().dot(&xc);
    for i in 0..gram.nrows() {
        gram[[i, i]] += alpha;
    }
    let rhs = xc.t().dot(&yc);
    let coef = cholesky_solve(&gram, &rhs)?;
    let intercept = y_mean - x_mean.dot(&coef);
    Some((coef, intercept))
}

/// Uncentered coefficient of determination of `y` regressed on the columns
/// of `x` through the origin: `1 - SSR / sum(y^2)`.
///
/// Returns `None` if `y` is all zero or the normal equations are singular.
pub fn r_squared_uncentered(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Option<f64> {
    if x.nrows() == 0 || y.len() != x.nrows() {
        return None;
    }
    let ss_tot: f64 = y.iter().map(|a| a * a).sum();
    if ss_tot <= 0.0 {
        return None;
    }
    let coef = cholesky_solve(&x.t().dot(&x), &x.t().dot(&y))?;
    let fitted = x.dot(&coef);
    let ss_res: f64 = y.iter().zip(&fitted).map(|(a, b)| (a - b).powi(2)).sum();
    Some(1.0 - ss_res / ss_tot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_cholesky_solve() {
        let a = array![[4.0, 2.0], [2.0, 3.0]];
        let b = array![2.0, 1.0];
        let x = cholesky_solve(&a, &b).unwrap();
        assert_relative_eq!(x[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(x[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_not_positive_definite() {
        let a = array![[1.0, 2.0], [2.0, 1.0]];
        assert!(cholesky_solve(&a, &array![1.0, 1.0]).is_none());
    }

    #[test]
    fn test_exact_linear_fit() {
        let x = array![[1.0, 0.0], [2.0, 1.0], [3.0, 5.0], [4.0, 2.0]];
        let y: Array1<f64> = x.rows().into_iter().map(|r| 1.0 + 2.0 * r[0] - r[1]).collect();
        let (coef, intercept) = ridge_fit(x.view(), y.view(), 0.0).unwrap();
        assert_relative_eq!(coef[0], 2.0, epsilon = 1e-9);
        assert_relative_eq!(coef[1], -1.0, epsilon = 1e-9);
        assert_relative_eq!(intercept, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_uncentered_r_squared_has_no_constant() {
        // y = 2 x exactly through the origin
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![2.0, 4.0, 6.0];
        assert_relative_eq!(r_squared_uncentered(x.view(), y.view()).unwrap(), 1.0, epsilon = 1e-12);

        // a pure offset is not explained by a zero-mean regressor
        let x = array![[-1.0], [0.0], [1.0]];
        let y = array![3.0, 3.0, 3.0];
        assert_relative_eq!(r_squared_uncentered(x.view(), y.view()).unwrap(), 0.0, epsilon = 1e-12);

        assert!(r_squared_uncentered(x.view(), array![0.0, 0.0, 0.0].view()).is_none());
    }

    #[test]
    fn test_ridge_shrinks() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];
        let (ols, _) = ridge_fit(x.view(), y.view(), 0.0).unwrap();
        let (shrunk, _) = ridge_fit(x.view(), y.view(), 10.0).unwrap();
        assert!(shrunk[0].abs() < ols[0].abs());
    }
}
