//! Statistical utility functions shared by the factor, evaluation and
//! portfolio crates.
//!
//! Every function ignores non-finite inputs where that makes sense and
//! returns `None` (or `NaN` for element-wise outputs) rather than panicking
//! on degenerate input.

use std::cmp::Ordering;

/// Minimum threshold for standard deviation to avoid division by zero.
pub const MIN_STD_THRESHOLD: f64 = 1e-10;

/// Arithmetic mean of the finite values.
pub fn mean(values: &[f64]) -> Option<f64> {
    let (sum, n) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Sample standard deviation (N-1 denominator) of the finite values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.len() < 2 {
        return None;
    }
    let m = finite.iter().sum::<f64>() / finite.len() as f64;
    let var = finite.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (finite.len() - 1) as f64;
    Some(var.sqrt())
}

/// Linear-interpolation quantile of already sorted values, `q` in `[0, 1]`.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Linear-interpolation quantile of the finite values.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    finite.sort_by(f64::total_cmp);
    quantile_sorted(&finite, q)
}

/// 1-based ranks with ties sharing their average rank.
///
/// ```
/// use vantage_traits::stats::average_ranks;
///
/// assert_eq!(average_ranks(&[10.0, 30.0, 20.0, 30.0]), vec![1.0, 3.5, 2.0, 3.5]);
/// ```
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // positions i..=j share ranks i+1..=j+1
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &k in &order[i..=j] {
            ranks[k] = avg;
        }
        i = j + 1;
    }
    ranks
}

/// Cross-sectional percentile ranks in `(0, 1]`: average rank divided by n.
pub fn percentile_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len() as f64;
    average_ranks(values).into_iter().map(|r| r / n).collect()
}

/// Pearson correlation. `None` if fewer than two pairs or zero variance.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let n = x.len() as f64;
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let (dx, dy) = (a - mx, b - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let denom = (sxx * syy).sqrt();
    (denom > MIN_STD_THRESHOLD).then(|| sxy / denom)
}

/// Spearman rank correlation over the pairs where both sides are finite.
///
/// Returns `None` when fewer than `min_pairs` (at least two) valid pairs
/// remain or either side is constant.
pub fn spearman(x: &[f64], y: &[f64], min_pairs: usize) -> Option<f64> {
    if x.len() != y.len() {
        return None;
    }
    let (a, b): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(y)
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(a, b)| (*a, *b))
        .unzip();
    if a.len() < min_pairs.max(2) {
        return None;
    }
    pearson(&average_ranks(&a), &average_ranks(&b))
}

/// Standardize values to z-scores with the sample standard deviation.
/// Constant input yields zeros.
pub fn standardize(values: &[f64]) -> Vec<f64> {
    match (mean(values), sample_std(values)) {
        (Some(m), Some(s)) if s > MIN_STD_THRESHOLD => values.iter().map(|v| (v - m) / s).collect(),
        _ => vec![0.0; values.len()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_and_std() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0, f64::NAN];
        assert_relative_eq!(mean(&v).unwrap(), 3.0);
        assert_relative_eq!(sample_std(&v).unwrap(), 2.5_f64.sqrt());
        assert!(sample_std(&[1.0]).is_none());
        assert!(mean(&[]).is_none());
    }

    #[test]
    fn test_quantile_linear() {
        let v = [4.0, 1.0, 3.0, 2.0];
        assert_relative_eq!(quantile(&v, 0.5).unwrap(), 2.5);
        assert_relative_eq!(quantile(&v, 0.25).unwrap(), 1.75);
        assert_relative_eq!(quantile(&v, 1.0).unwrap(), 4.0);
    }

    #[test]
    fn test_average_ranks_ties() {
        assert_eq!(average_ranks(&[1.0, 1.0, 1.0]), vec![2.0, 2.0, 2.0]);
        assert_eq!(average_ranks(&[3.0, 1.0, 2.0]), vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn test_percentile_ranks() {
        let p = percentile_ranks(&[0.5, 0.1, 0.9, 0.3]);
        assert_eq!(p, vec![0.75, 0.25, 1.0, 0.5]);
    }

    #[test]
    fn test_spearman_monotonic() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [10.0, 20.0, 25.0, 100.0, 1000.0];
        assert_relative_eq!(spearman(&x, &y, 2).unwrap(), 1.0, epsilon = 1e-12);
        let rev: Vec<f64> = y.iter().rev().copied().collect();
        assert_relative_eq!(spearman(&x, &rev, 2).unwrap(), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_spearman_min_pairs_and_nan() {
        let x = [1.0, 2.0, f64::NAN, 4.0];
        let y = [1.0, 2.0, 3.0, 4.0];
        assert!(spearman(&x, &y, 4).is_none());
        assert!(spearman(&x, &y, 3).is_some());
        assert!(spearman(&[1.0, 1.0, 1.0], &y[..3], 2).is_none());
    }

    #[test]
    fn test_standardize() {
        let z = standardize(&[1.0, 2.0, 3.0]);
        assert_relative_eq!(z[0], -1.0);
        assert_relative_eq!(z[2], 1.0);
        assert_eq!(standardize(&[2.0, 2.0]), vec![0.0, 0.0]);
    }
}
