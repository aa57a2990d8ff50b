//! Performance metrics of a daily return series.

use serde::{Deserialize, Serialize};

/// Trading days per year.
pub const TRADING_DAYS_PER_YEAR: usize = 252;

/// Minimum number of years CAGR is annualized over.
pub const MIN_CAGR_YEARS: f64 = 0.1;

const SHARPE_EPSILON: f64 = 1e-9;

/// Summary statistics of a daily return series.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Compounded return over the whole series.
    pub total_return: f64,
    /// Compound annual growth rate.
    pub cagr: f64,
    /// Annualized Sharpe ratio.
    pub sharpe: f64,
    /// Largest peak-to-trough decline, reported as a value ≤ 0.
    pub max_drawdown: f64,
    /// Share of days with a positive return.
    pub win_rate: f64,
    /// Number of days.
    pub n_days: usize,
}

impl PerformanceMetrics {
    /// Compute every metric. An empty series yields zeros.
    pub fn from_returns(returns: &[f64]) -> Self {
        if returns.is_empty() {
            return Self::default();
        }
        let curve = cumulative_curve(returns);
        let final_value = curve.last().copied().unwrap_or(1.0);
        Self {
            total_return: final_value - 1.0,
            cagr: calculate_cagr(final_value, returns.len()),
            sharpe: calculate_sharpe(returns),
            max_drawdown: calculate_max_drawdown(&curve),
            win_rate: returns.iter().filter(|r| **r > 0.0).count() as f64 / returns.len() as f64,
            n_days: returns.len(),
        }
    }
}

/// Compounded growth of one unit: `Π(1 + r)`.
pub fn cumulative_curve(returns: &[f64]) -> Vec<f64> {
    returns
        .iter()
        .scan(1.0, |value, r| {
            *value *= 1.0 + r;
            Some(*value)
        })
        .collect()
}

/// `final^(1 / max(years, 0.1)) − 1` with `years = n / 252`.
pub fn calculate_cagr(final_value: f64, n_days: usize) -> f64 {
    let years = (n_days as f64 / TRADING_DAYS_PER_YEAR as f64).max(MIN_CAGR_YEARS);
    if final_value <= 0.0 {
        return -1.0;
    }
    final_value.powf(1.0 / years) - 1.0
}

/// `mean / (std + 1e-9) · √252` with the sample standard deviation.
pub fn calculate_sharpe(returns: &[f64]) -> f64 {
    let n = returns.len();
    if n < 2 {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / n as f64;
    let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    mean / (var.sqrt() + SHARPE_EPSILON) * (TRADING_DAYS_PER_YEAR as f64).sqrt()
}

/// `min((curve − running_max) / running_max)`.
pub fn calculate_max_drawdown(curve: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for &value in curve {
        peak = peak.max(value);
        if peak > 0.0 {
            max_dd = max_dd.min((value - peak) / peak);
        }
    }
    max_dd
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_curve_and_drawdown() {
        let curve = cumulative_curve(&[0.1, -0.5, 0.2]);
        assert_relative_eq!(curve[0], 1.1);
        assert_relative_eq!(curve[1], 0.55);
        assert_relative_eq!(curve[2], 0.66, epsilon = 1e-12);
        assert_relative_eq!(calculate_max_drawdown(&curve), -0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_cagr_floor_on_short_series() {
        // 10 days annualized over 0.1 years, not 10/252
        assert_relative_eq!(calculate_cagr(1.01, 10), 1.01_f64.powf(10.0) - 1.0, epsilon = 1e-12);
        assert_relative_eq!(calculate_cagr(1.21, 504), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_metrics() {
        let m = PerformanceMetrics::from_returns(&[0.01, -0.01, 0.02, 0.0]);
        assert_eq!(m.n_days, 4);
        assert_relative_eq!(m.win_rate, 0.5);
        assert!(m.sharpe > 0.0);
        assert!(m.max_drawdown <= 0.0);
        assert_eq!(PerformanceMetrics::from_returns(&[]), PerformanceMetrics::default());
    }

    #[test]
    fn test_constant_returns_sharpe_is_finite() {
        let s = calculate_sharpe(&[0.0, 0.0, 0.0]);
        assert_eq!(s, 0.0);
    }
}
