//! Information Coefficient (IC) calculations.
//!
//! IC is the Spearman rank correlation between a factor's cross-section and
//! the next-period return on the same date.

use serde::{Deserialize, Serialize};
use vantage_traits::stats::{mean, sample_std, spearman};
use vantage_traits::{Date, FactorPanel, Result};

/// Added to the IC standard deviation before dividing.
pub const IR_EPSILON: f64 = 1e-9;

/// Spearman IC of scores against forward returns over the finite pairs.
///
/// ```
/// use vantage_eval::calculate_ic;
///
/// let ic = calculate_ic(&[1.5, 0.3, -0.8, 2.1], &[0.02, 0.01, -0.01, 0.03], 2);
/// assert_eq!(ic, Some(1.0));
/// ```
pub fn calculate_ic(scores: &[f64], forward_returns: &[f64], min_pairs: usize) -> Option<f64> {
    spearman(scores, forward_returns, min_pairs)
}

/// Daily IC of one factor column against `target_next`.
///
/// Dates with fewer than `min_rows` rows are skipped, as are dates with fewer
/// than `min_pairs` rows where both the factor and the label are present.
pub fn ic_series(
    panel: &FactorPanel,
    column: &str,
    min_rows: usize,
    min_pairs: usize,
) -> Result<Vec<(Date, f64)>> {
    let values = panel.column(column)?;
    let rows = panel.rows();
    let mut series = Vec::new();
    for (date, range) in panel.date_groups() {
        if range.len() < min_rows {
            continue;
        }
        let (x, y): (Vec<f64>, Vec<f64>) = range
            .filter_map(|i| Some((values[i]?, rows[i].target_next?)))
            .unzip();
        if let Some(ic) = calculate_ic(&x, &y, min_pairs) {
            series.push((date, ic));
        }
    }
    Ok(series)
}

/// Summary statistics of a factor's IC series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IcSummary {
    /// Mean daily IC.
    #[serde(with = "crate::nullable")]
    pub mean_ic: f64,
    /// Sample standard deviation of the daily IC.
    #[serde(with = "crate::nullable")]
    pub std_ic: f64,
    /// `mean_ic / (std_ic + 1e-9)`.
    #[serde(with = "crate::nullable")]
    pub ic_ir: f64,
    /// Number of dates with an IC.
    pub n_dates: usize,
}

impl IcSummary {
    /// Summarize a series. An empty series yields NaN statistics.
    pub fn from_series(ics: &[f64]) -> Self {
        let mean_ic = mean(ics).unwrap_or(f64::NAN);
        // a single observation has no dispersion
        let std_ic = sample_std(ics).unwrap_or(if ics.len() == 1 { 0.0 } else { f64::NAN });
        Self {
            mean_ic,
            std_ic,
            ic_ir: mean_ic / (std_ic + IR_EPSILON),
            n_dates: ics.len(),
        }
    }

    /// Returns whether the mean IC is defined.
    pub const fn is_defined(&self) -> bool {
        self.mean_ic.is_finite()
    }

    /// `|mean_ic|`, with undefined ICs ranked as zero.
    pub fn abs_ic(&self) -> f64 {
        if self.is_defined() { self.mean_ic.abs() } else { 0.0 }
    }

    /// Signed `ic_ir` for ranking, with undefined values ranked last.
    pub fn ranked_ir(&self) -> f64 {
        if self.ic_ir.is_finite() { self.ic_ir } else { f64::NEG_INFINITY }
    }
}
