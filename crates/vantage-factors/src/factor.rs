//! The factor trait.

use crate::history::SymbolHistory;
use crate::registry::FactorCategory;

/// A per-symbol time-series factor.
///
/// `compute` returns one value per observation of the history; values whose
/// window is not yet full are `None`, never zero.
pub trait Factor: Send + Sync + std::fmt::Debug {
    /// Column name of the factor.
    fn name(&self) -> &'static str;

    /// Category of the factor.
    fn category(&self) -> FactorCategory;

    /// Observations needed before the first value is defined.
    fn lookback(&self) -> usize;

    /// Compute the factor over a symbol's whole history.
    fn compute(&self, history: &SymbolHistory) -> Vec<Option<f64>>;
}
