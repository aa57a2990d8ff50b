//! Dense per-symbol price history.

use crate::rolling::pct_change;
use vantage_traits::{Date, Symbol, SymbolSeries};

/// The trading history of one symbol, starting at its first observed close.
///
/// Built from a forward-filled [`SymbolSeries`]: dates before the first close
/// are dropped, missing highs and lows fall back to the close, missing volume
/// is zero.
#[derive(Debug, Clone, Default)]
pub struct SymbolHistory {
    /// Security identifier.
    pub symbol: Symbol,
    /// Trading dates.
    pub dates: Vec<Date>,
    /// Closing prices.
    pub close: Vec<f64>,
    /// High prices.
    pub high: Vec<f64>,
    /// Low prices.
    pub low: Vec<f64>,
    /// Volumes.
    pub volume: Vec<f64>,
}

impl SymbolHistory {
    /// Extract the dense history of `symbol` from a panel-aligned series.
    pub fn from_series(symbol: &str, dates: &[Date], series: &SymbolSeries) -> Self {
        let mut history = Self {
            symbol: symbol.to_string(),
            ..Self::default()
        };
        for (i, date) in dates.iter().enumerate() {
            let Some(close) = series.close.get(i).copied().flatten() else {
                continue;
            };
            history.dates.push(*date);
            history.close.push(close);
            history.high.push(series.high[i].unwrap_or(close));
            history.low.push(series.low[i].unwrap_or(close));
            history.volume.push(series.volume[i].unwrap_or(0.0));
        }
        history
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.close.len()
    }

    /// Returns whether the history is empty.
    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }

    /// Daily simple returns; the first is missing.
    pub fn returns(&self) -> Vec<Option<f64>> {
        pct_change(&self.close, 1)
    }

    /// Closes as a nullable series, for the rolling kernels.
    pub fn close_series(&self) -> Vec<Option<f64>> {
        self.close.iter().copied().map(Some).collect()
    }
}
