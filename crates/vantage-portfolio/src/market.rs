//! Per-symbol risk inputs observed at one bar.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vantage_traits::stats::sample_std;
use vantage_traits::{PricePanel, Symbol};

/// Annualization factor for daily volatility.
pub const TRADING_DAYS: f64 = 252.0;

/// Lookbacks for the risk inputs, in bars.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketStateConfig {
    /// Trailing return window used by the stop-loss.
    pub return_window: usize,
    /// Realized volatility window used for sizing.
    pub vol_window: usize,
}

impl Default for MarketStateConfig {
    fn default() -> Self {
        Self {
            return_window: 22,
            vol_window: 60,
        }
    }
}

/// Trailing one-month return and annualized 60-day volatility per symbol.
///
/// Symbols without enough history are absent from the maps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketState {
    /// Trailing one-month return.
    pub ret_1m: BTreeMap<Symbol, f64>,
    /// Annualized realized volatility.
    pub vol_60: BTreeMap<Symbol, f64>,
}

impl MarketState {
    /// Observe every symbol of a forward-filled panel at bar `i`.
    pub fn at(prices: &PricePanel, i: usize, config: &MarketStateConfig) -> Self {
        let mut state = Self::default();
        for (symbol, series) in prices.iter() {
            let Some(close) = series.close.get(i).copied().flatten() else {
                continue;
            };
            if i >= config.return_window
                && let Some(base) = series.close[i - config.return_window]
                && base != 0.0
            {
                state.ret_1m.insert(symbol.clone(), close / base - 1.0);
            }
            if i >= config.vol_window {
                let returns: Option<Vec<f64>> = (i + 1 - config.vol_window..=i)
                    .map(|k| prices.close_return(symbol, k))
                    .collect();
                if let Some(std) = returns.as_deref().and_then(sample_std) {
                    state.vol_60.insert(symbol.clone(), std * TRADING_DAYS.sqrt());
                }
            }
        }
        state
    }

    /// Trailing return of `symbol`.
    pub fn ret_1m(&self, symbol: &str) -> Option<f64> {
        self.ret_1m.get(symbol).copied()
    }

    /// Volatility of `symbol`.
    pub fn vol(&self, symbol: &str) -> Option<f64> {
        self.vol_60.get(symbol).copied()
    }
}
