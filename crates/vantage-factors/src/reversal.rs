//! Oscillator factors: overbought / oversold measures.

use crate::factor::Factor;
use crate::history::SymbolHistory;
use crate::registry::FactorCategory;
use crate::rolling::{ewm_mean, rolling_mean};

/// `rsi`: relative strength index with Wilder smoothing.
#[derive(Debug, Clone, Copy)]
pub struct RelativeStrength {
    window: usize,
}

impl RelativeStrength {
    /// Create the factor with a custom window.
    #[must_use]
    pub const fn new(window: usize) -> Self {
        Self { window }
    }
}

impl Default for RelativeStrength {
    fn default() -> Self {
        Self::new(14)
    }
}

impl Factor for RelativeStrength {
    fn name(&self) -> &'static str {
        "rsi"
    }

    fn category(&self) -> FactorCategory {
        FactorCategory::Reversal
    }

    fn lookback(&self) -> usize {
        self.window
    }

    fn compute(&self, history: &SymbolHistory) -> Vec<Option<f64>> {
        // The first bar has no change and counts as a flat bar.
        let diff: Vec<f64> = (0..history.len())
            .map(|t| t.checked_sub(1).map_or(0.0, |p| history.close[t] - history.close[p]))
            .collect();
        let up: Vec<f64> = diff.iter().map(|d| d.max(0.0)).collect();
        let down: Vec<f64> = diff.iter().map(|d| (-d).max(0.0)).collect();

        let alpha = 1.0 / self.window as f64;
        let avg_up = ewm_mean(&up, alpha, self.window);
        let avg_down = ewm_mean(&down, alpha, self.window);

        avg_up
            .into_iter()
            .zip(avg_down)
            .map(|(u, d)| {
                let (u, d) = (u?, d?);
                if d == 0.0 {
                    (u > 0.0).then_some(100.0)
                } else {
                    Some(100.0 - 100.0 / (1.0 + u / d))
                }
            })
            .collect()
    }
}

/// `disparity_20`: percentage distance of the close from its moving average.
#[derive(Debug, Clone, Copy)]
pub struct Disparity {
    window: usize,
}

impl Disparity {
    /// Create the factor with a custom window.
    #[must_use]
    pub const fn new(window: usize) -> Self {
        Self { window }
    }
}

impl Default for Disparity {
    fn default() -> Self {
        Self::new(20)
    }
}

impl Factor for Disparity {
    fn name(&self) -> &'static str {
        "disparity_20"
    }

    fn category(&self) -> FactorCategory {
        FactorCategory::Reversal
    }

    fn lookback(&self) -> usize {
        self.window
    }

    fn compute(&self, history: &SymbolHistory) -> Vec<Option<f64>> {
        rolling_mean(&history.close_series(), self.window)
            .into_iter()
            .zip(&history.close)
            .map(|(ma, c)| ma.and_then(|m| (m != 0.0).then(|| (c / m - 1.0) * 100.0)))
            .collect()
    }
}
