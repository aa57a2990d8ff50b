//! Momentum factors: trailing returns and moving-average trend.

use crate::factor::Factor;
use crate::history::SymbolHistory;
use crate::registry::FactorCategory;
use crate::rolling::{pct_change, rolling_mean, zip_with};
use serde::{Deserialize, Serialize};

/// Trailing close-to-close return over a fixed number of bars.
#[derive(Debug, Clone, Copy)]
pub struct TrailingReturn {
    name: &'static str,
    lookback_days: usize,
}

impl TrailingReturn {
    /// Create a trailing return factor with an explicit column name.
    #[must_use]
    pub const fn new(name: &'static str, lookback_days: usize) -> Self {
        Self {
            name,
            lookback_days,
        }
    }

    /// `ret_1m`: 21-bar return.
    #[must_use]
    pub const fn one_month() -> Self {
        Self::new("ret_1m", 21)
    }

    /// `ret_3m`: 63-bar return.
    #[must_use]
    pub const fn three_month() -> Self {
        Self::new("ret_3m", 63)
    }
}

impl Factor for TrailingReturn {
    fn name(&self) -> &'static str {
        self.name
    }

    fn category(&self) -> FactorCategory {
        FactorCategory::Momentum
    }

    fn lookback(&self) -> usize {
        self.lookback_days + 1
    }

    fn compute(&self, history: &SymbolHistory) -> Vec<Option<f64>> {
        pct_change(&history.close, self.lookback_days)
    }
}

/// Moving-average windows shared by the trend factors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MovingAverageConfig {
    /// Fast moving-average window (default: 50).
    pub short_window: usize,
    /// Slow moving-average window (default: 200).
    pub long_window: usize,
}

impl Default for MovingAverageConfig {
    fn default() -> Self {
        Self {
            short_window: 50,
            long_window: 200,
        }
    }
}

fn moving_averages(config: MovingAverageConfig, history: &SymbolHistory) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let close = history.close_series();
    (
        rolling_mean(&close, config.short_window),
        rolling_mean(&close, config.long_window),
    )
}

/// `mom_gap`: relative distance of the fast moving average above the slow one.
#[derive(Debug, Clone, Copy, Default)]
pub struct MovingAverageGap {
    config: MovingAverageConfig,
}

impl MovingAverageGap {
    /// Create the factor with custom windows.
    #[must_use]
    pub const fn new(config: MovingAverageConfig) -> Self {
        Self { config }
    }
}

impl Factor for MovingAverageGap {
    fn name(&self) -> &'static str {
        "mom_gap"
    }

    fn category(&self) -> FactorCategory {
        FactorCategory::Momentum
    }

    fn lookback(&self) -> usize {
        self.config.long_window
    }

    fn compute(&self, history: &SymbolHistory) -> Vec<Option<f64>> {
        let (fast, slow) = moving_averages(self.config, history);
        zip_with(&fast, &slow, |f, s| (s != 0.0).then(|| (f - s) / s))
    }
}

/// `ma_cross`: 1 when the fast moving average is above the slow one, else 0.
/// Undefined until the slow average exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct MovingAverageCross {
    config: MovingAverageConfig,
}

impl MovingAverageCross {
    /// Create the factor with custom windows.
    #[must_use]
    pub const fn new(config: MovingAverageConfig) -> Self {
        Self { config }
    }
}

impl Factor for MovingAverageCross {
    fn name(&self) -> &'static str {
        "ma_cross"
    }

    fn category(&self) -> FactorCategory {
        FactorCategory::Trend
    }

    fn lookback(&self) -> usize {
        self.config.long_window
    }

    fn compute(&self, history: &SymbolHistory) -> Vec<Option<f64>> {
        let (fast, slow) = moving_averages(self.config, history);
        zip_with(&fast, &slow, |f, s| Some(if f > s { 1.0 } else { 0.0 }))
    }
}
