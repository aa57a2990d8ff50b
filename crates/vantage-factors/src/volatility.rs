//! Volatility and higher-moment factors.

use crate::factor::Factor;
use crate::history::SymbolHistory;
use crate::registry::FactorCategory;
use crate::rolling::{rolling_kurt, rolling_mean, rolling_skew, rolling_std};

/// Trading days per year.
pub const TRADING_DAYS: f64 = 252.0;

/// `vol_20`: annualized standard deviation of daily returns.
#[derive(Debug, Clone, Copy)]
pub struct RealizedVolatility {
    window: usize,
}

impl RealizedVolatility {
    /// Create the factor with a custom window.
    #[must_use]
    pub const fn new(window: usize) -> Self {
        Self { window }
    }
}

impl Default for RealizedVolatility {
    fn default() -> Self {
        Self::new(20)
    }
}

impl Factor for RealizedVolatility {
    fn name(&self) -> &'static str {
        "vol_20"
    }

    fn category(&self) -> FactorCategory {
        FactorCategory::Volatility
    }

    fn lookback(&self) -> usize {
        self.window + 1
    }

    fn compute(&self, history: &SymbolHistory) -> Vec<Option<f64>> {
        annualize(rolling_std(&history.returns(), self.window))
    }
}

/// `downside_vol`: annualized standard deviation of returns clipped at zero
/// from above.
#[derive(Debug, Clone, Copy)]
pub struct DownsideVolatility {
    window: usize,
}

impl DownsideVolatility {
    /// Create the factor with a custom window.
    #[must_use]
    pub const fn new(window: usize) -> Self {
        Self { window }
    }
}

impl Default for DownsideVolatility {
    fn default() -> Self {
        Self::new(20)
    }
}

impl Factor for DownsideVolatility {
    fn name(&self) -> &'static str {
        "downside_vol"
    }

    fn category(&self) -> FactorCategory {
        FactorCategory::Volatility
    }

    fn lookback(&self) -> usize {
        self.window + 1
    }

    fn compute(&self, history: &SymbolHistory) -> Vec<Option<f64>> {
        let clipped: Vec<Option<f64>> = history
            .returns()
            .into_iter()
            .map(|r| r.map(|r| r.min(0.0)))
            .collect();
        annualize(rolling_std(&clipped, self.window))
    }
}

fn annualize(values: Vec<Option<f64>>) -> Vec<Option<f64>> {
    let factor = TRADING_DAYS.sqrt();
    values.into_iter().map(|v| v.map(|v| v * factor)).collect()
}

/// True range per bar. The first bar has no previous close and uses the
/// high-low range alone.
pub fn true_range(history: &SymbolHistory) -> Vec<Option<f64>> {
    (0..history.len())
        .map(|t| {
            let (h, l) = (history.high[t], history.low[t]);
            let mut tr = h - l;
            if t > 0 {
                let prev = history.close[t - 1];
                tr = tr.max((h - prev).abs()).max((l - prev).abs());
            }
            Some(tr)
        })
        .collect()
}

/// `natr`: average true range normalized by the close.
#[derive(Debug, Clone, Copy)]
pub struct NormalizedAtr {
    window: usize,
}

impl NormalizedAtr {
    /// Create the factor with a custom window.
    #[must_use]
    pub const fn new(window: usize) -> Self {
        Self { window }
    }
}

impl Default for NormalizedAtr {
    fn default() -> Self {
        Self::new(14)
    }
}

impl Factor for NormalizedAtr {
    fn name(&self) -> &'static str {
        "natr"
    }

    fn category(&self) -> FactorCategory {
        FactorCategory::Volatility
    }

    fn lookback(&self) -> usize {
        self.window
    }

    fn compute(&self, history: &SymbolHistory) -> Vec<Option<f64>> {
        rolling_mean(&true_range(history), self.window)
            .into_iter()
            .zip(&history.close)
            .map(|(atr, c)| atr.and_then(|a| (*c != 0.0).then(|| a / c)))
            .collect()
    }
}

/// `skew`: rolling skewness of daily returns.
#[derive(Debug, Clone, Copy)]
pub struct ReturnSkewness {
    window: usize,
}

impl ReturnSkewness {
    /// Create the factor with a custom window.
    #[must_use]
    pub const fn new(window: usize) -> Self {
        Self { window }
    }
}

impl Default for ReturnSkewness {
    fn default() -> Self {
        Self::new(60)
    }
}

impl Factor for ReturnSkewness {
    fn name(&self) -> &'static str {
        "skew"
    }

    fn category(&self) -> FactorCategory {
        FactorCategory::Volatility
    }

    fn lookback(&self) -> usize {
        self.window + 1
    }

    fn compute(&self, history: &SymbolHistory) -> Vec<Option<f64>> {
        rolling_skew(&history.returns(), self.window)
    }
}

/// `kurt`: rolling excess kurtosis of daily returns.
#[derive(Debug, Clone, Copy)]
pub struct ReturnKurtosis {
    window: usize,
}

impl ReturnKurtosis {
    /// Create the factor with a custom window.
    #[must_use]
    pub const fn new(window: usize) -> Self {
        Self { window }
    }
}

impl Default for ReturnKurtosis {
    fn default() -> Self {
        Self::new(60)
    }
}

impl Factor for ReturnKurtosis {
    fn name(&self) -> &'static str {
        "kurt"
    }

    fn category(&self) -> FactorCategory {
        FactorCategory::Volatility
    }

    fn lookback(&self) -> usize {
        self.window + 1
    }

    fn compute(&self, history: &SymbolHistory) -> Vec<Option<f64>> {
        rolling_kurt(&history.returns(), self.window)
    }
}
