//! Liquidity and flow factors.

use crate::factor::Factor;
use crate::history::SymbolHistory;
use crate::registry::FactorCategory;
use crate::rolling::{rolling, rolling_mean, rolling_std};

/// Added to the volume deviation before dividing.
pub const VOLUME_STD_EPSILON: f64 = 1e-9;

/// `dol_vol`: average traded dollar value.
#[derive(Debug, Clone, Copy)]
pub struct DollarVolume {
    window: usize,
}

impl DollarVolume {
    /// Create the factor with a custom window.
    #[must_use]
    pub const fn new(window: usize) -> Self {
        Self { window }
    }
}

impl Default for DollarVolume {
    fn default() -> Self {
        Self::new(20)
    }
}

impl Factor for DollarVolume {
    fn name(&self) -> &'static str {
        "dol_vol"
    }

    fn category(&self) -> FactorCategory {
        FactorCategory::Liquidity
    }

    fn lookback(&self) -> usize {
        self.window
    }

    fn compute(&self, history: &SymbolHistory) -> Vec<Option<f64>> {
        let traded: Vec<Option<f64>> = history
            .close
            .iter()
            .zip(&history.volume)
            .map(|(c, v)| Some(c * v))
            .collect();
        rolling_mean(&traded, self.window)
    }
}

/// `vol_zscore`: today's volume relative to its trailing distribution.
#[derive(Debug, Clone, Copy)]
pub struct VolumeZScore {
    window: usize,
}

impl VolumeZScore {
    /// Create the factor with a custom window.
    #[must_use]
    pub const fn new(window: usize) -> Self {
        Self { window }
    }
}

impl Default for VolumeZScore {
    fn default() -> Self {
        Self::new(20)
    }
}

impl Factor for VolumeZScore {
    fn name(&self) -> &'static str {
        "vol_zscore"
    }

    fn category(&self) -> FactorCategory {
        FactorCategory::Liquidity
    }

    fn lookback(&self) -> usize {
        self.window
    }

    fn compute(&self, history: &SymbolHistory) -> Vec<Option<f64>> {
        let volume: Vec<Option<f64>> = history.volume.iter().copied().map(Some).collect();
        let mean = rolling_mean(&volume, self.window);
        let std = rolling_std(&volume, self.window);
        history
            .volume
            .iter()
            .zip(mean.iter().zip(&std))
            .map(|(v, (m, s))| Some((v - (*m)?) / ((*s)? + VOLUME_STD_EPSILON)))
            .collect()
    }
}

/// `mfi`: money-flow index, a volume-weighted RSI on the typical price.
///
/// Each bar's money flow (typical price times volume) is signed by the
/// direction of the typical price versus the previous bar; the first bar and
/// unchanged bars contribute zero.
#[derive(Debug, Clone, Copy)]
pub struct MoneyFlowIndex {
    window: usize,
}

impl MoneyFlowIndex {
    /// Create the factor with a custom window.
    #[must_use]
    pub const fn new(window: usize) -> Self {
        Self { window }
    }
}

impl Default for MoneyFlowIndex {
    fn default() -> Self {
        Self::new(14)
    }
}

impl Factor for MoneyFlowIndex {
    fn name(&self) -> &'static str {
        "mfi"
    }

    fn category(&self) -> FactorCategory {
        FactorCategory::Liquidity
    }

    fn lookback(&self) -> usize {
        self.window
    }

    fn compute(&self, history: &SymbolHistory) -> Vec<Option<f64>> {
        let typical: Vec<f64> = (0..history.len())
            .map(|t| (history.high[t] + history.low[t] + history.close[t]) / 3.0)
            .collect();
        let signed: Vec<Option<f64>> = (0..typical.len())
            .map(|t| {
                let direction = match t.checked_sub(1).map(|p| typical[p]) {
                    Some(prev) if typical[t] > prev => 1.0,
                    Some(prev) if typical[t] < prev => -1.0,
                    _ => 0.0,
                };
                Some(typical[t] * history.volume[t] * direction)
            })
            .collect();

        rolling(&signed, self.window, |w| {
            let positive: f64 = w.iter().filter(|x| **x > 0.0).sum();
            let negative: f64 = -w.iter().filter(|x| **x < 0.0).sum::<f64>();
            if negative > 0.0 {
                Some(100.0 - 100.0 / (1.0 + positive / negative))
            } else if positive > 0.0 {
                Some(100.0)
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn flat(volume: Vec<f64>) -> SymbolHistory {
        let n = volume.len();
        SymbolHistory {
            close: vec![10.0; n],
            high: vec![10.0; n],
            low: vec![10.0; n],
            volume,
            ..SymbolHistory::default()
        }
    }

    #[test]
    fn test_dollar_volume() {
        let out = DollarVolume::new(2).compute(&flat(vec![1.0, 3.0, 5.0]));
        assert!(out[0].is_none());
        assert_relative_eq!(out[1].unwrap(), 20.0);
        assert_relative_eq!(out[2].unwrap(), 40.0);
    }

    #[test]
    fn test_volume_zscore_constant_volume_is_zero() {
        let out = VolumeZScore::new(3).compute(&flat(vec![5.0; 4]));
        assert_relative_eq!(out[3].unwrap(), 0.0);
    }

    #[test]
    fn test_mfi_all_up_is_100() {
        let close: Vec<f64> = (0..20).map(|i| 10.0 + i as f64).collect();
        let h = SymbolHistory {
            high: close.clone(),
            low: close.clone(),
            volume: vec![100.0; 20],
            close,
            ..SymbolHistory::default()
        };
        let out = MoneyFlowIndex::default().compute(&h);
        assert!(out[12].is_none());
        assert_relative_eq!(out[13].unwrap(), 100.0);
    }

    #[test]
    fn test_mfi_balanced_flow() {
        // typical price 10, 11, 10: +11*v, -10*v
        let close = vec![10.0, 11.0, 10.0];
        let h = SymbolHistory {
            high: close.clone(),
            low: close.clone(),
            volume: vec![1.0; 3],
            close,
            ..SymbolHistory::default()
        };
        let out = MoneyFlowIndex::new(3).compute(&h);
        assert_relative_eq!(out[2].unwrap(), 100.0 - 100.0 / (1.0 + 1.1), epsilon = 1e-12);
    }
}
