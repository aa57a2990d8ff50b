//! The factor catalogue.
//!
//! The catalogue is fixed: fourteen technical factors in a stable column
//! order. Downstream stages refer to factors by name only.

use crate::factor::Factor;
use crate::liquidity::{DollarVolume, MoneyFlowIndex, VolumeZScore};
use crate::momentum::{MovingAverageCross, MovingAverageGap, TrailingReturn};
use crate::reversal::{Disparity, RelativeStrength};
use crate::volatility::{
    DownsideVolatility, NormalizedAtr, RealizedVolatility, ReturnKurtosis, ReturnSkewness,
};
use serde::{Deserialize, Serialize};

/// Factor category classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FactorCategory {
    /// Trailing returns and moving-average gaps
    Momentum,
    /// Realized risk and return distribution shape
    Volatility,
    /// Traded value and money flow
    Liquidity,
    /// Trend state indicators
    Trend,
    /// Overbought / oversold oscillators
    Reversal,
}

impl FactorCategory {
    /// Get a human-readable description of the category.
    #[must_use]
    pub const fn description(&self) -> &str {
        match self {
            Self::Momentum => "Trailing price returns and moving-average momentum",
            Self::Volatility => "Realized volatility, range and higher moments of returns",
            Self::Liquidity => "Dollar volume, abnormal volume and money flow",
            Self::Trend => "Moving-average trend state",
            Self::Reversal => "Oscillators measuring stretch from recent prices",
        }
    }
}

/// Metadata about a factor.
#[derive(Debug, Clone, Serialize)]
pub struct FactorInfo {
    /// Column name
    pub name: &'static str,
    /// Category classification
    pub category: FactorCategory,
    /// Bars of history needed before the first value
    pub lookback: usize,
}

/// Column names of the catalogue, in output order.
pub const FACTOR_NAMES: [&str; 14] = [
    "ret_1m",
    "ret_3m",
    "mom_gap",
    "vol_20",
    "downside_vol",
    "natr",
    "skew",
    "kurt",
    "dol_vol",
    "vol_zscore",
    "mfi",
    "rsi",
    "disparity_20",
    "ma_cross",
];

/// Instantiate every catalogue factor with its default parameters, in
/// [`FACTOR_NAMES`] order.
#[must_use]
pub fn catalogue() -> Vec<Box<dyn Factor>> {
    vec![
        Box::new(TrailingReturn::one_month()),
        Box::new(TrailingReturn::three_month()),
        Box::new(MovingAverageGap::default()),
        Box::new(RealizedVolatility::default()),
        Box::new(DownsideVolatility::default()),
        Box::new(NormalizedAtr::default()),
        Box::new(ReturnSkewness::default()),
        Box::new(ReturnKurtosis::default()),
        Box::new(DollarVolume::default()),
        Box::new(VolumeZScore::default()),
        Box::new(MoneyFlowIndex::default()),
        Box::new(RelativeStrength::default()),
        Box::new(Disparity::default()),
        Box::new(MovingAverageCross::default()),
    ]
}

/// Metadata for every catalogue factor.
#[must_use]
pub fn available_factors() -> Vec<FactorInfo> {
    catalogue()
        .iter()
        .map(|f| FactorInfo {
            name: f.name(),
            category: f.category(),
            lookback: f.lookback(),
        })
        .collect()
}

/// Factors of one category.
#[must_use]
pub fn factors_by_category(category: FactorCategory) -> Vec<FactorInfo> {
    available_factors()
        .into_iter()
        .filter(|f| f.category == category)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalogue_order_matches_names() {
        let names: Vec<&str> = catalogue().iter().map(|f| f.name()).collect();
        assert_eq!(names, FACTOR_NAMES.to_vec());
    }

    #[test]
    fn test_names_unique() {
        let unique: HashSet<&str> = FACTOR_NAMES.iter().copied().collect();
        assert_eq!(unique.len(), FACTOR_NAMES.len());
    }

    #[test]
    fn test_categories() {
        assert_eq!(factors_by_category(FactorCategory::Volatility).len(), 5);
        assert_eq!(factors_by_category(FactorCategory::Liquidity).len(), 3);
        assert!(available_factors().iter().all(|f| f.lookback > 0));
    }
}
