//! Market regime classification from volatility, term spread and trend.

use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fmt;
use vantage_traits::frame::{date_column, f64_column};
use vantage_traits::{Date, Result, SymbolSeries};

/// Broad market regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    /// Risk-on; full candidate count.
    #[default]
    Bull,
    /// Mixed signals; reduced candidate count.
    Neutral,
    /// Risk-off; sharply reduced candidate count.
    Bear,
}

impl Regime {
    /// Lowercase label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Bull => "bull",
            Self::Neutral => "neutral",
            Self::Bear => "bear",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time regime. Recomputed on every query or bar, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegimeState {
    /// Regime label.
    pub regime: Regime,
    /// Volatility index above the extreme threshold. Only set with [`Regime::Bear`].
    pub extreme: bool,
}

impl RegimeState {
    /// A plain regime without the extreme flag.
    #[must_use]
    pub const fn new(regime: Regime) -> Self {
        Self {
            regime,
            extreme: false,
        }
    }

    /// The extreme bear state.
    #[must_use]
    pub const fn extreme_bear() -> Self {
        Self {
            regime: Regime::Bear,
            extreme: true,
        }
    }

    /// Returns whether the cash reserve applies.
    #[must_use]
    pub const fn is_extreme_bear(&self) -> bool {
        self.extreme && matches!(self.regime, Regime::Bear)
    }
}

/// Regime thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeConfig {
    /// VIX above this votes neutral.
    pub vix_neutral: f64,
    /// VIX above this is bear.
    pub vix_bear: f64,
    /// VIX above this is extreme bear.
    pub vix_extreme: f64,
    /// Benchmark moving-average window in bars.
    pub ma_window: usize,
    /// Minimum observed closes inside the window for the average to exist.
    pub ma_min_periods: usize,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            vix_neutral: 20.0,
            vix_bear: 25.0,
            vix_extreme: 32.0,
            ma_window: 200,
            ma_min_periods: 100,
        }
    }
}

/// Inputs observed at one date. `None` inputs do not vote.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RegimeInputs {
    /// Volatility index level.
    pub vix: Option<f64>,
    /// 10-year minus 2-year treasury spread.
    pub t10y2y: Option<f64>,
    /// Whether the benchmark closed below its moving average.
    pub benchmark_below_ma: Option<bool>,
}

/// Daily macro observations (the `macro` table: `date, vix, t10y2y`).
#[derive(Debug, Clone, Default)]
pub struct MacroSeries {
    dates: Vec<Date>,
    vix: Vec<Option<f64>>,
    t10y2y: Vec<Option<f64>>,
}

impl MacroSeries {
    /// Build from `(date, vix, t10y2y)` observations in any order.
    pub fn new(mut rows: Vec<(Date, Option<f64>, Option<f64>)>) -> Self {
        rows.sort_by_key(|r| r.0);
        rows.dedup_by_key(|r| r.0);
        Self {
            dates: rows.iter().map(|r| r.0).collect(),
            vix: rows.iter().map(|r| r.1).collect(),
            t10y2y: rows.iter().map(|r| r.2).collect(),
        }
    }

    /// Read the `macro` table.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let dates = date_column(df, "date")?;
        let vix = f64_column(df, "vix")?;
        let t10y2y = f64_column(df, "t10y2y")?;
        let rows = dates
            .into_iter()
            .zip(vix.into_iter().zip(t10y2y))
            .filter_map(|(d, (v, t))| Some((d?, v, t)))
            .collect();
        Ok(Self::new(rows))
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Returns whether there are no observations.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    fn last_on_or_before(&self, values: &[Option<f64>], date: Date) -> Option<f64> {
        let end = self.dates.partition_point(|d| *d <= date);
        values[..end].iter().rev().find_map(|v| *v)
    }

    /// Latest `(vix, t10y2y)` observed on or before `date`.
    pub fn as_of(&self, date: Date) -> (Option<f64>, Option<f64>) {
        (
            self.last_on_or_before(&self.vix, date),
            self.last_on_or_before(&self.t10y2y, date),
        )
    }
}

/// Classifies the market regime.
#[derive(Debug, Clone, Default)]
pub struct RegimeClassifier {
    config: RegimeConfig,
}

impl RegimeClassifier {
    /// Create a classifier.
    #[must_use]
    pub const fn new(config: RegimeConfig) -> Self {
        Self { config }
    }

    /// Get the thresholds.
    #[must_use]
    pub const fn config(&self) -> &RegimeConfig {
        &self.config
    }

    /// Classify one set of inputs.
    pub fn classify(&self, inputs: &RegimeInputs) -> RegimeState {
        let c = &self.config;
        let vix_above = |level: f64| inputs.vix.is_some_and(|v| v > level);
        let inverted = inputs.t10y2y.is_some_and(|t| t < 0.0);
        let below = inputs.benchmark_below_ma == Some(true);

        if vix_above(c.vix_extreme) {
            RegimeState::extreme_bear()
        } else if vix_above(c.vix_bear) || (inverted && below) {
            RegimeState::new(Regime::Bear)
        } else if vix_above(c.vix_neutral) || inverted || below {
            RegimeState::new(Regime::Neutral)
        } else {
            RegimeState::new(Regime::Bull)
        }
    }

    /// Whether `closes[i]` is below the trailing moving average ending at `i`.
    pub fn below_moving_average(&self, closes: &[Option<f64>], i: usize) -> Option<bool> {
        let close = (*closes.get(i)?)?;
        let start = (i + 1).saturating_sub(self.config.ma_window);
        let window: Vec<f64> = closes[start..=i].iter().flatten().copied().collect();
        if window.len() < self.config.ma_min_periods.max(1) {
            return None;
        }
        let ma = window.iter().sum::<f64>() / window.len() as f64;
        Some(close < ma)
    }

    /// Gather the inputs for bar `i` (dated `date`) of a panel.
    pub fn inputs_at(
        &self,
        date: Date,
        i: usize,
        macro_series: Option<&MacroSeries>,
        benchmark: Option<&SymbolSeries>,
    ) -> RegimeInputs {
        let (vix, t10y2y) = macro_series.map_or((None, None), |m| m.as_of(date));
        RegimeInputs {
            vix,
            t10y2y,
            benchmark_below_ma: benchmark.and_then(|b| self.below_moving_average(&b.close, i)),
        }
    }
}
