//! The factor engine: price panel in, factor panel out.

use crate::factor::Factor;
use crate::history::SymbolHistory;
use crate::registry::catalogue;
use crate::rolling::{lead, rolling_mean};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use vantage_traits::{FactorPanel, FactorRow, PricePanel, Result, Symbol, VantageError};

/// Configuration for the factor engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorEngineConfig {
    /// Symbols with this share of missing closes or more are excluded.
    pub max_missing_ratio: f64,
    /// Minimum observed closes for a symbol to be computed.
    pub min_observations: usize,
    /// Window of the smoothed diagnostic target.
    pub smooth_window: usize,
}

impl Default for FactorEngineConfig {
    fn default() -> Self {
        Self {
            max_missing_ratio: 0.3,
            min_observations: 60,
            smooth_window: 5,
        }
    }
}

/// Whether rows lacking a next-period label are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FactorMode {
    /// Drop rows with a null `target_next`.
    #[default]
    Training,
    /// Keep every row, so the latest bar can be scored.
    Inference,
}

/// What happened to each input symbol.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FactorReport {
    /// Symbols in the input panel.
    pub n_input: usize,
    /// Symbols excluded for too many missing closes.
    pub excluded_missing: Vec<Symbol>,
    /// Symbols skipped for too short a history.
    pub skipped: Vec<Symbol>,
    /// Symbols whose computation failed, with the reason.
    pub failed: Vec<(Symbol, String)>,
    /// Symbols present in the output.
    pub n_computed: usize,
}

/// Computes the factor catalogue for every symbol of a price panel.
#[derive(Debug)]
pub struct FactorEngine {
    config: FactorEngineConfig,
    factors: Vec<Box<dyn Factor>>,
}

impl Default for FactorEngine {
    fn default() -> Self {
        Self::new(FactorEngineConfig::default())
    }
}

enum SymbolOutcome {
    Rows(Vec<FactorRow>),
    Skipped(Symbol),
    Failed(Symbol, String),
}

impl FactorEngine {
    /// Create an engine over the full catalogue.
    #[must_use]
    pub fn new(config: FactorEngineConfig) -> Self {
        Self {
            config,
            factors: catalogue(),
        }
    }

    /// Factor column names, in output order.
    pub fn factor_names(&self) -> Vec<String> {
        self.factors.iter().map(|f| f.name().to_string()).collect()
    }

    /// Get the engine configuration.
    #[must_use]
    pub const fn config(&self) -> &FactorEngineConfig {
        &self.config
    }

    /// Compute the factor panel.
    ///
    /// Symbols are processed independently and in parallel; a symbol that is
    /// too short or fails is logged and left out without affecting the rest.
    ///
    /// # Errors
    ///
    /// Returns [`VantageError::DataInsufficiency`] if no symbol produces rows.
    pub fn compute(&self, prices: &PricePanel, mode: FactorMode) -> Result<(FactorPanel, FactorReport)> {
        let mut report = FactorReport {
            n_input: prices.n_symbols(),
            ..FactorReport::default()
        };

        let mut eligible = Vec::new();
        for (symbol, series) in prices.iter() {
            if series.missing_close_ratio() < self.config.max_missing_ratio {
                eligible.push(symbol.clone());
            } else {
                report.excluded_missing.push(symbol.clone());
            }
        }
        info!(
            total = report.n_input,
            eligible = eligible.len(),
            "computing factors"
        );

        let filled = prices
            .retain(|symbol, _| eligible.binary_search_by(|s| s.as_str().cmp(symbol)).is_ok())
            .forward_filled();
        let dates = filled.dates();

        let outcomes: Vec<SymbolOutcome> = filled
            .iter()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|(symbol, series)| {
                let history = SymbolHistory::from_series(symbol, dates, series);
                if history.len() < self.config.min_observations {
                    return SymbolOutcome::Skipped(symbol.clone());
                }
                match self.compute_symbol(&history, mode) {
                    Ok(rows) => SymbolOutcome::Rows(rows),
                    Err(e) => SymbolOutcome::Failed(symbol.clone(), e.to_string()),
                }
            })
            .collect();

        let mut rows = Vec::new();
        for outcome in outcomes {
            match outcome {
                SymbolOutcome::Rows(r) => {
                    report.n_computed += 1;
                    rows.extend(r);
                }
                SymbolOutcome::Skipped(symbol) => {
                    debug!(%symbol, "fewer than {} observations, skipped", self.config.min_observations);
                    report.skipped.push(symbol);
                }
                SymbolOutcome::Failed(symbol, reason) => {
                    warn!(%symbol, %reason, "factor computation failed");
                    report.failed.push((symbol, reason));
                }
            }
        }

        if rows.is_empty() {
            return Err(VantageError::DataInsufficiency(format!(
                "no symbol produced factor rows ({} input, {} skipped, {} failed)",
                report.n_input,
                report.skipped.len(),
                report.failed.len()
            )));
        }

        let panel = FactorPanel::new(self.factor_names(), rows)?;
        info!(
            rows = panel.len(),
            symbols = report.n_computed,
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "factor panel built"
        );
        Ok((panel, report))
    }

    /// Compute every factor and both targets for one symbol.
    ///
    /// # Errors
    ///
    /// Returns [`VantageError::ComputationFailure`] if the history holds a
    /// non-finite or non-positive close.
    pub fn compute_symbol(&self, history: &SymbolHistory, mode: FactorMode) -> Result<Vec<FactorRow>> {
        if let Some(bad) = history.close.iter().find(|c| !c.is_finite() || **c <= 0.0) {
            return Err(VantageError::computation(
                history.symbol.as_str(),
                format!("invalid close {bad}"),
            ));
        }

        let columns: Vec<Vec<Option<f64>>> = self
            .factors
            .iter()
            .map(|f| {
                f.compute(history)
                    .into_iter()
                    .map(|v| v.filter(|x| x.is_finite()))
                    .collect()
            })
            .collect();

        let target_next = lead(&history.returns(), 1);
        let target_smooth = rolling_mean(&target_next, self.config.smooth_window);

        Ok((0..history.len())
            .filter(|&t| mode == FactorMode::Inference || target_next[t].is_some())
            .map(|t| FactorRow {
                date: history.dates[t],
                symbol: history.symbol.clone(),
                values: columns.iter().map(|c| c[t]).collect(),
                target_next: target_next[t],
                target_smooth: target_smooth[t],
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FACTOR_NAMES;
    use vantage_traits::{Bar, Date};

    fn bars(symbol: &str, n: usize, start_missing: usize, drift: f64) -> Vec<Bar> {
        let start = Date::from_ymd_opt(2020, 1, 1).unwrap();
        (0..n)
            .map(|i| {
                let close = (i >= start_missing).then(|| 100.0 * (1.0 + drift).powi(i as i32) + (i % 3) as f64);
                Bar {
                    date: start + chrono::Duration::days(i as i64),
                    symbol: symbol.to_string(),
                    open: close,
                    high: close.map(|c| c * 1.01),
                    low: close.map(|c| c * 0.99),
                    close,
                    volume: close.map(|_| 1_000.0 + (i % 7) as f64 * 10.0),
                }
            })
            .collect()
    }

    #[test]
    fn test_panel_shape_and_targets() {
        let mut all = bars("AAA", 250, 0, 0.001);
        all.extend(bars("BBB", 250, 0, -0.001));
        let prices = PricePanel::from_bars(all).unwrap();

        let (panel, report) = FactorEngine::default()
            .compute(&prices, FactorMode::Training)
            .unwrap();
        assert_eq!(panel.columns().len(), FACTOR_NAMES.len());
        assert_eq!(report.n_computed, 2);
        // last bar has no next return
        assert_eq!(panel.len(), 2 * 249);
        assert!(panel.rows().iter().all(|r| r.target_next.is_some()));

        // windowed factors short of history are null, not zero
        let first = &panel.rows()[0];
        let mom_gap = panel.column_index("mom_gap").unwrap();
        assert!(first.values[mom_gap].is_none());
    }

    #[test]
    fn test_target_next_is_next_return() {
        let prices = PricePanel::from_bars(bars("AAA", 80, 0, 0.002)).unwrap();
        let (panel, _) = FactorEngine::default()
            .compute(&prices, FactorMode::Training)
            .unwrap();
        let s = prices.series("AAA").unwrap();
        let row = &panel.rows()[10];
        let expected = s.close[11].unwrap() / s.close[10].unwrap() - 1.0;
        assert!((row.target_next.unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_inference_keeps_last_bar() {
        let prices = PricePanel::from_bars(bars("AAA", 80, 0, 0.0)).unwrap();
        let (panel, _) = FactorEngine::default()
            .compute(&prices, FactorMode::Inference)
            .unwrap();
        assert_eq!(panel.len(), 80);
        assert!(panel.rows().last().unwrap().target_next.is_none());
    }

    #[test]
    fn test_missing_and_short_symbols_excluded() {
        let mut all = bars("AAA", 200, 0, 0.001);
        // 40% of closes missing
        all.extend(bars("GAP", 200, 80, 0.001));
        let prices = PricePanel::from_bars(all).unwrap();
        let (panel, report) = FactorEngine::default()
            .compute(&prices, FactorMode::Training)
            .unwrap();
        assert_eq!(report.excluded_missing, vec!["GAP".to_string()]);
        assert!(panel.rows().iter().all(|r| r.symbol == "AAA"));

        let short = PricePanel::from_bars(bars("TINY", 30, 0, 0.0)).unwrap();
        let result = FactorEngine::default().compute(&short, FactorMode::Training);
        assert!(matches!(result, Err(VantageError::DataInsufficiency(_))));
    }

    #[test]
    fn test_failure_is_isolated() {
        let mut bad = bars("BAD", 100, 0, 0.0);
        bad[50].close = Some(-1.0);
        let mut all = bars("AAA", 100, 0, 0.001);
        all.extend(bad);
        let prices = PricePanel::from_bars(all).unwrap();
        let (panel, report) = FactorEngine::default()
            .compute(&prices, FactorMode::Training)
            .unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "BAD");
        assert!(!panel.is_empty());
    }
}
