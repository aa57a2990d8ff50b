//! Backtesting framework.
//!
//! Replays position construction bar by bar: positions are rebuilt on the
//! first bar and whenever the calendar month changes, held otherwise, and
//! transaction costs are charged on the rebalance bar.

use crate::metrics::{PerformanceMetrics, cumulative_curve};
use chrono::NaiveDate;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};
use vantage_portfolio::{
    BlendWeights, MacroSeries, MarketState, MarketStateConfig, PortfolioConstructor, PositionSet,
    RegimeClassifier, ScoredPanel, SectorMap,
};
use vantage_traits::frame::{date_series, f64_series, year_month};
use vantage_traits::{Date, PricePanel, Result, Symbol, VantageError};

/// Backtesting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// First simulated date.
    pub start_date: NaiveDate,
    /// Slippage per unit of turnover.
    pub slippage: f64,
    /// Commission per unit of turnover.
    pub commission: f64,
    /// Target number of positions.
    pub top_n: usize,
    /// Blend weights of the model and rule scores.
    pub weights: BlendWeights,
    /// Lookbacks of the stop-loss and sizing inputs.
    pub market: MarketStateConfig,
    /// Reference symbol for the benchmark curve and the regime trend input.
    pub benchmark: Option<Symbol>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2017, 1, 1).unwrap_or_default(),
            slippage: 0.001,
            commission: 0.0005,
            top_n: 10,
            weights: BlendWeights::default(),
            market: MarketStateConfig::default(),
            benchmark: Some("SPY".to_string()),
        }
    }
}

impl BacktestConfig {
    /// Cost per unit of turnover.
    pub fn cost_rate(&self) -> f64 {
        self.slippage + self.commission
    }
}

/// Everything a simulation reads. Shared read-only across sweep cells.
#[derive(Debug, Clone, Copy)]
pub struct BacktestInputs<'a> {
    /// Forward-filled prices.
    pub prices: &'a PricePanel,
    /// Raw scores per date.
    pub scores: &'a ScoredPanel,
    /// VIX and term spread, if available.
    pub macro_series: Option<&'a MacroSeries>,
    /// Sector assignment.
    pub sectors: &'a SectorMap,
}

/// Summary fields of a run (the `backtest_summary` document).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSummary {
    /// Performance metrics.
    #[serde(flatten)]
    pub metrics: PerformanceMetrics,
    /// First simulated date.
    pub start: Option<Date>,
    /// Last simulated date.
    pub end: Option<Date>,
    /// Number of rebalances that produced positions.
    pub n_rebalances: usize,
    /// Sum of turnover over all rebalances.
    pub total_turnover: f64,
    /// Sum of costs charged.
    pub total_cost: f64,
    /// Benchmark total return, if a benchmark was tracked.
    pub benchmark_total_return: Option<f64>,
}

/// Backtesting results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Simulated dates.
    pub dates: Vec<Date>,
    /// Daily portfolio returns net of costs.
    pub returns: Vec<f64>,
    /// Growth of one unit.
    pub cumulative: Vec<f64>,
    /// Benchmark growth of one unit on the same dates.
    pub benchmark: Option<Vec<f64>>,
    /// Summary metrics.
    pub metrics: PerformanceMetrics,
    /// Number of rebalances that produced positions.
    pub n_rebalances: usize,
    /// Sum of turnover over all rebalances.
    pub total_turnover: f64,
    /// Sum of costs charged.
    pub total_cost: f64,
    /// Weights held at the end of the run.
    pub final_weights: BTreeMap<Symbol, f64>,
}

impl BacktestResult {
    /// The summary document.
    pub fn summary(&self) -> BacktestSummary {
        BacktestSummary {
            metrics: self.metrics,
            start: self.dates.first().copied(),
            end: self.dates.last().copied(),
            n_rebalances: self.n_rebalances,
            total_turnover: self.total_turnover,
            total_cost: self.total_cost,
            benchmark_total_return: self
                .benchmark
                .as_ref()
                .and_then(|b| b.last())
                .map(|v| v - 1.0),
        }
    }

    /// The `equity_curve` table: `date, equity[, benchmark]`.
    pub fn equity_curve(&self) -> Result<DataFrame> {
        let wrap = |v: &[f64]| v.iter().copied().map(Some).collect::<Vec<_>>();
        let mut columns = vec![
            date_series("date", &self.dates)?,
            f64_series("equity", &wrap(&self.cumulative)),
        ];
        if let Some(b) = &self.benchmark {
            columns.push(f64_series("benchmark", &wrap(b)));
        }
        Ok(DataFrame::new(columns)?)
    }
}

/// Bar-by-bar strategy simulator.
#[derive(Debug, Clone, Default)]
pub struct BacktestSimulator {
    config: BacktestConfig,
    constructor: PortfolioConstructor,
    classifier: RegimeClassifier,
}

impl BacktestSimulator {
    /// Create a simulator.
    #[must_use]
    pub const fn new(
        config: BacktestConfig,
        constructor: PortfolioConstructor,
        classifier: RegimeClassifier,
    ) -> Self {
        Self {
            config,
            constructor,
            classifier,
        }
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Run with the configured weights and position count.
    pub fn run(&self, inputs: BacktestInputs<'_>) -> Result<BacktestResult> {
        self.run_with(inputs, self.config.weights, self.config.top_n)
    }

    /// Run with explicit blend weights and position count.
    ///
    /// Weights adopted at a rebalance bar's close earn from the next bar.
    ///
    /// # Errors
    ///
    /// Returns [`VantageError::DataInsufficiency`] if no price dates fall on
    /// or after the start date.
    pub fn run_with(
        &self,
        inputs: BacktestInputs<'_>,
        weights: BlendWeights,
        top_n: usize,
    ) -> Result<BacktestResult> {
        let prices = inputs.prices;
        let all_dates = prices.dates();
        let first = all_dates.partition_point(|d| *d < self.config.start_date);
        if first >= all_dates.len() {
            return Err(VantageError::DataInsufficiency(format!(
                "no price dates on or after {}",
                self.config.start_date
            )));
        }
        let benchmark = self
            .config
            .benchmark
            .as_deref()
            .and_then(|b| prices.series(b).map(|s| (b, s)));
        let cost_rate = self.config.cost_rate();

        let n = all_dates.len() - first;
        let mut returns = Vec::with_capacity(n);
        let mut bench_returns = Vec::with_capacity(n);
        let mut held: BTreeMap<Symbol, f64> = BTreeMap::new();
        let (mut n_rebalances, mut total_turnover, mut total_cost) = (0, 0.0, 0.0);

        for i in first..all_dates.len() {
            let date = all_dates[i];
            let gross: f64 = held
                .iter()
                .map(|(sym, w)| w * prices.close_return(sym, i).unwrap_or(0.0))
                .sum();

            let rebalance = i == first || year_month(date) != year_month(all_dates[i - 1]);
            let mut cost = 0.0;
            if rebalance {
                match self.rebalance(inputs, i, date, weights, top_n) {
                    Ok(Some(set)) => {
                        let turnover = set.turnover(&held);
                        cost = turnover * cost_rate;
                        total_turnover += turnover;
                        total_cost += cost;
                        n_rebalances += 1;
                        held = set.weights;
                    }
                    Ok(None) => {}
                    Err(e) if e.is_recoverable() => {
                        debug!(%date, error = %e, "rebalance skipped, holding positions");
                    }
                    Err(e) => return Err(e),
                }
            }
            returns.push(gross - cost);
            if let Some((sym, _)) = benchmark {
                bench_returns.push(prices.close_return(sym, i).unwrap_or(0.0));
            }
        }

        let metrics = PerformanceMetrics::from_returns(&returns);
        info!(
            top_n,
            ml_weight = weights.ml,
            rule_weight = weights.rule,
            sharpe = metrics.sharpe,
            cagr = metrics.cagr,
            mdd = metrics.max_drawdown,
            n_rebalances,
            "backtest finished"
        );
        Ok(BacktestResult {
            dates: all_dates[first..].to_vec(),
            cumulative: cumulative_curve(&returns),
            benchmark: benchmark.map(|_| cumulative_curve(&bench_returns)),
            returns,
            metrics,
            n_rebalances,
            total_turnover,
            total_cost,
            final_weights: held,
        })
    }

    fn rebalance(
        &self,
        inputs: BacktestInputs<'_>,
        i: usize,
        date: Date,
        weights: BlendWeights,
        top_n: usize,
    ) -> Result<Option<PositionSet>> {
        let Some(signal) = inputs.scores.signal(date, weights) else {
            debug!(%date, "no signal on rebalance date");
            return Ok(None);
        };
        let benchmark = self
            .config
            .benchmark
            .as_deref()
            .and_then(|b| inputs.prices.series(b));
        let regime = self
            .classifier
            .classify(&self.classifier.inputs_at(date, i, inputs.macro_series, benchmark));
        let market = MarketState::at(inputs.prices, i, &self.config.market);
        let set = self
            .constructor
            .construct(&signal, regime, &market, inputs.sectors, Some(top_n))?;
        debug!(%date, regime = %regime.regime, positions = set.len(), "rebalanced");
        Ok(Some(set))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::Datelike;
    use vantage_portfolio::{BlendMode, ConstructionConfig, SignalGenerator};
    use vantage_traits::{Bar, FactorPanel, FactorRow};

    /// Ten symbols on consecutive days across two month boundaries; each
    /// symbol's close grows by `(k + 1) bp` a day.
    fn prices(days: i64) -> PricePanel {
        let start = Date::from_ymd_opt(2020, 1, 20).unwrap();
        let mut bars = Vec::new();
        for k in 0..10 {
            let mut close = 100.0;
            for t in 0..days {
                bars.push(Bar {
                    date: start + chrono::Duration::days(t),
                    symbol: format!("S{k}"),
                    open: Some(close),
                    high: Some(close),
                    low: Some(close),
                    close: Some(close),
                    volume: Some(1e6),
                });
                close *= 1.0 + 0.0001 * (k + 1) as f64;
            }
        }
        PricePanel::from_bars(bars).unwrap()
    }

    /// Rule-score inputs ranking `S0..S4` ahead in January and `S5..S9` ahead after.
    fn scores(prices: &PricePanel) -> ScoredPanel {
        let mut rows = Vec::new();
        for &date in prices.dates() {
            for k in 0..10 {
                let top = if date.month0() == 0 { k < 5 } else { k >= 5 };
                rows.push(FactorRow {
                    date,
                    symbol: format!("S{k}"),
                    values: vec![Some(if top { 1.0 } else { 0.0 }), Some(0.0), Some(0.2)],
                    target_next: None,
                    target_smooth: None,
                });
            }
        }
        let panel = FactorPanel::new(
            vec!["ret_3m".into(), "ret_1m".into(), "vol_20".into()],
            rows,
        )
        .unwrap();
        SignalGenerator::new(BlendMode::Rule, BlendWeights::default())
            .score(&panel)
            .unwrap()
    }

    fn simulator(top_n: usize) -> BacktestSimulator {
        BacktestSimulator::new(
            BacktestConfig {
                start_date: Date::from_ymd_opt(2020, 1, 1).unwrap(),
                top_n,
                benchmark: Some("S0".into()),
                ..BacktestConfig::default()
            },
            PortfolioConstructor::new(ConstructionConfig {
                sector_cap: 1.0,
                ..ConstructionConfig::default()
            }),
            RegimeClassifier::default(),
        )
    }

    #[test]
    fn test_rebalance_on_month_change_with_costs() {
        let p = prices(40);
        let s = scores(&p);
        let sectors = SectorMap::default();
        let inputs = BacktestInputs {
            prices: &p,
            scores: &s,
            macro_series: None,
            sectors: &sectors,
        };
        let result = simulator(5).run(inputs).unwrap();
        // first bar and 1 Feb
        assert_eq!(result.n_rebalances, 2);
        // cash -> full, then a complete swap
        assert_relative_eq!(result.total_turnover, 3.0, epsilon = 1e-9);
        assert_relative_eq!(result.total_cost, 3.0 * 0.0015, epsilon = 1e-12);
        assert_relative_eq!(result.returns[0], -0.0015, epsilon = 1e-12);

        let feb = result.dates.iter().position(|d| d.month() == 2).unwrap();
        // the bar of the swap earns January's book and pays the swap cost
        let jan_book: f64 = (0..5).map(|k| 0.0001 * (k + 1) as f64).sum::<f64>() / 5.0;
        assert_relative_eq!(result.returns[feb], jan_book - 0.003, epsilon = 1e-9);
        let feb_book: f64 = (5..10).map(|k| 0.0001 * (k + 1) as f64).sum::<f64>() / 5.0;
        assert_relative_eq!(result.returns[feb + 1], feb_book, epsilon = 1e-9);

        let bench = result.benchmark.as_ref().unwrap();
        assert_eq!(bench.len(), result.returns.len());
        assert_eq!(result.equity_curve().unwrap().width(), 3);
    }

    #[test]
    fn test_insufficient_scores_hold_previous() {
        let p = prices(40);
        let s = scores(&p);
        let sectors = SectorMap::default();
        let inputs = BacktestInputs {
            prices: &p,
            scores: &s,
            macro_series: None,
            sectors: &sectors,
        };
        // 20 wanted, 10 scored: never invests
        let result = simulator(20).run(inputs).unwrap();
        assert_eq!(result.n_rebalances, 0);
        assert!(result.returns.iter().all(|r| *r == 0.0));
    }

    #[test]
    fn test_start_after_data_is_insufficiency() {
        let p = prices(5);
        let s = scores(&p);
        let sectors = SectorMap::default();
        let mut sim = simulator(5);
        sim.config.start_date = Date::from_ymd_opt(2030, 1, 1).unwrap();
        let result = sim.run(BacktestInputs {
            prices: &p,
            scores: &s,
            macro_series: None,
            sectors: &sectors,
        });
        assert!(matches!(result, Err(VantageError::DataInsufficiency(_))));
    }
}
