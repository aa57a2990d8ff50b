//! Parameter sweeps over the backtest.
//!
//! Every grid cell is an independent simulation over shared read-only
//! inputs, evaluated in parallel with rayon. Rows come back in grid order.

use crate::backtest::{BacktestInputs, BacktestSimulator};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use vantage_portfolio::BlendWeights;
use vantage_traits::Result;

/// Sweep grids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Model weights of the 2-D grid.
    pub ml_weights: Vec<f64>,
    /// Rule weights of the 2-D grid.
    pub rule_weights: Vec<f64>,
    /// Position count of the 2-D grid.
    pub top_n: usize,
    /// Model weights of the legacy grid.
    pub legacy_ml_weights: Vec<f64>,
    /// Position counts of the legacy grid.
    pub legacy_top_n: Vec<usize>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        let grid = vec![0.1, 0.3, 0.5, 0.7, 0.9];
        Self {
            ml_weights: grid.clone(),
            rule_weights: grid,
            top_n: 10,
            legacy_ml_weights: vec![0.3, 0.4, 0.5, 0.6, 0.7],
            legacy_top_n: vec![5, 10, 15, 20],
        }
    }
}

/// Which grid a sweep runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepMode {
    /// `ml_weight × rule_weight` at a fixed position count.
    Blend,
    /// `ml_weight × top_n` with the rule weight fixed at zero.
    Legacy,
}

/// One cell of the `sharpe_contour` document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepRow {
    /// Model weight.
    pub ml_weight: f64,
    /// Rule weight.
    pub rule_weight: f64,
    /// Position count.
    pub top_n: usize,
    /// Annualized Sharpe ratio.
    pub sharpe: f64,
    /// Compound annual growth rate.
    pub cagr: f64,
    /// Maximum drawdown (≤ 0).
    pub mdd: f64,
}

/// Runs the simulator over a parameter grid.
#[derive(Debug, Clone, Default)]
pub struct ParameterSweeper {
    simulator: BacktestSimulator,
    config: SweepConfig,
}

impl ParameterSweeper {
    /// Create a sweeper.
    #[must_use]
    pub const fn new(simulator: BacktestSimulator, config: SweepConfig) -> Self {
        Self { simulator, config }
    }

    /// The grid cells of `mode`, in row order.
    pub fn grid(&self, mode: SweepMode) -> Vec<(BlendWeights, usize)> {
        let c = &self.config;
        match mode {
            SweepMode::Blend => c
                .ml_weights
                .iter()
                .flat_map(|&ml| {
                    c.rule_weights
                        .iter()
                        .map(move |&rule| (BlendWeights { ml, rule }, c.top_n))
                })
                .collect(),
            SweepMode::Legacy => c
                .legacy_ml_weights
                .iter()
                .flat_map(|&ml| {
                    c.legacy_top_n
                        .iter()
                        .map(move |&n| (BlendWeights { ml, rule: 0.0 }, n))
                })
                .collect(),
        }
    }

    /// Sweep the 2-D grid when rule scores exist, the legacy grid otherwise.
    pub fn run(&self, inputs: BacktestInputs<'_>) -> Result<Vec<SweepRow>> {
        let mode = if inputs.scores.has_rule() {
            SweepMode::Blend
        } else {
            SweepMode::Legacy
        };
        self.run_mode(inputs, mode)
    }

    /// Sweep one grid.
    pub fn run_mode(&self, inputs: BacktestInputs<'_>, mode: SweepMode) -> Result<Vec<SweepRow>> {
        let grid = self.grid(mode);
        info!(?mode, cells = grid.len(), "parameter sweep");
        grid.into_par_iter()
            .map(|(weights, top_n)| {
                let result = self.simulator.run_with(inputs, weights, top_n)?;
                Ok(SweepRow {
                    ml_weight: weights.ml,
                    rule_weight: weights.rule,
                    top_n,
                    sharpe: result.metrics.sharpe,
                    cagr: result.metrics.cagr,
                    mdd: result.metrics.max_drawdown,
                })
            })
            .collect()
    }
}
