//! Evaluation for vantage.
//!
//! This crate provides the research and evaluation stages of the pipeline:
//! - Information Coefficient (IC) calculations and IC summaries
//! - Feature selection with an IC filter and a VIF collinearity filter
//! - Performance metrics (CAGR, Sharpe, max drawdown, win rate)
//! - A bar-by-bar backtest with monthly rebalancing and transaction costs
//! - Parallel parameter sweeps over the blend weights and position count
//!
//! # Example
//!
//! ```rust,ignore
//! use vantage_eval::{BacktestInputs, BacktestSimulator, ParameterSweeper};
//!
//! let inputs = BacktestInputs { prices: &prices, scores: &scores, macro_series: None, sectors: &sectors };
//! let result = BacktestSimulator::default().run(inputs)?;
//! println!("sharpe {:.2}", result.metrics.sharpe);
//!
//! let rows = ParameterSweeper::default().run(inputs)?;
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod backtest;
pub mod ic;
pub mod metrics;
mod nullable;
pub mod selection;
pub mod sweep;

pub use backtest::{BacktestConfig, BacktestInputs, BacktestResult, BacktestSimulator, BacktestSummary};
pub use ic::{IcSummary, calculate_ic, ic_series};
pub use metrics::{
    PerformanceMetrics, calculate_cagr, calculate_max_drawdown, calculate_sharpe, cumulative_curve,
};
pub use selection::{FeatureSelector, SelectedFeatureSet, SelectionConfig};
pub use sweep::{ParameterSweeper, SweepConfig, SweepMode, SweepRow};
