#![doc(issue_tracker_base_url = "https://github.com/factordynamics/vantage/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! # vantage
//!
//! Factor-based, machine-learned, long-only equity portfolio.
//!
//! vantage is an umbrella crate that re-exports all vantage sub-crates and
//! wires them into a [`Pipeline`] that runs every stage against a table
//! store and a model registry.
//!
//! ## Quick Start
//!
//! ```ignore
//! use vantage::{Pipeline, VantageConfig};
//!
//! # fn main() -> vantage::Result<()> {
//! let pipeline = Pipeline::from_config(VantageConfig::from_env()?)?;
//!
//! // Offline: factors, feature selection, walk-forward training
//! pipeline.run_factors()?;
//! pipeline.run_training(chrono::Utc::now())?;
//!
//! // Evaluation
//! let result = pipeline.run_backtest()?;
//! println!("sharpe {:.2}", result.metrics.sharpe);
//!
//! // Live query: ten names, no sentiment overlay
//! let positions = pipeline.get_portfolio(10, None)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Organization
//!
//! - [`traits`] - Core types, error taxonomy, statistics and capability traits
//! - [`factors`] - The technical factor catalogue and engine
//! - [`eval`] - IC, feature selection, backtesting and parameter sweeps
//! - [`model`] - Scaler, ridge, boosted trees, walk-forward training, bundles
//! - [`portfolio`] - Regime, signals and position construction
//! - [`store`] - Table and document storage backends
//!
//! ## Architecture
//!
//! 1. **Factors** are computed per symbol from the price panel
//! 2. **Selection** keeps the factors with a stable IC and low collinearity
//! 3. **Training** fits candidate models on rolling windows and ensembles the best pair
//! 4. **Signals** blend the model score with a rule score by percentile rank
//! 5. **Construction** sizes a regime-aware, sector-capped position set
//! 6. **Backtest** replays construction month by month under transaction costs

/// Version information for the vantage crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cache;
pub mod config;
pub mod pipeline;

pub use cache::{CacheStatus, SnapshotCache};
pub use config::VantageConfig;
pub use pipeline::{FactorStage, LiveSnapshot, MarketData, Pipeline, TrainingStage};

// ============================================================================
// Sub-crates
// ============================================================================

/// Core types and trait definitions.
pub mod traits {
    pub use vantage_traits::*;
}

/// Factor catalogue and engine.
///
/// ```ignore
/// use vantage::factors::{FactorEngine, FactorMode};
///
/// let (panel, report) = FactorEngine::default().compute(&prices, FactorMode::Training)?;
/// println!("{} symbols skipped", report.skipped.len());
/// ```
pub mod factors {
    pub use vantage_factors::*;
}

/// Evaluation: IC, feature selection, backtesting and sweeps.
///
/// ## Information Coefficient (IC)
///
/// Rank correlation between factor scores and next-period returns:
///
/// ```text
/// IC_t = spearman(factor_t, return_{t+1})
/// ```
///
/// A factor needs `|mean IC| ≥ 0.02` to be selected.
pub mod eval {
    pub use vantage_eval::*;
}

/// Models and walk-forward training.
pub mod model {
    pub use vantage_model::*;
}

/// Regime, signals and position construction.
pub mod portfolio {
    pub use vantage_portfolio::*;
}

/// Storage backends.
pub mod store {
    pub use vantage_store::*;
}

// Re-export error types
pub use vantage_traits::{Result, VantageError};

// Re-export common types
pub use vantage_portfolio::{BlendMode, PositionSet, Regime, RegimeState, SignalVector};
pub use vantage_traits::{Date, FactorPanel, PricePanel, Symbol, TableStore};

/// Prelude module for convenient imports.
///
/// ```ignore
/// use vantage::prelude::*;
/// ```
pub mod prelude {
    pub use crate::traits::{ScoreSource, TableStore};
    pub use crate::{Pipeline, VantageConfig};
    pub use crate::{Result, VantageError};
    pub use crate::{Date, FactorPanel, PositionSet, PricePanel, Symbol};
}
