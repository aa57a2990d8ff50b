//! Signals and portfolio construction for vantage.
//!
//! This crate turns factor cross-sections into target weights:
//! - Regime: VIX level, term-spread sign and benchmark trend
//! - Market state: trailing returns and realized volatility per symbol
//! - Signals: model score, rule score and their percentile-rank blend
//! - Construction: regime-sized, stop-loss filtered, inverse-vol weighted,
//!   sector-capped position sets
//!
//! # Example
//!
//! ```ignore
//! use vantage_portfolio::{PortfolioConstructor, RegimeState};
//!
//! let positions = PortfolioConstructor::default()
//!     .construct(&signal, RegimeState::default(), &market, &sectors, None)?;
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod constructor;
pub mod market;
pub mod regime;
pub mod sectors;
pub mod signal;

pub use constructor::{ConstructionConfig, PortfolioConstructor, PositionSet, effective_count};
pub use market::{MarketState, MarketStateConfig};
pub use regime::{MacroSeries, Regime, RegimeClassifier, RegimeConfig, RegimeInputs, RegimeState};
pub use sectors::SectorMap;
pub use signal::{
    BlendMode, BlendWeights, CrossSectionScores, RuleScore, ScoredPanel, SignalGenerator,
    SignalVector, blend_ranks, blend_sentiment, rule_score,
};
