//! Technical factor computation for vantage.
//!
//! This crate provides the fixed factor catalogue and the engine that
//! computes it per symbol:
//! - Momentum: 1- and 3-month returns, moving-average gap
//! - Volatility: realized and downside volatility, normalized ATR, skew, kurtosis
//! - Liquidity: dollar volume, volume z-score, money-flow index
//! - Trend and reversal: RSI, disparity, moving-average cross
//!
//! # Example
//!
//! ```ignore
//! use vantage_factors::{FactorEngine, FactorMode};
//!
//! let (panel, report) = FactorEngine::default().compute(&prices, FactorMode::Training)?;
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod engine;
pub mod factor;
pub mod history;
pub mod liquidity;
pub mod momentum;
pub mod registry;
pub mod reversal;
pub mod rolling;
pub mod volatility;

pub use engine::{FactorEngine, FactorEngineConfig, FactorMode, FactorReport};
pub use factor::Factor;
pub use history::SymbolHistory;
pub use registry::{FACTOR_NAMES, FactorCategory, FactorInfo, available_factors, catalogue};
