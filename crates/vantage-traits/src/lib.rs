#![doc(issue_tracker_base_url = "https://github.com/factordynamics/vantage/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core types and trait definitions for the vantage factor portfolio pipeline.
//!
//! This crate provides the price and factor panels every stage exchanges,
//! the error taxonomy, shared statistics, and the capability traits for
//! score sources and table storage.

/// The version of the vantage-traits crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod error;
pub mod frame;
pub mod fs;
pub mod panel;
pub mod signal;
pub mod stats;
pub mod store;
pub mod types;

// Re-exports
pub use error::{Result, VantageError};
pub use panel::{DesignMatrix, FactorPanel, FactorRow, TARGET_NEXT, TARGET_SMOOTH};
pub use signal::ScoreSource;
pub use store::TableStore;
pub use types::{Bar, Date, PricePanel, Symbol, SymbolSeries};
