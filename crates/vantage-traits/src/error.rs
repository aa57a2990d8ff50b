//! Error types for the vantage pipeline.
//!
//! The taxonomy follows the isolation boundaries of the pipeline:
//! data insufficiency is recoverable through a documented fallback,
//! configuration errors are fatal at construction time, computation
//! failures are isolated per symbol or per window, and a missing model
//! bundle degrades the live path to "no positions".

use thiserror::Error;

/// The main error type for vantage operations.
#[derive(Debug, Error)]
pub enum VantageError {
    /// Too little data for the requested window, split or candidate pool.
    #[error("Insufficient data: {0}")]
    DataInsufficiency(String),

    /// Invalid configuration (unknown backend, unknown blend mode, impossible
    /// window sizes). Always fatal.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A computation failed for a single unit of work (one symbol, one window).
    #[error("Computation failed for {unit}: {reason}")]
    ComputationFailure {
        /// The isolated unit, e.g. a symbol or `window 3`.
        unit: String,
        /// What went wrong.
        reason: String,
    },

    /// No trained model bundle is available.
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// A mandatory input table does not exist in the store.
    #[error("Missing table: {0}")]
    MissingTable(String),

    /// A snapshot refresh is already running.
    #[error("Refresh already in progress")]
    RefreshInProgress,

    /// Error when a required column is missing from the data.
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// Error due to invalid or malformed data.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Error from Polars operations.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VantageError {
    /// Shorthand for a [`VantageError::ComputationFailure`].
    pub fn computation(unit: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ComputationFailure {
            unit: unit.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error is recoverable by a fallback policy rather than fatal.
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DataInsufficiency(_)
                | Self::ComputationFailure { .. }
                | Self::ModelUnavailable(_)
                | Self::RefreshInProgress
        )
    }
}

/// A specialized Result type for vantage operations.
pub type Result<T> = std::result::Result<T, VantageError>;
