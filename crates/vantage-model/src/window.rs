//! Walk-forward window generation on the unique date axis.

use serde::{Deserialize, Serialize};
use vantage_traits::{Date, Result, VantageError};

/// Walk-forward sizing, in trading days.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardConfig {
    /// Training window length (default: 3 years).
    pub train_days: usize,
    /// Validation window length (default: 6 months).
    pub validation_days: usize,
    /// Offset between consecutive windows (default: 3 months).
    pub step_days: usize,
    /// Dates skipped between training and validation.
    pub gap_days: usize,
    /// Minimum clean training rows for a window to be trained.
    pub min_train_rows: usize,
    /// Minimum clean validation rows for a window to be trained.
    pub min_validation_rows: usize,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            train_days: 756,
            validation_days: 126,
            step_days: 63,
            gap_days: 0,
            min_train_rows: 1_000,
            min_validation_rows: 100,
        }
    }
}

/// One rolling train / validation split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkForwardWindow {
    /// Zero-based window number.
    pub index: usize,
    /// First training date.
    pub train_start: Date,
    /// Last training date.
    pub train_end: Date,
    /// First validation date.
    pub validation_start: Date,
    /// Last validation date.
    pub validation_end: Date,
}

/// Generate fixed-size rolling windows over sorted unique `dates`.
///
/// # Errors
///
/// Returns [`VantageError::Configuration`] if a size is zero or the axis is
/// shorter than one training plus one validation window.
pub fn generate_windows(dates: &[Date], config: &WalkForwardConfig) -> Result<Vec<WalkForwardWindow>> {
    if config.train_days == 0 || config.validation_days == 0 || config.step_days == 0 {
        return Err(VantageError::Configuration(
            "walk-forward window sizes must be positive".to_string(),
        ));
    }
    let required = config.train_days + config.gap_days + config.validation_days;
    if dates.len() < required {
        return Err(VantageError::Configuration(format!(
            "{} trading dates available, walk-forward needs at least {}",
            dates.len(),
            required
        )));
    }

    let mut windows = Vec::new();
    let mut start = 0;
    while start + required <= dates.len() {
        let train_end = start + config.train_days - 1;
        let validation_start = train_end + 1 + config.gap_days;
        let validation_end = validation_start + config.validation_days - 1;
        windows.push(WalkForwardWindow {
            index: windows.len(),
            train_start: dates[start],
            train_end: dates[train_end],
            validation_start: dates[validation_start],
            validation_end: dates[validation_end],
        });
        start += config.step_days;
    }
    Ok(windows)
}
