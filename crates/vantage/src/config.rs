//! Runtime configuration.
//!
//! Defaults carry the pipeline constants; environment variables (optionally
//! from a `.env` file) override the deployment-specific parts.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use vantage_eval::{BacktestConfig, SelectionConfig, SweepConfig};
use vantage_factors::FactorEngineConfig;
use vantage_model::TrainerConfig;
use vantage_portfolio::{BlendMode, ConstructionConfig, RegimeConfig};
use vantage_store::StorageBackend;
use vantage_traits::{Result, VantageError};

/// Table store backend: `parquet` or `memory`.
pub const ENV_STORAGE_BACKEND: &str = "VANTAGE_STORAGE_BACKEND";
/// Directory of tables and documents.
pub const ENV_DATA_DIR: &str = "VANTAGE_DATA_DIR";
/// Root of the model bundle registry.
pub const ENV_MODELS_DIR: &str = "VANTAGE_MODELS_DIR";
/// Directory of walk-forward checkpoints.
pub const ENV_CHECKPOINT_DIR: &str = "VANTAGE_CHECKPOINT_DIR";
/// Signal blend mode: `ml`, `rule` or `blend`.
pub const ENV_BLEND_MODE: &str = "VANTAGE_BLEND_MODE";
/// First backtest date, `YYYY-MM-DD`.
pub const ENV_BACKTEST_START: &str = "VANTAGE_BACKTEST_START";
/// Benchmark symbol. Empty disables the benchmark.
pub const ENV_BENCHMARK: &str = "VANTAGE_BENCHMARK";

/// Configuration of every pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VantageConfig {
    /// Table store backend.
    pub storage_backend: StorageBackend,
    /// Directory of tables and documents.
    pub data_dir: PathBuf,
    /// Root of the model bundle registry.
    pub models_dir: PathBuf,
    /// Directory of walk-forward checkpoints.
    pub checkpoint_dir: PathBuf,
    /// Which score sources feed the signal.
    pub blend_mode: BlendMode,
    /// Factor computation.
    pub factors: FactorEngineConfig,
    /// Feature selection.
    pub selection: SelectionConfig,
    /// Walk-forward training.
    pub trainer: TrainerConfig,
    /// Position construction.
    pub construction: ConstructionConfig,
    /// Regime thresholds.
    pub regime: RegimeConfig,
    /// Backtest costs, dates and blend weights.
    pub backtest: BacktestConfig,
    /// Sweep grids.
    pub sweep: SweepConfig,
}

impl Default for VantageConfig {
    fn default() -> Self {
        Self {
            storage_backend: StorageBackend::default(),
            data_dir: PathBuf::from("data"),
            models_dir: PathBuf::from("models"),
            checkpoint_dir: PathBuf::from("models/checkpoints"),
            blend_mode: BlendMode::default(),
            factors: FactorEngineConfig::default(),
            selection: SelectionConfig::default(),
            trainer: TrainerConfig::default(),
            construction: ConstructionConfig::default(),
            regime: RegimeConfig::default(),
            backtest: BacktestConfig::default(),
            sweep: SweepConfig::default(),
        }
    }
}

impl VantageConfig {
    /// Defaults overridden by `VANTAGE_*` environment variables.
    ///
    /// This will also load from a `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns [`VantageError::Configuration`] for an unknown backend or
    /// blend mode, or a malformed start date.
    pub fn from_env() -> Result<Self> {
        // Try to load .env file (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by the variables `lookup` returns.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(v) = lookup(ENV_STORAGE_BACKEND) {
            config.storage_backend = v.parse()?;
        }
        if let Some(v) = lookup(ENV_DATA_DIR) {
            config.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_MODELS_DIR) {
            config.checkpoint_dir = PathBuf::from(&v).join("checkpoints");
            config.models_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_CHECKPOINT_DIR) {
            config.checkpoint_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_BLEND_MODE) {
            config.blend_mode = v.parse()?;
        }
        if let Some(v) = lookup(ENV_BACKTEST_START) {
            config.backtest.start_date = NaiveDate::parse_from_str(v.trim(), "%Y-%m-%d").map_err(|e| {
                VantageError::Configuration(format!("{ENV_BACKTEST_START}={v:?}: {e}"))
            })?;
        }
        if let Some(v) = lookup(ENV_BENCHMARK) {
            let v = v.trim();
            config.backtest.benchmark = (!v.is_empty()).then(|| v.to_string());
        }
        Ok(config)
    }
}
