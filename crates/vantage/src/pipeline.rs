//! End-to-end stages and the live portfolio query.
//!
//! Every stage reads its inputs from the table store and writes its outputs
//! back, so stages can run in separate processes:
//!
//! ```text
//! ohlcv ─▶ factors ─▶ selected_features ─▶ model bundle ─▶ backtest_summary
//!                                                       ├▶ sharpe_contour
//!                                                       └▶ get_portfolio
//! ```

use crate::cache::{CacheStatus, SnapshotCache};
use crate::config::VantageConfig;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};
use vantage_eval::{
    BacktestInputs, BacktestResult, BacktestSimulator, FeatureSelector, ParameterSweeper,
    SelectedFeatureSet, SweepRow,
};
use vantage_factors::{FactorEngine, FactorMode, FactorReport};
use vantage_model::{BundleMeta, BundleRegistry, CheckpointStore, TrainingReport, WalkForwardTrainer};
use vantage_portfolio::{
    MacroSeries, MarketState, PortfolioConstructor, PositionSet, RegimeClassifier, RegimeState,
    ScoredPanel, SectorMap, SignalGenerator, SignalVector, blend_sentiment,
};
use vantage_store::{DocumentStore, open_store};
use vantage_traits::frame::date_column;
use vantage_traits::{Date, FactorPanel, PricePanel, Result, Symbol, TableStore, VantageError};

/// Price table.
pub const OHLCV_TABLE: &str = "ohlcv";
/// Macro table (`date, vix, t10y2y`).
pub const MACRO_TABLE: &str = "macro";
/// Sector table (`symbol, sector`).
pub const SECTORS_TABLE: &str = "sectors";
/// Selected factors plus both targets.
pub const FACTORS_TABLE: &str = "factors";
/// Backtest equity curve.
pub const EQUITY_CURVE_TABLE: &str = "equity_curve";
/// Feature selection document.
pub const SELECTED_FEATURES_DOC: &str = "selected_features";
/// Backtest summary document.
pub const BACKTEST_SUMMARY_DOC: &str = "backtest_summary";
/// Sweep result document.
pub const SHARPE_CONTOUR_DOC: &str = "sharpe_contour";

/// Market inputs loaded from the store.
#[derive(Debug, Clone)]
pub struct MarketData {
    /// Raw prices, gaps not yet filled.
    pub prices: PricePanel,
    /// VIX and term spread, if the macro table exists.
    pub macro_series: Option<MacroSeries>,
    /// Sector assignment. Empty if the sectors table does not exist.
    pub sectors: SectorMap,
}

/// Outcome of the factor stage.
#[derive(Debug, Clone)]
pub struct FactorStage {
    /// Per-symbol outcome of the factor computation.
    pub report: FactorReport,
    /// The selected features.
    pub selection: SelectedFeatureSet,
}

/// Outcome of the training stage.
#[derive(Debug, Clone)]
pub struct TrainingStage {
    /// Version the bundle was saved under.
    pub version: String,
    /// Windows, skips and the published bundle.
    pub report: TrainingReport,
}

/// Inputs of the live portfolio query, as of the latest bar.
#[derive(Debug, Clone)]
pub struct LiveSnapshot {
    /// Latest price date.
    pub date: Date,
    /// Latest signal. `None` when no model is available for a mode that needs one.
    pub signal: Option<SignalVector>,
    /// Regime on the latest bar.
    pub regime: RegimeState,
    /// Stop-loss and sizing inputs on the latest bar.
    pub market: MarketState,
    /// Sector assignment.
    pub sectors: SectorMap,
}

/// Runs the pipeline stages against one store and model registry.
#[derive(Debug)]
pub struct Pipeline {
    config: VantageConfig,
    store: Arc<dyn TableStore>,
    documents: DocumentStore,
    registry: BundleRegistry,
    live: SnapshotCache<LiveSnapshot>,
}

impl Pipeline {
    /// Open the configured store backend.
    pub fn from_config(config: VantageConfig) -> Result<Self> {
        let store = open_store(config.storage_backend, &config.data_dir)?;
        Self::new(config, store)
    }

    /// Use an existing store. Documents live under the configured data directory.
    pub fn new(config: VantageConfig, store: Arc<dyn TableStore>) -> Result<Self> {
        let documents = DocumentStore::open(&config.data_dir)?;
        let registry = BundleRegistry::new(&config.models_dir);
        Ok(Self {
            config,
            store,
            documents,
            registry,
            live: SnapshotCache::new(),
        })
    }

    /// Get the configuration.
    pub const fn config(&self) -> &VantageConfig {
        &self.config
    }

    /// Get the table store.
    pub fn store(&self) -> &dyn TableStore {
        self.store.as_ref()
    }

    /// Get the document store.
    pub const fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    /// Get the model registry.
    pub const fn registry(&self) -> &BundleRegistry {
        &self.registry
    }

    /// Load prices, macro series and sectors.
    ///
    /// # Errors
    ///
    /// Returns [`VantageError::MissingTable`] if the price table is missing.
    /// The macro and sector tables are optional.
    pub fn load_market(&self) -> Result<MarketData> {
        let prices = PricePanel::from_dataframe(&self.store.load(OHLCV_TABLE)?)?;
        let macro_series = if self.store.exists(MACRO_TABLE) {
            Some(MacroSeries::from_dataframe(&self.store.load(MACRO_TABLE)?)?)
        } else {
            warn!(table = MACRO_TABLE, "table missing, regime ignores VIX and term spread");
            None
        };
        let sectors = if self.store.exists(SECTORS_TABLE) {
            SectorMap::from_dataframe(&self.store.load(SECTORS_TABLE)?)?
        } else {
            warn!(table = SECTORS_TABLE, "table missing, sector cap disabled");
            SectorMap::default()
        };
        Ok(MarketData {
            prices,
            macro_series,
            sectors,
        })
    }

    fn engine(&self) -> FactorEngine {
        FactorEngine::new(self.config.factors.clone())
    }

    fn simulator(&self) -> BacktestSimulator {
        BacktestSimulator::new(
            self.config.backtest.clone(),
            PortfolioConstructor::new(self.config.construction.clone()),
            RegimeClassifier::new(self.config.regime.clone()),
        )
    }

    /// Compute factors, select features and persist both.
    pub fn run_factors(&self) -> Result<FactorStage> {
        let market = self.load_market()?;
        let (panel, report) = self.engine().compute(&market.prices, FactorMode::Training)?;
        let selection = FeatureSelector::new(self.config.selection.clone()).select(&panel)?;
        let projected = panel.select(&selection.selected_features)?;
        self.store.save(FACTORS_TABLE, &projected.to_dataframe()?)?;
        self.documents.save(SELECTED_FEATURES_DOC, &selection)?;
        info!(
            symbols = report.n_computed,
            rows = projected.len(),
            features = selection.selected_features.len(),
            "factor stage finished"
        );
        Ok(FactorStage { report, selection })
    }

    /// The persisted feature selection.
    pub fn load_selection(&self) -> Result<SelectedFeatureSet> {
        self.documents.load(SELECTED_FEATURES_DOC)
    }

    /// Train on the persisted factors and publish a new bundle.
    ///
    /// Completed windows are resumed from the checkpoint directory.
    pub fn run_training(&self, trained_at: DateTime<Utc>) -> Result<TrainingStage> {
        let panel = FactorPanel::from_dataframe(&self.store.load(FACTORS_TABLE)?)?;
        let selection = self.load_selection()?;
        let trainer = WalkForwardTrainer::new(self.config.trainer.clone())
            .with_checkpoints(CheckpointStore::new(&self.config.checkpoint_dir));
        let mut report = trainer.train(&panel, &selection.selected_features, trained_at)?;
        let version = self.registry.save(&mut report.bundle)?;
        self.live.clear();
        Ok(TrainingStage { version, report })
    }

    /// Every bundle ever published, oldest first.
    pub fn registry_history(&self) -> Result<Vec<BundleMeta>> {
        self.registry.history()
    }

    /// Signal generator in the configured mode, with the latest bundle
    /// attached when one exists.
    pub fn signal_generator(&self) -> Result<SignalGenerator> {
        let generator = SignalGenerator::new(self.config.blend_mode, self.config.backtest.weights);
        if !self.config.blend_mode.uses_model() {
            return Ok(generator);
        }
        match self.registry.load_latest() {
            Ok(bundle) => {
                info!(version = %bundle.meta.version, "model bundle loaded");
                Ok(generator.with_model(Arc::new(bundle)))
            }
            Err(VantageError::ModelUnavailable(reason)) => {
                warn!(%reason, "no model bundle");
                Ok(generator)
            }
            Err(e) => Err(e),
        }
    }

    /// Raw model and rule scores for every date of `prices`.
    pub fn score_history(&self, prices: &PricePanel) -> Result<ScoredPanel> {
        let (panel, _) = self.engine().compute(prices, FactorMode::Inference)?;
        self.signal_generator()?.score(&panel)
    }

    fn with_inputs<R>(&self, run: impl FnOnce(BacktestInputs<'_>) -> Result<R>) -> Result<R> {
        let market = self.load_market()?;
        let scores = self.score_history(&market.prices)?;
        let prices = market.prices.forward_filled();
        run(BacktestInputs {
            prices: &prices,
            scores: &scores,
            macro_series: market.macro_series.as_ref(),
            sectors: &market.sectors,
        })
    }

    /// Run the backtest and persist its summary and equity curve.
    pub fn run_backtest(&self) -> Result<BacktestResult> {
        let result = self.with_inputs(|inputs| self.simulator().run(inputs))?;
        self.documents.save(BACKTEST_SUMMARY_DOC, &result.summary())?;
        self.store.save(EQUITY_CURVE_TABLE, &result.equity_curve()?)?;
        Ok(result)
    }

    /// Run the parameter sweep and persist the grid.
    pub fn run_sweep(&self) -> Result<Vec<SweepRow>> {
        let sweeper = ParameterSweeper::new(self.simulator(), self.config.sweep.clone());
        let rows = self.with_inputs(|inputs| sweeper.run(inputs))?;
        self.documents.save(SHARPE_CONTOUR_DOC, &rows)?;
        Ok(rows)
    }

    /// Build the inputs of the live query from the store.
    pub fn build_live_snapshot(&self) -> Result<LiveSnapshot> {
        let market = self.load_market()?;
        let prices = market.prices.forward_filled();
        let i = prices
            .dates()
            .len()
            .checked_sub(1)
            .ok_or_else(|| VantageError::DataInsufficiency("empty price table".to_string()))?;
        let date = prices.dates()[i];

        let classifier = RegimeClassifier::new(self.config.regime.clone());
        let benchmark = self
            .config
            .backtest
            .benchmark
            .as_deref()
            .and_then(|b| prices.series(b));
        let regime =
            classifier.classify(&classifier.inputs_at(date, i, market.macro_series.as_ref(), benchmark));
        let state = MarketState::at(&prices, i, &self.config.backtest.market);

        let (panel, _) = self.engine().compute(&market.prices, FactorMode::Inference)?;
        let signal = match self.signal_generator()?.latest(&panel) {
            Ok(signal) => Some(signal),
            Err(VantageError::ModelUnavailable(reason)) => {
                warn!(%reason, "live signal unavailable");
                None
            }
            Err(e) => return Err(e),
        };
        info!(%date, regime = %regime.regime, extreme = regime.extreme, "live snapshot built");
        Ok(LiveSnapshot {
            date,
            signal,
            regime,
            market: state,
            sectors: market.sectors,
        })
    }

    /// Rebuild the live snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`VantageError::RefreshInProgress`] if a refresh is running.
    pub fn refresh_live(&self) -> Result<Arc<LiveSnapshot>> {
        self.live.refresh(|| self.build_live_snapshot())
    }

    /// Last date of the stored price table.
    pub fn latest_price_date(&self) -> Result<Option<Date>> {
        let df = self.store.load(OHLCV_TABLE)?;
        Ok(date_column(&df, "date")?.into_iter().flatten().max())
    }

    /// The live snapshot, rebuilt first if the cache is empty or the price
    /// table has moved past the snapshot date.
    fn current_snapshot(&self) -> Result<Arc<LiveSnapshot>> {
        let snapshot = self.live.read_or_refresh(|| self.build_live_snapshot())?;
        let stale = self
            .latest_price_date()?
            .is_some_and(|latest| latest > snapshot.date);
        if !stale {
            return Ok(snapshot);
        }
        info!(date = %snapshot.date, "newer prices stored, refreshing live snapshot");
        match self.refresh_live() {
            Ok(fresh) => Ok(fresh),
            Err(VantageError::RefreshInProgress) => Ok(snapshot),
            Err(e) => Err(e),
        }
    }

    /// State of the live snapshot cache.
    pub fn live_status(&self) -> CacheStatus {
        self.live.status()
    }

    /// Target positions as of the latest bar.
    ///
    /// `sentiment` optionally rank-blends external scores into the signal
    /// with a weight in `[0, 1]`. Without a model the result is an empty
    /// (all cash) position set. The cached snapshot is rebuilt when newer
    /// prices have been stored since it was built; while another refresh is
    /// running the previous snapshot is served.
    ///
    /// # Errors
    ///
    /// - [`VantageError::Configuration`] for a zero candidate count or a
    ///   sentiment weight outside `[0, 1]`.
    /// - [`VantageError::DataInsufficiency`] if too few symbols are scored.
    pub fn get_portfolio(
        &self,
        candidate_count: usize,
        sentiment: Option<(f64, BTreeMap<Symbol, f64>)>,
    ) -> Result<PositionSet> {
        if candidate_count == 0 {
            return Err(VantageError::Configuration(
                "candidate count must be positive".to_string(),
            ));
        }
        let snapshot = self.current_snapshot()?;
        let Some(signal) = &snapshot.signal else {
            return Ok(PositionSet::empty(snapshot.date, snapshot.regime));
        };
        let signal = match &sentiment {
            Some((weight, scores)) => blend_sentiment(signal, *weight, scores)?,
            None => signal.clone(),
        };
        PortfolioConstructor::new(self.config.construction.clone()).construct(
            &signal,
            snapshot.regime,
            &snapshot.market,
            &snapshot.sectors,
            Some(candidate_count),
        )
    }
}
