//! End-to-end scenarios across the factor, portfolio and evaluation crates.

use approx::assert_relative_eq;
use chrono::{Datelike, Duration, NaiveDate, Utc, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::sync::Arc;
use vantage::eval::{
    BacktestConfig, BacktestInputs, BacktestSimulator, ParameterSweeper, SweepConfig,
};
use vantage::factors::{FactorEngine, FactorMode};
use vantage::model::{SearchSpace, TrainerConfig, TuningConfig, WalkForwardConfig};
use vantage::portfolio::{
    BlendMode, BlendWeights, ConstructionConfig, MacroSeries, MarketState, PortfolioConstructor,
    Regime, RegimeClassifier, RegimeState, SectorMap, SignalGenerator, SignalVector,
};
use vantage::store::MemoryStore;
use vantage::traits::frame::{date_series, f64_series};
use vantage::traits::{
    Bar, Date, FactorPanel, FactorRow, PricePanel, ScoreSource, SymbolSeries, TableStore,
};
use vantage::{Pipeline, Result, VantageConfig, VantageError};

fn business_days(start: Date, n: usize) -> Vec<Date> {
    let mut out = Vec::with_capacity(n);
    let mut d = start;
    while out.len() < n {
        if !matches!(d.weekday(), Weekday::Sat | Weekday::Sun) {
            out.push(d);
        }
        d += Duration::days(1);
    }
    out
}

/// Seeded random walks over `n_days` business days from 2018. Symbol `S09`
/// misses `missing` of its closes, spread over the whole history.
fn random_prices(n_symbols: usize, n_days: usize, missing: f64, seed: u64) -> PricePanel {
    let dates = business_days(NaiveDate::from_ymd_opt(2018, 1, 1).unwrap(), n_days);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut bars = Vec::new();
    for k in 0..n_symbols {
        let symbol = format!("S{k:02}");
        let drift = 0.0002 * (k as f64 - n_symbols as f64 / 2.0) / n_symbols as f64;
        let mut close = 50.0 + 10.0 * k as f64;
        for (t, &date) in dates.iter().enumerate() {
            close *= 1.0 + drift + rng.gen_range(-0.02..0.02);
            let skip = k == 9 && (t % 10) < (missing * 10.0).round() as usize;
            if skip {
                continue;
            }
            let range = close * rng.gen_range(0.0..0.02);
            bars.push(Bar {
                date,
                symbol: symbol.clone(),
                open: Some(close),
                high: Some(close + range),
                low: Some(close - range),
                close: Some(close),
                volume: Some(1e6 * rng.gen_range(0.5..1.5)),
            });
        }
    }
    PricePanel::from_bars(bars).unwrap()
}

fn distinct_sectors(n: usize) -> SectorMap {
    SectorMap::new((0..n).map(|k| (format!("S{k:02}"), format!("Sector{k}"))))
}

#[test]
fn factor_engine_excludes_symbol_with_forty_percent_missing_closes() {
    let prices = random_prices(10, 5 * 252, 0.4, 11);
    assert_relative_eq!(prices.series("S09").unwrap().missing_close_ratio(), 0.4, epsilon = 1e-9);

    let (panel, report) = FactorEngine::default()
        .compute(&prices, FactorMode::Training)
        .unwrap();

    assert_eq!(report.n_input, 10);
    assert_eq!(report.excluded_missing, vec!["S09".to_string()]);
    assert_eq!(report.n_computed, 9);
    assert!(panel.rows().iter().all(|r| r.symbol != "S09"));
    assert!(panel.rows().iter().all(|r| r.target_next.is_some()));
}

#[test]
fn full_switch_rebalance_charges_twice_the_cost_rate() {
    let start = NaiveDate::from_ymd_opt(2020, 1, 27).unwrap();
    let dates: Vec<Date> = (0..12).map(|t| start + Duration::days(t)).collect();
    let mut bars = Vec::new();
    let mut rows = Vec::new();
    for &date in &dates {
        for symbol in ["A", "B"] {
            bars.push(Bar {
                date,
                symbol: symbol.to_string(),
                open: Some(100.0),
                high: Some(100.0),
                low: Some(100.0),
                close: Some(100.0),
                volume: Some(1e6),
            });
            // A leads in January, B from February on
            let leads = (symbol == "A") == (date.month() == 1);
            rows.push(FactorRow {
                date,
                symbol: symbol.to_string(),
                values: vec![Some(if leads { 1.0 } else { 0.0 }), Some(0.0), Some(1.0)],
                target_next: None,
                target_smooth: None,
            });
        }
    }
    let prices = PricePanel::from_bars(bars).unwrap();
    let panel = FactorPanel::new(vec!["ret_3m".into(), "ret_1m".into(), "vol_20".into()], rows).unwrap();
    let scores = SignalGenerator::new(BlendMode::Rule, BlendWeights::default())
        .score(&panel)
        .unwrap();

    let simulator = BacktestSimulator::new(
        BacktestConfig {
            start_date: start,
            slippage: 0.001,
            commission: 0.0005,
            top_n: 1,
            benchmark: None,
            ..BacktestConfig::default()
        },
        PortfolioConstructor::new(ConstructionConfig {
            sector_cap: 1.0,
            ..ConstructionConfig::default()
        }),
        RegimeClassifier::default(),
    );
    let sectors = SectorMap::default();
    let result = simulator
        .run(BacktestInputs {
            prices: &prices,
            scores: &scores,
            macro_series: None,
            sectors: &sectors,
        })
        .unwrap();

    let switch = dates.iter().position(|d| d.month() == 2).unwrap();
    assert_relative_eq!(result.returns[0], -0.0015, epsilon = 1e-12);
    assert_relative_eq!(result.returns[switch], -2.0 * 0.0015, epsilon = 1e-12);
    for (t, r) in result.returns.iter().enumerate() {
        if t != 0 && t != switch {
            assert_eq!(*r, 0.0, "bar {t}");
        }
    }
    assert_eq!(result.n_rebalances, 2);
    assert_relative_eq!(result.total_turnover, 3.0, epsilon = 1e-12);
    assert_eq!(result.final_weights.get("B"), Some(&1.0));
}

#[test]
fn extreme_bear_scales_every_weight_by_seventy_percent() {
    let n = 250;
    let dates = business_days(NaiveDate::from_ymd_opt(2022, 1, 3).unwrap(), n);
    let date = dates[n - 1];
    // steadily falling benchmark ends below its 200-bar average
    let benchmark = SymbolSeries {
        close: (0..n).map(|t| Some(400.0 - t as f64)).collect(),
        ..SymbolSeries::default()
    };
    let macro_series = MacroSeries::new(vec![(date, Some(35.0), Some(-0.1))]);

    let classifier = RegimeClassifier::default();
    let inputs = classifier.inputs_at(date, n - 1, Some(&macro_series), Some(&benchmark));
    assert_eq!(inputs.benchmark_below_ma, Some(true));
    let regime = classifier.classify(&inputs);
    assert_eq!(regime.regime, Regime::Bear);
    assert!(regime.extreme);

    let signal = SignalVector {
        date,
        scores: (0..20).map(|k| (format!("S{k:02}"), 20.0 - k as f64)).collect(),
    };
    let sectors = distinct_sectors(20);
    let market = MarketState::default();
    let constructor = PortfolioConstructor::default();

    let plain = constructor
        .construct(&signal, RegimeState::new(Regime::Bear), &market, &sectors, Some(30))
        .unwrap();
    let extreme = constructor
        .construct(&signal, regime, &market, &sectors, Some(30))
        .unwrap();

    assert_eq!(plain.effective_count, 10);
    assert_eq!(plain.weights.keys().collect::<Vec<_>>(), extreme.weights.keys().collect::<Vec<_>>());
    assert_relative_eq!(plain.total_weight(), 1.0, epsilon = 1e-9);
    assert_relative_eq!(extreme.total_weight(), 0.7, epsilon = 1e-9);
    for (symbol, w) in &plain.weights {
        assert_relative_eq!(extreme.weights[symbol], 0.7 * w, epsilon = 1e-12);
    }
}

/// Short-term reversal stand-in for a trained model.
struct Reversal;

impl ScoreSource for Reversal {
    fn name(&self) -> &str {
        "reversal"
    }

    fn required_columns(&self) -> Vec<String> {
        vec!["ret_1m".to_string()]
    }

    fn score(&self, panel: &FactorPanel) -> Result<Vec<f64>> {
        Ok(panel
            .column("ret_1m")?
            .into_iter()
            .map(|v| -v.unwrap_or(0.0))
            .collect())
    }
}

#[test]
fn blend_sweep_yields_twenty_five_rows_with_sharpe() {
    let prices = random_prices(12, 300, 0.0, 5);
    let (panel, _) = FactorEngine::default()
        .compute(&prices, FactorMode::Inference)
        .unwrap();
    let scores = SignalGenerator::new(BlendMode::Blend, BlendWeights::default())
        .with_model(Arc::new(Reversal))
        .score(&panel)
        .unwrap();
    assert!(scores.has_model() && scores.has_rule());

    let simulator = BacktestSimulator::new(
        BacktestConfig {
            start_date: prices.dates()[0],
            benchmark: None,
            ..BacktestConfig::default()
        },
        PortfolioConstructor::default(),
        RegimeClassifier::default(),
    );
    let filled = prices.forward_filled();
    let sectors = distinct_sectors(12);
    let rows = ParameterSweeper::new(simulator, SweepConfig::default())
        .run(BacktestInputs {
            prices: &filled,
            scores: &scores,
            macro_series: None,
            sectors: &sectors,
        })
        .unwrap();

    assert_eq!(rows.len(), 25);
    assert!(rows.iter().all(|r| r.sharpe.is_finite() && r.top_n == 10));
    assert_eq!((rows[0].ml_weight, rows[0].rule_weight), (0.1, 0.1));
    assert_eq!((rows[4].ml_weight, rows[4].rule_weight), (0.1, 0.9));
    assert_eq!((rows[24].ml_weight, rows[24].rule_weight), (0.9, 0.9));
}

fn seed_store(store: &dyn TableStore, prices: &PricePanel, with_sectors: bool) {
    store.save("ohlcv", &prices.to_dataframe().unwrap()).unwrap();
    if with_sectors {
        let sectors =
            SectorMap::new((0..10).map(|k| (format!("S{k:02}"), format!("Sector{}", k % 5))));
        store.save("sectors", &sectors.to_dataframe().unwrap()).unwrap();
    }
    let dates = prices.dates().to_vec();
    let vix: Vec<Option<f64>> = dates.iter().map(|_| Some(15.0)).collect();
    let spread: Vec<Option<f64>> = dates.iter().map(|_| Some(0.5)).collect();
    let df = polars::prelude::DataFrame::new(vec![
        date_series("date", &dates).unwrap(),
        f64_series("vix", &vix),
        f64_series("t10y2y", &spread),
    ])
    .unwrap();
    store.save("macro", &df).unwrap();
}

fn pipeline(dir: &std::path::Path, mode: BlendMode) -> Pipeline {
    let store = MemoryStore::new();
    seed_store(&store, &random_prices(10, 5 * 252, 0.4, 3), true);
    pipeline_over(dir, mode, store)
}

fn pipeline_over(dir: &std::path::Path, mode: BlendMode, store: MemoryStore) -> Pipeline {
    let config = VantageConfig {
        data_dir: dir.join("data"),
        models_dir: dir.join("models"),
        checkpoint_dir: dir.join("checkpoints"),
        blend_mode: mode,
        construction: ConstructionConfig {
            target_count: 5,
            ..ConstructionConfig::default()
        },
        backtest: BacktestConfig {
            top_n: 5,
            ..BacktestConfig::default()
        },
        sweep: SweepConfig {
            top_n: 5,
            ..SweepConfig::default()
        },
        trainer: TrainerConfig {
            walk_forward: WalkForwardConfig {
                train_days: 252,
                validation_days: 63,
                step_days: 252,
                gap_days: 0,
                min_train_rows: 500,
                min_validation_rows: 100,
            },
            tuning: TuningConfig {
                n_trials: 1,
                seed: 1,
                space: SearchSpace {
                    n_estimators: (5, 10),
                    min_child_weight: (5, 10),
                    ..SearchSpace::default()
                },
            },
        },
        ..VantageConfig::default()
    };
    Pipeline::new(config, Arc::new(store)).unwrap()
}

#[test]
fn rule_pipeline_runs_without_a_model() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(dir.path(), BlendMode::Rule);

    let stage = pipeline.run_factors().unwrap();
    assert_eq!(stage.report.excluded_missing, vec!["S09".to_string()]);
    assert!((10..=15).contains(&stage.selection.selected_features.len()));
    assert_eq!(
        pipeline.load_selection().unwrap().selected_features,
        stage.selection.selected_features
    );
    assert!(pipeline.store().exists("factors"));

    let result = pipeline.run_backtest().unwrap();
    assert!(result.n_rebalances > 0);
    assert!(pipeline.documents().exists("backtest_summary"));
    assert!(pipeline.store().exists("equity_curve"));

    let rows = pipeline.run_sweep().unwrap();
    assert_eq!(rows.len(), 25);
    assert!(pipeline.documents().exists("sharpe_contour"));

    let positions = pipeline.get_portfolio(5, None).unwrap();
    assert_eq!(positions.regime.regime, Regime::Bull);
    assert!(!positions.is_empty() && positions.len() <= 5);
    assert!(positions.total_weight() <= 1.0 + 1e-9);
    assert!(pipeline.live_status().ready);

    let sentiment: BTreeMap<String, f64> = [("S00".to_string(), 1.0)].into_iter().collect();
    assert!(pipeline.get_portfolio(5, Some((0.3, sentiment.clone()))).is_ok());
    assert!(matches!(
        pipeline.get_portfolio(5, Some((1.5, sentiment))),
        Err(VantageError::Configuration(_))
    ));
}

#[test]
fn blend_pipeline_degrades_to_cash_without_a_model() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(dir.path(), BlendMode::Blend);

    let positions = pipeline.get_portfolio(5, None).unwrap();
    assert!(positions.is_empty());
    assert_eq!(positions.cash(), 1.0);
    assert!(matches!(
        pipeline.run_backtest(),
        Err(VantageError::ModelUnavailable(_))
    ));
}

#[test]
fn blend_pipeline_trains_publishes_and_serves() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(dir.path(), BlendMode::Blend);
    pipeline.run_factors().unwrap();

    let trained = pipeline.run_training(Utc::now()).unwrap();
    assert_eq!(pipeline.registry().latest_version(), Some(trained.version.clone()));
    assert_eq!(trained.report.bundle.meta.ensemble.len(), 2);
    assert!(!trained.report.windows.is_empty());
    let history = pipeline.registry_history().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].version, trained.version);

    let positions = pipeline.get_portfolio(5, None).unwrap();
    assert!(!positions.is_empty() && positions.len() <= 5);
    assert!(positions.total_weight() <= 1.0 + 1e-9);

    let summary = pipeline.run_backtest().unwrap().summary();
    assert!(summary.metrics.max_drawdown <= 0.0);
}

#[test]
fn missing_sectors_table_leaves_positions_uncapped() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();
    seed_store(&store, &random_prices(10, 5 * 252, 0.4, 3), false);
    let pipeline = pipeline_over(dir.path(), BlendMode::Rule, store);

    assert!(pipeline.load_market().unwrap().sectors.is_empty());
    let positions = pipeline.get_portfolio(5, None).unwrap();
    assert_eq!(positions.regime.regime, Regime::Bull);
    assert_eq!(positions.len(), 5);
    assert_relative_eq!(positions.total_weight(), 1.0, epsilon = 1e-9);

    let result = pipeline.run_backtest().unwrap();
    assert!(result.n_rebalances > 0);
    assert!(result.final_weights.len() > 1);
}

#[test]
fn live_portfolio_follows_newly_stored_prices() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();
    seed_store(&store, &random_prices(10, 5 * 252 - 5, 0.4, 3), true);
    let pipeline = pipeline_over(dir.path(), BlendMode::Rule, store);

    let before = pipeline.get_portfolio(5, None).unwrap();
    let longer = random_prices(10, 5 * 252, 0.4, 3);
    let last = *longer.dates().last().unwrap();
    assert!(last > before.date);
    pipeline.store().save("ohlcv", &longer.to_dataframe().unwrap()).unwrap();

    assert_eq!(pipeline.latest_price_date().unwrap(), Some(last));
    let after = pipeline.get_portfolio(5, None).unwrap();
    assert_eq!(after.date, last);
    assert_eq!(pipeline.refresh_live().unwrap().date, last);
}
