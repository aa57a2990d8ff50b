//! Walk-forward trainer.
//!
//! Each window fits a scaler on its training rows, tunes every candidate
//! family, and scores the two best families' averaged validation
//! predictions. The family pair chosen most often across windows is refit on
//! all clean rows with production hyper-parameters and published as a new
//! bundle.

use crate::bundle::{BundleMeta, ModelBundle};
use crate::checkpoint::{CheckpointStore, WindowCheckpoint};
use crate::model::ModelFamily;
use crate::scaler::RobustScaler;
use crate::tuning::{TuningConfig, tune, validation_ic};
use crate::window::{WalkForwardConfig, WalkForwardWindow, generate_windows};
use chrono::{DateTime, Utc};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};
use vantage_traits::{FactorPanel, Result, VantageError};

/// Trainer configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Window sizing and row minimums.
    pub walk_forward: WalkForwardConfig,
    /// Hyper-parameter search.
    pub tuning: TuningConfig,
}

/// Outcome of a training run.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    /// The bundle to publish. Its version is assigned on save.
    pub bundle: ModelBundle,
    /// Per-window results, trained or resumed.
    pub windows: Vec<WindowCheckpoint>,
    /// Windows skipped, with the reason.
    pub skipped_windows: Vec<(usize, String)>,
    /// Windows loaded from checkpoints instead of trained.
    pub resumed: usize,
}

/// Rolling-window trainer with resumable checkpoints.
#[derive(Debug, Clone, Default)]
pub struct WalkForwardTrainer {
    config: TrainerConfig,
    checkpoints: Option<CheckpointStore>,
}

impl WalkForwardTrainer {
    /// Create a trainer without checkpointing.
    #[must_use]
    pub const fn new(config: TrainerConfig) -> Self {
        Self {
            config,
            checkpoints: None,
        }
    }

    /// Persist and resume window results in `store`.
    #[must_use]
    pub fn with_checkpoints(mut self, store: CheckpointStore) -> Self {
        self.checkpoints = Some(store);
        self
    }

    /// Get the trainer configuration.
    #[must_use]
    pub const fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Train one window.
    ///
    /// # Errors
    ///
    /// Returns [`VantageError::DataInsufficiency`] if either split has too few
    /// clean rows.
    pub fn train_window(
        &self,
        panel: &FactorPanel,
        features: &[String],
        window: &WalkForwardWindow,
    ) -> Result<WindowCheckpoint> {
        let wf = &self.config.walk_forward;
        let train = panel
            .between(window.train_start, window.train_end)
            .design_matrix(features)?;
        let val = panel
            .between(window.validation_start, window.validation_end)
            .design_matrix(features)?;
        if train.x.nrows() < wf.min_train_rows || val.x.nrows() < wf.min_validation_rows {
            return Err(VantageError::DataInsufficiency(format!(
                "window {}: {} train rows (need {}), {} validation rows (need {})",
                window.index,
                train.x.nrows(),
                wf.min_train_rows,
                val.x.nrows(),
                wf.min_validation_rows
            )));
        }

        let scaler = RobustScaler::fit(train.x.view())?;
        let x_tr = scaler.transform(train.x.view())?;
        let x_va = scaler.transform(val.x.view())?;

        let mut tuned = ModelFamily::ALL
            .into_iter()
            .map(|family| {
                tune(
                    family,
                    (x_tr.view(), &train.y),
                    (x_va.view(), &val.y),
                    &self.config.tuning,
                )
            })
            .collect::<Result<Vec<_>>>()?;
        // stable: equal ICs keep family order
        tuned.sort_by(|a, b| b.ic.total_cmp(&a.ic));

        let ensemble: Array1<f64> = (&tuned[0].predictions + &tuned[1].predictions) / 2.0;
        let ensemble_ic = validation_ic(&ensemble, &val.y);
        let mut top2_models = vec![tuned[0].family, tuned[1].family];
        top2_models.sort();

        let model_ics = tuned.iter().map(|t| (t.family, t.ic)).collect();
        info!(
            window = window.index,
            ensemble_ic,
            top2 = ?top2_models,
            n_train = train.x.nrows(),
            n_val = val.x.nrows(),
            "window trained"
        );
        Ok(WindowCheckpoint {
            window: *window,
            model_ics,
            ensemble_ic,
            top2_models,
            n_train: train.x.nrows(),
            n_val: val.x.nrows(),
        })
    }

    /// Run walk-forward training and build the final bundle.
    ///
    /// # Errors
    ///
    /// - [`VantageError::Configuration`] if the date axis is too short.
    /// - [`VantageError::DataInsufficiency`] if every window is skipped.
    pub fn train(
        &self,
        panel: &FactorPanel,
        features: &[String],
        trained_at: DateTime<Utc>,
    ) -> Result<TrainingReport> {
        let windows = generate_windows(&panel.dates(), &self.config.walk_forward)?;
        info!(windows = windows.len(), features = features.len(), "walk-forward training");

        let mut results = Vec::new();
        let mut skipped = Vec::new();
        let mut resumed = 0;
        for window in &windows {
            if let Some(ckpt) = self.checkpoints.as_ref().and_then(|s| s.load(window)) {
                info!(window = window.index, "resumed from checkpoint");
                resumed += 1;
                results.push(ckpt);
                continue;
            }
            match self.train_window(panel, features, window) {
                Ok(ckpt) => {
                    if let Some(store) = &self.checkpoints {
                        store.save(&ckpt)?;
                    }
                    results.push(ckpt);
                }
                Err(e) if e.is_recoverable() => {
                    warn!(window = window.index, error = %e, "window skipped");
                    skipped.push((window.index, e.to_string()));
                }
                Err(e) => return Err(e),
            }
        }

        if results.is_empty() {
            return Err(VantageError::DataInsufficiency(format!(
                "all {} walk-forward windows were skipped",
                windows.len()
            )));
        }

        let ensemble = most_frequent_pair(&results);
        let avg_ensemble_ic =
            results.iter().map(|r| r.ensemble_ic).sum::<f64>() / results.len() as f64;
        info!(ensemble = ?ensemble, avg_ensemble_ic, "final ensemble selected");

        let all = panel.design_matrix(features)?;
        let scaler = RobustScaler::fit(all.x.view())?;
        let x = scaler.transform(all.x.view())?;
        let models = ensemble
            .iter()
            .map(|family| Ok((*family, family.fit_production(x.view(), &all.y)?)))
            .collect::<Result<Vec<_>>>()?;

        let bundle = ModelBundle {
            meta: BundleMeta {
                version: crate::bundle::version_for(trained_at),
                features: features.to_vec(),
                ensemble,
                split_strategy: format!(
                    "rolling train={} validation={} step={} gap={}",
                    self.config.walk_forward.train_days,
                    self.config.walk_forward.validation_days,
                    self.config.walk_forward.step_days,
                    self.config.walk_forward.gap_days
                ),
                wf_steps: results.len(),
                avg_ensemble_ic,
                trained_at,
            },
            scaler,
            models,
        };

        Ok(TrainingReport {
            bundle,
            windows: results,
            skipped_windows: skipped,
            resumed,
        })
    }
}

/// The top-two pair chosen most often; ties go to the pair seen first.
pub fn most_frequent_pair(results: &[WindowCheckpoint]) -> Vec<ModelFamily> {
    let mut counts: BTreeMap<&[ModelFamily], (usize, usize)> = BTreeMap::new();
    for (i, r) in results.iter().enumerate() {
        counts.entry(r.top2_models.as_slice()).or_insert((0, i)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.0.cmp(&b.1.0).then(b.1.1.cmp(&a.1.1)))
        .map(|(pair, _)| pair.to_vec())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::SearchSpace;
    use vantage_traits::{Date, FactorRow};

    fn ckpt(index: usize, pair: [ModelFamily; 2]) -> WindowCheckpoint {
        let d = Date::from_ymd_opt(2020, 1, 1).unwrap();
        WindowCheckpoint {
            window: WalkForwardWindow {
                index,
                train_start: d,
                train_end: d,
                validation_start: d,
                validation_end: d,
            },
            model_ics: BTreeMap::new(),
            ensemble_ic: 0.0,
            top2_models: pair.to_vec(),
            n_train: 0,
            n_val: 0,
        }
    }

    #[test]
    fn test_most_frequent_pair_tie_goes_first() {
        use ModelFamily::*;
        let results = vec![
            ckpt(0, [GbtLeaf, Ridge]),
            ckpt(1, [GbtDepth, GbtLeaf]),
            ckpt(2, [GbtDepth, GbtLeaf]),
            ckpt(3, [GbtLeaf, Ridge]),
        ];
        assert_eq!(most_frequent_pair(&results), vec![GbtLeaf, Ridge]);
        let results = vec![ckpt(0, [GbtDepth, Ridge]), ckpt(1, [GbtLeaf, Ridge]), ckpt(2, [GbtLeaf, Ridge])];
        assert_eq!(most_frequent_pair(&results), vec![GbtLeaf, Ridge]);
    }

    fn synthetic_panel(n_dates: usize, n_symbols: usize) -> FactorPanel {
        let start = Date::from_ymd_opt(2018, 1, 1).unwrap();
        let mut rows = Vec::new();
        for t in 0..n_dates {
            for s in 0..n_symbols {
                let a = ((t * 31 + s * 17) % 97) as f64 / 97.0 - 0.5;
                let b = ((t * 13 + s * 29) % 89) as f64 / 89.0 - 0.5;
                rows.push(FactorRow {
                    date: start + chrono::Duration::days(t as i64),
                    symbol: format!("S{s:02}"),
                    values: vec![Some(a), Some(b)],
                    target_next: Some(0.02 * a - 0.005 * b),
                    target_smooth: None,
                });
            }
        }
        FactorPanel::new(vec!["a".into(), "b".into()], rows).unwrap()
    }

    fn fast_config() -> TrainerConfig {
        TrainerConfig {
            walk_forward: WalkForwardConfig {
                train_days: 40,
                validation_days: 10,
                step_days: 20,
                gap_days: 0,
                min_train_rows: 100,
                min_validation_rows: 20,
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
        }
    }

    #[test]
    fn test_train_produces_bundle_and_checkpoints() {
        let panel = synthetic_panel(90, 10);
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path());
        let trainer = WalkForwardTrainer::new(fast_config()).with_checkpoints(store.clone());
        let features = vec!["a".to_string(), "b".to_string()];

        let report = trainer.train(&panel, &features, Utc::now()).unwrap();
        // starts 0, 20, 40 fit in 90 dates
        assert_eq!(report.windows.len(), 3);
        assert_eq!(report.resumed, 0);
        assert_eq!(report.bundle.models.len(), 2);
        assert_eq!(report.bundle.meta.wf_steps, 3);
        assert!(store.path(2).exists());

        let again = trainer.train(&panel, &features, Utc::now()).unwrap();
        assert_eq!(again.resumed, 3);
        let pairs = |r: &TrainingReport| r.windows.iter().map(|w| w.top2_models.clone()).collect::<Vec<_>>();
        assert_eq!(pairs(&again), pairs(&report));
        assert_eq!(again.bundle.meta.ensemble, report.bundle.meta.ensemble);
    }

    #[test]
    fn test_all_windows_skipped_is_insufficiency() {
        let panel = synthetic_panel(90, 2);
        let trainer = WalkForwardTrainer::new(fast_config());
        let features = vec!["a".to_string()];
        let result = trainer.train(&panel, &features, Utc::now());
        assert!(matches!(result, Err(VantageError::DataInsufficiency(_))));
    }

    #[test]
    fn test_short_axis_is_configuration_error() {
        let panel = synthetic_panel(30, 10);
        let trainer = WalkForwardTrainer::new(fast_config());
        let result = trainer.train(&panel, &["a".to_string()], Utc::now());
        assert!(matches!(result, Err(VantageError::Configuration(_))));
    }

    #[test]
    fn test_window_split_respects_dates() {
        let panel = synthetic_panel(90, 10);
        let trainer = WalkForwardTrainer::new(fast_config());
        let windows = generate_windows(&panel.dates(), &trainer.config().walk_forward).unwrap();
        let ckpt = trainer
            .train_window(&panel, &["a".to_string(), "b".to_string()], &windows[0])
            .unwrap();
        assert_eq!(ckpt.n_train, 400);
        assert_eq!(ckpt.n_val, 100);
        assert!(ckpt.ensemble_ic > 0.5);
    }
}
