//! Seeded random hyper-parameter search.
//!
//! Every trial is scored by the Spearman IC of its validation predictions.

use crate::gbt::{BoosterParams, GradientBoostedTrees};
use crate::model::{FittedModel, ModelFamily};
use crate::ridge::{RIDGE_ALPHAS, Ridge};
use ndarray::{Array1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;
use vantage_traits::Result;
use vantage_traits::stats::spearman;

/// Booster search space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSpace {
    /// Boosting rounds, inclusive.
    pub n_estimators: (usize, usize),
    /// Tree depth, inclusive.
    pub max_depth: (usize, usize),
    /// Minimum child rows, inclusive.
    pub min_child_weight: (usize, usize),
    /// Learning rate, sampled log-uniformly.
    pub learning_rate: (f64, f64),
    /// Row sampling fraction.
    pub subsample: (f64, f64),
    /// Feature sampling fraction.
    pub colsample: (f64, f64),
    /// L1 penalty, sampled log-uniformly.
    pub reg_alpha: (f64, f64),
    /// L2 penalty, sampled log-uniformly.
    pub reg_lambda: (f64, f64),
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self {
            n_estimators: (100, 500),
            max_depth: (2, 5),
            min_child_weight: (50, 200),
            learning_rate: (0.01, 0.1),
            subsample: (0.6, 1.0),
            colsample: (0.6, 1.0),
            reg_alpha: (1e-4, 1.0),
            reg_lambda: (1e-4, 1.0),
        }
    }
}

fn log_uniform(rng: &mut StdRng, (lo, hi): (f64, f64)) -> f64 {
    rng.gen_range(lo.ln()..=hi.ln()).exp()
}

impl SearchSpace {
    /// Draw one parameter set.
    pub fn sample(&self, rng: &mut StdRng, family: ModelFamily, seed: u64) -> BoosterParams {
        BoosterParams {
            n_estimators: rng.gen_range(self.n_estimators.0..=self.n_estimators.1),
            max_depth: rng.gen_range(self.max_depth.0..=self.max_depth.1),
            min_child_weight: rng.gen_range(self.min_child_weight.0..=self.min_child_weight.1),
            learning_rate: log_uniform(rng, self.learning_rate),
            subsample: rng.gen_range(self.subsample.0..=self.subsample.1),
            colsample: rng.gen_range(self.colsample.0..=self.colsample.1),
            reg_alpha: log_uniform(rng, self.reg_alpha),
            reg_lambda: log_uniform(rng, self.reg_lambda),
            growth: family.growth().unwrap_or(crate::gbt::Growth::DepthWise),
            seed,
        }
    }
}

/// Tuning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningConfig {
    /// Random trials per booster family.
    pub n_trials: usize,
    /// Base seed.
    pub seed: u64,
    /// Booster search space.
    pub space: SearchSpace,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            n_trials: 50,
            seed: 42,
            space: SearchSpace::default(),
        }
    }
}

/// Outcome of tuning one family on one window.
#[derive(Debug, Clone)]
pub struct TunedModel {
    /// Family tuned.
    pub family: ModelFamily,
    /// Best model, refit on the training rows.
    pub model: FittedModel,
    /// Validation predictions of the best model.
    pub predictions: Array1<f64>,
    /// Validation IC of the best model.
    pub ic: f64,
}

/// Spearman IC of predictions against labels; zero when undefined.
pub fn validation_ic(pred: &Array1<f64>, y: &Array1<f64>) -> f64 {
    spearman(&pred.to_vec(), &y.to_vec(), 2).unwrap_or(0.0)
}

/// Tune `family` on the training split and score it on the validation split.
pub fn tune(
    family: ModelFamily,
    train: (ArrayView2<'_, f64>, &Array1<f64>),
    validation: (ArrayView2<'_, f64>, &Array1<f64>),
    config: &TuningConfig,
) -> Result<TunedModel> {
    let (x_tr, y_tr) = train;
    let (x_va, y_va) = validation;
    let mut best: Option<TunedModel> = None;

    let consider = |model: FittedModel, best: &mut Option<TunedModel>| {
        let predictions = model.predict(x_va);
        let ic = validation_ic(&predictions, y_va);
        if best.as_ref().is_none_or(|b| ic > b.ic) {
            *best = Some(TunedModel {
                family,
                model,
                predictions,
                ic,
            });
        }
    };

    match family {
        ModelFamily::Ridge => {
            for alpha in RIDGE_ALPHAS {
                let model = Ridge::fit(x_tr, y_tr, alpha)?;
                consider(FittedModel::Ridge(model), &mut best);
            }
        }
        ModelFamily::GbtDepth | ModelFamily::GbtLeaf => {
            let family_salt = family as u64 + 1;
            let mut rng = StdRng::seed_from_u64(config.seed.wrapping_mul(31).wrapping_add(family_salt));
            for trial in 0..config.n_trials.max(1) {
                let params = config.space.sample(&mut rng, family, config.seed + trial as u64);
                let model = GradientBoostedTrees::fit(x_tr, y_tr, &params)?;
                consider(FittedModel::Booster(model), &mut best);
                debug!(family = %family, trial, "tuning trial done");
            }
        }
    }

    best.ok_or_else(|| vantage_traits::VantageError::computation(family.name(), "no trial completed"))
}
