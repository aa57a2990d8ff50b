//! Feature selection: an IC filter followed by a collinearity (VIF) filter.

use crate::ic::{IcSummary, ic_series};
use ndarray::{Array2, Axis};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};
use vantage_model::linalg::r_squared_uncentered;
use vantage_traits::{Date, FactorPanel, Result, VantageError};

/// Selection thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Minimum `|mean IC|` to pass the IC filter.
    pub ic_threshold: f64,
    /// Maximum VIF to pass the collinearity filter.
    pub vif_threshold: f64,
    /// Selections smaller than this are backfilled.
    pub min_features: usize,
    /// Selections larger than this are trimmed by `|IC-IR|`.
    pub max_features: usize,
    /// Rows a date needs to contribute an IC.
    pub min_rows_per_date: usize,
    /// Valid pairs a factor needs on a date.
    pub min_pairs: usize,
    /// Maximum rows sampled for the VIF regressions.
    pub vif_sample_rows: usize,
    /// Seed of the VIF row sample.
    pub seed: u64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            ic_threshold: 0.02,
            vif_threshold: 10.0,
            min_features: 10,
            max_features: 15,
            min_rows_per_date: 20,
            min_pairs: 10,
            vif_sample_rows: 10_000,
            seed: 42,
        }
    }
}

/// The `selected_features` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedFeatureSet {
    /// Selected factor names, best first.
    pub selected_features: Vec<String>,
    /// IC statistics of every factor considered.
    pub ic_summary: BTreeMap<String, IcSummary>,
    /// VIF of every factor entering the collinearity filter. Infinite or
    /// undefined values are stored as `null`.
    #[serde(with = "crate::nullable::map")]
    pub vif_summary: BTreeMap<String, f64>,
    /// Distinct symbols in the panel.
    pub n_symbols: usize,
    /// First and last panel dates.
    pub date_range: Option<(Date, Date)>,
    /// Whether the selection was backfilled past the filters.
    pub degraded: bool,
}

/// Selects the model's input features from the factor catalogue.
#[derive(Debug, Clone, Default)]
pub struct FeatureSelector {
    config: SelectionConfig,
}

impl FeatureSelector {
    /// Create a selector.
    #[must_use]
    pub const fn new(config: SelectionConfig) -> Self {
        Self { config }
    }

    /// Get the thresholds.
    #[must_use]
    pub const fn config(&self) -> &SelectionConfig {
        &self.config
    }

    /// IC summary of every factor column.
    pub fn ic_summaries(&self, panel: &FactorPanel) -> Result<BTreeMap<String, IcSummary>> {
        panel
            .columns()
            .iter()
            .map(|col| {
                let series = ic_series(panel, col, self.config.min_rows_per_date, self.config.min_pairs)?;
                let ics: Vec<f64> = series.into_iter().map(|(_, ic)| ic).collect();
                Ok((col.clone(), IcSummary::from_series(&ics)))
            })
            .collect()
    }

    /// VIF of each `candidate` against the others, on complete rows sampled
    /// to at most `vif_sample_rows` with the configured seed.
    ///
    /// The auxiliary regressions run on the raw factor values with no
    /// constant term, so `R^2` is uncentered and factors sharing a common
    /// offset read as collinear.
    ///
    /// A perfectly explained factor gets an infinite VIF; a factor whose
    /// regression cannot be solved gets NaN and fails the filter.
    pub fn vif(&self, panel: &FactorPanel, candidates: &[String]) -> Result<BTreeMap<String, f64>> {
        if candidates.len() < 2 {
            return Ok(candidates.iter().map(|c| (c.clone(), 1.0)).collect());
        }
        let columns = candidates
            .iter()
            .map(|c| panel.column(c))
            .collect::<Result<Vec<_>>>()?;
        let complete: Vec<usize> = (0..panel.len())
            .filter(|&i| columns.iter().all(|col| col[i].is_some_and(f64::is_finite)))
            .collect();

        let rows: Vec<usize> = if complete.len() > self.config.vif_sample_rows {
            let mut rng = StdRng::seed_from_u64(self.config.seed);
            let mut picked =
                rand::seq::index::sample(&mut rng, complete.len(), self.config.vif_sample_rows).into_vec();
            picked.sort_unstable();
            picked.into_iter().map(|k| complete[k]).collect()
        } else {
            complete
        };

        let k = candidates.len();
        let data: Vec<f64> = rows
            .iter()
            .flat_map(|&i| columns.iter().map(move |col| col[i].unwrap_or(0.0)))
            .collect();
        let x = Array2::from_shape_vec((rows.len(), k), data)
            .map_err(|e| VantageError::InvalidData(e.to_string()))?;

        Ok(candidates
            .iter()
            .enumerate()
            .map(|(j, name)| {
                let others: Vec<usize> = (0..k).filter(|&o| o != j).collect();
                let xo = x.select(Axis(1), &others);
                let vif = match r_squared_uncentered(xo.view(), x.column(j)) {
                    Some(r2) if r2 >= 1.0 => f64::INFINITY,
                    Some(r2) => 1.0 / (1.0 - r2),
                    None => f64::NAN,
                };
                (name.clone(), vif)
            })
            .collect())
    }

    /// Run both filters and size the selection.
    ///
    /// # Errors
    ///
    /// Returns [`VantageError::DataInsufficiency`] for an empty panel.
    pub fn select(&self, panel: &FactorPanel) -> Result<SelectedFeatureSet> {
        let c = &self.config;
        if panel.is_empty() {
            return Err(VantageError::DataInsufficiency(
                "feature selection needs a non-empty factor panel".to_string(),
            ));
        }
        let ic_summary = self.ic_summaries(panel)?;

        // every factor, by |IC| desc then name
        let mut by_ic: Vec<&String> = ic_summary.keys().collect();
        by_ic.sort_by(|a, b| ic_summary[*b].abs_ic().total_cmp(&ic_summary[*a].abs_ic()).then(a.cmp(b)));

        let ic_pass: BTreeSet<&String> = by_ic
            .iter()
            .copied()
            .filter(|f| ic_summary[*f].abs_ic() >= c.ic_threshold)
            .collect();

        let mut vif_candidates: Vec<String> = by_ic
            .iter()
            .filter(|f| ic_summary[**f].abs_ic() >= c.ic_threshold / 2.0)
            .map(|f| (*f).clone())
            .collect();
        if vif_candidates.len() < 3 {
            vif_candidates = by_ic.iter().map(|f| (*f).clone()).collect();
        }
        let vif_summary = self.vif(panel, &vif_candidates)?;

        let mut selected: Vec<String> = by_ic
            .iter()
            .filter(|f| ic_pass.contains(*f))
            .filter(|f| vif_summary.get(f.as_str()).is_some_and(|v| *v <= c.vif_threshold))
            .map(|f| (*f).clone())
            .collect();
        info!(
            ic_pass = ic_pass.len(),
            vif_candidates = vif_candidates.len(),
            passed = selected.len(),
            "feature filters applied"
        );

        let mut degraded = false;
        if selected.len() < c.min_features {
            for f in &by_ic {
                if selected.len() >= c.min_features {
                    break;
                }
                if !selected.contains(*f) {
                    selected.push((*f).clone());
                }
            }
            degraded = true;
            warn!(
                selected = selected.len(),
                min = c.min_features,
                "too few features passed both filters, backfilled from IC ranking"
            );
        } else if selected.len() > c.max_features {
            let mut by_ir = selected.clone();
            by_ir.sort_by(|a, b| ic_summary[b].ranked_ir().total_cmp(&ic_summary[a].ranked_ir()).then(a.cmp(b)));
            let keep: BTreeSet<String> = by_ir.into_iter().take(c.max_features).collect();
            selected.retain(|f| keep.contains(f));
        }

        let n_symbols = panel
            .rows()
            .iter()
            .map(|r| r.symbol.as_str())
            .collect::<BTreeSet<_>>()
            .len();
        let date_range = panel
            .rows()
            .first()
            .zip(panel.last_date())
            .map(|(first, last)| (first.date, last));

        info!(features = ?selected, degraded, "features selected");
        Ok(SelectedFeatureSet {
            selected_features: selected,
            ic_summary,
            vif_summary,
            n_symbols,
            date_range,
            degraded,
        })
    }
}
