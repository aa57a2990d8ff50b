//! Signal generation: the model score, the model-free rule score and their
//! rank blend.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;
use vantage_traits::stats::percentile_ranks;
use vantage_traits::{Date, FactorPanel, Result, ScoreSource, Symbol, VantageError};

/// Factor columns the rule score reads.
pub const RULE_COLUMNS: [&str; 3] = ["ret_3m", "ret_1m", "vol_20"];

const MIN_VOL: f64 = 1e-4;
const DEFAULT_VOL: f64 = 0.2;

/// `0.5·ret_3m + 0.3·ret_1m + 0.2 / max(vol_20, 1e-4)`.
///
/// `None` if any input is missing, so symbols short of history drop out of
/// the rule cross-section instead of ranking on filler values.
pub fn rule_score(ret_3m: Option<f64>, ret_1m: Option<f64>, vol_20: Option<f64>) -> Option<f64> {
    let finite = |v: Option<f64>| v.filter(|x| x.is_finite());
    let (r3, r1, vol) = (finite(ret_3m)?, finite(ret_1m)?, finite(vol_20)?);
    Some(0.5 * r3 + 0.3 * r1 + 0.2 / vol.max(MIN_VOL))
}

/// Model-free score computed from raw factors.
///
/// A column absent from the panel is filled with its default (zero return,
/// 0.2 volatility). Rows with a missing value in a present column score NaN.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleScore;

impl RuleScore {
    fn column_or(panel: &FactorPanel, name: &str, default: f64) -> Result<Vec<Option<f64>>> {
        if panel.column_index(name).is_some() {
            panel.column(name)
        } else {
            debug!(column = name, default, "rule column absent, using default");
            Ok(vec![Some(default); panel.len()])
        }
    }
}

impl ScoreSource for RuleScore {
    fn name(&self) -> &str {
        "rule"
    }

    fn required_columns(&self) -> Vec<String> {
        RULE_COLUMNS.iter().map(|c| (*c).to_string()).collect()
    }

    fn score(&self, panel: &FactorPanel) -> Result<Vec<f64>> {
        let r3 = Self::column_or(panel, "ret_3m", 0.0)?;
        let r1 = Self::column_or(panel, "ret_1m", 0.0)?;
        let v = Self::column_or(panel, "vol_20", DEFAULT_VOL)?;
        Ok((0..panel.len())
            .map(|i| rule_score(r3[i], r1[i], v[i]).unwrap_or(f64::NAN))
            .collect())
    }
}

/// Which score sources feed the signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    /// Model score only.
    Ml,
    /// Rule score only.
    Rule,
    /// Percentile-rank blend of both.
    #[default]
    Blend,
}

impl BlendMode {
    /// Returns whether the model score is used.
    #[must_use]
    pub const fn uses_model(&self) -> bool {
        matches!(self, Self::Ml | Self::Blend)
    }

    /// Returns whether the rule score is used.
    #[must_use]
    pub const fn uses_rule(&self) -> bool {
        matches!(self, Self::Rule | Self::Blend)
    }
}

impl fmt::Display for BlendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ml => "ml",
            Self::Rule => "rule",
            Self::Blend => "blend",
        })
    }
}

impl FromStr for BlendMode {
    type Err = VantageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ml" => Ok(Self::Ml),
            "rule" => Ok(Self::Rule),
            "blend" => Ok(Self::Blend),
            other => Err(VantageError::Configuration(format!(
                "unknown blend mode '{other}' (expected ml, rule or blend)"
            ))),
        }
    }
}

/// Blend weights of the two sources.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlendWeights {
    /// Weight of the model rank.
    pub ml: f64,
    /// Weight of the rule rank.
    pub rule: f64,
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self { ml: 0.5, rule: 0.3 }
    }
}

/// Scores of one date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalVector {
    /// Signal date.
    pub date: Date,
    /// Score per symbol.
    pub scores: BTreeMap<Symbol, f64>,
}

impl SignalVector {
    /// Number of scored symbols.
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Returns whether no symbol is scored.
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Finite scores, best first. Equal scores are ordered by symbol.
    pub fn ranked(&self) -> Vec<(&Symbol, f64)> {
        let mut ranked: Vec<(&Symbol, f64)> = self
            .scores
            .iter()
            .filter(|(_, s)| s.is_finite())
            .map(|(sym, s)| (sym, *s))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }
}

/// Percentile-rank blend over the symbols scored finitely by both sources:
/// `(w_ml·rank_ml + w_rule·rank_rule) / (w_ml + w_rule)`.
pub fn blend_ranks(
    ml: &BTreeMap<Symbol, f64>,
    rule: &BTreeMap<Symbol, f64>,
    weights: BlendWeights,
) -> BTreeMap<Symbol, f64> {
    let common: Vec<(&Symbol, f64, f64)> = ml
        .iter()
        .filter_map(|(sym, m)| {
            let r = *rule.get(sym)?;
            (m.is_finite() && r.is_finite()).then_some((sym, *m, r))
        })
        .collect();
    let rank_ml = percentile_ranks(&common.iter().map(|c| c.1).collect::<Vec<_>>());
    let rank_rule = percentile_ranks(&common.iter().map(|c| c.2).collect::<Vec<_>>());
    let total = weights.ml + weights.rule;
    common
        .iter()
        .enumerate()
        .map(|(i, (sym, _, _))| {
            (
                (*sym).clone(),
                (weights.ml * rank_ml[i] + weights.rule * rank_rule[i]) / total,
            )
        })
        .collect()
}

/// Rank-blend externally supplied sentiment into a signal:
/// `(1 − w)·rank(signal) + w·rank(sentiment)`. Symbols without a sentiment
/// score are treated as neutral (zero).
///
/// # Errors
///
/// Returns [`VantageError::Configuration`] if `weight` is outside `[0, 1]`.
pub fn blend_sentiment(
    signal: &SignalVector,
    weight: f64,
    sentiment: &BTreeMap<Symbol, f64>,
) -> Result<SignalVector> {
    if !(0.0..=1.0).contains(&weight) {
        return Err(VantageError::Configuration(format!(
            "sentiment weight {weight} outside [0, 1]"
        )));
    }
    if weight == 0.0 || signal.is_empty() {
        return Ok(signal.clone());
    }
    let neutral: BTreeMap<Symbol, f64> = signal
        .scores
        .keys()
        .map(|sym| {
            let s = sentiment.get(sym).copied().filter(|v| v.is_finite());
            (sym.clone(), s.unwrap_or(0.0))
        })
        .collect();
    Ok(SignalVector {
        date: signal.date,
        scores: blend_ranks(
            &signal.scores,
            &neutral,
            BlendWeights {
                ml: 1.0 - weight,
                rule: weight,
            },
        ),
    })
}

/// Both raw scores of one date's cross-section, row aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossSectionScores {
    /// Cross-section date.
    pub date: Date,
    /// Symbols, in panel order.
    pub symbols: Vec<Symbol>,
    /// Model scores, if the model source is active.
    pub ml: Option<Vec<f64>>,
    /// Rule scores, if the rule source is active.
    pub rule: Option<Vec<f64>>,
}

impl CrossSectionScores {
    fn source(&self, values: &[f64]) -> BTreeMap<Symbol, f64> {
        self.symbols
            .iter()
            .zip(values)
            .filter(|(_, v)| v.is_finite())
            .map(|(s, v)| (s.clone(), *v))
            .collect()
    }

    /// Combine into a signal.
    ///
    /// Both sources with positive weights are rank blended. Otherwise the
    /// single active source passes through untouched.
    pub fn signal(&self, weights: BlendWeights) -> SignalVector {
        let scores = match (&self.ml, &self.rule) {
            (Some(ml), Some(rule)) if weights.ml > 0.0 && weights.rule > 0.0 => {
                blend_ranks(&self.source(ml), &self.source(rule), weights)
            }
            (Some(_), Some(rule)) if weights.ml <= 0.0 && weights.rule > 0.0 => self.source(rule),
            (Some(ml), _) => self.source(ml),
            (None, Some(rule)) => self.source(rule),
            (None, None) => BTreeMap::new(),
        };
        SignalVector {
            date: self.date,
            scores,
        }
    }
}

/// Raw scores of every date in a factor panel, computed once and blended on
/// demand so that blend weights can vary without rescoring.
#[derive(Debug, Clone, Default)]
pub struct ScoredPanel {
    sections: BTreeMap<Date, CrossSectionScores>,
}

impl ScoredPanel {
    /// Dates with scores.
    pub fn dates(&self) -> impl Iterator<Item = &Date> {
        self.sections.keys()
    }

    /// Raw scores of one date.
    pub fn section(&self, date: Date) -> Option<&CrossSectionScores> {
        self.sections.get(&date)
    }

    /// Returns whether model scores are present.
    pub fn has_model(&self) -> bool {
        self.sections.values().any(|s| s.ml.is_some())
    }

    /// Returns whether rule scores are present.
    pub fn has_rule(&self) -> bool {
        self.sections.values().any(|s| s.rule.is_some())
    }

    /// The blended signal of one date.
    pub fn signal(&self, date: Date, weights: BlendWeights) -> Option<SignalVector> {
        self.section(date).map(|s| s.signal(weights))
    }

    /// The most recent signal.
    pub fn latest(&self, weights: BlendWeights) -> Option<SignalVector> {
        self.sections.values().next_back().map(|s| s.signal(weights))
    }
}

/// Turns a factor panel into signals.
#[derive(Clone, Default)]
pub struct SignalGenerator {
    mode: BlendMode,
    weights: BlendWeights,
    model: Option<Arc<dyn ScoreSource>>,
}

impl fmt::Debug for SignalGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalGenerator")
            .field("mode", &self.mode)
            .field("weights", &self.weights)
            .field("model", &self.model.as_ref().map(|m| m.name().to_string()))
            .finish()
    }
}

impl SignalGenerator {
    /// Create a generator without a model source.
    #[must_use]
    pub const fn new(mode: BlendMode, weights: BlendWeights) -> Self {
        Self {
            mode,
            weights,
            model: None,
        }
    }

    /// Attach the model score source.
    #[must_use]
    pub fn with_model(mut self, model: Arc<dyn ScoreSource>) -> Self {
        self.model = Some(model);
        self
    }

    /// Blend mode.
    #[must_use]
    pub const fn mode(&self) -> BlendMode {
        self.mode
    }

    /// Blend weights.
    #[must_use]
    pub const fn weights(&self) -> BlendWeights {
        self.weights
    }

    /// Score every row of `panel` with the active sources.
    ///
    /// # Errors
    ///
    /// - [`VantageError::ModelUnavailable`] if the mode uses the model and
    ///   none is attached.
    /// - [`VantageError::MissingColumn`] if a source's columns are absent.
    pub fn score(&self, panel: &FactorPanel) -> Result<ScoredPanel> {
        let ml = match (&self.model, self.mode.uses_model()) {
            (_, false) => None,
            (Some(model), true) => Some(model.score(panel)?),
            (None, true) => {
                return Err(VantageError::ModelUnavailable(format!(
                    "blend mode '{}' needs a trained model",
                    self.mode
                )));
            }
        };
        let rule = if self.mode.uses_rule() {
            Some(RuleScore.score(panel)?)
        } else {
            None
        };

        let rows = panel.rows();
        let sections = panel
            .date_groups()
            .into_iter()
            .map(|(date, range)| {
                let section = CrossSectionScores {
                    date,
                    symbols: rows[range.clone()].iter().map(|r| r.symbol.clone()).collect(),
                    ml: ml.as_ref().map(|v| v[range.clone()].to_vec()),
                    rule: rule.as_ref().map(|v| v[range].to_vec()),
                };
                (date, section)
            })
            .collect::<BTreeMap<_, _>>();
        debug!(dates = sections.len(), mode = %self.mode, "panel scored");
        Ok(ScoredPanel { sections })
    }

    /// The signal of the latest date in `panel`.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::score`] errors and returns
    /// [`VantageError::DataInsufficiency`] for an empty panel.
    pub fn latest(&self, panel: &FactorPanel) -> Result<SignalVector> {
        let date = panel
            .last_date()
            .ok_or_else(|| VantageError::DataInsufficiency("empty factor panel".to_string()))?;
        let scored = self.score(&panel.at(date))?;
        scored
            .signal(date, self.weights)
            .ok_or_else(|| VantageError::DataInsufficiency(format!("no scores on {date}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use vantage_traits::FactorRow;

    fn d() -> Date {
        Date::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn panel() -> FactorPanel {
        let cols = RULE_COLUMNS.iter().map(|c| (*c).to_string()).collect();
        let row = |sym: &str, r3, r1, v| FactorRow {
            date: d(),
            symbol: sym.into(),
            values: vec![r3, r1, v],
            target_next: None,
            target_smooth: None,
        };
        FactorPanel::new(
            cols,
            vec![
                row("AAA", Some(0.10), Some(0.02), Some(0.25)),
                row("BBB", Some(-0.05), None, Some(0.40)),
                row("CCC", None, Some(0.01), None),
            ],
        )
        .unwrap()
    }

    #[derive(Debug)]
    struct Fixed(Vec<f64>);

    impl ScoreSource for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
        fn required_columns(&self) -> Vec<String> {
            Vec::new()
        }
        fn score(&self, _: &FactorPanel) -> Result<Vec<f64>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_rule_score_needs_every_input() {
        assert_relative_eq!(
            rule_score(Some(0.1), Some(0.02), Some(0.25)).unwrap(),
            0.05 + 0.006 + 0.8
        );
        assert_relative_eq!(rule_score(Some(0.0), Some(0.0), Some(0.0)).unwrap(), 0.2 / 1e-4);
        assert_eq!(rule_score(None, None, None), None);
        assert_eq!(rule_score(Some(0.1), None, Some(0.2)), None);
        assert_eq!(rule_score(Some(0.1), Some(0.02), Some(f64::NAN)), None);
    }

    #[test]
    fn test_symbol_without_history_is_not_ranked() {
        let cols = RULE_COLUMNS.iter().map(|c| (*c).to_string()).collect();
        let row = |sym: &str, values: Vec<Option<f64>>| FactorRow {
            date: d(),
            symbol: sym.into(),
            values,
            target_next: None,
            target_smooth: None,
        };
        let panel = FactorPanel::new(
            cols,
            vec![
                row("EST", vec![Some(0.10), Some(0.04), Some(0.22)]),
                row("NEW", vec![None, None, None]),
            ],
        )
        .unwrap();
        let signal = SignalGenerator::new(BlendMode::Rule, BlendWeights::default())
            .latest(&panel)
            .unwrap();
        let ranked: Vec<&str> = signal.ranked().iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(ranked, vec!["EST"]);
    }

    #[test]
    fn test_absent_rule_column_uses_default() {
        let row = |sym: &str, r3, r1| FactorRow {
            date: d(),
            symbol: sym.into(),
            values: vec![r3, r1],
            target_next: None,
            target_smooth: None,
        };
        let panel = FactorPanel::new(
            vec!["ret_3m".into(), "ret_1m".into()],
            vec![row("AAA", Some(0.2), Some(0.1)), row("BBB", Some(0.1), None)],
        )
        .unwrap();
        let scores = RuleScore.score(&panel).unwrap();
        assert_relative_eq!(scores[0], 0.1 + 0.03 + 1.0);
        assert!(scores[1].is_nan());
    }

    #[test]
    fn test_blend_mode_parse() {
        assert_eq!("BLEND".parse::<BlendMode>().unwrap(), BlendMode::Blend);
        assert_eq!("ml".parse::<BlendMode>().unwrap(), BlendMode::Ml);
        assert!(matches!(
            "momentum".parse::<BlendMode>(),
            Err(VantageError::Configuration(_))
        ));
    }

    #[test]
    fn test_blend_uses_ranks_not_magnitude() {
        let ml: BTreeMap<Symbol, f64> = [("A".into(), 100.0), ("B".into(), 1.0), ("C".into(), 0.0)].into();
        let rule: BTreeMap<Symbol, f64> = [("A".into(), 0.0), ("B".into(), 2.0), ("C".into(), 1.0)].into();
        let blended = blend_ranks(&ml, &rule, BlendWeights { ml: 0.5, rule: 0.5 });
        // ranks ml: A 1, B 2/3, C 1/3; rule: A 1/3, B 1, C 2/3
        assert_relative_eq!(blended["A"], 2.0 / 3.0);
        assert_relative_eq!(blended["B"], 5.0 / 6.0);
        assert_relative_eq!(blended["C"], 0.5);
    }

    #[test]
    fn test_single_source_passes_through() {
        let generator = SignalGenerator::new(BlendMode::Blend, BlendWeights { ml: 0.5, rule: 0.0 })
            .with_model(Arc::new(Fixed(vec![0.3, -0.1, 0.2])));
        let signal = generator.latest(&panel()).unwrap();
        assert_eq!(signal.scores["AAA"], 0.3);
        assert_eq!(signal.scores["BBB"], -0.1);
    }

    #[test]
    fn test_blend_without_model_is_unavailable() {
        let generator = SignalGenerator::new(BlendMode::Blend, BlendWeights::default());
        assert!(matches!(
            generator.score(&panel()),
            Err(VantageError::ModelUnavailable(_))
        ));
        let rule_only = SignalGenerator::new(BlendMode::Rule, BlendWeights::default());
        let signal = rule_only.latest(&panel()).unwrap();
        assert_relative_eq!(signal.scores["AAA"], 0.05 + 0.006 + 0.8);
        assert!(!signal.scores.contains_key("CCC"));
    }

    #[test]
    fn test_ranked_order_and_ties() {
        let signal = SignalVector {
            date: d(),
            scores: [("B".into(), 1.0), ("A".into(), 1.0), ("C".into(), 2.0), ("D".into(), f64::NAN)].into(),
        };
        let order: Vec<&str> = signal.ranked().iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(order, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_sentiment_blend() {
        let signal = SignalVector {
            date: d(),
            scores: [("A".into(), 3.0), ("B".into(), 2.0)].into(),
        };
        let sentiment: BTreeMap<Symbol, f64> = [("B".into(), 0.9)].into();
        let out = blend_sentiment(&signal, 1.0, &sentiment).unwrap();
        assert!(out.scores["B"] > out.scores["A"]);
        assert_eq!(blend_sentiment(&signal, 0.0, &sentiment).unwrap(), signal);
        assert!(blend_sentiment(&signal, 1.5, &sentiment).is_err());
    }
}
