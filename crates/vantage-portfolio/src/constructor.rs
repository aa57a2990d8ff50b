//! Position construction: scores in, capped long-only weights out.
//!
//! The constructor is a pure function of its inputs and is shared by the
//! live query and every backtest rebalance:
//!
//! 1. effective count from the regime
//! 2. top `2 × effective` candidates
//! 3. stop-loss exclusion, re-admitting in rank order to avoid under-filling
//! 4. inverse-volatility weights over the top `effective`
//! 5. sector cap: greedy pass, correction iterations, final clamp to cash
//! 6. cash reserve in an extreme bear regime

use crate::market::MarketState;
use crate::regime::{Regime, RegimeState};
use crate::sectors::SectorMap;
use crate::signal::SignalVector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;
use vantage_traits::{Date, Result, Symbol, VantageError};

/// Tolerance on the sector cap.
pub const SECTOR_EPSILON: f64 = 1e-6;

/// Construction parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstructionConfig {
    /// Target number of positions in a bull regime.
    pub target_count: usize,
    /// Candidate pool size as a multiple of the effective count.
    pub candidate_multiplier: usize,
    /// Trailing return below which a name is stopped out.
    pub stop_loss: f64,
    /// Maximum aggregate weight per sector.
    pub sector_cap: f64,
    /// Correction iterations after the greedy sector pass.
    pub sector_iterations: usize,
    /// Fraction held as cash in an extreme bear regime.
    pub cash_reserve: f64,
    /// Volatility floor for inverse-volatility sizing.
    pub min_vol: f64,
    /// Volatility assumed when none is observed.
    pub default_vol: f64,
}

impl Default for ConstructionConfig {
    fn default() -> Self {
        Self {
            target_count: 10,
            candidate_multiplier: 2,
            stop_loss: -0.10,
            sector_cap: 0.30,
            sector_iterations: 5,
            cash_reserve: 0.30,
            min_vol: 1e-4,
            default_vol: 0.2,
        }
    }
}

/// Number of positions to hold for a regime.
///
/// Bear holds `max(⌊n/3⌋, 3)`, neutral `max(⌊0.8·n⌋, 5)`, bull `n`.
pub const fn effective_count(target: usize, regime: Regime) -> usize {
    match regime {
        Regime::Bull => target,
        Regime::Neutral => {
            let n = target * 4 / 5;
            if n < 5 { 5 } else { n }
        }
        Regime::Bear => {
            let n = target / 3;
            if n < 3 { 3 } else { n }
        }
    }
}

/// Target weights of one date. The remainder of one is cash.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionSet {
    /// Construction date.
    pub date: Date,
    /// Weight per symbol, all positive.
    pub weights: BTreeMap<Symbol, f64>,
    /// Regime the set was built under.
    pub regime: RegimeState,
    /// Effective count for that regime.
    pub effective_count: usize,
}

impl PositionSet {
    /// A set holding only cash.
    pub const fn empty(date: Date, regime: RegimeState) -> Self {
        Self {
            date,
            weights: BTreeMap::new(),
            regime,
            effective_count: 0,
        }
    }

    /// Number of positions.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Returns whether only cash is held.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Sum of position weights.
    pub fn total_weight(&self) -> f64 {
        self.weights.values().sum()
    }

    /// Uninvested fraction.
    pub fn cash(&self) -> f64 {
        (1.0 - self.total_weight()).max(0.0)
    }

    /// Weight of `symbol`, zero if not held.
    pub fn weight(&self, symbol: &str) -> f64 {
        self.weights.get(symbol).copied().unwrap_or(0.0)
    }

    /// Aggregate weight per sector.
    pub fn sector_weights(&self, sectors: &SectorMap) -> BTreeMap<String, f64> {
        sector_sums(&self.weights, sectors)
    }

    /// `Σ|w_new − w_old|` over the union of both sets of names.
    pub fn turnover(&self, previous: &BTreeMap<Symbol, f64>) -> f64 {
        let added: f64 = self
            .weights
            .iter()
            .map(|(s, w)| (w - previous.get(s).copied().unwrap_or(0.0)).abs())
            .sum();
        let removed: f64 = previous
            .iter()
            .filter(|(s, _)| !self.weights.contains_key(*s))
            .map(|(_, w)| w.abs())
            .sum();
        added + removed
    }
}

fn sector_sums(weights: &BTreeMap<Symbol, f64>, sectors: &SectorMap) -> BTreeMap<String, f64> {
    let mut sums = BTreeMap::new();
    for (sym, w) in weights {
        if let Some(sector) = sectors.sector_of(sym) {
            *sums.entry(sector.to_string()).or_insert(0.0) += w;
        }
    }
    sums
}

/// A selected name and its weight, kept in score order.
#[derive(Debug, Clone)]
struct Pick<'a> {
    symbol: &'a Symbol,
    sector: Option<&'a str>,
    weight: f64,
}

fn normalize(picks: &mut [Pick<'_>]) {
    let total: f64 = picks.iter().map(|p| p.weight).sum();
    if total > 0.0 {
        for p in picks.iter_mut() {
            p.weight /= total;
        }
    }
}

fn sector_totals<'a>(picks: &[Pick<'a>]) -> BTreeMap<&'a str, f64> {
    let mut totals = BTreeMap::new();
    for p in picks {
        if let Some(sector) = p.sector {
            *totals.entry(sector).or_insert(0.0) += p.weight;
        }
    }
    totals
}

/// Builds [`PositionSet`]s.
#[derive(Debug, Clone, Default)]
pub struct PortfolioConstructor {
    config: ConstructionConfig,
}

impl PortfolioConstructor {
    /// Create a constructor.
    #[must_use]
    pub const fn new(config: ConstructionConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &ConstructionConfig {
        &self.config
    }

    /// Build the positions for one date.
    ///
    /// `target_count` overrides the configured target when given.
    ///
    /// # Errors
    ///
    /// Returns [`VantageError::DataInsufficiency`] if fewer finite scores
    /// than the effective count exist.
    pub fn construct(
        &self,
        signal: &SignalVector,
        regime: RegimeState,
        market: &MarketState,
        sectors: &SectorMap,
        target_count: Option<usize>,
    ) -> Result<PositionSet> {
        let c = &self.config;
        let effective = effective_count(target_count.unwrap_or(c.target_count), regime.regime);
        let ranked = signal.ranked();
        if ranked.len() < effective {
            return Err(VantageError::DataInsufficiency(format!(
                "{} scored symbols on {}, {} needed for a {} regime",
                ranked.len(),
                signal.date,
                effective,
                regime.regime
            )));
        }

        // ranked positions of the candidate pool
        let pool = effective.saturating_mul(c.candidate_multiplier.max(1)).min(ranked.len());
        let stopped = |i: &usize| market.ret_1m(ranked[*i].0).is_some_and(|r| r < c.stop_loss);
        let (excluded, mut kept): (Vec<usize>, Vec<usize>) = (0..pool).partition(stopped);
        if kept.len() < effective {
            let shortfall = effective - kept.len();
            debug!(date = %signal.date, shortfall, "re-admitting stopped-out names");
            kept.extend(excluded.iter().take(shortfall));
            kept.sort_unstable();
        } else if !excluded.is_empty() {
            debug!(date = %signal.date, excluded = excluded.len(), "stop-loss exclusions");
        }
        kept.truncate(effective);

        let mut picks: Vec<Pick<'_>> = kept
            .iter()
            .map(|&i| {
                let symbol = ranked[i].0;
                let vol = market
                    .vol(symbol)
                    .filter(|v| v.is_finite())
                    .unwrap_or(c.default_vol)
                    .max(c.min_vol);
                Pick {
                    symbol,
                    sector: sectors.sector_of(symbol),
                    weight: 1.0 / vol,
                }
            })
            .collect();
        normalize(&mut picks);

        self.apply_sector_cap(&mut picks);

        let scale = if regime.is_extreme_bear() {
            1.0 - c.cash_reserve
        } else {
            1.0
        };
        let weights = picks
            .into_iter()
            .filter(|p| p.weight > 0.0)
            .map(|p| (p.symbol.clone(), p.weight * scale))
            .collect();

        Ok(PositionSet {
            date: signal.date,
            weights,
            regime,
            effective_count: effective,
        })
    }

    /// Picks arrive in score order with normalized weights.
    fn apply_sector_cap(&self, picks: &mut Vec<Pick<'_>>) {
        let cap = self.config.sector_cap;

        let mut accepted: BTreeMap<&str, f64> = BTreeMap::new();
        picks.retain(|p| {
            let Some(sector) = p.sector else {
                return true;
            };
            let used = accepted.entry(sector).or_insert(0.0);
            if *used < cap {
                *used += p.weight;
                true
            } else {
                false
            }
        });
        normalize(picks);

        for _ in 0..self.config.sector_iterations {
            let totals = sector_totals(picks);
            let over: Vec<&str> = totals
                .iter()
                .filter(|(_, w)| **w > cap + SECTOR_EPSILON)
                .map(|(s, _)| *s)
                .collect();
            let mut dropped = false;
            for sector in over {
                let members = picks.iter().filter(|p| p.sector == Some(sector)).count();
                if members >= 2
                    && let Some(last) = picks.iter().rposition(|p| p.sector == Some(sector))
                {
                    picks.remove(last);
                    dropped = true;
                }
            }
            if !dropped {
                break;
            }
            normalize(picks);
        }

        let totals = sector_totals(picks);
        for p in picks.iter_mut() {
            let Some(total) = p.sector.and_then(|s| totals.get(s).copied()) else {
                continue;
            };
            if total > cap + SECTOR_EPSILON {
                p.weight *= cap / total;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn date() -> Date {
        Date::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn signal(n: usize) -> SignalVector {
        SignalVector {
            date: date(),
            scores: (0..n).map(|i| (format!("S{i:02}"), (n - i) as f64)).collect(),
        }
    }

    fn round_robin_sectors(n: usize, k: usize) -> SectorMap {
        SectorMap::new((0..n).map(|i| (format!("S{i:02}"), format!("X{}", i % k))))
    }

    #[test]
    fn test_effective_counts() {
        assert_eq!(effective_count(10, Regime::Bull), 10);
        assert_eq!(effective_count(10, Regime::Neutral), 8);
        assert_eq!(effective_count(5, Regime::Neutral), 5);
        assert_eq!(effective_count(10, Regime::Bear), 3);
        assert_eq!(effective_count(20, Regime::Bear), 6);
    }

    #[test]
    fn test_inverse_vol_weights() {
        let constructor = PortfolioConstructor::new(ConstructionConfig {
            target_count: 2,
            ..ConstructionConfig::default()
        });
        let market = MarketState {
            ret_1m: BTreeMap::new(),
            vol_60: [("S00".to_string(), 0.1), ("S01".to_string(), 0.3)].into(),
        };
        let sectors = SectorMap::new([("S00", "A"), ("S01", "B")]);
        let loose = PortfolioConstructor::new(ConstructionConfig {
            target_count: 2,
            sector_cap: 1.0,
            ..ConstructionConfig::default()
        });
        let set = loose
            .construct(&signal(4), RegimeState::default(), &market, &sectors, None)
            .unwrap();
        assert_relative_eq!(set.weight("S00"), 0.75, epsilon = 1e-12);
        assert_relative_eq!(set.weight("S01"), 0.25, epsilon = 1e-12);

        let capped = constructor
            .construct(&signal(4), RegimeState::default(), &market, &sectors, None)
            .unwrap();
        assert!(capped.sector_weights(&sectors).values().all(|w| *w <= 0.3 + SECTOR_EPSILON));
    }

    #[test]
    fn test_stop_loss_excludes_and_readmits() {
        let constructor = PortfolioConstructor::default();
        let sectors = round_robin_sectors(20, 5);
        let mut market = MarketState::default();
        market.ret_1m.insert("S00".into(), -0.2);
        let set = constructor
            .construct(&signal(20), RegimeState::default(), &market, &sectors, None)
            .unwrap();
        assert_eq!(set.weight("S00"), 0.0);
        assert!(set.weights.contains_key("S10"));

        // every candidate stopped out: re-admit best first
        let bear = RegimeState::new(Regime::Bear);
        let mut market = MarketState::default();
        for i in 0..6 {
            market.ret_1m.insert(format!("S{i:02}"), -0.5);
        }
        market.ret_1m.remove("S04");
        let set = constructor
            .construct(&signal(20), bear, &market, &sectors, None)
            .unwrap();
        let held: Vec<&str> = set.weights.keys().map(String::as_str).collect();
        assert_eq!(held, vec!["S00", "S01", "S04"]);
    }

    #[test]
    fn test_extreme_bear_cash_reserve() {
        let constructor = PortfolioConstructor::default();
        let sectors = round_robin_sectors(20, 5);
        let market = MarketState::default();
        let calm = constructor
            .construct(&signal(20), RegimeState::new(Regime::Bear), &market, &sectors, Some(30))
            .unwrap();
        let extreme = constructor
            .construct(&signal(20), RegimeState::extreme_bear(), &market, &sectors, Some(30))
            .unwrap();
        assert_relative_eq!(calm.total_weight(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(extreme.total_weight(), 0.7, epsilon = 1e-12);
        for (sym, w) in &calm.weights {
            assert_relative_eq!(extreme.weight(sym), w * 0.7, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_single_sector_clamped_to_cap() {
        let constructor = PortfolioConstructor::default();
        let sectors = SectorMap::new((0..20).map(|i| (format!("S{i:02}"), "Tech")));
        let set = constructor
            .construct(&signal(20), RegimeState::default(), &MarketState::default(), &sectors, None)
            .unwrap();
        assert_eq!(set.len(), 1);
        assert_relative_eq!(set.total_weight(), 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_unmapped_symbols_are_not_sector_capped() {
        let constructor = PortfolioConstructor::default();
        let set = constructor
            .construct(
                &signal(20),
                RegimeState::default(),
                &MarketState::default(),
                &SectorMap::default(),
                None,
            )
            .unwrap();
        assert_eq!(set.len(), 10);
        assert_relative_eq!(set.total_weight(), 1.0, epsilon = 1e-12);
        assert!(set.sector_weights(&SectorMap::default()).is_empty());

        // mapped names are still capped alongside unmapped ones
        let partial = SectorMap::new((0..5).map(|i| (format!("S{i:02}"), "Tech")));
        let set = constructor
            .construct(&signal(20), RegimeState::default(), &MarketState::default(), &partial, None)
            .unwrap();
        assert!(set.sector_weights(&partial)["Tech"] <= 0.3 + SECTOR_EPSILON);
        assert!(set.weights.contains_key("S05"));
    }

    #[test]
    fn test_too_few_scores() {
        let constructor = PortfolioConstructor::default();
        let result = constructor.construct(
            &signal(5),
            RegimeState::default(),
            &MarketState::default(),
            &SectorMap::default(),
            None,
        );
        assert!(matches!(result, Err(VantageError::DataInsufficiency(_))));
    }

    #[test]
    fn test_turnover() {
        let set = PositionSet {
            date: date(),
            weights: [("A".to_string(), 0.5), ("B".to_string(), 0.5)].into(),
            regime: RegimeState::default(),
            effective_count: 2,
        };
        let previous = [("B".to_string(), 0.3), ("C".to_string(), 0.7)].into();
        assert_relative_eq!(set.turnover(&previous), 0.5 + 0.2 + 0.7);
    }

    fn regime_strategy() -> impl Strategy<Value = RegimeState> {
        prop_oneof![
            Just(RegimeState::new(Regime::Bull)),
            Just(RegimeState::new(Regime::Neutral)),
            Just(RegimeState::new(Regime::Bear)),
            Just(RegimeState::extreme_bear()),
        ]
    }

    proptest! {
        #[test]
        fn prop_position_invariants(
            scores in prop::collection::vec(-1.0f64..1.0, 10..40),
            rets in prop::collection::vec(prop::option::of(-0.3f64..0.2), 40),
            vols in prop::collection::vec(prop::option::of(0.0f64..0.8), 40),
            sector_ids in prop::collection::vec(0usize..6, 40),
            target in 3usize..15,
            regime in regime_strategy(),
        ) {
            let n = scores.len();
            let sym = |i: usize| format!("S{i:02}");
            let signal = SignalVector {
                date: date(),
                scores: scores.iter().enumerate().map(|(i, s)| (sym(i), *s)).collect(),
            };
            let mut market = MarketState::default();
            for i in 0..n {
                if let Some(r) = rets[i] { market.ret_1m.insert(sym(i), r); }
                if let Some(v) = vols[i] { market.vol_60.insert(sym(i), v); }
            }
            let sectors = SectorMap::new((0..n).map(|i| (sym(i), format!("X{}", sector_ids[i]))));
            let constructor = PortfolioConstructor::default();
            let effective = effective_count(target, regime.regime);
            prop_assume!(n >= effective);

            let set = constructor.construct(&signal, regime, &market, &sectors, Some(target)).unwrap();
            prop_assert!(set.total_weight() <= 1.0 + 1e-9);
            prop_assert!(set.weights.values().all(|w| *w > 0.0 && *w <= 1.0));
            prop_assert!(set.len() <= effective);
            for w in set.sector_weights(&sectors).values() {
                prop_assert!(*w <= 0.30 + SECTOR_EPSILON);
            }

            let ranked = signal.ranked();
            let pool = (2 * effective).min(ranked.len());
            let survivors = ranked[..pool]
                .iter()
                .filter(|(s, _)| market.ret_1m(s).is_none_or(|r| r >= -0.10))
                .count();
            if survivors >= effective {
                for s in set.weights.keys() {
                    prop_assert!(market.ret_1m(s).is_none_or(|r| r >= -0.10));
                }
            }

            let again = constructor.construct(&signal, regime, &market, &sectors, Some(target)).unwrap();
            prop_assert_eq!(again, set);
        }
    }
}
