//! Common types used throughout the vantage pipeline.
//!
//! This module defines the price panel (the raw `ohlcv` table) and the
//! per-symbol aligned view the factor engine and the risk inputs consume.

use crate::frame::{date_column, date_series, f64_column, f64_series, str_column, str_series};
use crate::{Result, VantageError};
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

// Re-export date type from chrono
pub use chrono::NaiveDate as Date;

/// A market symbol identifier, typically a ticker like "AAPL".
pub type Symbol = String;

/// One OHLCV observation for one symbol on one date.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    /// Trading date.
    pub date: Date,
    /// Security identifier.
    pub symbol: Symbol,
    /// Opening price.
    pub open: Option<f64>,
    /// High price.
    pub high: Option<f64>,
    /// Low price.
    pub low: Option<f64>,
    /// Closing price.
    pub close: Option<f64>,
    /// Traded volume.
    pub volume: Option<f64>,
}

/// OHLCV history of one symbol aligned to the panel's date axis.
///
/// Every vector has the same length as [`PricePanel::dates`]; a `None`
/// marks a date on which the symbol had no observation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolSeries {
    /// Opening prices.
    pub open: Vec<Option<f64>>,
    /// High prices.
    pub high: Vec<Option<f64>>,
    /// Low prices.
    pub low: Vec<Option<f64>>,
    /// Closing prices.
    pub close: Vec<Option<f64>>,
    /// Volumes.
    pub volume: Vec<Option<f64>>,
}

impl SymbolSeries {
    fn with_len(n: usize) -> Self {
        Self {
            open: vec![None; n],
            high: vec![None; n],
            low: vec![None; n],
            close: vec![None; n],
            volume: vec![None; n],
        }
    }

    /// Fraction of dates with a missing close.
    pub fn missing_close_ratio(&self) -> f64 {
        if self.close.is_empty() {
            return 1.0;
        }
        self.close.iter().filter(|c| c.is_none()).count() as f64 / self.close.len() as f64
    }

    /// Carry the last observation forward. Leading gaps stay missing, except
    /// volume, whose leading gaps become zero.
    pub fn forward_filled(&self) -> Self {
        let mut volume = forward_fill(&self.volume);
        for v in &mut volume {
            if v.is_none() {
                *v = Some(0.0);
            }
        }
        Self {
            open: forward_fill(&self.open),
            high: forward_fill(&self.high),
            low: forward_fill(&self.low),
            close: forward_fill(&self.close),
            volume,
        }
    }
}

/// Forward-fill a nullable series. Never back-fills.
pub fn forward_fill(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut last = None;
    values
        .iter()
        .map(|v| {
            if v.is_some() {
                last = *v;
            }
            last
        })
        .collect()
}

/// A (date, symbol) keyed OHLCV panel.
///
/// The date axis is the sorted union of every symbol's trading dates and is
/// strictly increasing. Built once per data refresh, read-only thereafter.
#[derive(Debug, Clone, Default)]
pub struct PricePanel {
    dates: Vec<Date>,
    series: BTreeMap<Symbol, SymbolSeries>,
}

impl PricePanel {
    /// Build a panel from individual bars.
    ///
    /// # Errors
    ///
    /// Returns [`VantageError::InvalidData`] if a (date, symbol) pair occurs twice.
    pub fn from_bars(bars: impl IntoIterator<Item = Bar>) -> Result<Self> {
        let bars: Vec<Bar> = bars.into_iter().collect();
        let dates: Vec<Date> = bars
            .iter()
            .map(|b| b.date)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let index: BTreeMap<Date, usize> = dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();

        let mut series: BTreeMap<Symbol, SymbolSeries> = BTreeMap::new();
        let mut seen: BTreeSet<(Symbol, Date)> = BTreeSet::new();
        for bar in bars {
            if !seen.insert((bar.symbol.clone(), bar.date)) {
                return Err(VantageError::InvalidData(format!(
                    "duplicate bar for {} on {}",
                    bar.symbol, bar.date
                )));
            }
            let i = index[&bar.date];
            let s = series
                .entry(bar.symbol.clone())
                .or_insert_with(|| SymbolSeries::with_len(dates.len()));
            s.open[i] = bar.open;
            s.high[i] = bar.high;
            s.low[i] = bar.low;
            s.close[i] = bar.close;
            s.volume[i] = bar.volume;
        }

        Ok(Self { dates, series })
    }

    /// Build a panel from a long `ohlcv` table with columns
    /// `date, symbol, open, high, low, close, volume`.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let dates = date_column(df, "date")?;
        let symbols = str_column(df, "symbol")?;
        let open = f64_column(df, "open")?;
        let high = f64_column(df, "high")?;
        let low = f64_column(df, "low")?;
        let close = f64_column(df, "close")?;
        let volume = f64_column(df, "volume")?;

        let bars = (0..df.height()).filter_map(|i| {
            Some(Bar {
                date: dates[i]?,
                symbol: symbols[i].clone()?,
                open: open[i],
                high: high[i],
                low: low[i],
                close: close[i],
                volume: volume[i],
            })
        });
        Self::from_bars(bars)
    }

    /// Convert back to a long `ohlcv` table, skipping dates where the symbol
    /// has no observation at all.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut dates = Vec::new();
        let mut symbols = Vec::new();
        let (mut open, mut high, mut low, mut close, mut volume) =
            (Vec::new(), Vec::new(), Vec::new(), Vec::new(), Vec::new());

        for (symbol, s) in &self.series {
            for (i, date) in self.dates.iter().enumerate() {
                if s.open[i].is_none() && s.close[i].is_none() && s.volume[i].is_none() {
                    continue;
                }
                dates.push(*date);
                symbols.push(symbol.clone());
                open.push(s.open[i]);
                high.push(s.high[i]);
                low.push(s.low[i]);
                close.push(s.close[i]);
                volume.push(s.volume[i]);
            }
        }

        Ok(DataFrame::new(vec![
            date_series("date", &dates)?,
            str_series("symbol", &symbols),
            f64_series("open", &open),
            f64_series("high", &high),
            f64_series("low", &low),
            f64_series("close", &close),
            f64_series("volume", &volume),
        ])?)
    }

    /// The panel's strictly increasing date axis.
    pub fn dates(&self) -> &[Date] {
        &self.dates
    }

    /// Symbols in sorted order.
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.series.keys()
    }

    /// Number of symbols.
    pub fn n_symbols(&self) -> usize {
        self.series.len()
    }

    /// Returns whether the panel has no symbols.
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// The aligned series of one symbol.
    pub fn series(&self, symbol: &str) -> Option<&SymbolSeries> {
        self.series.get(symbol)
    }

    /// Iterate over `(symbol, series)` pairs in symbol order.
    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &SymbolSeries)> {
        self.series.iter()
    }

    /// Keep only the symbols for which `keep` returns true.
    pub fn retain(&self, mut keep: impl FnMut(&str, &SymbolSeries) -> bool) -> Self {
        Self {
            dates: self.dates.clone(),
            series: self
                .series
                .iter()
                .filter(|(sym, s)| keep(sym, s))
                .map(|(sym, s)| (sym.clone(), s.clone()))
                .collect(),
        }
    }

    /// Forward-fill every symbol along the date axis.
    pub fn forward_filled(&self) -> Self {
        Self {
            dates: self.dates.clone(),
            series: self
                .series
                .iter()
                .map(|(sym, s)| (sym.clone(), s.forward_filled()))
                .collect(),
        }
    }

    /// Simple close-to-close return of `symbol` at date index `i`, if both
    /// closes exist.
    pub fn close_return(&self, symbol: &str, i: usize) -> Option<f64> {
        if i == 0 {
            return None;
        }
        let s = self.series.get(symbol)?;
        let (prev, cur) = (s.close[i - 1]?, s.close[i]?);
        (prev != 0.0).then(|| cur / prev - 1.0)
    }
}
