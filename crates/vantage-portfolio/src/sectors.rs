//! Symbol to sector lookup (the `sectors` table).

use polars::prelude::DataFrame;
use std::collections::BTreeMap;
use vantage_traits::frame::{str_column, str_series};
use vantage_traits::{Result, Symbol};

/// Frozen symbol to sector assignment shared by the backtest and live paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectorMap {
    sectors: BTreeMap<Symbol, String>,
}

impl SectorMap {
    /// Build from `(symbol, sector)` pairs. Later pairs win.
    pub fn new<S: Into<String>, T: Into<String>>(pairs: impl IntoIterator<Item = (S, T)>) -> Self {
        Self {
            sectors: pairs
                .into_iter()
                .map(|(s, t)| (s.into(), t.into()))
                .collect(),
        }
    }

    /// Read a `symbol, sector` table. Rows with a null symbol or sector are
    /// ignored, leaving those symbols unmapped.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let symbols = str_column(df, "symbol")?;
        let sectors = str_column(df, "sector")?;
        Ok(Self::new(symbols.into_iter().zip(sectors).filter_map(
            |(sym, sector)| Some((sym?, sector?)),
        )))
    }

    /// Write as a `symbol, sector` table.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let symbols: Vec<String> = self.sectors.keys().cloned().collect();
        let sectors: Vec<String> = self.sectors.values().cloned().collect();
        Ok(DataFrame::new(vec![
            str_series("symbol", &symbols),
            str_series("sector", &sectors),
        ])?)
    }

    /// Sector of `symbol`, `None` if unmapped.
    ///
    /// Unmapped symbols belong to no sector and are not subject to the
    /// sector cap.
    pub fn sector_of(&self, symbol: &str) -> Option<&str> {
        self.sectors.get(symbol).map(String::as_str)
    }

    /// Number of mapped symbols.
    pub fn len(&self) -> usize {
        self.sectors.len()
    }

    /// Returns whether no symbol is mapped.
    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }
}
