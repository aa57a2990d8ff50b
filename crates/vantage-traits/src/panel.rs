//! The factor panel: one row per (date, symbol) with a value per factor.

use crate::frame::{date_column, date_series, f64_column, f64_series, str_column, str_series};
use crate::{Date, Result, Symbol, VantageError};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::ops::Range;

/// Column name of the next-period return label.
pub const TARGET_NEXT: &str = "target_next";
/// Column name of the smoothed diagnostic target.
pub const TARGET_SMOOTH: &str = "target_smooth";

/// One (date, symbol) row of a [`FactorPanel`].
#[derive(Debug, Clone, PartialEq)]
pub struct FactorRow {
    /// Observation date.
    pub date: Date,
    /// Security identifier.
    pub symbol: Symbol,
    /// Factor values, aligned with [`FactorPanel::columns`].
    pub values: Vec<Option<f64>>,
    /// Next-period return.
    pub target_next: Option<f64>,
    /// Five-period rolling mean of `target_next`.
    pub target_smooth: Option<f64>,
}

/// A long (date, symbol) keyed factor table, sorted by date then symbol.
#[derive(Debug, Clone, Default)]
pub struct FactorPanel {
    columns: Vec<String>,
    rows: Vec<FactorRow>,
}

/// Design matrix extracted from a panel.
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    /// Feature values, one row per kept panel row.
    pub x: Array2<f64>,
    /// Label values.
    pub y: Array1<f64>,
    /// Indices of the kept rows in the source panel.
    pub rows: Vec<usize>,
}

impl FactorPanel {
    /// Create a panel. Rows are sorted by (date, symbol).
    ///
    /// # Errors
    ///
    /// Returns [`VantageError::InvalidData`] if a row's width does not match
    /// the column count or a target name is used as a factor column.
    pub fn new(columns: Vec<String>, mut rows: Vec<FactorRow>) -> Result<Self> {
        if let Some(target) = columns
            .iter()
            .find(|c| matches!(c.as_str(), TARGET_NEXT | TARGET_SMOOTH))
        {
            return Err(VantageError::InvalidData(format!(
                "{target} is a target and cannot be a factor column"
            )));
        }
        if let Some(bad) = rows.iter().find(|r| r.values.len() != columns.len()) {
            return Err(VantageError::InvalidData(format!(
                "row {} {} has {} values for {} columns",
                bad.date,
                bad.symbol,
                bad.values.len(),
                columns.len()
            )));
        }
        rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.symbol.cmp(&b.symbol)));
        Ok(Self { columns, rows })
    }

    /// Factor column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All rows, sorted by (date, symbol).
    pub fn rows(&self) -> &[FactorRow] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns whether the panel has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a factor column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of one factor column, in row order.
    pub fn column(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| VantageError::MissingColumn(name.to_string()))?;
        Ok(self.rows.iter().map(|r| r.values[idx]).collect())
    }

    /// Value of a factor in a single row, `None` if the column is absent or null.
    pub fn value(&self, row: usize, name: &str) -> Option<f64> {
        let idx = self.column_index(name)?;
        self.rows.get(row)?.values[idx]
    }

    /// Distinct dates in ascending order.
    pub fn dates(&self) -> Vec<Date> {
        let mut dates: Vec<Date> = self.rows.iter().map(|r| r.date).collect();
        dates.dedup();
        dates
    }

    /// Distinct dates with the row range each occupies.
    pub fn date_groups(&self) -> Vec<(Date, Range<usize>)> {
        let mut groups = Vec::new();
        let mut start = 0;
        while start < self.rows.len() {
            let date = self.rows[start].date;
            let end = start + self.rows[start..].partition_point(|r| r.date == date);
            groups.push((date, start..end));
            start = end;
        }
        groups
    }

    /// Row range for one date (empty if the date is absent).
    pub fn date_range_of(&self, date: Date) -> Range<usize> {
        let start = self.rows.partition_point(|r| r.date < date);
        let end = self.rows.partition_point(|r| r.date <= date);
        start..end
    }

    /// Rows observed on one date.
    pub fn cross_section(&self, date: Date) -> &[FactorRow] {
        &self.rows[self.date_range_of(date)]
    }

    /// Last date in the panel.
    pub fn last_date(&self) -> Option<Date> {
        self.rows.last().map(|r| r.date)
    }

    /// Sub-panel of the dates in `[start, end]`.
    pub fn between(&self, start: Date, end: Date) -> Self {
        let lo = self.rows.partition_point(|r| r.date < start);
        let hi = self.rows.partition_point(|r| r.date <= end);
        Self {
            columns: self.columns.clone(),
            rows: self.rows[lo..hi.max(lo)].to_vec(),
        }
    }

    /// Sub-panel of a single date.
    pub fn at(&self, date: Date) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: self.cross_section(date).to_vec(),
        }
    }

    /// Project onto a subset of factor columns, in the given order.
    pub fn select<S: AsRef<str>>(&self, features: &[S]) -> Result<Self> {
        let idx: Vec<usize> = features
            .iter()
            .map(|f| {
                self.column_index(f.as_ref())
                    .ok_or_else(|| VantageError::MissingColumn(f.as_ref().to_string()))
            })
            .collect::<Result<_>>()?;
        let rows = self
            .rows
            .iter()
            .map(|r| FactorRow {
                date: r.date,
                symbol: r.symbol.clone(),
                values: idx.iter().map(|&i| r.values[i]).collect(),
                target_next: r.target_next,
                target_smooth: r.target_smooth,
            })
            .collect();
        Ok(Self {
            columns: features.iter().map(|f| f.as_ref().to_string()).collect(),
            rows,
        })
    }

    /// Drop rows without a next-period label.
    pub fn labelled(&self) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|r| r.target_next.is_some())
                .cloned()
                .collect(),
        }
    }

    /// Build a training matrix over `features` against `target_next`, keeping
    /// only rows where every feature and the label are present.
    ///
    /// `target_smooth` is never a label and, since it cannot be a factor
    /// column, never a feature either.
    pub fn design_matrix<S: AsRef<str>>(&self, features: &[S]) -> Result<DesignMatrix> {
        let idx = self.indices(features)?;
        let mut data = Vec::new();
        let mut y = Vec::new();
        let mut kept = Vec::new();
        for (i, row) in self.rows.iter().enumerate() {
            let Some(label) = row.target_next else { continue };
            let values: Option<Vec<f64>> = idx.iter().map(|&j| row.values[j]).collect();
            let Some(values) = values else { continue };
            data.extend(values);
            y.push(label);
            kept.push(i);
        }
        let x = Array2::from_shape_vec((kept.len(), idx.len()), data)
            .map_err(|e| VantageError::InvalidData(e.to_string()))?;
        Ok(DesignMatrix {
            x,
            y: Array1::from_vec(y),
            rows: kept,
        })
    }

    /// Feature matrix for inference over every row; nulls become zero.
    pub fn feature_matrix<S: AsRef<str>>(&self, features: &[S]) -> Result<Array2<f64>> {
        let idx = self.indices(features)?;
        let data: Vec<f64> = self
            .rows
            .iter()
            .flat_map(|row| idx.iter().map(|&j| row.values[j].unwrap_or(0.0)))
            .collect();
        Array2::from_shape_vec((self.rows.len(), idx.len()), data)
            .map_err(|e| VantageError::InvalidData(e.to_string()))
    }

    fn indices<S: AsRef<str>>(&self, features: &[S]) -> Result<Vec<usize>> {
        features
            .iter()
            .map(|f| {
                self.column_index(f.as_ref())
                    .ok_or_else(|| VantageError::MissingColumn(f.as_ref().to_string()))
            })
            .collect()
    }

    /// Convert to a polars table with columns `date, symbol, <factors>,
    /// target_next, target_smooth`.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let dates: Vec<Date> = self.rows.iter().map(|r| r.date).collect();
        let symbols: Vec<String> = self.rows.iter().map(|r| r.symbol.clone()).collect();
        let mut columns = vec![date_series("date", &dates)?, str_series("symbol", &symbols)];
        for (j, name) in self.columns.iter().enumerate() {
            let values: Vec<Option<f64>> = self.rows.iter().map(|r| r.values[j]).collect();
            columns.push(f64_series(name, &values));
        }
        let next: Vec<Option<f64>> = self.rows.iter().map(|r| r.target_next).collect();
        let smooth: Vec<Option<f64>> = self.rows.iter().map(|r| r.target_smooth).collect();
        columns.push(f64_series(TARGET_NEXT, &next));
        columns.push(f64_series(TARGET_SMOOTH, &smooth));
        Ok(DataFrame::new(columns)?)
    }

    /// Read a table written by [`FactorPanel::to_dataframe`]. Every column
    /// other than the keys and targets is a factor. Missing target columns
    /// read as null.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let dates = date_column(df, "date")?;
        let symbols = str_column(df, "symbol")?;
        let names: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|n| n.to_string())
            .filter(|n| !matches!(n.as_str(), "date" | "symbol" | TARGET_NEXT | TARGET_SMOOTH))
            .collect();
        let values: Vec<Vec<Option<f64>>> = names
            .iter()
            .map(|n| f64_column(df, n))
            .collect::<Result<_>>()?;
        let optional = |name: &str| -> Result<Vec<Option<f64>>> {
            match f64_column(df, name) {
                Err(VantageError::MissingColumn(_)) => Ok(vec![None; df.height()]),
                other => other,
            }
        };
        let next = optional(TARGET_NEXT)?;
        let smooth = optional(TARGET_SMOOTH)?;

        let rows = (0..df.height())
            .filter_map(|i| {
                Some(FactorRow {
                    date: dates[i]?,
                    symbol: symbols[i].clone()?,
                    values: values.iter().map(|col| col[i]).collect(),
                    target_next: next[i],
                    target_smooth: smooth[i],
                })
            })
            .collect();
        Self::new(names, rows)
    }
}
