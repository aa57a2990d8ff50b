//! Polars column helpers shared by the panel conversions and the stores.
//!
//! Tables cross crate boundaries as Polars `DataFrame`s; the pipeline itself
//! works on plain vectors. These helpers are the only place that knows how
//! dates are physically encoded (days since the Unix epoch).

use crate::{Date, Result, VantageError};
use chrono::Datelike;
use polars::prelude::*;

/// Days between 0001-01-01 (CE day 1) and 1970-01-01.
pub const CE_TO_UNIX_EPOCH_DAYS: i32 = 719_163;

/// Convert a calendar date to Polars' physical date representation.
pub fn date_to_days(date: Date) -> i32 {
    date.num_days_from_ce() - CE_TO_UNIX_EPOCH_DAYS
}

/// Convert Polars' physical date representation back to a calendar date.
pub fn days_to_date(days: i32) -> Option<Date> {
    Date::from_num_days_from_ce_opt(days + CE_TO_UNIX_EPOCH_DAYS)
}

fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(Column::as_materialized_series)
        .map_err(|_| VantageError::MissingColumn(name.to_string()))
}

/// Read a date column. Accepts `Date`, `Datetime` and `YYYY-MM-DD` strings.
pub fn date_column(df: &DataFrame, name: &str) -> Result<Vec<Option<Date>>> {
    let series = column(df, name)?;
    match series.dtype() {
        DataType::Date => Ok(series
            .date()?
            .into_iter()
            .map(|d: Option<i32>| d.and_then(days_to_date))
            .collect()),
        DataType::Datetime(_, _) => {
            let cast = series.cast(&DataType::Date)?;
            Ok(cast
                .date()?
                .into_iter()
                .map(|d: Option<i32>| d.and_then(days_to_date))
                .collect())
        }
        DataType::String => series
            .str()?
            .into_iter()
            .map(|s: Option<&str>| {
                s.map(|s| {
                    Date::parse_from_str(s, "%Y-%m-%d").map_err(|e| {
                        VantageError::InvalidData(format!("bad date '{s}' in {name}: {e}"))
                    })
                })
                .transpose()
            })
            .collect(),
        other => Err(VantageError::InvalidData(format!(
            "column {name} has dtype {other}, expected a date"
        ))),
    }
}

/// Read a numeric column as `f64`, preserving nulls. NaN is treated as null.
pub fn f64_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = column(df, name)?.cast(&DataType::Float64)?;
    Ok(series
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

/// Read a string column.
pub fn str_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = column(df, name)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|s: Option<&str>| s.map(str::to_string))
        .collect())
}

/// Build a `Date` typed column.
pub fn date_series(name: &str, dates: &[Date]) -> Result<Column> {
    let days: Vec<i32> = dates.iter().copied().map(date_to_days).collect();
    let series = Series::new(name.into(), days).cast(&DataType::Date)?;
    Ok(series.into())
}

/// Build a nullable `Float64` column.
pub fn f64_series(name: &str, values: &[Option<f64>]) -> Column {
    Series::new(name.into(), values).into()
}

/// Build a `String` column.
pub fn str_series(name: &str, values: &[String]) -> Column {
    Series::new(name.into(), values).into()
}

/// Returns the year-month pair of a date, used for calendar-month boundaries.
pub fn year_month(date: Date) -> (i32, u32) {
    (date.year(), date.month())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_epoch_roundtrip_anchor() {
        assert_eq!(date_to_days(d(1970, 1, 1)), 0);
        assert_eq!(days_to_date(1), Some(d(1970, 1, 2)));
    }

    #[test]
    fn test_date_column_from_date_dtype() {
        let dates = vec![d(2024, 1, 2), d(2024, 1, 3)];
        let df = DataFrame::new(vec![date_series("date", &dates).unwrap()]).unwrap();
        let parsed = date_column(&df, "date").unwrap();
        assert_eq!(parsed, vec![Some(dates[0]), Some(dates[1])]);
    }

    #[test]
    fn test_date_column_from_strings() {
        let df = df! { "date" => &["2024-01-02", "2024-02-29"] }.unwrap();
        let parsed = date_column(&df, "date").unwrap();
        assert_eq!(parsed[1], Some(d(2024, 2, 29)));
    }

    #[test]
    fn test_f64_column_nulls_and_nan() {
        let df = DataFrame::new(vec![f64_series("x", &[Some(1.0), None, Some(f64::NAN)])]).unwrap();
        let values = f64_column(&df, "x").unwrap();
        assert_eq!(values, vec![Some(1.0), None, None]);
    }

    #[test]
    fn test_missing_column() {
        let df = df! { "a" => &[1.0] }.unwrap();
        assert!(matches!(
            f64_column(&df, "close"),
            Err(VantageError::MissingColumn(_))
        ));
    }
}
