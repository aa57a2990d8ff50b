//! CLI subcommand modules.
//!
//! This module contains the implementations for all vantage CLI subcommands.

pub(crate) mod backtest;
pub(crate) mod factors;
pub(crate) mod portfolio;
pub(crate) mod registry;
pub(crate) mod signals;
pub(crate) mod sweep;
pub(crate) mod train;

use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

/// Output format of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum Format {
    /// Human-readable tables
    Text,
    /// Pretty-printed JSON on stdout
    Json,
}

/// Print a boxed section title.
pub(crate) fn banner(title: &str) {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║{title:^62}║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Format a possibly undefined statistic.
pub(crate) fn fmt_stat(v: f64, precision: usize) -> String {
    if v.is_finite() {
        format!("{v:.precision$}")
    } else {
        "-".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_stat() {
        assert_eq!(fmt_stat(0.123_456, 3), "0.123");
        assert_eq!(fmt_stat(-1.5, 1), "-1.5");
        assert_eq!(fmt_stat(f64::NAN, 4), "-");
        assert_eq!(fmt_stat(f64::INFINITY, 2), "-");
    }
}
