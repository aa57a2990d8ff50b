//! Live target portfolio.

use super::{Format, banner, print_json};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use vantage::{Pipeline, Symbol};

fn read_sentiment(path: &Path) -> Result<BTreeMap<Symbol, f64>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read sentiment file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("failed to parse sentiment file {}", path.display()))
}

pub(crate) fn run(
    pipeline: &Pipeline,
    count: usize,
    sentiment: Option<&Path>,
    sentiment_weight: f64,
    format: Format,
) -> Result<()> {
    let sentiment = sentiment
        .map(|path| read_sentiment(path).map(|scores| (sentiment_weight, scores)))
        .transpose()?;
    let positions = pipeline.get_portfolio(count, sentiment)?;
    if format == Format::Json {
        return print_json(&positions);
    }

    banner(&format!("PORTFOLIO {}", positions.date));
    let extreme = if positions.regime.extreme { " (extreme)" } else { "" };
    println!("Regime:          {}{extreme}", positions.regime.regime);
    println!("Effective count: {}", positions.effective_count);
    if positions.weights.is_empty() {
        println!("\nAll cash.");
        return Ok(());
    }

    let mut ranked: Vec<_> = positions.weights.iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(a.1));
    println!("\n{:<10} {:>8}", "Symbol", "Weight");
    println!("{}", "-".repeat(19));
    for (symbol, weight) in &ranked {
        println!("{symbol:<10} {:>7.2}%", *weight * 100.0);
    }
    let invested: f64 = positions.weights.values().sum();
    println!("{}", "-".repeat(19));
    println!("{:<10} {:>7.2}%", "Cash", (1.0 - invested).max(0.0) * 100.0);
    Ok(())
}
