//! Latest signal.

use super::{Format, banner, print_json};
use anyhow::Result;
use vantage::Pipeline;

pub(crate) fn run(pipeline: &Pipeline, top: usize, format: Format) -> Result<()> {
    let snapshot = pipeline.refresh_live()?;
    let Some(signal) = &snapshot.signal else {
        if format == Format::Json {
            return print_json(&serde_json::json!({
                "date": snapshot.date,
                "regime": snapshot.regime,
                "signal": null,
            }));
        }
        println!("No signal for {}: no model bundle is published.", snapshot.date);
        return Ok(());
    };

    let ranked = signal.ranked();
    if format == Format::Json {
        let rows: Vec<_> = ranked
            .iter()
            .take(top)
            .map(|(symbol, score)| serde_json::json!({ "symbol": symbol, "score": score }))
            .collect();
        return print_json(&serde_json::json!({
            "date": snapshot.date,
            "regime": snapshot.regime,
            "signal": rows,
        }));
    }

    banner(&format!("SIGNAL {}", snapshot.date));
    let extreme = if snapshot.regime.extreme { " (extreme)" } else { "" };
    println!("Regime: {}{extreme}", snapshot.regime.regime);
    println!("Scored symbols: {}\n", signal.len());
    println!("{:>4}  {:<10} {:>10}", "Rank", "Symbol", "Score");
    println!("{}", "-".repeat(28));
    for (i, (symbol, score)) in ranked.iter().take(top).enumerate() {
        println!("{:>4}  {:<10} {:>10.4}", i + 1, symbol, score);
    }
    Ok(())
}
