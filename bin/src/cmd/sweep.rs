//! Parameter sweep.

use super::{Format, banner, fmt_stat, print_json};
use anyhow::Result;
use vantage::Pipeline;

pub(crate) fn run(pipeline: &Pipeline, format: Format) -> Result<()> {
    let rows = pipeline.run_sweep()?;
    if format == Format::Json {
        return print_json(&rows);
    }

    banner("PARAMETER SWEEP");
    println!(
        "{:>6} {:>6} {:>6} {:>8} {:>9} {:>9}",
        "ML", "Rule", "Top N", "Sharpe", "CAGR %", "MDD %"
    );
    println!("{}", "-".repeat(49));
    for row in &rows {
        println!(
            "{:>6.2} {:>6.2} {:>6} {:>8} {:>9} {:>9}",
            row.ml_weight,
            row.rule_weight,
            row.top_n,
            fmt_stat(row.sharpe, 2),
            fmt_stat(row.cagr * 100.0, 2),
            fmt_stat(row.mdd * 100.0, 2),
        );
    }

    if let Some(best) = rows
        .iter()
        .filter(|r| r.sharpe.is_finite())
        .max_by(|a, b| a.sharpe.total_cmp(&b.sharpe))
    {
        println!(
            "\nBest Sharpe {:.2} at ml {:.2} / rule {:.2}, top {}",
            best.sharpe, best.ml_weight, best.rule_weight, best.top_n
        );
    }
    Ok(())
}
