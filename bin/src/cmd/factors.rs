//! Factor computation and feature selection.

use super::{Format, banner, fmt_stat, print_json};
use anyhow::Result;
use vantage::Pipeline;
use vantage::factors::available_factors;

pub(crate) fn list(format: Format) -> Result<()> {
    let factors = available_factors();
    if format == Format::Json {
        return print_json(&factors);
    }

    banner("FACTOR CATALOGUE");
    println!("{:<16} {:<12} {:>8}  Description", "Factor", "Category", "Lookback");
    println!("{}", "-".repeat(90));
    for info in &factors {
        println!(
            "{:<16} {:<12} {:>8}  {}",
            info.name,
            format!("{:?}", info.category),
            info.lookback,
            info.category.description()
        );
    }
    println!("\n{} factors", factors.len());
    Ok(())
}

pub(crate) fn run(pipeline: &Pipeline, format: Format) -> Result<()> {
    let stage = pipeline.run_factors()?;
    if format == Format::Json {
        return print_json(&serde_json::json!({
            "report": stage.report,
            "selection": stage.selection,
        }));
    }

    let report = &stage.report;
    let selection = &stage.selection;
    banner("FACTOR STAGE");
    println!("Input symbols:     {}", report.n_input);
    println!("Computed symbols:  {}", report.n_computed);
    println!("Excluded (gaps):   {}", report.excluded_missing.len());
    println!("Skipped (history): {}", report.skipped.len());
    for (symbol, reason) in &report.failed {
        println!("  failed {symbol}: {reason}");
    }
    if let Some((first, last)) = selection.date_range {
        println!("Date range:        {first} to {last}");
    }

    println!("\n{:<16} {:>9} {:>9} {:>9} {:>8}", "Feature", "Mean IC", "IC IR", "VIF", "Dates");
    println!("{}", "-".repeat(56));
    for name in &selection.selected_features {
        let ic = selection.ic_summary.get(name);
        let vif = selection.vif_summary.get(name).copied().unwrap_or(f64::NAN);
        println!(
            "{:<16} {:>9} {:>9} {:>9} {:>8}",
            name,
            ic.map_or_else(|| "-".to_string(), |s| fmt_stat(s.mean_ic, 4)),
            ic.map_or_else(|| "-".to_string(), |s| fmt_stat(s.ic_ir, 2)),
            fmt_stat(vif, 2),
            ic.map_or(0, |s| s.n_dates),
        );
    }
    if selection.degraded {
        println!("\nSelection was backfilled past the filters.");
    }
    Ok(())
}
