//! Model registry history.

use super::{Format, banner, fmt_stat, print_json};
use anyhow::Result;
use vantage::Pipeline;

pub(crate) fn run(pipeline: &Pipeline, format: Format) -> Result<()> {
    let history = pipeline.registry_history()?;
    if format == Format::Json {
        return print_json(&history);
    }

    banner("MODEL REGISTRY");
    if history.is_empty() {
        println!("No bundles published.");
        return Ok(());
    }
    println!(
        "{:<28} {:<20} {:>6} {:>9}  Ensemble",
        "Version", "Trained at", "Steps", "Avg IC"
    );
    println!("{}", "-".repeat(90));
    for meta in &history {
        let ensemble = meta
            .ensemble
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "{:<28} {:<20} {:>6} {:>9}  {}",
            meta.version,
            meta.trained_at.format("%Y-%m-%d %H:%M:%S"),
            meta.wf_steps,
            fmt_stat(meta.avg_ensemble_ic, 4),
            ensemble
        );
    }
    Ok(())
}
