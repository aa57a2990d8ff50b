//! Walk-forward training.

use super::{Format, banner, fmt_stat, print_json};
use anyhow::Result;
use chrono::{DateTime, Utc};
use vantage::Pipeline;

pub(crate) fn run(pipeline: &Pipeline, trained_at: DateTime<Utc>, format: Format) -> Result<()> {
    let stage = pipeline.run_training(trained_at)?;
    let report = &stage.report;
    if format == Format::Json {
        return print_json(&serde_json::json!({
            "version": stage.version,
            "meta": report.bundle.meta,
            "windows": report.windows,
            "skipped_windows": report.skipped_windows,
            "resumed": report.resumed,
        }));
    }

    banner("WALK-FORWARD TRAINING");
    println!(
        "{:>4}  {:<23}  {:<23}  {:>9}  {:>7}  Top models",
        "#", "Train", "Validation", "Ens. IC", "Rows"
    );
    println!("{}", "-".repeat(92));
    for w in &report.windows {
        let top = w
            .top2_models
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "{:>4}  {} {}  {} {}  {:>9}  {:>7}  {}",
            w.window.index,
            w.window.train_start,
            w.window.train_end,
            w.window.validation_start,
            w.window.validation_end,
            fmt_stat(w.ensemble_ic, 4),
            w.n_train,
            top
        );
    }
    for (index, reason) in &report.skipped_windows {
        println!("{index:>4}  skipped: {reason}");
    }

    let meta = &report.bundle.meta;
    println!("\nPublished version: {}", stage.version);
    println!("Features:          {}", meta.features.join(", "));
    println!(
        "Ensemble:          {}",
        meta.ensemble.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    );
    println!("Average IC:        {}", fmt_stat(meta.avg_ensemble_ic, 4));
    println!("Windows resumed:   {}", report.resumed);
    Ok(())
}
