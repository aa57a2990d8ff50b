//! Strategy backtest.

use super::{Format, banner, fmt_stat, print_json};
use anyhow::Result;
use vantage::Pipeline;

pub(crate) fn run(pipeline: &Pipeline, format: Format) -> Result<()> {
    let result = pipeline.run_backtest()?;
    let summary = result.summary();
    if format == Format::Json {
        return print_json(&summary);
    }

    let config = &pipeline.config().backtest;
    let m = &summary.metrics;
    banner("BACKTEST RESULTS");
    if let (Some(start), Some(end)) = (summary.start, summary.end) {
        println!("Period:          {start} to {end} ({} days)", m.n_days);
    }
    println!(
        "Blend:           ml {:.2} / rule {:.2}, top {}",
        config.weights.ml, config.weights.rule, config.top_n
    );
    println!();
    println!("Total return:    {:>9}%", fmt_stat(m.total_return * 100.0, 2));
    println!("CAGR:            {:>9}%", fmt_stat(m.cagr * 100.0, 2));
    println!("Sharpe:          {:>9}", fmt_stat(m.sharpe, 2));
    println!("Max drawdown:    {:>9}%", fmt_stat(m.max_drawdown * 100.0, 2));
    println!("Win rate:        {:>9}%", fmt_stat(m.win_rate * 100.0, 1));
    println!();
    println!("Rebalances:      {:>9}", summary.n_rebalances);
    println!("Turnover:        {:>9.2}", summary.total_turnover);
    println!("Costs:           {:>9}%", fmt_stat(summary.total_cost * 100.0, 3));
    if let Some(bench) = summary.benchmark_total_return {
        println!("Benchmark:       {:>9}%", fmt_stat(bench * 100.0, 2));
    }

    if !result.final_weights.is_empty() {
        println!("\nFinal holdings:");
        for (symbol, weight) in &result.final_weights {
            println!("  {symbol:<10} {:>6.2}%", weight * 100.0);
        }
    }
    Ok(())
}
