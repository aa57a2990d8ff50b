//! Vantage CLI binary.
//!
//! Runs the pipeline stages against the configured table store and model
//! registry. Configuration comes from `VANTAGE_*` environment variables (or a
//! `.env` file); global flags override them.

mod cmd;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use cmd::Format;
use std::path::PathBuf;
use std::process;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use vantage::{Pipeline, VantageConfig};

#[derive(Parser)]
#[command(name = "vantage")]
#[command(about = "Factor-based machine-learned equity portfolio", long_about = None)]
#[command(version)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    /// Storage backend (parquet or memory)
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Directory of tables and documents
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Root of the model registry
    #[arg(long, global = true)]
    models_dir: Option<PathBuf>,

    /// Signal blend mode (ml, rule or blend)
    #[arg(long, global = true)]
    mode: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute factors and select features
    Factors {
        /// Only list the factor catalogue
        #[arg(long)]
        list: bool,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Walk-forward training; publishes a new model bundle
    Train {
        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Show the latest signal
    Signals {
        /// Number of symbols to show
        #[arg(short = 'n', long, default_value = "20")]
        top: usize,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Backtest the strategy
    Backtest {
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,

        /// Target number of positions
        #[arg(long)]
        top_n: Option<usize>,

        /// Weight of the model rank
        #[arg(long)]
        ml_weight: Option<f64>,

        /// Weight of the rule rank
        #[arg(long)]
        rule_weight: Option<f64>,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Sweep blend weights and position counts
    Sweep {
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,

        /// Position count of the 2-D grid
        #[arg(long)]
        top_n: Option<usize>,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Target positions as of the latest bar
    Portfolio {
        /// Target number of positions
        #[arg(short, long, default_value = "10")]
        count: usize,

        /// JSON file of `{symbol: score}` sentiment scores
        #[arg(long)]
        sentiment: Option<PathBuf>,

        /// Weight of the sentiment rank, in [0, 1]
        #[arg(long, default_value = "0.2")]
        sentiment_weight: f64,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// List published model bundles
    Registry {
        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.json);
    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}', expected YYYY-MM-DD"))
}

fn load_config(cli: &Cli) -> Result<VantageConfig> {
    let mut config = VantageConfig::from_env()?;
    if let Some(backend) = &cli.backend {
        config.storage_backend = backend.parse()?;
    }
    if let Some(dir) = &cli.data_dir {
        config.data_dir.clone_from(dir);
    }
    if let Some(dir) = &cli.models_dir {
        config.checkpoint_dir = dir.join("checkpoints");
        config.models_dir.clone_from(dir);
    }
    if let Some(mode) = &cli.mode {
        config.blend_mode = mode.parse()?;
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(&cli)?;
    debug!(
        backend = %config.storage_backend,
        data_dir = %config.data_dir.display(),
        mode = %config.blend_mode,
        "configuration loaded"
    );

    match cli.command {
        Commands::Factors { list: true, format } => cmd::factors::list(format),
        Commands::Factors { list: false, format } => {
            cmd::factors::run(&Pipeline::from_config(config)?, format)
        }
        Commands::Train { format } => {
            cmd::train::run(&Pipeline::from_config(config)?, Utc::now(), format)
        }
        Commands::Signals { top, format } => {
            cmd::signals::run(&Pipeline::from_config(config)?, top, format)
        }
        Commands::Backtest {
            start,
            top_n,
            ml_weight,
            rule_weight,
            format,
        } => {
            if let Some(start) = start {
                config.backtest.start_date = parse_date(&start)?;
            }
            if let Some(n) = top_n {
                config.backtest.top_n = n;
            }
            if let Some(w) = ml_weight {
                config.backtest.weights.ml = w;
            }
            if let Some(w) = rule_weight {
                config.backtest.weights.rule = w;
            }
            cmd::backtest::run(&Pipeline::from_config(config)?, format)
        }
        Commands::Sweep { start, top_n, format } => {
            if let Some(start) = start {
                config.backtest.start_date = parse_date(&start)?;
            }
            if let Some(n) = top_n {
                config.sweep.top_n = n;
            }
            cmd::sweep::run(&Pipeline::from_config(config)?, format)
        }
        Commands::Portfolio {
            count,
            sentiment,
            sentiment_weight,
            format,
        } => cmd::portfolio::run(
            &Pipeline::from_config(config)?,
            count,
            sentiment.as_deref(),
            sentiment_weight,
            format,
        ),
        Commands::Registry { format } => cmd::registry::run(&Pipeline::from_config(config)?, format),
    }
}
