//! ReplayLab CLI: indicator and replay commands.
//!
//! Commands:
//! - `indicators`: aggregate a bar CSV and print the indicator series as JSON
//! - `replay`: run a backtest with a scripted order plan and print the report

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use replaylab_core::config::ReplayConfig;
use replaylab_core::engine::{BacktestCoordinator, OrderPlan, ScriptedStrategy};
use replaylab_core::indicators::IndicatorPoint;
use replaylab_core::series::{BarSeries, BarUpdate, SeriesGroup};
use replaylab_core::store::csv_store::read_bars_csv;
use replaylab_core::store::CsvBarStore;

#[derive(Parser)]
#[command(
    name = "replaylab",
    about = "ReplayLab CLI: incremental indicators and bar-replay backtests"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate bars and print indicator values as JSON.
    Indicators {
        /// Bar CSV (time,open,high,low,close,volume,vwap,trade_count).
        #[arg(long)]
        bars: PathBuf,

        /// Replay config (TOML).
        #[arg(long)]
        config: PathBuf,

        /// Print every point instead of only the latest.
        #[arg(long, default_value_t = false)]
        all: bool,
    },
    /// Replay bars through a scripted strategy and print the report as JSON.
    Replay {
        /// Bar CSV at the configured sub-bar size.
        #[arg(long)]
        bars: PathBuf,

        /// Replay config (TOML).
        #[arg(long)]
        config: PathBuf,

        /// Order plan (JSON).
        #[arg(long)]
        plan: PathBuf,

        /// Write fills, order statuses and indicator series here.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Indicators { bars, config, all } => run_indicators(&bars, &config, all),
        Commands::Replay {
            bars,
            config,
            plan,
            output_dir,
        } => run_replay(&bars, &config, &plan, output_dir.as_deref()),
    }
}

#[derive(Serialize)]
struct SeriesOutput<'a> {
    kind: &'static str,
    lookback: usize,
    points: Vec<&'a IndicatorPoint>,
}

fn run_indicators(bars_path: &Path, config_path: &Path, all: bool) -> Result<()> {
    let config = ReplayConfig::load(config_path)?;
    if config.indicators.is_empty() {
        bail!("config {} attaches no indicators", config_path.display());
    }
    let bars = read_bars_csv(bars_path, config.sub_bar_secs())
        .with_context(|| format!("failed to read bars from {}", bars_path.display()))?;

    let instrument = config.instrument();
    let mut group = SeriesGroup::new(
        instrument.id.to_string(),
        BarSeries::new(instrument, config.bar_size_secs),
    );
    group.attach_many(&config.indicators)?;
    let ratio = config.rollup_ratio();
    for bar in &bars {
        group.ingest(&BarUpdate::from(bar), ratio);
    }

    let mut output = BTreeMap::new();
    for (_, series) in group.all_series() {
        let points: Vec<&IndicatorPoint> = if all {
            series.points().iter().collect()
        } else {
            series.last().into_iter().collect()
        };
        output.insert(
            series.name().to_string(),
            SeriesOutput {
                kind: series.kind_name(),
                lookback: series.lookback(),
                points,
            },
        );
    }
    tracing::info!(bars = group.bars().len(), series = output.len(), "indicators computed");
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_replay(bars_path: &Path, config_path: &Path, plan_path: &Path, output_dir: Option<&Path>) -> Result<()> {
    let config = ReplayConfig::load(config_path)?;
    let plan_text = std::fs::read_to_string(plan_path)
        .with_context(|| format!("failed to read plan {}", plan_path.display()))?;
    let plan = OrderPlan::from_json_str(&plan_text)
        .with_context(|| format!("failed to parse plan {}", plan_path.display()))?;
    let bars = read_bars_csv(bars_path, config.sub_bar_secs())
        .with_context(|| format!("failed to read bars from {}", bars_path.display()))?;

    let mut coordinator = BacktestCoordinator::new(&config)?;
    if let Some(dir) = output_dir {
        let store = CsvBarStore::new(dir)?;
        coordinator = coordinator.with_store(Arc::new(store));
    }
    coordinator.add_strategy(Box::new(ScriptedStrategy::new(plan)))?;

    let report = coordinator.run(&bars);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
