//! chanlab CLI — run the channel-break grid backtest and inspect the grid.
//!
//! Commands:
//! - `run` — run from a TOML run file and/or flags, save artifacts
//! - `grid` — run and print the top of the final parameter grid

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::prelude::*;

use chanlab_core::engine::{EngineConfig, LEADERBOARD_SIZE};
use chanlab_runner::config::{EngineSection, RunFile};
use chanlab_runner::{
    load_bars, run_on_bars_ranked, save_artifacts, DataSource, RunResult, SyntheticSpec,
};

#[derive(Parser)]
#[command(
    name = "chanlab",
    about = "chanlab — channel-break backtests with walk-forward parameter selection"
)]
struct Cli {
    /// Log level: error, warn, info, debug, trace.
    #[arg(long, global = true, default_value = "info")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a backtest and save the artifact set.
    Run {
        #[command(flatten)]
        opts: RunOpts,

        /// Output directory for artifacts. Overrides the run file's [output] dir.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Run a backtest and print the best grid cells as of the final bar.
    Grid {
        #[command(flatten)]
        opts: RunOpts,

        /// Number of cells to print.
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
}

/// Inputs shared by `run` and `grid`. Flags override the run file.
#[derive(Args)]
struct RunOpts {
    /// Path to a TOML run file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// CSV file of daily bars (Date,Open,High,Low,Close).
    #[arg(long, conflicts_with = "synthetic")]
    data: Option<PathBuf>,

    /// Use a seeded synthetic random walk instead of a data file.
    #[arg(long, default_value_t = false)]
    synthetic: bool,

    /// Number of synthetic bars.
    #[arg(long, default_value_t = 500)]
    bars: usize,

    /// Seed for synthetic bars.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Largest channel length in the grid (M).
    #[arg(long)]
    max_window: Option<usize>,

    /// Far channel length of the fixed comparison pair.
    #[arg(long)]
    fixed_far: Option<usize>,

    /// Near channel length of the fixed comparison pair.
    #[arg(long)]
    fixed_near: Option<usize>,

    /// Exit reversals at the close instead of the near level.
    #[arg(long, default_value_t = false)]
    use_close: bool,

    /// Advance the grid on one thread.
    #[arg(long, default_value_t = false)]
    sequential: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(
            tracing_subscriber::filter::Targets::new().with_default(cli.log_level),
        );
    tracing_subscriber::registry().with(fmt_layer).init();

    match cli.command {
        Commands::Run { opts, output_dir } => run_cmd(opts, output_dir),
        Commands::Grid { opts, top } => grid_cmd(opts, top),
    }
}

fn run_cmd(opts: RunOpts, output_dir: Option<PathBuf>) -> Result<()> {
    let (file, result) = execute(&opts, LEADERBOARD_SIZE)?;
    print_summary(&result);

    let output_dir = output_dir
        .or_else(|| file.map(|f| f.output.dir))
        .unwrap_or_else(|| PathBuf::from("runs"));
    let run_dir = save_artifacts(&result, &output_dir)?;
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn grid_cmd(opts: RunOpts, top: usize) -> Result<()> {
    let (_, result) = execute(&opts, top)?;
    print_summary(&result);

    let board = &result.summary.metrics.leaderboard;
    if board.is_empty() {
        println!("Grid never became ready: fewer than max_window + 1 bars.");
        return Ok(());
    }

    println!("--- Top {} grid cells ---", board.len());
    println!("{:>5} {:>5} {:>5} {:>14} {:>13} {:>6}", "rank", "far", "near", "pnl", "trend", "pos");
    for (i, cell) in board.iter().enumerate() {
        println!(
            "{:>5} {:>5} {:>5} {:>14.4} {:>13} {:>6}",
            i + 1,
            cell.params.far_len,
            cell.params.near_len,
            cell.pnl,
            format!("{:?}", cell.trend),
            format!("{:?}", cell.position),
        );
    }
    Ok(())
}

/// Resolve the run file, flags, and data source, then run.
fn execute(opts: &RunOpts, leaderboard_size: usize) -> Result<(Option<RunFile>, RunResult)> {
    let file = opts
        .config
        .as_deref()
        .map(RunFile::from_path)
        .transpose()
        .context("failed to load run file")?;

    let config = engine_config(opts, file.as_ref())?;

    let source = if let Some(path) = &opts.data {
        DataSource::Csv(path.clone())
    } else if opts.synthetic {
        DataSource::Synthetic(SyntheticSpec {
            bars: opts.bars,
            seed: opts.seed,
        })
    } else if let Some(source) = file.as_ref().map(RunFile::data_source).transpose()?.flatten() {
        source
    } else {
        bail!("no data source: pass --data <csv>, --synthetic, or a run file with a [data] table");
    };

    let loaded = load_bars(&source).context("failed to load bars")?;
    let result = run_on_bars_ranked(&config, &loaded, leaderboard_size)?;
    Ok((file, result))
}

fn engine_config(opts: &RunOpts, file: Option<&RunFile>) -> Result<EngineConfig> {
    let mut section = match file {
        Some(f) => f.engine.clone(),
        None => {
            let (Some(m), Some(far), Some(near)) = (opts.max_window, opts.fixed_far, opts.fixed_near)
            else {
                bail!("without --config, --max-window, --fixed-far and --fixed-near are required");
            };
            EngineSection::new(m, far, near)
        }
    };
    if let Some(m) = opts.max_window {
        section.max_window = m;
    }
    if let Some(far) = opts.fixed_far {
        section.fixed_far_len = far;
    }
    if let Some(near) = opts.fixed_near {
        section.fixed_near_len = near;
    }
    if opts.use_close {
        section.use_close_for_reversal_exit = true;
    }
    if opts.sequential {
        section.parallel = false;
    }
    Ok(section.to_engine_config()?)
}

fn print_summary(result: &RunResult) {
    let s = &result.summary;
    let m = &s.metrics;
    println!();
    println!("=== Channel Grid Run ===");
    println!("Data:           {}", s.data_source);
    println!("Period:         {} to {}", s.start_date, s.end_date);
    println!("Bars:           {} ({} warmup)", m.bar_count, m.warmup_bars);
    println!("Max window:     {}", s.config.max_window);
    println!("Fixed pair:     {}", s.config.fixed);
    println!();
    println!("--- Performance ---   live        fixed");
    println!("Final PnL:      {:>10.4} {:>12.4}", m.live.final_pnl, m.fixed.final_pnl);
    println!("Max Drawdown:   {:>10.4} {:>12.4}", m.live.max_drawdown, m.fixed.max_drawdown);
    println!("Fills:          {:>10} {:>12}", m.live.fill_count, m.fixed.fill_count);
    println!("Round Trips:    {:>10} {:>12}", m.live.round_trips, m.fixed.round_trips);
    println!("Bars in Market: {:>10} {:>12}", m.live.bars_in_market, m.fixed.bars_in_market);
    println!();
    println!("Selection changes: {}", m.selection_changes);
    println!("Distinct pairs:    {}", m.distinct_pairs);
    if let Some(p) = m.final_selection {
        println!("Final selection:   {p}");
    }
    if s.has_synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    for warn in &s.data_quality_warnings {
        println!("WARNING: {warn}");
    }
    println!();
}
