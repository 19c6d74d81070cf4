//! Run orchestration — wires together data loading, the live driver, and metrics.
//!
//! Entry points:
//! - `run_from_file()`: reads a TOML run file, loads its data, runs.
//! - `run_with_source()`: loads a resolved data source, runs.
//! - `run_on_bars()`: takes pre-loaded data and an engine config. No I/O.

use std::path::Path;

use chanlab_core::engine::{run_live_ranked, BacktestRun, EngineConfig, LEADERBOARD_SIZE};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::{config_hash, ConfigError, DataSource, RunFile};
use crate::data_loader::{load_bars, LoadError, LoadedData};
use crate::metrics::RunMetrics;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("run file has no [data] table and no data source was given")]
    NoDataSource,
}

impl From<chanlab_core::engine::ConfigError> for RunError {
    fn from(err: chanlab_core::engine::ConfigError) -> Self {
        RunError::Config(ConfigError::Engine(err))
    }
}

/// Current schema version for persisted run reports.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of one run: the full output table plus its report.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub run: BacktestRun,
    pub summary: RunSummary,
}

/// Persisted run report (`summary.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub config: EngineConfig,
    pub config_hash: String,
    pub data_source: String,
    pub dataset_hash: String,
    pub has_synthetic: bool,
    pub start_date: String,
    pub end_date: String,
    pub metrics: RunMetrics,
    pub data_quality_warnings: Vec<String>,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Run from a TOML run file. `data_override` replaces the file's `[data]` table.
pub fn run_from_file(path: &Path, data_override: Option<DataSource>) -> Result<RunResult, RunError> {
    let file = RunFile::from_path(path)?;
    let source = match data_override {
        Some(source) => source,
        None => file.data_source()?.ok_or(RunError::NoDataSource)?,
    };
    let config = file.engine_config()?;
    run_with_source(&config, &source)
}

/// Load `source` and run the engine on it.
pub fn run_with_source(config: &EngineConfig, source: &DataSource) -> Result<RunResult, RunError> {
    let loaded = load_bars(source)?;
    run_on_bars(config, &loaded)
}

/// Run on pre-loaded data — no I/O.
pub fn run_on_bars(config: &EngineConfig, loaded: &LoadedData) -> Result<RunResult, RunError> {
    run_on_bars_ranked(config, loaded, LEADERBOARD_SIZE)
}

/// `run_on_bars` keeping the best `leaderboard_size` grid cells in the report.
pub fn run_on_bars_ranked(
    config: &EngineConfig,
    loaded: &LoadedData,
    leaderboard_size: usize,
) -> Result<RunResult, RunError> {
    info!(
        source = %loaded.source,
        bars = loaded.bars.len(),
        max_window = config.max_window,
        fixed = %config.fixed,
        "starting run"
    );

    let run = run_live_ranked(config, &loaded.bars, leaderboard_size)?;
    let metrics = RunMetrics::compute(&run);

    info!(
        tradable_bars = metrics.tradable_bars,
        live_pnl = metrics.live.final_pnl,
        fixed_pnl = metrics.fixed.final_pnl,
        selection_changes = metrics.selection_changes,
        "run finished"
    );

    let start_date = loaded
        .bars
        .first()
        .map(|b| b.date.to_string())
        .unwrap_or_default();
    let end_date = loaded
        .bars
        .last()
        .map(|b| b.date.to_string())
        .unwrap_or_default();

    let summary = RunSummary {
        schema_version: SCHEMA_VERSION,
        config: config.clone(),
        config_hash: config_hash(config),
        data_source: loaded.source.clone(),
        dataset_hash: loaded.dataset_hash.clone(),
        has_synthetic: loaded.has_synthetic,
        start_date,
        end_date,
        metrics,
        data_quality_warnings: loaded.data_quality_warnings.clone(),
    };

    Ok(RunResult { run, summary })
}
