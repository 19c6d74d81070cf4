//! chanlab runner — run orchestration around the channel-break grid engine.
//!
//! This crate builds on `chanlab-core` to provide:
//! - TOML run files validated into the engine configuration
//! - Bar loading from CSV files or a seeded synthetic random walk
//! - A runner that drives the engine and fingerprints config and data
//! - Per-trajectory and per-run metrics
//! - CSV, JSON, and Markdown export of the output table and run report

pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod runner;

pub use config::{config_hash, ConfigError, DataSource, RunFile, SyntheticSpec};
pub use data_loader::{load_bars, load_csv, load_synthetic, LoadError, LoadedData};
pub use export::{
    export_json, export_trajectory_csv, generate_report, import_json, load_summary,
    save_artifacts, write_artifacts, Trajectory,
};
pub use metrics::{RunMetrics, TrajectorySummary};
pub use runner::{
    run_from_file, run_on_bars, run_on_bars_ranked, run_with_source, RunError, RunResult, RunSummary, SCHEMA_VERSION,
};
