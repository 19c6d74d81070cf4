//! Reporting and export — CSV, JSON, and Markdown artifact generation.
//!
//! Provides three export formats for run results:
//! - **CSV**: one row per tradable bar for each trajectory (live and fixed)
//! - **JSON**: the run summary with schema versioning
//! - **Markdown**: human-readable report
//!
//! `summary.json` carries a `schema_version` field. Newer versions are
//! rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chanlab_core::domain::ChannelParams;
use chanlab_core::engine::{OutputRow, TrajectoryPoint};

use crate::runner::{RunResult, RunSummary, SCHEMA_VERSION};

/// Which trajectory of the output table to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trajectory {
    /// Traded with the pair selected on each bar.
    Live,
    /// Traded with the configured fixed pair.
    Fixed,
}

impl Trajectory {
    fn file_name(self) -> &'static str {
        match self {
            Trajectory::Live => "live_trades.csv",
            Trajectory::Fixed => "fixed_trades.csv",
        }
    }
}

const TRADE_COLUMNS: [&str; 17] = [
    "date",
    "open",
    "high",
    "low",
    "close",
    "far_len",
    "near_len",
    "trend",
    "position",
    "fill_price",
    "liquidation_price",
    "cash",
    "pnl",
    "far_support",
    "far_resistance",
    "near_support",
    "near_resistance",
];

// ─── CSV export ─────────────────────────────────────────────────────

/// Export one trajectory of the output table as CSV.
///
/// `fixed` is the configured pair, written in the far_len/near_len columns of
/// the fixed trajectory. The live trajectory writes each row's selection.
pub fn export_trajectory_csv(rows: &[OutputRow], which: Trajectory, fixed: ChannelParams) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(TRADE_COLUMNS)?;

    for row in rows {
        let (params, point): (ChannelParams, &TrajectoryPoint) = match which {
            Trajectory::Live => (row.selected, &row.live),
            Trajectory::Fixed => (fixed, &row.fixed),
        };
        let s = &point.state;
        let l = &point.levels;
        wtr.write_record([
            row.date.to_string(),
            format!("{:.6}", row.open),
            format!("{:.6}", row.high),
            format!("{:.6}", row.low),
            format!("{:.6}", row.close),
            params.far_len.to_string(),
            params.near_len.to_string(),
            s.trend.as_sign().to_string(),
            s.position.as_sign().to_string(),
            s.fill_price.map(|p| format!("{p:.6}")).unwrap_or_default(),
            s.liquidation_price.map(|p| format!("{p:.6}")).unwrap_or_default(),
            format!("{:.6}", s.cash),
            format!("{:.6}", s.pnl),
            format!("{:.6}", l.far_support),
            format!("{:.6}", l.far_resistance),
            format!("{:.6}", l.near_support),
            format!("{:.6}", l.near_resistance),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}


// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `RunSummary` to pretty JSON.
pub fn export_json(summary: &RunSummary) -> Result<String> {
    serde_json::to_string_pretty(summary).context("failed to serialize RunSummary to JSON")
}

/// Deserialize a `RunSummary` from JSON, rejecting newer schema versions.
pub fn import_json(json: &str) -> Result<RunSummary> {
    let summary: RunSummary =
        serde_json::from_str(json).context("failed to deserialize RunSummary from JSON")?;
    if summary.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            summary.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(summary)
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a run.
///
/// Creates a directory named `run_{timestamp}_{hash8}/` under `output_dir`
/// containing:
/// - `summary.json` — the `RunSummary`
/// - `live_trades.csv` — live trajectory
/// - `fixed_trades.csv` — fixed-pair trajectory
/// - `report.md` — Markdown report
///
/// Returns the path to the created directory.
pub fn save_artifacts(result: &RunResult, output_dir: &Path) -> Result<PathBuf> {
    let hash_prefix: String = result.summary.config_hash.chars().take(8).collect();
    let dirname = format!(
        "run_{}_{}",
        chrono::Local::now().format("%Y%m%d_%H%M%S"),
        hash_prefix
    );
    let run_dir = output_dir.join(dirname);
    write_artifacts(result, &run_dir)?;
    Ok(run_dir)
}

/// Write the artifact set into `run_dir` (created if missing).
pub fn write_artifacts(result: &RunResult, run_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let json = export_json(&result.summary)?;
    write_file(&run_dir.join("summary.json"), &json)?;

    let fixed = result.summary.config.fixed;
    for which in [Trajectory::Live, Trajectory::Fixed] {
        let csv = export_trajectory_csv(&result.run.rows, which, fixed)?;
        write_file(&run_dir.join(which.file_name()), &csv)?;
    }

    write_file(&run_dir.join("report.md"), &generate_report(&result.summary))?;
    Ok(())
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}

/// Load a `RunSummary` from an artifact directory's summary.json.
///
/// Rejects newer schema versions.
pub fn load_summary(dir: &Path) -> Result<RunSummary> {
    let path = dir.join("summary.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

// ─── Markdown report ────────────────────────────────────────────────

/// Generate a Markdown report for a run.
pub fn generate_report(summary: &RunSummary) -> String {
    let mut md = String::with_capacity(2048);
    let m = &summary.metrics;
    let c = &summary.config;

    md.push_str("# Channel Grid Run Report\n\n");

    md.push_str("## Metadata\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Data | {} |\n", summary.data_source));
    md.push_str(&format!(
        "| Period | {} to {} |\n",
        summary.start_date, summary.end_date
    ));
    md.push_str(&format!(
        "| Bars | {} ({} warmup) |\n",
        m.bar_count, m.warmup_bars
    ));
    md.push_str(&format!("| Max Window | {} |\n", c.max_window));
    md.push_str(&format!("| Fixed Pair | {} |\n", c.fixed));
    md.push_str(&format!("| Fallback Pair | {} |\n", c.fallback));
    md.push_str(&format!("| Reversal Exit | {:?} |\n", c.reversal_exit));
    md.push_str(&format!("| Config Hash | {} |\n", summary.config_hash));
    md.push_str(&format!("| Dataset Hash | {} |\n", summary.dataset_hash));
    if summary.has_synthetic {
        md.push_str("| Data Kind | **SYNTHETIC** |\n");
    }
    md.push('\n');

    md.push_str("## Performance Summary\n\n");
    md.push_str("| Metric | Live | Fixed |\n");
    md.push_str("| --- | ---: | ---: |\n");
    md.push_str(&format!(
        "| Final PnL | {:.4} | {:.4} |\n",
        m.live.final_pnl, m.fixed.final_pnl
    ));
    md.push_str(&format!(
        "| Max Drawdown | {:.4} | {:.4} |\n",
        m.live.max_drawdown, m.fixed.max_drawdown
    ));
    md.push_str(&format!(
        "| Fills | {} | {} |\n",
        m.live.fill_count, m.fixed.fill_count
    ));
    md.push_str(&format!(
        "| Round Trips | {} | {} |\n",
        m.live.round_trips, m.fixed.round_trips
    ));
    md.push_str(&format!(
        "| Bars in Market | {} | {} |\n",
        m.live.bars_in_market, m.fixed.bars_in_market
    ));
    md.push('\n');

    md.push_str("## Selection\n\n");
    md.push_str(&format!("- Tradable bars: {}\n", m.tradable_bars));
    md.push_str(&format!("- Selection changes: {}\n", m.selection_changes));
    md.push_str(&format!("- Distinct pairs: {}\n", m.distinct_pairs));
    if let Some(p) = m.final_selection {
        md.push_str(&format!("- Final selection: {p}\n"));
    }
    md.push('\n');

    if !m.leaderboard.is_empty() {
        md.push_str("## Leaderboard\n\n");
        md.push_str("| Rank | Far | Near | PnL | Trend | Position |\n");
        md.push_str("| ---: | ---: | ---: | ---: | --- | --- |\n");
        for (i, cell) in m.leaderboard.iter().enumerate() {
            md.push_str(&format!(
                "| {} | {} | {} | {:.4} | {} | {} |\n",
                i + 1,
                cell.params.far_len,
                cell.params.near_len,
                cell.pnl,
                cell.trend.as_sign(),
                cell.position.as_sign()
            ));
        }
        md.push('\n');
    }

    if !summary.data_quality_warnings.is_empty() {
        md.push_str("## Data Quality\n\n");
        for warn in &summary.data_quality_warnings {
            md.push_str(&format!("- {warn}\n"));
        }
        md.push('\n');
    }

    md
}
