//! Live driver — the bar-by-bar walk-forward loop.
//!
//! Per bar:
//! 1. Advance the parameter grid
//! 2. Select the best pair from the grid as of this bar
//! 3. Trade the live trajectory with that pair, on its own state
//! 4. Append an output row (live point + fixed-pair point)
//!
//! The selection in step 2 already includes the current bar's close in every
//! cell's pnl, so the pair that trades a bar was chosen knowing how that bar
//! ended for each candidate. Live results therefore carry a small look-ahead
//! bias compared with a selection made from the previous bar's grid.
//!
//! At the end of the series any open unit is closed at the final close.

use tracing::{debug, warn};

use crate::domain::{Bar, ChannelParams};

use super::grid::{GridStatus, ParameterGrid};
use super::selector::select_best;
use super::state::{BacktestRun, ConfigError, EngineConfig, OutputRow, TradeState, TrajectoryPoint};
use super::trade_step::trade_step;

/// Number of grid cells kept in the final leaderboard.
pub const LEADERBOARD_SIZE: usize = 5;

pub struct LiveDriver {
    config: EngineConfig,
    grid: ParameterGrid,
    history: Vec<Bar>,
    live: TradeState,
    rows: Vec<OutputRow>,
    last_selected: Option<ChannelParams>,
    warmup_bars: usize,
}

impl LiveDriver {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            grid: ParameterGrid::from_config(&config),
            config,
            history: Vec::new(),
            live: TradeState::default(),
            rows: Vec::new(),
            last_selected: None,
            warmup_bars: 0,
        })
    }

    pub fn grid(&self) -> &ParameterGrid {
        &self.grid
    }

    /// Feed the next bar. Returns the row produced for it, or `None` while the
    /// grid is still warming up.
    pub fn step(&mut self, bar: Bar) -> Option<&OutputRow> {
        if let GridStatus::NotReady { .. } = self.grid.advance(&self.history, &bar) {
            self.warmup_bars += 1;
            self.history.push(bar);
            return None;
        }

        let selected = select_best(&self.grid, self.config.fallback);
        if self.last_selected != Some(selected) {
            debug!(date = %bar.date, %selected, "selected pair changed");
            self.last_selected = Some(selected);
        }

        let live = trade_step(
            &self.history,
            &bar,
            &self.live,
            selected,
            self.config.reversal_exit,
        );
        let fixed = self
            .grid
            .cell(self.config.fixed)
            .and_then(|cell| cell.levels.map(|levels| TrajectoryPoint { state: cell.state, levels }));

        let (Some(live), Some(fixed)) = (live, fixed) else {
            // Both pairs fit inside max_window, so a ready grid always has them.
            warn!(date = %bar.date, %selected, "no levels for a ready grid; bar skipped");
            self.history.push(bar);
            return None;
        };

        self.live = live.state;
        self.rows.push(OutputRow {
            date: bar.date,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            selected,
            live: TrajectoryPoint {
                state: live.state,
                levels: live.levels,
            },
            fixed,
        });
        self.history.push(bar);
        self.rows.last()
    }

    /// Close out the run: liquidate any open unit on the final bar and
    /// collect the rows.
    pub fn finish(self) -> BacktestRun {
        self.finish_ranked(LEADERBOARD_SIZE)
    }

    /// `finish` with a leaderboard of the best `leaderboard_size` cells.
    /// Empty while the grid never became ready.
    pub fn finish_ranked(mut self, leaderboard_size: usize) -> BacktestRun {
        let leaderboard = if self.grid.is_ready() {
            self.grid.ranked(leaderboard_size)
        } else {
            Vec::new()
        };
        if let Some(last) = self.rows.last_mut() {
            let close = last.close;
            last.live.state = last.live.state.liquidate(close);
            last.fixed.state = last.fixed.state.liquidate(close);
            self.live = last.live.state;
        }
        BacktestRun {
            leaderboard,
            bar_count: self.history.len(),
            warmup_bars: self.warmup_bars,
            rows: self.rows,
            config: self.config,
        }
    }
}

/// Run the live driver over a complete series.
pub fn run_live(config: &EngineConfig, bars: &[Bar]) -> Result<BacktestRun, ConfigError> {
    run_live_ranked(config, bars, LEADERBOARD_SIZE)
}

/// `run_live` keeping the best `leaderboard_size` grid cells.
pub fn run_live_ranked(
    config: &EngineConfig,
    bars: &[Bar],
    leaderboard_size: usize,
) -> Result<BacktestRun, ConfigError> {
    let mut driver = LiveDriver::new(config.clone())?;
    for bar in bars {
        driver.step(bar.clone());
    }
    Ok(driver.finish_ranked(leaderboard_size))
}
