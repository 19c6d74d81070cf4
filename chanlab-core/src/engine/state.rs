//! Engine configuration, per-trajectory state, and run result types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{ChannelParams, Position, Trend};
use crate::indicators::LevelSet;

/// Smallest grid the engine accepts: far lengths 2 and 3.
pub const MIN_MAX_WINDOW: usize = 3;

/// Rejected engine configuration. Fatal to the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("max_window must be >= {MIN_MAX_WINDOW}, got {0}")]
    MaxWindowTooSmall(usize),

    #[error("{role} pair: near_len must be >= 1")]
    NearTooShort { role: &'static str },

    #[error("{role} pair: near_len ({near_len}) must be shorter than far_len ({far_len})")]
    NearNotShorter {
        role: &'static str,
        far_len: usize,
        near_len: usize,
    },

    #[error("{role} pair: far_len ({far_len}) exceeds max_window ({max_window})")]
    FarExceedsMaxWindow {
        role: &'static str,
        far_len: usize,
        max_window: usize,
    },
}

/// Price used when a trend reversal forces an open position out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReversalExit {
    /// Exit at the near level on the far side of the channel (resistance when
    /// covering a short, support when selling a long).
    #[default]
    NearLevel,
    /// Exit at the reversal bar's close.
    Close,
}

impl ReversalExit {
    pub fn from_use_close(use_close: bool) -> Self {
        if use_close {
            ReversalExit::Close
        } else {
            ReversalExit::NearLevel
        }
    }
}

/// Configuration for a grid backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Largest far window searched (M). The grid covers far 2..=M.
    pub max_window: usize,
    /// Baseline pair reported next to the optimised trajectory.
    pub fixed: ChannelParams,
    /// Pair traded while no grid cell has a positive pnl.
    pub fallback: ChannelParams,
    pub reversal_exit: ReversalExit,
    /// Evaluate grid rows on the rayon pool.
    pub parallel: bool,
}

impl EngineConfig {
    pub fn new(max_window: usize, fixed_far_len: usize, fixed_near_len: usize) -> Result<Self, ConfigError> {
        let config = Self {
            max_window,
            fixed: ChannelParams {
                far_len: fixed_far_len,
                near_len: fixed_near_len,
            },
            fallback: ChannelParams::default(),
            reversal_exit: ReversalExit::default(),
            parallel: true,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_reversal_exit(mut self, reversal_exit: ReversalExit) -> Self {
        self.reversal_exit = reversal_exit;
        self
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_fallback(mut self, far_len: usize, near_len: usize) -> Result<Self, ConfigError> {
        self.fallback = ChannelParams { far_len, near_len };
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_window < MIN_MAX_WINDOW {
            return Err(ConfigError::MaxWindowTooSmall(self.max_window));
        }
        check_pair("fixed", self.fixed, self.max_window)?;
        check_pair("fallback", self.fallback, self.max_window)
    }
}

fn check_pair(role: &'static str, params: ChannelParams, max_window: usize) -> Result<(), ConfigError> {
    if params.near_len < 1 {
        return Err(ConfigError::NearTooShort { role });
    }
    if params.near_len >= params.far_len {
        return Err(ConfigError::NearNotShorter {
            role,
            far_len: params.far_len,
            near_len: params.near_len,
        });
    }
    if params.far_len > max_window {
        return Err(ConfigError::FarExceedsMaxWindow {
            role,
            far_len: params.far_len,
            max_window,
        });
    }
    Ok(())
}

/// Trading state of one trajectory (a grid cell or the live run).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TradeState {
    pub trend: Trend,
    pub position: Position,
    pub cash: f64,
    /// Fill made by the trading rule on the most recent step, if any.
    pub fill_price: Option<f64>,
    /// End-of-series close-out price. Set only on a liquidated final row and
    /// kept apart from `fill_price`, which may hold a fill from the same bar.
    #[serde(default)]
    pub liquidation_price: Option<f64>,
    /// Mark-to-market: cash + position * latest close.
    pub pnl: f64,
}

impl TradeState {
    pub fn mark(&self, close: f64) -> f64 {
        self.cash + self.position.market_value(close)
    }

    /// Close any open unit at `close`. Flat states come back unchanged.
    pub fn liquidate(&self, close: f64) -> TradeState {
        if self.position.is_flat() {
            return *self;
        }
        let cash = self.cash + self.position.market_value(close);
        TradeState {
            position: Position::Flat,
            cash,
            liquidation_price: Some(close),
            pnl: cash,
            ..*self
        }
    }

    /// Fills on this step: the rule's fill plus any terminal liquidation.
    pub fn fill_count(&self) -> usize {
        usize::from(self.fill_price.is_some()) + usize::from(self.liquidation_price.is_some())
    }
}

/// One trajectory's state at one bar, together with the levels it traded on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub state: TradeState,
    pub levels: LevelSet,
}

/// One output row per tradable bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRow {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Pair that traded the live trajectory on this bar.
    pub selected: ChannelParams,
    pub live: TrajectoryPoint,
    /// Grid cell of the configured fixed pair, for comparison.
    pub fixed: TrajectoryPoint,
}

/// A grid cell's standing at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankedCell {
    pub params: ChannelParams,
    pub pnl: f64,
    pub trend: Trend,
    pub position: Position,
}

/// Result of a complete live-driver run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestRun {
    pub config: EngineConfig,
    pub rows: Vec<OutputRow>,
    /// Total bars fed to the driver, including warmup.
    pub bar_count: usize,
    /// Bars consumed before the grid became ready.
    pub warmup_bars: usize,
    /// Best grid cells at the final bar, highest pnl first.
    pub leaderboard: Vec<RankedCell>,
}

impl BacktestRun {
    pub fn final_row(&self) -> Option<&OutputRow> {
        self.rows.last()
    }
}
