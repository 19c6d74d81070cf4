//! Backtesting engine — incremental parameter grid and walk-forward driver.
//!
//! Every bar the engine:
//!
//! 1. Advances one trade-step state per (far, near) pair in the grid
//! 2. Selects the pair with the best trailing pnl
//! 3. Trades the live trajectory with the selected pair
//! 4. Emits an output row next to a fixed comparison pair

pub mod driver;
pub mod grid;
pub mod replay;
pub mod selector;
pub mod state;
pub mod trade_step;

pub use driver::{run_live, run_live_ranked, LiveDriver, LEADERBOARD_SIZE};
pub use grid::{GridCell, GridStatus, ParameterGrid};
pub use replay::{replay_fixed, ReplayRow};
pub use selector::select_best;
pub use state::{
    BacktestRun, ConfigError, EngineConfig, OutputRow, RankedCell, ReversalExit, TradeState,
    TrajectoryPoint, MIN_MAX_WINDOW,
};
pub use trade_step::{apply_rule, trade_step, Step};
