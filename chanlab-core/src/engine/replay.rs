//! Fixed-pair replay — one (far, near) pair run from scratch over a series.
//!
//! This is the non-incremental form of a single grid cell. It is what a grid
//! cell must reproduce when both start on the same bar, and it is handy when
//! only one pair is of interest.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{Bar, ChannelParams};

use super::state::{ReversalExit, TradeState, TrajectoryPoint};
use super::trade_step::trade_step;

/// One traded bar of a fixed-pair replay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReplayRow {
    pub date: NaiveDate,
    pub close: f64,
    pub point: TrajectoryPoint,
}

/// Replay `params` over `bars`.
///
/// Trading starts at bar index `max(first_bar, far_len)`, the first bar with a
/// full far window behind it when `first_bar` is zero. Pass the grid's
/// `max_window` as `first_bar` to line up with a grid cell. Any unit still
/// open on the final bar is closed at its close.
pub fn replay_fixed(
    bars: &[Bar],
    params: ChannelParams,
    reversal_exit: ReversalExit,
    first_bar: usize,
) -> Vec<ReplayRow> {
    let start = first_bar.max(params.far_len);
    let mut state = TradeState::default();
    let mut rows = Vec::with_capacity(bars.len().saturating_sub(start));

    for t in start..bars.len() {
        let Some(step) = trade_step(&bars[..t], &bars[t], &state, params, reversal_exit) else {
            continue;
        };
        state = step.state;
        rows.push(ReplayRow {
            date: bars[t].date,
            close: bars[t].close,
            point: TrajectoryPoint {
                state,
                levels: step.levels,
            },
        });
    }

    if let Some(last) = rows.last_mut() {
        last.point.state = last.point.state.liquidate(last.close);
    }
    rows
}
