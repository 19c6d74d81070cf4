//! Parameter grid — one independent trade-step state per (far, near) pair.
//!
//! Cells live in a flat arena of (M-1) x (M-1) slots, row = far_len - 2,
//! column = near_len - 1. Only the lower triangle (near < far) is ever
//! advanced. Rows are independent, so with `parallel` set each row is
//! advanced on the rayon pool; every worker writes only its own row.

use rayon::prelude::*;

use crate::domain::{Bar, ChannelParams};
use crate::indicators::{ExtremaLadder, LevelSet};

use super::state::{EngineConfig, RankedCell, ReversalExit, TradeState};
use super::trade_step::apply_rule;

/// State of one grid cell after the most recent advance.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GridCell {
    pub state: TradeState,
    /// Levels of the most recent advance. `None` until the grid is ready.
    pub levels: Option<LevelSet>,
}

/// Whether a call to [`ParameterGrid::advance`] updated the cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridStatus {
    NotReady { bars_until_ready: usize },
    Advanced,
}

#[derive(Debug, Clone)]
pub struct ParameterGrid {
    max_window: usize,
    cells: Vec<GridCell>,
    reversal_exit: ReversalExit,
    parallel: bool,
    ready: bool,
}

impl ParameterGrid {
    pub fn new(max_window: usize, reversal_exit: ReversalExit, parallel: bool) -> Self {
        assert!(max_window >= 2, "grid needs max_window >= 2");
        let stride = max_window - 1;
        Self {
            max_window,
            cells: vec![GridCell::default(); stride * stride],
            reversal_exit,
            parallel,
            ready: false,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.max_window, config.reversal_exit, config.parallel)
    }

    /// True once the grid has advanced at least once.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    fn index(&self, params: ChannelParams) -> Option<usize> {
        if !params.is_valid() || params.far_len > self.max_window {
            return None;
        }
        Some((params.far_len - 2) * (self.max_window - 1) + (params.near_len - 1))
    }

    pub fn cell(&self, params: ChannelParams) -> Option<&GridCell> {
        self.index(params).map(|i| &self.cells[i])
    }

    /// Advance every valid cell by `bar`. `history` holds all bars before it.
    ///
    /// The grid waits until `history` covers the widest far window (M bars);
    /// before that it reports `NotReady` and leaves every cell untouched.
    pub fn advance(&mut self, history: &[Bar], bar: &Bar) -> GridStatus {
        if history.len() < self.max_window {
            return GridStatus::NotReady {
                bars_until_ready: self.max_window - history.len(),
            };
        }

        let ladder = ExtremaLadder::build(history, self.max_window);
        let reversal_exit = self.reversal_exit;
        let close = bar.close;
        let stride = self.max_window - 1;

        let advance_row = |(row, cells): (usize, &mut [GridCell])| {
            let far_len = row + 2;
            for (col, cell) in cells.iter_mut().take(far_len - 1).enumerate() {
                let params = ChannelParams {
                    far_len,
                    near_len: col + 1,
                };
                if let Some(levels) = ladder.levels(params) {
                    cell.state = apply_rule(&cell.state, close, &levels, reversal_exit);
                    cell.levels = Some(levels);
                }
            }
        };

        if self.parallel {
            self.cells
                .par_chunks_mut(stride)
                .enumerate()
                .for_each(&advance_row);
        } else {
            self.cells.chunks_mut(stride).enumerate().for_each(&advance_row);
        }

        self.ready = true;
        GridStatus::Advanced
    }

    /// All valid cells in far-then-near scan order.
    pub fn iter(&self) -> impl Iterator<Item = (ChannelParams, &GridCell)> + '_ {
        ChannelParams::enumerate(self.max_window)
            .filter_map(move |params| self.cell(params).map(|cell| (params, cell)))
    }

    /// The `n` cells with the highest pnl. Equal pnl keeps scan order.
    pub fn ranked(&self, n: usize) -> Vec<RankedCell> {
        let mut cells: Vec<RankedCell> = self
            .iter()
            .map(|(params, cell)| RankedCell {
                params,
                pnl: cell.state.pnl,
                trend: cell.state.trend,
                position: cell.state.position,
            })
            .collect();
        // Stable sort: ties stay in scan order.
        cells.sort_by(|a, b| b.pnl.total_cmp(&a.pnl));
        cells.truncate(n);
        cells
    }

    #[cfg(test)]
    pub(crate) fn set_pnl_for_test(&mut self, params: ChannelParams, pnl: f64) {
        let i = self.index(params).expect("valid grid pair");
        self.cells[i].state.pnl = pnl;
    }
}
