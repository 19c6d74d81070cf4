//! Optimal-parameter selector — picks the grid cell with the best trailing pnl.

use crate::domain::ChannelParams;

use super::grid::ParameterGrid;

/// Return the pair with the strictly greatest pnl, scanning far-then-near.
///
/// The scan starts at `fallback` with a baseline pnl of zero, so a cell only
/// wins when it is strictly profitable and strictly better than every cell
/// before it. Equal pnl keeps the earlier pair (smaller far, then smaller
/// near). A grid that is not ready, or has no profitable cell, yields
/// `fallback`.
pub fn select_best(grid: &ParameterGrid, fallback: ChannelParams) -> ChannelParams {
    if !grid.is_ready() {
        return fallback;
    }
    let mut best = fallback;
    let mut best_pnl = 0.0;
    for (params, cell) in grid.iter() {
        if cell.state.pnl > best_pnl {
            best_pnl = cell.state.pnl;
            best = params;
        }
    }
    best
}
