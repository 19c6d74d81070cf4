//! Run metrics — pure functions over the output rows.
//!
//! Every metric is computed from one trajectory's sequence of states (live or
//! fixed) or from the per-bar selection column. pnl here is absolute (price
//! units of one traded unit), not a return.

use std::collections::BTreeSet;

use chanlab_core::domain::{ChannelParams, Position};
use chanlab_core::engine::{BacktestRun, OutputRow, RankedCell, TradeState};
use serde::{Deserialize, Serialize};

/// Summary of one trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySummary {
    pub final_pnl: f64,
    /// Bars with a fill (entries and exits, including the final liquidation).
    pub fill_count: usize,
    /// Positions opened and later closed.
    pub round_trips: usize,
    /// Largest peak-to-trough fall of the pnl curve, as a non-positive number.
    pub max_drawdown: f64,
    pub bars_in_market: usize,
}

impl TrajectorySummary {
    pub fn compute(states: &[TradeState]) -> Self {
        let pnl: Vec<f64> = states.iter().map(|s| s.pnl).collect();
        Self {
            final_pnl: pnl.last().copied().unwrap_or(0.0),
            fill_count: fill_count(states),
            round_trips: round_trips(states),
            max_drawdown: max_drawdown(&pnl),
            bars_in_market: bars_in_market(states),
        }
    }
}

/// Whole-run summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub bar_count: usize,
    pub warmup_bars: usize,
    pub tradable_bars: usize,
    pub live: TrajectorySummary,
    pub fixed: TrajectorySummary,
    /// Bars on which the selected pair differs from the previous bar's.
    pub selection_changes: usize,
    pub distinct_pairs: usize,
    /// Pair selected on the final bar.
    pub final_selection: Option<ChannelParams>,
    pub leaderboard: Vec<RankedCell>,
}

impl RunMetrics {
    pub fn compute(run: &BacktestRun) -> Self {
        let live: Vec<TradeState> = run.rows.iter().map(|r| r.live.state).collect();
        let fixed: Vec<TradeState> = run.rows.iter().map(|r| r.fixed.state).collect();
        Self {
            bar_count: run.bar_count,
            warmup_bars: run.warmup_bars,
            tradable_bars: run.rows.len(),
            live: TrajectorySummary::compute(&live),
            fixed: TrajectorySummary::compute(&fixed),
            selection_changes: selection_changes(&run.rows),
            distinct_pairs: distinct_pairs(&run.rows),
            final_selection: run.final_row().map(|r| r.selected),
            leaderboard: run.leaderboard.clone(),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

pub fn fill_count(states: &[TradeState]) -> usize {
    states.iter().map(TradeState::fill_count).sum()
}

/// Count positions closed, either back to flat by the rule or by the final
/// liquidation. A unit opened and liquidated on the same bar counts once.
pub fn round_trips(states: &[TradeState]) -> usize {
    let mut prev = Position::Flat;
    let mut count = 0;
    for s in states {
        if s.liquidation_price.is_some() || (!prev.is_flat() && s.position.is_flat()) {
            count += 1;
        }
        prev = s.position;
    }
    count
}

/// Absolute max drawdown of a pnl curve, measured from a running peak that
/// starts at 0 (the flat starting book).
pub fn max_drawdown(pnl: &[f64]) -> f64 {
    let mut peak = 0.0_f64;
    let mut max_dd = 0.0_f64;
    for &p in pnl {
        if p > peak {
            peak = p;
        }
        let dd = p - peak;
        if dd < max_dd {
            max_dd = dd;
        }
    }
    max_dd
}

pub fn bars_in_market(states: &[TradeState]) -> usize {
    states.iter().filter(|s| !s.position.is_flat()).count()
}

pub fn selection_changes(rows: &[OutputRow]) -> usize {
    rows.windows(2)
        .filter(|w| w[0].selected != w[1].selected)
        .count()
}

pub fn distinct_pairs(rows: &[OutputRow]) -> usize {
    rows.iter()
        .map(|r| r.selected)
        .collect::<BTreeSet<_>>()
        .len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chanlab_core::domain::Trend;
    use proptest::prelude::*;

    fn state(position: Position, fill: Option<f64>, pnl: f64) -> TradeState {
        TradeState {
            trend: Trend::Up,
            position,
            cash: pnl,
            fill_price: fill,
            liquidation_price: None,
            pnl,
        }
    }

    // ── Drawdown ──

    #[test]
    fn max_drawdown_known() {
        // Peak 5, trough -2 → -7
        assert_eq!(max_drawdown(&[1.0, 5.0, 3.0, -2.0, 4.0]), -7.0);
    }

    #[test]
    fn max_drawdown_counts_losses_from_the_flat_start() {
        assert_eq!(max_drawdown(&[-1.0, -3.0, -2.0]), -3.0);
    }

    #[test]
    fn max_drawdown_monotonic_increase() {
        let pnl: Vec<f64> = (0..50).map(|i| i as f64).collect();
        assert_eq!(max_drawdown(&pnl), 0.0);
    }

    #[test]
    fn max_drawdown_empty() {
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    // ── Fills and round trips ──

    #[test]
    fn round_trip_counts_closes() {
        let states = vec![
            state(Position::Flat, None, 0.0),
            state(Position::Long, Some(99.0), 1.0),
            state(Position::Long, None, 2.0),
            state(Position::Flat, Some(102.0), 3.0),
            state(Position::Short, Some(104.0), 3.0),
            state(Position::Flat, Some(101.0), 6.0),
        ];
        assert_eq!(fill_count(&states), 4);
        assert_eq!(round_trips(&states), 2);
        assert_eq!(bars_in_market(&states), 3);
    }

    #[test]
    fn entry_on_the_liquidated_final_bar_is_a_round_trip() {
        let entered = state(Position::Long, Some(101.5), -0.5);
        let states = vec![state(Position::Flat, None, 0.0), entered.liquidate(101.0)];
        assert_eq!(fill_count(&states), 2);
        assert_eq!(round_trips(&states), 1);
        assert_eq!(bars_in_market(&states), 0);
    }

    #[test]
    fn held_position_liquidated_counts_once() {
        let states = vec![
            state(Position::Short, Some(104.0), 0.0),
            state(Position::Short, None, 1.0).liquidate(103.0),
        ];
        assert_eq!(fill_count(&states), 2);
        assert_eq!(round_trips(&states), 1);
    }

    #[test]
    fn open_position_is_not_a_round_trip() {
        let states = vec![state(Position::Flat, None, 0.0), state(Position::Short, Some(5.0), 0.0)];
        assert_eq!(round_trips(&states), 0);
        assert_eq!(fill_count(&states), 1);
    }

    #[test]
    fn summary_of_empty_trajectory_is_zero() {
        let s = TrajectorySummary::compute(&[]);
        assert_eq!(s.final_pnl, 0.0);
        assert_eq!(s.fill_count, 0);
        assert_eq!(s.round_trips, 0);
        assert_eq!(s.bars_in_market, 0);
    }

    // ── Selection ──

    #[test]
    fn run_metrics_on_engine_output() {
        use chanlab_core::domain::Bar;
        use chanlab_core::engine::{run_live, EngineConfig};

        let base = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars: Vec<Bar> = (0..40)
            .map(|i| {
                let c = 100.0 + ((i as f64) * 0.7).sin() * 5.0;
                Bar::new(base + chrono::Duration::days(i), c, c + 1.0, c - 1.0, c)
            })
            .collect();
        let config = EngineConfig::new(6, 4, 2).unwrap();
        let run = run_live(&config, &bars).unwrap();
        let m = RunMetrics::compute(&run);

        assert_eq!(m.bar_count, 40);
        assert_eq!(m.tradable_bars, 34);
        assert_eq!(m.live.final_pnl, run.final_row().unwrap().live.state.pnl);
        assert!(m.distinct_pairs >= 1);
        assert!(m.selection_changes + 1 >= m.distinct_pairs);
        assert_eq!(m.final_selection, run.final_row().map(|r| r.selected));
        assert!(m.live.max_drawdown <= 0.0);
        assert_eq!(m.live.bars_in_market, run.rows.iter().filter(|r| !r.live.state.position.is_flat()).count());
    }

    #[test]
    fn final_bar_entry_counts_entry_and_liquidation() {
        use chanlab_core::domain::Bar;
        use chanlab_core::engine::{run_live, EngineConfig};

        let base = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let ohlc = [
            (100.0, 101.0, 99.0, 100.0),
            (100.0, 101.0, 99.0, 100.0),
            (100.0, 101.0, 99.0, 100.0),
            (100.0, 103.0, 100.0, 102.0),
            (102.0, 105.0, 101.5, 104.0),
            (104.0, 104.0, 100.0, 101.0),
        ];
        let bars: Vec<Bar> = ohlc
            .iter()
            .enumerate()
            .map(|(i, &(o, h, l, c))| Bar::new(base + chrono::Duration::days(i as i64), o, h, l, c))
            .collect();
        let config = EngineConfig::new(3, 3, 1).unwrap();
        let m = RunMetrics::compute(&run_live(&config, &bars).unwrap());

        assert_eq!(m.fixed.fill_count, 2);
        assert_eq!(m.fixed.round_trips, 1);
        assert_eq!(m.fixed.final_pnl, -0.5);
    }

    // ── Properties ──

    fn arb_position() -> impl Strategy<Value = Position> {
        prop_oneof![Just(Position::Short), Just(Position::Flat), Just(Position::Long)]
    }

    proptest! {
        #[test]
        fn drawdown_is_bounded_by_the_curve(pnl in prop::collection::vec(-100.0f64..100.0, 0..60)) {
            let dd = max_drawdown(&pnl);
            prop_assert!(dd <= 0.0);
            let peak = pnl.iter().copied().fold(0.0_f64, f64::max);
            let trough = pnl.iter().copied().fold(0.0_f64, f64::min);
            prop_assert!(dd >= trough - peak);
        }

        #[test]
        fn round_trips_never_exceed_fills(
            steps in prop::collection::vec((arb_position(), any::<bool>()), 0..60)
        ) {
            // A position change always comes with a fill.
            let mut prev = Position::Flat;
            let states: Vec<TradeState> = steps
                .iter()
                .map(|&(position, extra_fill)| {
                    let fill = (position != prev || extra_fill).then_some(100.0);
                    prev = position;
                    state(position, fill, 0.0)
                })
                .collect();
            prop_assert!(round_trips(&states) <= fill_count(&states));
            prop_assert!(bars_in_market(&states) <= states.len());
        }
    }
}
