//! Single-parameter trade step — the channel-break rule applied to one bar.
//!
//! Per bar, for one (far, near) pair:
//! 1. Levels from the bars strictly before the current one
//! 2. Trend from the current close against the far channel
//! 3. Wait while the trend is undetermined
//! 4. Reversal exit, entry, or take-profit at the near levels
//! 5. Mark to market at the close
//!
//! Fills happen exactly at the level prices with unlimited liquidity, one unit
//! at a time.

use crate::domain::{Bar, ChannelParams, Position, Trend};
use crate::indicators::{compute_levels, LevelSet};

use super::state::{ReversalExit, TradeState};

/// Outcome of one trade step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub state: TradeState,
    pub levels: LevelSet,
}

/// Run one step for `params`. `history` must end with the bar before `bar`.
///
/// Returns `None` while fewer than `far_len` historical bars exist; the caller
/// treats that as "no decision yet".
pub fn trade_step(
    history: &[Bar],
    bar: &Bar,
    prev: &TradeState,
    params: ChannelParams,
    reversal_exit: ReversalExit,
) -> Option<Step> {
    let levels = compute_levels(history, params)?;
    Some(Step {
        state: apply_rule(prev, bar.close, &levels, reversal_exit),
        levels,
    })
}

/// Apply the trading rule to `prev` for a bar closing at `close`.
pub fn apply_rule(prev: &TradeState, close: f64, levels: &LevelSet, reversal_exit: ReversalExit) -> TradeState {
    let trend = prev
        .trend
        .classify(close, levels.far_support, levels.far_resistance);

    let mut next = TradeState {
        trend,
        position: prev.position,
        cash: prev.cash,
        fill_price: None,
        liquidation_price: None,
        pnl: prev.pnl,
    };

    let reversed = trend != prev.trend;
    match trend {
        Trend::Undetermined => {}
        Trend::Up => {
            if reversed && !prev.position.is_flat() {
                let price = match reversal_exit {
                    ReversalExit::Close => close,
                    ReversalExit::NearLevel => levels.near_resistance,
                };
                close_position(&mut next, price);
            } else if !reversed && prev.position.is_flat() && close <= levels.near_support {
                open_position(&mut next, Position::Long, levels.near_support);
            } else if !reversed && !prev.position.is_flat() && close >= levels.near_resistance {
                close_position(&mut next, levels.near_resistance);
            }
        }
        Trend::Down => {
            if reversed && !prev.position.is_flat() {
                let price = match reversal_exit {
                    ReversalExit::Close => close,
                    ReversalExit::NearLevel => levels.near_support,
                };
                close_position(&mut next, price);
            } else if !reversed && prev.position.is_flat() && close >= levels.near_resistance {
                open_position(&mut next, Position::Short, levels.near_resistance);
            } else if !reversed && !prev.position.is_flat() && close <= levels.near_support {
                close_position(&mut next, levels.near_support);
            }
        }
    }

    next.pnl = next.mark(close);
    next
}

fn open_position(state: &mut TradeState, side: Position, price: f64) {
    state.position = side;
    state.cash -= side.market_value(price);
    state.fill_price = Some(price);
}

fn close_position(state: &mut TradeState, price: f64) {
    state.cash += state.position.market_value(price);
    state.position = Position::Flat;
    state.fill_price = Some(price);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_ohlc_bars, DEFAULT_EPSILON};

    fn levels() -> LevelSet {
        LevelSet {
            far_support: 90.0,
            far_resistance: 110.0,
            near_support: 98.0,
            near_resistance: 104.0,
        }
    }

    fn state(trend: Trend, position: Position, cash: f64) -> TradeState {
        TradeState {
            trend,
            position,
            cash,
            fill_price: None,
            liquidation_price: None,
            pnl: 0.0,
        }
    }

    #[test]
    fn waits_while_undetermined() {
        let prev = TradeState::default();
        let next = apply_rule(&prev, 100.0, &levels(), ReversalExit::NearLevel);
        assert_eq!(next.trend, Trend::Undetermined);
        assert_eq!(next.position, Position::Flat);
        assert_eq!(next.fill_price, None);
        assert_eq!(next.pnl, 0.0);
    }

    #[test]
    fn first_breakout_sets_trend_without_trading() {
        let prev = TradeState::default();
        let next = apply_rule(&prev, 111.0, &levels(), ReversalExit::NearLevel);
        assert_eq!(next.trend, Trend::Up);
        assert_eq!(next.position, Position::Flat);
        assert_eq!(next.fill_price, None);
    }

    #[test]
    fn uptrend_buys_pullback_at_near_support() {
        let prev = state(Trend::Up, Position::Flat, 0.0);
        let next = apply_rule(&prev, 97.0, &levels(), ReversalExit::NearLevel);
        assert_eq!(next.position, Position::Long);
        assert_eq!(next.fill_price, Some(98.0));
        assert_approx(next.cash, -98.0, DEFAULT_EPSILON);
        assert_approx(next.pnl, -1.0, DEFAULT_EPSILON);
    }

    #[test]
    fn uptrend_takes_profit_at_near_resistance() {
        let prev = state(Trend::Up, Position::Long, -98.0);
        let next = apply_rule(&prev, 105.0, &levels(), ReversalExit::NearLevel);
        assert_eq!(next.position, Position::Flat);
        assert_eq!(next.fill_price, Some(104.0));
        assert_approx(next.cash, 6.0, DEFAULT_EPSILON);
        assert_approx(next.pnl, 6.0, DEFAULT_EPSILON);
    }

    #[test]
    fn uptrend_holds_inside_near_channel() {
        let prev = state(Trend::Up, Position::Long, -98.0);
        let next = apply_rule(&prev, 101.0, &levels(), ReversalExit::NearLevel);
        assert_eq!(next.position, Position::Long);
        assert_eq!(next.fill_price, None);
        assert_approx(next.pnl, 3.0, DEFAULT_EPSILON);
    }

    #[test]
    fn downtrend_shorts_rally_at_near_resistance() {
        let prev = state(Trend::Down, Position::Flat, 0.0);
        let next = apply_rule(&prev, 105.0, &levels(), ReversalExit::NearLevel);
        assert_eq!(next.position, Position::Short);
        assert_eq!(next.fill_price, Some(104.0));
        assert_approx(next.cash, 104.0, DEFAULT_EPSILON);
        assert_approx(next.pnl, -1.0, DEFAULT_EPSILON);
    }

    #[test]
    fn downtrend_covers_at_near_support() {
        let prev = state(Trend::Down, Position::Short, 104.0);
        let next = apply_rule(&prev, 97.0, &levels(), ReversalExit::NearLevel);
        assert_eq!(next.position, Position::Flat);
        assert_eq!(next.fill_price, Some(98.0));
        assert_approx(next.pnl, 6.0, DEFAULT_EPSILON);
    }

    #[test]
    fn reversal_up_covers_short_at_near_resistance() {
        let prev = state(Trend::Down, Position::Short, 104.0);
        let next = apply_rule(&prev, 112.0, &levels(), ReversalExit::NearLevel);
        assert_eq!(next.trend, Trend::Up);
        assert_eq!(next.position, Position::Flat);
        assert_eq!(next.fill_price, Some(104.0));
        assert_approx(next.pnl, 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn reversal_down_sells_long_at_near_support() {
        let prev = state(Trend::Up, Position::Long, -98.0);
        let next = apply_rule(&prev, 88.0, &levels(), ReversalExit::NearLevel);
        assert_eq!(next.trend, Trend::Down);
        assert_eq!(next.position, Position::Flat);
        assert_eq!(next.fill_price, Some(98.0));
        assert_approx(next.pnl, 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn reversal_exit_can_use_close() {
        let prev = state(Trend::Up, Position::Long, -98.0);
        let next = apply_rule(&prev, 88.0, &levels(), ReversalExit::Close);
        assert_eq!(next.position, Position::Flat);
        assert_eq!(next.fill_price, Some(88.0));
        assert_approx(next.pnl, -10.0, DEFAULT_EPSILON);
    }

    #[test]
    fn trade_step_needs_far_history() {
        let bars = make_ohlc_bars(&[
            (100.0, 101.0, 99.0, 100.0),
            (100.0, 101.0, 99.0, 100.0),
            (100.0, 103.0, 99.0, 102.0),
        ]);
        let params = ChannelParams::new(3, 1).unwrap();
        let prev = TradeState::default();
        assert!(trade_step(&bars[..2], &bars[2], &prev, params, ReversalExit::NearLevel).is_none());

        let params = ChannelParams::new(2, 1).unwrap();
        let step = trade_step(&bars[..2], &bars[2], &prev, params, ReversalExit::NearLevel).unwrap();
        assert_eq!(step.state.trend, Trend::Up);
        assert_approx(step.levels.far_resistance, 101.0, DEFAULT_EPSILON);
    }
}
