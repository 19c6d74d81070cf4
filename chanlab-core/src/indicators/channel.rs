//! Channel levels — lowest low / highest high over trailing windows.
//!
//! Two windows end at the bar just before the one being traded:
//! - Far:  `far_len` bars, gives the breakout channel (trend)
//! - Near: `near_len` bars, a sub-window giving entry and exit prices
//!
//! The current bar never contributes to its own levels.

use serde::{Deserialize, Serialize};

use crate::domain::{Bar, ChannelParams};

/// Support and resistance for one (far, near) pair at one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelSet {
    pub far_support: f64,
    pub far_resistance: f64,
    pub near_support: f64,
    pub near_resistance: f64,
}

/// Compute the levels for `params` from `history`, which must exclude the
/// current bar.
///
/// Returns `None` when fewer than `far_len` bars are available.
pub fn compute_levels(history: &[Bar], params: ChannelParams) -> Option<LevelSet> {
    if !params.is_valid() || history.len() < params.far_len {
        return None;
    }
    let far = &history[history.len() - params.far_len..];
    let near = &history[history.len() - params.near_len..];
    Some(LevelSet {
        far_support: lowest_low(far),
        far_resistance: highest_high(far),
        near_support: lowest_low(near),
        near_resistance: highest_high(near),
    })
}

fn lowest_low(window: &[Bar]) -> f64 {
    window.iter().fold(f64::INFINITY, |acc, b| acc.min(b.low))
}

fn highest_high(window: &[Bar]) -> f64 {
    window.iter().fold(f64::NEG_INFINITY, |acc, b| acc.max(b.high))
}

/// Running extrema for every trailing window length up to a fixed depth.
///
/// All grid cells read windows that end on the same bar, so one backward pass
/// over the last `depth` bars answers every (far, near) lookup in O(1).
/// `lows[k - 1]` is the lowest low of the last `k` bars, `highs[k - 1]` the
/// highest high.
#[derive(Debug, Clone)]
pub struct ExtremaLadder {
    lows: Vec<f64>,
    highs: Vec<f64>,
}

impl ExtremaLadder {
    /// Build the ladder from the tail of `history`, up to `max_window` bars deep.
    pub fn build(history: &[Bar], max_window: usize) -> Self {
        let depth = max_window.min(history.len());
        let mut lows = Vec::with_capacity(depth);
        let mut highs = Vec::with_capacity(depth);
        let mut low = f64::INFINITY;
        let mut high = f64::NEG_INFINITY;
        for bar in history.iter().rev().take(depth) {
            low = low.min(bar.low);
            high = high.max(bar.high);
            lows.push(low);
            highs.push(high);
        }
        Self { lows, highs }
    }

    /// Number of window lengths available.
    pub fn depth(&self) -> usize {
        self.lows.len()
    }

    pub fn levels(&self, params: ChannelParams) -> Option<LevelSet> {
        if !params.is_valid() || params.far_len > self.depth() {
            return None;
        }
        Some(LevelSet {
            far_support: self.lows[params.far_len - 1],
            far_resistance: self.highs[params.far_len - 1],
            near_support: self.lows[params.near_len - 1],
            near_resistance: self.highs[params.near_len - 1],
        })
    }
}
