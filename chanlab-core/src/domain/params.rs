//! Lookback pair for one channel configuration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A (far, near) lookback pair.
///
/// `near_len` is always strictly shorter than `far_len`, so the near channel
/// is nested inside the far channel. Construction through [`ChannelParams::new`]
/// enforces `1 <= near_len < far_len`; the upper bound against the grid size is
/// checked by the engine config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelParams {
    pub far_len: usize,
    pub near_len: usize,
}

impl ChannelParams {
    pub fn new(far_len: usize, near_len: usize) -> Option<Self> {
        if near_len >= 1 && near_len < far_len {
            Some(Self { far_len, near_len })
        } else {
            None
        }
    }

    pub fn is_valid(&self) -> bool {
        self.near_len >= 1 && self.near_len < self.far_len
    }

    /// Every valid pair with `far_len <= max_window`, far-then-near order.
    pub fn enumerate(max_window: usize) -> impl Iterator<Item = ChannelParams> {
        (2..=max_window)
            .flat_map(|far_len| (1..far_len).map(move |near_len| ChannelParams { far_len, near_len }))
    }
}

impl Default for ChannelParams {
    fn default() -> Self {
        Self {
            far_len: 2,
            near_len: 1,
        }
    }
}

impl fmt::Display for ChannelParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "far={} near={}", self.far_len, self.near_len)
    }
}
