//! Sticky tri-state trend.

use serde::{Deserialize, Serialize};

/// Directional state of the far channel.
///
/// Starts `Undetermined` and stays there until the first close outside the far
/// channel. After that it only flips on a breakout in the opposite direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Trend {
    #[default]
    Undetermined,
    Up,
    Down,
}

impl Trend {
    /// Classify the trend for a bar closing at `close` against the far channel.
    ///
    /// A close strictly above `far_resistance` is an up-break, strictly below
    /// `far_support` a down-break. Anything inside the channel keeps `self`.
    pub fn classify(self, close: f64, far_support: f64, far_resistance: f64) -> Trend {
        if close > far_resistance {
            Trend::Up
        } else if close < far_support {
            Trend::Down
        } else {
            self
        }
    }

    pub fn is_determined(self) -> bool {
        self != Trend::Undetermined
    }

    /// Signed representation used in exported tables: -1, 0, +1.
    pub fn as_sign(self) -> i8 {
        match self {
            Trend::Undetermined => 0,
            Trend::Up => 1,
            Trend::Down => -1,
        }
    }
}
