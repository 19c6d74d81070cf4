use serde::{Deserialize, Serialize};

/// Single-unit position held by one trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Position {
    Short,
    #[default]
    Flat,
    Long,
}

impl Position {
    /// Signed unit count: -1, 0 or +1.
    pub fn units(self) -> f64 {
        match self {
            Position::Short => -1.0,
            Position::Flat => 0.0,
            Position::Long => 1.0,
        }
    }

    pub fn as_sign(self) -> i8 {
        match self {
            Position::Short => -1,
            Position::Flat => 0,
            Position::Long => 1,
        }
    }

    pub fn is_flat(self) -> bool {
        self == Position::Flat
    }

    pub fn market_value(self, price: f64) -> f64 {
        self.units() * price
    }
}
