//! Channel level calculation.

pub mod channel;

pub use channel::{compute_levels, ExtremaLadder, LevelSet};

/// Build bars from (open, high, low, close) tuples on consecutive days.
#[cfg(test)]
pub fn make_ohlc_bars(data: &[(f64, f64, f64, f64)]) -> Vec<crate::domain::Bar> {
    use crate::domain::Bar;
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| {
            Bar::new(base_date + chrono::Duration::days(i as i64), open, high, low, close)
        })
        .collect()
}

/// Create synthetic bars from close prices for testing.
///
/// open = previous close (or close for the first bar), high = close + 1.0,
/// low = close - 1.0.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<crate::domain::Bar> {
    let data: Vec<_> = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            (open, close + 1.0, close - 1.0, close)
        })
        .collect();
    make_ohlc_bars(&data)
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for level tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
