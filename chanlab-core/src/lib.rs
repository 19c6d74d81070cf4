//! Chanlab Core — channel-break backtesting over a grid of lookback pairs.
//!
//! This crate contains the engine:
//! - Domain types (bars, lookback pairs, trend, position)
//! - Channel level calculation over trailing windows
//! - The single-pair trade step (sticky trend, near-level entries and exits)
//! - The parameter grid, advanced one bar at a time
//! - The best-pair selector and the walk-forward live driver
//!
//! Loading data and writing results belong to `chanlab-runner`.

pub mod domain;
pub mod engine;
pub mod indicators;
