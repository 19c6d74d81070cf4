//! Domain types for the channel-break engine.

pub mod bar;
pub mod params;
pub mod position;
pub mod trend;

pub use bar::Bar;
pub use params::ChannelParams;
pub use position::Position;
pub use trend::Trend;
