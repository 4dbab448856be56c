//! Noise and EV adoption data for the Papineau/Cartier intersection.
//!
//! This crate blends a small historical table of monthly LAeq24 noise levels
//! and EV registrations with procedurally synthesized readings:
//!
//! - [`historical`]: the immutable monthly dataset, embedded from a CSV fixture
//! - [`strategy`]: REAL vs ESTIMATED selection and the base noise level
//! - [`synth`]: layered time-of-day/traffic/micro-pattern noise synthesis
//! - [`window`]: the bounded sliding window driving the live chart
//! - [`ev`]: EV adoption projection and proportional noise reduction
//! - [`summary`]: dataset summaries and month-by-month correlation rows
//! - `live` (feature `live`): tokio timers that tick the window

pub mod config;
pub mod error;
pub mod ev;
pub mod historical;
pub mod strategy;
pub mod summary;
pub mod synth;
pub mod window;

#[cfg(feature = "live")]
pub mod live;

pub use config::{DataConfig, Location};
pub use error::DataError;
pub use ev::{EvAdoptionEstimate, EvProjector};
pub use historical::{HistoricalDataset, HistoricalPoint};
pub use strategy::{DataStrategy, StrategySelector};
pub use window::{NoiseReading, TimeSeriesSession};
