//! Layered noise synthesis.
//!
//! A reading is the base level plus five additive terms, summed in this order:
//!
//! 1. time of day (rush hours, daytime, night)
//! 2. traffic-light cycle keyed to the minute of the hour
//! 3. weekend reduction
//! 4. micro-pattern: 15-minute, 3-minute and 1-minute sine waves on epoch time
//! 5. jitter derived from epoch milliseconds
//!
//! Every term is a pure function of the timestamp, so a given instant always
//! yields the same reading.

use crate::error::DataError;
use chrono::{DateTime, Datelike, TimeZone, Timelike, Weekday};
use std::f64::consts::PI;

/// Quietest value a reading may take, dB.
pub const MIN_DB: f64 = 30.0;
/// Loudest value a reading may take, dB.
pub const MAX_DB: f64 = 85.0;

const RUSH_HOUR_OFFSET: f64 = 8.0;
const DAYTIME_OFFSET: f64 = 2.0;
const NIGHT_OFFSET: f64 = -5.0;
const TRAFFIC_LIGHT_AMPLITUDE: f64 = 1.2;
const WEEKEND_OFFSET: f64 = -4.0;
const JITTER_MODULUS: i64 = 997;
const JITTER_AMPLITUDE: f64 = 1.2;

/// The individual variation terms for one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseTerms {
    pub time_of_day: f64,
    pub traffic_light: f64,
    pub weekend: f64,
    pub micro_pattern: f64,
    pub jitter: f64,
}

impl NoiseTerms {
    pub fn at<Tz: TimeZone>(timestamp: &DateTime<Tz>) -> Self {
        let millis = timestamp.timestamp_millis();
        Self {
            time_of_day: time_of_day_offset(timestamp.hour()),
            traffic_light: traffic_light_cycle(timestamp.minute()),
            weekend: weekend_offset(timestamp.weekday()),
            micro_pattern: micro_pattern(millis),
            jitter: jitter(millis),
        }
    }

    /// Sum of the terms, added to `base` in the fixed order.
    pub fn apply(&self, base: f64) -> f64 {
        base + self.time_of_day + self.traffic_light + self.weekend + self.micro_pattern + self.jitter
    }
}

/// Step function by local hour.
pub fn time_of_day_offset(hour: u32) -> f64 {
    match hour {
        7..=9 | 16..=19 => RUSH_HOUR_OFFSET,
        6..=22 => DAYTIME_OFFSET,
        _ => NIGHT_OFFSET,
    }
}

/// Roughly two-minute traffic-light cycle.
pub fn traffic_light_cycle(minute: u32) -> f64 {
    (minute as f64 / 2.0 * PI).sin() * TRAFFIC_LIGHT_AMPLITUDE
}

pub fn weekend_offset(weekday: Weekday) -> f64 {
    match weekday {
        Weekday::Sat | Weekday::Sun => WEEKEND_OFFSET,
        _ => 0.0,
    }
}

/// Sum of three sine waves with 15-, 3- and 1-minute periods on epoch time.
pub fn micro_pattern(epoch_millis: i64) -> f64 {
    let t = epoch_millis as f64;
    (t / 900_000.0).sin() * 1.5 + (t / 180_000.0).sin() * 0.8 + (t / 60_000.0).sin() * 0.4
}

/// Deterministic jitter in `[-1.2, 1.2)` from the epoch milliseconds.
pub fn jitter(epoch_millis: i64) -> f64 {
    let bucket = epoch_millis.rem_euclid(JITTER_MODULUS) as f64;
    (bucket / JITTER_MODULUS as f64 * 2.0 - 1.0) * JITTER_AMPLITUDE
}

/// Synthesize an instantaneous reading, clamped to `[MIN_DB, MAX_DB]`.
///
/// Hour, minute and weekday are read in the timestamp's own timezone.
pub fn synthesize<Tz: TimeZone>(timestamp: &DateTime<Tz>, base_noise: f64) -> Result<f64, DataError> {
    if !base_noise.is_finite() {
        return Err(DataError::UndefinedBaseNoise);
    }
    let value = NoiseTerms::at(timestamp).apply(base_noise);
    Ok(value.clamp(MIN_DB, MAX_DB))
}

/// Noise attributed to EV adoption: how far the current base sits below the
/// historical baseline, never negative.
pub fn ev_impact(historical_baseline: f64, current_base: f64) -> f64 {
    (historical_baseline - current_base).max(0.0)
}
