//! Sliding window of recent noise readings.
//!
//! A [`TimeSeriesSession`] is owned by one dashboard instance. It is seeded
//! with readings walking backward from "now", then extended one reading per
//! tick, evicting the oldest reading once the capacity is exceeded.

use crate::config::DataConfig;
use crate::error::DataError;
use crate::strategy::{DataStrategy, StrategySelector};
use crate::synth::{ev_impact, synthesize};
use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use log::debug;
use np_utils::dates::clock_label;
use np_utils::math::round_to;
use serde::Serialize;
use std::collections::VecDeque;

/// One synthesized reading, ready for charting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoiseReading {
    /// "HH:MM" label in the clock's local offset
    pub time: String,
    /// Synthesized noise, dB, rounded to 0.1
    pub noise: f64,
    /// Reduction from the historical baseline, dB, rounded to 0.1
    pub ev_impact: f64,
    pub is_real: bool,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TimeSeriesSession {
    selector: StrategySelector,
    capacity: usize,
    interval: TimeDelta,
    readings: VecDeque<NoiseReading>,
    last_update: Option<DateTime<Utc>>,
}

impl TimeSeriesSession {
    pub fn new(selector: StrategySelector, config: &DataConfig) -> Self {
        Self {
            selector,
            capacity: config.window_capacity,
            interval: config.interval,
            readings: VecDeque::with_capacity(config.window_capacity + 1),
            last_update: None,
        }
    }

    pub fn selector(&self) -> &StrategySelector {
        &self.selector
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn interval(&self) -> TimeDelta {
        self.interval
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    /// Copy of the current window, oldest first.
    pub fn snapshot(&self) -> Vec<NoiseReading> {
        self.readings.iter().cloned().collect()
    }

    /// Seed the window from the local wall clock.
    pub fn initialize(&mut self, point_count: usize) -> Result<Vec<NoiseReading>, DataError> {
        self.initialize_at(&Local::now(), point_count)
    }

    /// Seed the window with up to `point_count` readings ending at `now`,
    /// spaced one interval apart, oldest first.
    ///
    /// Does nothing when the window already holds readings.
    pub fn initialize_at<Tz: TimeZone>(
        &mut self,
        now: &DateTime<Tz>,
        point_count: usize,
    ) -> Result<Vec<NoiseReading>, DataError>
    where
        Tz::Offset: std::fmt::Display,
    {
        if !self.readings.is_empty() {
            return Ok(self.snapshot());
        }
        let count = point_count.min(self.capacity);
        let mut seeded = VecDeque::with_capacity(self.capacity + 1);
        for i in (0..count).rev() {
            let timestamp = now.clone() - self.interval * i as i32;
            seeded.push_back(self.reading_at(&timestamp)?);
        }
        debug!("Seeded time series with {} readings", seeded.len());
        self.readings = seeded;
        self.last_update = Some(now.with_timezone(&Utc));
        Ok(self.snapshot())
    }

    /// Advance the window from the local wall clock.
    pub fn tick(&mut self) -> Result<Vec<NoiseReading>, DataError> {
        self.tick_at(&Local::now())
    }

    /// Append a reading for `now` unless the previous update was less than one
    /// interval ago, evicting the oldest reading past capacity.
    pub fn tick_at<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) -> Result<Vec<NoiseReading>, DataError>
    where
        Tz::Offset: std::fmt::Display,
    {
        let now_utc = now.with_timezone(&Utc);
        if let Some(last) = self.last_update {
            if now_utc - last < self.interval {
                return Ok(self.snapshot());
            }
        }
        let reading = self.reading_at(now)?;
        self.readings.push_back(reading);
        while self.readings.len() > self.capacity {
            self.readings.pop_front();
        }
        self.last_update = Some(now_utc);
        Ok(self.snapshot())
    }

    /// Seed when empty, otherwise tick.
    pub fn next_frame(&mut self, point_count: usize) -> Result<Vec<NoiseReading>, DataError> {
        if self.readings.is_empty() {
            self.initialize(point_count)
        } else {
            self.tick()
        }
    }

    /// Forget all readings so a new display instance starts fresh.
    pub fn reset(&mut self) {
        self.readings.clear();
        self.last_update = None;
    }

    fn reading_at<Tz: TimeZone>(&self, timestamp: &DateTime<Tz>) -> Result<NoiseReading, DataError>
    where
        Tz::Offset: std::fmt::Display,
    {
        let strategy = self.selector.select_strategy(timestamp);
        let base = self.selector.base_noise_level(timestamp);
        let noise = synthesize(timestamp, base)?;
        let impact = ev_impact(self.selector.baseline_noise(), base);
        Ok(NoiseReading {
            time: clock_label(timestamp),
            noise: round_to(noise, 1),
            ev_impact: round_to(impact, 1),
            is_real: strategy == DataStrategy::Real,
            recorded_at: timestamp.with_timezone(&Utc),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::historical::HistoricalDataset;
    use std::sync::Arc;

    fn session(capacity: usize) -> TimeSeriesSession {
        let dataset = Arc::new(HistoricalDataset::embedded().unwrap());
        let config = DataConfig {
            window_capacity: capacity,
            ..DataConfig::default()
        };
        let selector = StrategySelector::new(dataset, &config);
        TimeSeriesSession::new(selector, &config)
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 10, 14, 0, 0).unwrap()
    }

    #[test]
    fn test_initialize_caps_at_capacity() {
        let mut s = session(20);
        assert_eq!(s.initialize_at(&start(), 5).unwrap().len(), 5);

        let mut s = session(20);
        assert_eq!(s.initialize_at(&start(), 50).unwrap().len(), 20);

        let mut s = session(20);
        assert!(s.initialize_at(&start(), 0).unwrap().is_empty());
    }

    #[test]
    fn test_initialize_walks_backward_oldest_first() {
        let mut s = session(20);
        let readings = s.initialize_at(&start(), 4).unwrap();
        let times: Vec<_> = readings.iter().map(|r| r.recorded_at).collect();
        assert_eq!(times[0], start() - TimeDelta::minutes(9));
        assert_eq!(times[3], start());
        assert!(times.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(readings[3].time, "14:00");
        assert!(readings.iter().all(|r| !r.is_real));
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let mut s = session(20);
        let first = s.initialize_at(&start(), 5).unwrap();
        let again = s.initialize_at(&(start() + TimeDelta::hours(2)), 10).unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn test_tick_within_interval_is_noop() {
        let mut s = session(20);
        s.initialize_at(&start(), 5).unwrap();
        let before = s.snapshot();
        let after = s.tick_at(&(start() + TimeDelta::seconds(30))).unwrap();
        assert_eq!(before, after);
        let again = s.tick_at(&(start() + TimeDelta::seconds(90))).unwrap();
        assert_eq!(again.len(), 5);
    }

    #[test]
    fn test_ticks_evict_oldest_first() {
        let capacity = 20;
        let mut s = session(capacity);
        let seeded = s.initialize_at(&start(), capacity).unwrap();
        let earliest = seeded[0].recorded_at;
        for k in 1..=(capacity as i32 + 1) {
            let snapshot = s.tick_at(&(start() + TimeDelta::minutes(3) * k)).unwrap();
            assert_eq!(snapshot.len(), capacity);
        }
        let window = s.snapshot();
        assert!(window.iter().all(|r| r.recorded_at != earliest));
        assert_eq!(
            window.last().unwrap().recorded_at,
            start() + TimeDelta::minutes(3 * 21)
        );
        assert!(window.windows(2).all(|w| w[0].recorded_at < w[1].recorded_at));
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut s = session(3);
        let mut snapshot = s.initialize_at(&start(), 3).unwrap();
        snapshot.clear();
        assert_eq!(s.len(), 3);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut s = session(20);
        s.initialize_at(&start(), 5).unwrap();
        s.reset();
        assert!(s.is_empty());
        assert!(s.last_update().is_none());
        assert_eq!(s.initialize_at(&start(), 2).unwrap().len(), 2);
    }

    #[test]
    fn test_readings_are_rounded_and_marked() {
        let mut s = session(20);
        let historical = Utc.with_ymd_and_hms(2024, 3, 12, 8, 0, 0).unwrap();
        let readings = s.initialize_at(&historical, 3).unwrap();
        for r in &readings {
            assert!(r.is_real);
            assert_eq!(r.noise, round_to(r.noise, 1));
            // March 2024 base 72.55 against the 73.0 baseline
            assert!((r.ev_impact - 0.5).abs() < 1e-9);
        }
    }
}
