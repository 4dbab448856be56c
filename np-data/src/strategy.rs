//! REAL vs ESTIMATED data selection.
//!
//! Timestamps at or before the cutoff (midnight UTC on the last month of real
//! data) read the historical table; later timestamps extrapolate from the
//! last real month with a fixed per-day drift. The extrapolation starts at
//! zero drift on the cutoff day, so the base level is continuous across the
//! boundary.

use crate::config::{DataConfig, Location};
use crate::historical::{HistoricalDataset, HistoricalPoint};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use np_utils::dates::{month_key, utc_midnight, whole_days_between};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Where a value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataStrategy {
    Real,
    Estimated,
}

#[derive(Debug, Clone)]
pub struct StrategySelector {
    dataset: Arc<HistoricalDataset>,
    cutoff_date: NaiveDate,
    cutoff: DateTime<Utc>,
    drift_per_day: f64,
    location: Location,
}

impl StrategySelector {
    pub fn new(dataset: Arc<HistoricalDataset>, config: &DataConfig) -> Self {
        let cutoff_date = config.cutoff.unwrap_or(dataset.latest().timestamp);
        Self {
            cutoff: utc_midnight(&cutoff_date),
            cutoff_date,
            dataset,
            drift_per_day: config.noise_drift_per_day,
            location: config.location,
        }
    }

    pub fn dataset(&self) -> &Arc<HistoricalDataset> {
        &self.dataset
    }

    pub fn location(&self) -> Location {
        self.location
    }

    /// The cutoff instant (midnight UTC of the cutoff month).
    pub fn cutoff(&self) -> DateTime<Utc> {
        self.cutoff
    }

    pub fn cutoff_date(&self) -> NaiveDate {
        self.cutoff_date
    }

    /// The last real month, anchoring both the gap fallback and extrapolation.
    pub fn anchor(&self) -> &HistoricalPoint {
        self.dataset.latest_on_or_before(self.cutoff_date)
    }

    pub fn select_strategy<Tz: TimeZone>(&self, timestamp: &DateTime<Tz>) -> DataStrategy {
        if timestamp.with_timezone(&Utc) <= self.cutoff {
            DataStrategy::Real
        } else {
            DataStrategy::Estimated
        }
    }

    /// Base noise level for a timestamp, before any synthesized variation.
    ///
    /// A REAL timestamp whose month is missing from the table falls back to the
    /// anchor month rather than failing.
    pub fn base_noise_level<Tz: TimeZone>(&self, timestamp: &DateTime<Tz>) -> f64 {
        match self.select_strategy(timestamp) {
            DataStrategy::Real => self
                .dataset
                .find_month(&month_key(timestamp))
                .unwrap_or_else(|| self.anchor())
                .noise(self.location),
            DataStrategy::Estimated => {
                let days = whole_days_between(&self.cutoff, timestamp);
                self.anchor().noise(self.location) + days as f64 * self.drift_per_day
            }
        }
    }

    /// Noise at the start of the series; EV impact is measured against it.
    pub fn baseline_noise(&self) -> f64 {
        self.dataset.first().noise(self.location)
    }

    /// Days elapsed since the cutoff (negative before it).
    pub fn days_since_cutoff<Tz: TimeZone>(&self, timestamp: &DateTime<Tz>) -> i64 {
        whole_days_between(&self.cutoff, timestamp)
    }
}
