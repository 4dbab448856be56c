//! EV adoption as a share of the local fleet.

use crate::config::DataConfig;
use crate::strategy::{DataStrategy, StrategySelector};
use chrono::{DateTime, TimeZone, Utc};
use np_utils::dates::epoch_days;
use np_utils::math::round_to;
use serde::Serialize;

/// Amplitude of the cosmetic daily oscillation, in percentage points.
const DAILY_OSCILLATION: f64 = 0.05;

/// Adoption percentage with the strategy that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvAdoptionEstimate {
    pub percentage: f64,
    pub strategy: DataStrategy,
}

#[derive(Debug, Clone)]
pub struct EvProjector {
    selector: StrategySelector,
    total_fleet: f64,
    monthly_growth: f64,
}

impl EvProjector {
    pub fn new(selector: StrategySelector, config: &DataConfig) -> Self {
        Self {
            selector,
            total_fleet: config.total_fleet,
            monthly_growth: config.monthly_ev_growth,
        }
    }

    /// Equivalent daily rate of the monthly growth: `(1 + m)^(1/30) - 1`.
    pub fn daily_growth_rate(&self) -> f64 {
        (1.0 + self.monthly_growth).powf(1.0 / 30.0) - 1.0
    }

    /// Adoption percentage right now.
    pub fn current_adoption(&self) -> f64 {
        self.estimate_at(&Utc::now()).percentage
    }

    /// Adoption at `timestamp`, rounded to two decimals.
    ///
    /// REAL reads the last real EV count; ESTIMATED compounds it forward by the
    /// daily rate for each whole day past the cutoff. A non-positive fleet size
    /// yields 0.
    pub fn estimate_at<Tz: TimeZone>(&self, timestamp: &DateTime<Tz>) -> EvAdoptionEstimate {
        let strategy = self.selector.select_strategy(timestamp);
        if !(self.total_fleet.is_finite() && self.total_fleet > 0.0) {
            return EvAdoptionEstimate {
                percentage: 0.0,
                strategy,
            };
        }
        let latest = self.selector.anchor().evs(self.selector.location()) as f64;
        let evs = match strategy {
            DataStrategy::Real => latest,
            DataStrategy::Estimated => {
                let days = self.selector.days_since_cutoff(timestamp).max(0);
                latest * (1.0 + self.daily_growth_rate()).powf(days as f64)
            }
        };
        let adoption = evs / self.total_fleet * 100.0;
        let oscillation = epoch_days(timestamp).sin() * DAILY_OSCILLATION;
        EvAdoptionEstimate {
            percentage: round_to((adoption + oscillation).max(0.0), 2),
            strategy,
        }
    }

    /// Noise reduction attributable to an adoption `rate`, proportional to the
    /// reduction observed over the historical series.
    pub fn noise_reduction(&self, rate: f64) -> f64 {
        self.noise_reduction_at(rate, &Utc::now())
    }

    /// Returns 0 when current adoption is 0.
    pub fn noise_reduction_at<Tz: TimeZone>(&self, rate: f64, timestamp: &DateTime<Tz>) -> f64 {
        let current = self.estimate_at(timestamp).percentage;
        if current == 0.0 {
            return 0.0;
        }
        let observed = self
            .selector
            .dataset()
            .total_noise_reduction(self.selector.location());
        round_to(rate / current * observed, 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::historical::HistoricalDataset;
    use std::sync::Arc;

    fn projector(config: DataConfig) -> EvProjector {
        let dataset = Arc::new(HistoricalDataset::embedded().unwrap());
        let selector = StrategySelector::new(dataset, &config);
        EvProjector::new(selector, &config)
    }

    #[test]
    fn test_real_adoption_uses_latest_count() {
        let p = projector(DataConfig::default());
        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let estimate = p.estimate_at(&ts);
        assert_eq!(estimate.strategy, DataStrategy::Real);
        // 4340 / 50000 = 8.68 %, plus at most 0.05 of oscillation and rounding
        assert!((estimate.percentage - 8.68).abs() <= 0.06);
    }

    #[test]
    fn test_estimated_adoption_compounds() {
        let p = projector(DataConfig::default());
        let ts = Utc.with_ymd_and_hms(2025, 7, 30, 12, 0, 0).unwrap();
        let estimate = p.estimate_at(&ts);
        assert_eq!(estimate.strategy, DataStrategy::Estimated);
        // 90 days past the cutoff is three months of 3 % growth
        let expected = 4340.0 * 1.03_f64.powi(3) / 50_000.0 * 100.0;
        assert!((estimate.percentage - expected).abs() <= 0.06);
    }

    #[test]
    fn test_daily_rate_matches_monthly() {
        let p = projector(DataConfig::default());
        let monthly = (1.0 + p.daily_growth_rate()).powi(30) - 1.0;
        assert!((monthly - 0.03).abs() < 1e-12);
    }

    #[test]
    fn test_zero_fleet_is_safe() {
        let p = projector(DataConfig {
            total_fleet: 0.0,
            ..DataConfig::default()
        });
        let ts = Utc.with_ymd_and_hms(2025, 7, 30, 12, 0, 0).unwrap();
        assert_eq!(p.estimate_at(&ts).percentage, 0.0);
        assert_eq!(p.noise_reduction_at(5.0, &ts), 0.0);
        assert_eq!(p.noise_reduction(5.0), 0.0);
    }

    #[test]
    fn test_noise_reduction_is_proportional() {
        let p = projector(DataConfig::default());
        let ts = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let current = p.estimate_at(&ts).percentage;
        let full = p.noise_reduction_at(current, &ts);
        assert!((full - 1.15).abs() < 0.011);
        let half = p.noise_reduction_at(current / 2.0, &ts);
        assert!((half - full / 2.0).abs() < 0.011);
    }
}
