use chrono::{NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};

/// Estimated number of vehicles in the monitoring area.
pub const TOTAL_FLEET_ESTIMATE: f64 = 50_000.0;

/// Linear noise drift applied past the cutoff, in dB per day.
pub const NOISE_DRIFT_PER_DAY: f64 = -0.002;

/// Monthly EV growth rate observed in the registration series.
pub const MONTHLY_EV_GROWTH: f64 = 0.03;

/// Default number of readings kept in the sliding window.
pub const WINDOW_CAPACITY: usize = 20;

/// Monitored street at the intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    /// Avenue Papineau, the major artery.
    #[default]
    Papineau,
    /// Rue Cartier, the residential street.
    Cartier,
}

/// Parameters for the strategy selector, window and EV projector.
#[derive(Debug, Clone, PartialEq)]
pub struct DataConfig {
    /// Last month of real data. `None` uses the last month in the dataset.
    pub cutoff: Option<NaiveDate>,
    pub total_fleet: f64,
    pub noise_drift_per_day: f64,
    pub monthly_ev_growth: f64,
    pub window_capacity: usize,
    /// Spacing of seeded readings and minimum time between ticks.
    pub interval: TimeDelta,
    pub location: Location,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            cutoff: None,
            total_fleet: TOTAL_FLEET_ESTIMATE,
            noise_drift_per_day: NOISE_DRIFT_PER_DAY,
            monthly_ev_growth: MONTHLY_EV_GROWTH,
            window_capacity: WINDOW_CAPACITY,
            interval: TimeDelta::minutes(3),
            location: Location::Papineau,
        }
    }
}

impl DataConfig {
    /// Interactive mode: three minutes of wall time compressed to three seconds.
    pub fn demo() -> Self {
        Self {
            interval: TimeDelta::seconds(3),
            ..Self::default()
        }
    }
}
