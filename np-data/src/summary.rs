//! Summaries of the historical table for display.

use crate::config::{DataConfig, Location};
use crate::historical::HistoricalDataset;
use crate::strategy::{DataStrategy, StrategySelector};
use chrono::{DateTime, TimeZone};
use np_utils::dates::format_date;
use np_utils::math::round_to;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealDataPeriod {
    pub start: String,
    pub end: String,
    pub months_tracked: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvGrowth {
    pub start: u32,
    pub end: u32,
    /// Growth over the whole series, percent
    pub total_growth: f64,
}

/// Headline figures shown next to the live chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSummary {
    pub real_data_period: RealDataPeriod,
    /// dB dropped between the first and last month
    pub papineau_noise_reduction: f64,
    pub cartier_noise_reduction: f64,
    pub papineau_ev_growth: EvGrowth,
    pub cartier_ev_growth: EvGrowth,
    /// Monthly EV growth fitted to the Papineau series, percent
    pub observed_monthly_growth: f64,
    pub current_strategy: DataStrategy,
    pub transition_point: String,
}

/// One historical month with derived adoption and reduction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationPoint {
    pub date: String,
    pub papineau_noise: f64,
    pub cartier_noise: f64,
    pub papineau_evs: u32,
    pub cartier_evs: u32,
    pub papineau_ev_adoption: f64,
    pub cartier_ev_adoption: f64,
    /// Papineau dB below the first month
    pub noise_reduction: f64,
}

fn ev_growth(dataset: &HistoricalDataset, location: Location) -> EvGrowth {
    let start = dataset.first().evs(location);
    let end = dataset.latest().evs(location);
    let total_growth = if start == 0 {
        0.0
    } else {
        round_to((end as f64 / start as f64 - 1.0) * 100.0, 2)
    };
    EvGrowth {
        start,
        end,
        total_growth,
    }
}

/// Summarize the dataset as seen at `now`.
pub fn summarize<Tz: TimeZone>(
    selector: &StrategySelector,
    config: &DataConfig,
    now: &DateTime<Tz>,
) -> DatasetSummary {
    let dataset = selector.dataset();
    DatasetSummary {
        real_data_period: RealDataPeriod {
            start: format_date(&dataset.first().timestamp),
            end: format_date(&dataset.latest().timestamp),
            months_tracked: dataset.len(),
        },
        papineau_noise_reduction: round_to(dataset.total_noise_reduction(Location::Papineau), 2),
        cartier_noise_reduction: round_to(dataset.total_noise_reduction(Location::Cartier), 2),
        papineau_ev_growth: ev_growth(dataset, Location::Papineau),
        cartier_ev_growth: ev_growth(dataset, Location::Cartier),
        observed_monthly_growth: round_to(
            dataset.observed_monthly_growth(Location::Papineau, config.monthly_ev_growth) * 100.0,
            2,
        ),
        current_strategy: selector.select_strategy(now),
        transition_point: format_date(&selector.cutoff_date()),
    }
}

/// Month-by-month noise, EV counts and adoption against `total_fleet`.
pub fn correlation_series(dataset: &HistoricalDataset, total_fleet: f64) -> Vec<CorrelationPoint> {
    let baseline = dataset.first().papineau_noise;
    let adoption = |evs: u32| {
        if total_fleet > 0.0 {
            round_to(evs as f64 / total_fleet * 100.0, 2)
        } else {
            0.0
        }
    };
    dataset
        .points()
        .iter()
        .map(|p| CorrelationPoint {
            date: format_date(&p.timestamp),
            papineau_noise: round_to(p.papineau_noise, 1),
            cartier_noise: round_to(p.cartier_noise, 1),
            papineau_evs: p.papineau_evs,
            cartier_evs: p.cartier_evs,
            papineau_ev_adoption: adoption(p.papineau_evs),
            cartier_ev_adoption: adoption(p.cartier_evs),
            noise_reduction: round_to(baseline - p.papineau_noise, 2),
        })
        .collect()
}
