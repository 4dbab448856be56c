use crate::config::Location;
use crate::error::DataError;
use chrono::NaiveDate;
use csv::ReaderBuilder;
use np_utils::dates::{month_key_of_date, parse_date};
use serde::{Deserialize, Serialize};

/// Embedded monthly LAeq24 noise levels (dBA) and cumulative EV registrations
/// within ~500 m of each street, June 2023 onward.
pub static CSV_OBJECT: &str = include_str!("../../fixtures/noise_ev_series.csv");

/// One month of observations for both streets.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalPoint {
    /// First day of the observed month
    pub timestamp: NaiveDate,
    /// Monthly LAeq24 on Avenue Papineau, dBA
    pub papineau_noise: f64,
    /// Monthly LAeq24 on Rue Cartier, dBA
    pub cartier_noise: f64,
    /// Cumulative registered EVs near Papineau
    pub papineau_evs: u32,
    /// Cumulative registered EVs near Cartier
    pub cartier_evs: u32,
}

impl HistoricalPoint {
    pub fn noise(&self, location: Location) -> f64 {
        match location {
            Location::Papineau => self.papineau_noise,
            Location::Cartier => self.cartier_noise,
        }
    }

    pub fn evs(&self, location: Location) -> u32 {
        match location {
            Location::Papineau => self.papineau_evs,
            Location::Cartier => self.cartier_evs,
        }
    }

    /// "YYYY-MM" key of the observed month.
    pub fn month_key(&self) -> String {
        month_key_of_date(&self.timestamp)
    }
}

/// Ordered, non-empty sequence of monthly observations.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalDataset {
    // Sorted ascending by timestamp; never empty.
    points: Vec<HistoricalPoint>,
}

impl HistoricalDataset {
    /// Build a dataset from points in any order.
    pub fn new(mut points: Vec<HistoricalPoint>) -> Result<Self, DataError> {
        if points.is_empty() {
            return Err(DataError::EmptyDataset);
        }
        points.sort_by_key(|p| p.timestamp);
        Ok(Self { points })
    }

    /// The dataset shipped with the crate.
    pub fn embedded() -> Result<Self, DataError> {
        Self::parse_csv(CSV_OBJECT)
    }

    /// Parse a CSV string of monthly observations.
    ///
    /// Expected columns (with headers):
    /// `timestamp,papineau_noise,cartier_noise,papineau_evs,cartier_evs`
    pub fn parse_csv(csv_object: &str) -> Result<Self, DataError> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(csv_object.as_bytes());
        let mut points = Vec::new();
        for (index, row) in rdr.records().enumerate() {
            // header is line 1
            let line = index + 2;
            let record = row.map_err(|e| DataError::Parse {
                line,
                reason: e.to_string(),
            })?;
            let field = |i: usize, name: &str| {
                record.get(i).ok_or_else(|| DataError::Parse {
                    line,
                    reason: format!("missing {name}"),
                })
            };
            let timestamp = parse_date(field(0, "timestamp")?).map_err(|e| DataError::Parse {
                line,
                reason: e.to_string(),
            })?;
            let papineau_noise = parse_number::<f64>(field(1, "papineau_noise")?, line)?;
            let cartier_noise = parse_number::<f64>(field(2, "cartier_noise")?, line)?;
            let papineau_evs = parse_number::<u32>(field(3, "papineau_evs")?, line)?;
            let cartier_evs = parse_number::<u32>(field(4, "cartier_evs")?, line)?;
            points.push(HistoricalPoint {
                timestamp,
                papineau_noise,
                cartier_noise,
                papineau_evs,
                cartier_evs,
            });
        }
        log::debug!("Loaded {} historical points", points.len());
        Self::new(points)
    }

    pub fn points(&self) -> &[HistoricalPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Earliest month; the noise baseline.
    pub fn first(&self) -> &HistoricalPoint {
        &self.points[0]
    }

    /// Most recent month.
    pub fn latest(&self) -> &HistoricalPoint {
        &self.points[self.points.len() - 1]
    }

    /// The point for a "YYYY-MM" month key, if that month was observed.
    pub fn find_month(&self, month_key: &str) -> Option<&HistoricalPoint> {
        self.points.iter().find(|p| p.month_key() == month_key)
    }

    /// Most recent point observed on or before `date`, or the earliest point
    /// when `date` predates the whole series.
    pub fn latest_on_or_before(&self, date: NaiveDate) -> &HistoricalPoint {
        self.points
            .iter()
            .rev()
            .find(|p| p.timestamp <= date)
            .unwrap_or_else(|| self.first())
    }

    /// Noise drop between the first and last month, in dB.
    pub fn total_noise_reduction(&self, location: Location) -> f64 {
        self.first().noise(location) - self.latest().noise(location)
    }

    /// Compound monthly growth of the EV series: `(last/first)^(1/months) - 1`.
    ///
    /// Falls back to `default_rate` with fewer than two months or a zero start.
    pub fn observed_monthly_growth(&self, location: Location, default_rate: f64) -> f64 {
        let months = self.points.len().saturating_sub(1);
        let first = self.first().evs(location) as f64;
        if months == 0 || first <= 0.0 {
            return default_rate;
        }
        let total_growth = self.latest().evs(location) as f64 / first;
        total_growth.powf(1.0 / months as f64) - 1.0
    }
}

fn parse_number<T: std::str::FromStr>(value: &str, line: usize) -> Result<T, DataError>
where
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| DataError::Parse {
        line,
        reason: format!("{value:?}: {e}"),
    })
}
