//! Noise simulation and dataset summary commands.

use anyhow::Context;
use chrono::{DateTime, Local, Utc};
use log::info;
use np_data::live::{LiveConfig, LiveFeed};
use np_data::summary::{correlation_series, summarize};
use np_data::{
    DataConfig, DataStrategy, EvProjector, HistoricalDataset, Location, NoiseReading,
    StrategySelector, TimeSeriesSession,
};
use std::sync::Arc;
use std::time::Duration;

fn load(config: &DataConfig) -> anyhow::Result<StrategySelector> {
    let dataset = HistoricalDataset::embedded().context("Failed to load the historical dataset")?;
    Ok(StrategySelector::new(Arc::new(dataset), config))
}

fn parse_start(at: Option<&str>) -> anyhow::Result<DateTime<Local>> {
    match at {
        Some(raw) => {
            let parsed = DateTime::parse_from_rfc3339(raw)
                .with_context(|| format!("Invalid --at instant {raw:?}, expected RFC 3339"))?;
            Ok(parsed.with_timezone(&Local))
        }
        None => Ok(Local::now()),
    }
}

fn strategy_label(is_real: bool) -> &'static str {
    if is_real {
        "REAL"
    } else {
        "ESTIMATED"
    }
}

fn print_reading(reading: &NoiseReading) {
    println!(
        "{}  {:>5.1} dB  ev impact {:>4.1} dB  {}",
        reading.time,
        reading.noise,
        reading.ev_impact,
        strategy_label(reading.is_real)
    );
}

/// Seed `points` readings ending at the start instant, then tick `ticks`
/// times one interval apart.
pub fn run_simulate(
    points: usize,
    ticks: usize,
    at: Option<&str>,
    location: Location,
    json: bool,
) -> anyhow::Result<()> {
    let config = DataConfig {
        location,
        ..DataConfig::default()
    };
    let selector = load(&config)?;
    let projector = EvProjector::new(selector.clone(), &config);
    let mut session = TimeSeriesSession::new(selector, &config);
    let start = parse_start(at)?;

    info!(
        "Simulating {:?}: {} seeded readings, {} ticks from {}",
        location, points, ticks, start
    );
    let mut readings = session.initialize_at(&start, points)?;
    let mut now = start;
    for _ in 0..ticks {
        now += config.interval;
        readings = session.tick_at(&now)?;
    }
    let adoption = projector.estimate_at(&now);
    let reduction = projector.noise_reduction_at(adoption.percentage, &now);

    if json {
        let out = serde_json::json!({
            "readings": readings,
            "evAdoption": adoption,
            "noiseReduction": reduction,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    for reading in &readings {
        print_reading(reading);
    }
    println!(
        "EV adoption {:.2}% ({}), attributed noise reduction {:.2} dB",
        adoption.percentage,
        match adoption.strategy {
            DataStrategy::Real => "REAL",
            DataStrategy::Estimated => "ESTIMATED",
        },
        reduction
    );
    Ok(())
}

/// Run the live feed on demo timers for `seconds`, printing each new frame.
pub async fn run_watch(seconds: u64, location: Location) -> anyhow::Result<()> {
    let config = DataConfig {
        location,
        ..DataConfig::demo()
    };
    let selector = load(&config)?;
    let projector = EvProjector::new(selector.clone(), &config);
    let session = TimeSeriesSession::new(selector, &config);
    let live = LiveConfig {
        tick_every: Duration::from_secs(3),
        ..LiveConfig::default()
    };

    let feed = LiveFeed::spawn(session, projector, live)?;
    let mut frames = feed.subscribe();
    info!("Watching the live feed for {}s", seconds);
    if let Some(last) = feed.latest().readings.last() {
        print_reading(last);
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(seconds);
    let mut shown = feed.latest().readings.last().map(|r| r.recorded_at);
    loop {
        match tokio::time::timeout_at(deadline, frames.changed()).await {
            Ok(Ok(())) => {
                let frame = frames.borrow_and_update().clone();
                let newest = frame.readings.last();
                if newest.map(|r| r.recorded_at) != shown {
                    if let Some(reading) = newest {
                        print_reading(reading);
                        println!(
                            "   EV adoption {:.2}%  uptime {}s",
                            frame.adoption.percentage, frame.housekeeping
                        );
                    }
                    shown = newest.map(|r| r.recorded_at);
                }
            }
            Ok(Err(_)) | Err(_) => break,
        }
    }
    feed.stop();
    info!("Live feed stopped");
    Ok(())
}

/// Print the dataset summary and, optionally, the correlation table.
pub fn run_summary(correlation: bool, json: bool) -> anyhow::Result<()> {
    let config = DataConfig::default();
    let selector = load(&config)?;
    let summary = summarize(&selector, &config, &Utc::now());
    let rows = correlation_series(selector.dataset(), config.total_fleet);

    if json {
        let out = if correlation {
            serde_json::json!({ "summary": summary, "correlation": rows })
        } else {
            serde_json::to_value(&summary)?
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let period = &summary.real_data_period;
    println!(
        "Real data: {} to {} ({} months)",
        period.start, period.end, period.months_tracked
    );
    println!(
        "Noise reduction: Papineau {:.2} dB, Cartier {:.2} dB",
        summary.papineau_noise_reduction, summary.cartier_noise_reduction
    );
    println!(
        "EV growth: Papineau {} -> {} (+{:.2}%), Cartier {} -> {} (+{:.2}%)",
        summary.papineau_ev_growth.start,
        summary.papineau_ev_growth.end,
        summary.papineau_ev_growth.total_growth,
        summary.cartier_ev_growth.start,
        summary.cartier_ev_growth.end,
        summary.cartier_ev_growth.total_growth
    );
    println!(
        "Observed monthly EV growth: {:.2}%",
        summary.observed_monthly_growth
    );
    println!(
        "Current strategy: {:?} (real data through {})",
        summary.current_strategy, summary.transition_point
    );

    if correlation {
        println!();
        println!("date        papineau  cartier  pap EVs  car EVs  pap %  car %  reduction");
        for row in &rows {
            println!(
                "{}  {:>8.1}  {:>7.1}  {:>7}  {:>7}  {:>5.2}  {:>5.2}  {:>9.2}",
                row.date,
                row.papineau_noise,
                row.cartier_noise,
                row.papineau_evs,
                row.cartier_evs,
                row.papineau_ev_adoption,
                row.cartier_ev_adoption,
                row.noise_reduction
            );
        }
    }
    Ok(())
}
