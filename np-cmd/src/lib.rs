//! Command implementations for the noise pulse CLI.
//!
//! Subcommands drive the noise simulator, print dataset summaries, emit
//! analytics through the configured storage chain and query the event
//! collector.

use clap::{Subcommand, ValueEnum};
use np_data::Location;
use std::path::PathBuf;

pub mod analytics;
pub mod simulate;

/// Default SQLite file for the local analytics buffer.
pub const DEFAULT_BUFFER_PATH: &str = "noise-pulse-buffer.sqlite";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LocationArg {
    Papineau,
    Cartier,
}

impl From<LocationArg> for Location {
    fn from(arg: LocationArg) -> Self {
        match arg {
            LocationArg::Papineau => Location::Papineau,
            LocationArg::Cartier => Location::Cartier,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Seed the sliding window and advance it a number of ticks
    Simulate {
        /// Readings to seed the window with
        #[arg(short, long, default_value_t = 20)]
        points: usize,

        /// Ticks to run after seeding
        #[arg(short, long, default_value_t = 5)]
        ticks: usize,

        /// Start instant (RFC 3339); defaults to now
        #[arg(long)]
        at: Option<String>,

        /// Street to simulate
        #[arg(short, long, value_enum, default_value_t = LocationArg::Papineau)]
        location: LocationArg,

        /// Print readings as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the live feed on demo timers for a while
    Watch {
        /// How long to watch, in seconds
        #[arg(short, long, default_value_t = 15)]
        seconds: u64,

        /// Street to simulate
        #[arg(short, long, value_enum, default_value_t = LocationArg::Papineau)]
        location: LocationArg,
    },

    /// Summarize the historical dataset
    Summary {
        /// Include the month-by-month correlation table
        #[arg(long)]
        correlation: bool,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Emit one consented event through the configured storage backends
    Track {
        /// Event name
        event: String,

        /// Event data as a JSON object
        #[arg(short, long)]
        data: Option<String>,

        /// Local fallback buffer file
        #[arg(short, long, default_value = DEFAULT_BUFFER_PATH)]
        buffer: PathBuf,
    },

    /// List events stored by the collector
    Events {
        /// Collector base URL; defaults to NOISE_PULSE_COLLECTOR_URL
        #[arg(short, long)]
        url: Option<String>,

        /// Only events of this type
        #[arg(short = 't', long)]
        event_type: Option<String>,

        /// Only events for this site
        #[arg(short, long)]
        site_id: Option<String>,

        /// Maximum number of events
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },

    /// Show the collector's aggregate counts
    CollectorSummary {
        /// Collector base URL; defaults to NOISE_PULSE_COLLECTOR_URL
        #[arg(short, long)]
        url: Option<String>,

        /// Only events for this site
        #[arg(short, long)]
        site_id: Option<String>,
    },

    /// Inspect or clear the local analytics buffer
    Buffer {
        /// Local fallback buffer file
        #[arg(short, long, default_value = DEFAULT_BUFFER_PATH)]
        path: PathBuf,

        /// Delete all buffered events and sessions
        #[arg(long)]
        clear: bool,

        /// List buffered events as JSON instead of the summary
        #[arg(long)]
        events: bool,
    },
}

pub async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Simulate {
            points,
            ticks,
            at,
            location,
            json,
        } => simulate::run_simulate(points, ticks, at.as_deref(), location.into(), json),
        Command::Watch { seconds, location } => {
            simulate::run_watch(seconds, location.into()).await
        }
        Command::Summary { correlation, json } => simulate::run_summary(correlation, json),
        Command::Track { event, data, buffer } => {
            analytics::run_track(&event, data.as_deref(), &buffer).await
        }
        Command::Events {
            url,
            event_type,
            site_id,
            limit,
        } => analytics::run_events(url.as_deref(), event_type, site_id, limit).await,
        Command::CollectorSummary { url, site_id } => {
            analytics::run_collector_summary(url.as_deref(), site_id.as_deref()).await
        }
        Command::Buffer {
            path,
            clear,
            events,
        } => analytics::run_buffer(&path, clear, events),
    }
}
