//! Timer-driven live feed.
//!
//! Two periodic tasks share one tokio task: the window tick (which also
//! refreshes the EV estimate) and a cosmetic housekeeping counter. Frames are
//! published on a `watch` channel. Dropping the [`LiveFeed`] aborts the task,
//! so no timer outlives its dashboard.

use crate::error::DataError;
use crate::ev::{EvAdoptionEstimate, EvProjector};
use crate::window::{NoiseReading, TimeSeriesSession};
use chrono::{DateTime, Local, TimeDelta};
use log::{debug, warn};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Timer periods for the feed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveConfig {
    pub tick_every: Duration,
    pub housekeeping_every: Duration,
    /// Readings seeded before the first tick.
    pub seed_points: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            tick_every: Duration::from_secs(3),
            housekeeping_every: Duration::from_secs(1),
            seed_points: crate::config::WINDOW_CAPACITY,
        }
    }
}

/// What the dashboard redraws.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveFrame {
    pub readings: Vec<NoiseReading>,
    pub adoption: EvAdoptionEstimate,
    pub housekeeping: u64,
}

pub struct LiveFeed {
    handle: JoinHandle<()>,
    frames: watch::Receiver<LiveFrame>,
}

impl LiveFeed {
    /// Seed the window and start the timers on the current tokio runtime.
    ///
    /// Each tick is stamped with its scheduled time rather than the moment
    /// the task wakes, so a tick period equal to the session interval never
    /// lands a hair short and gets skipped.
    pub fn spawn(
        mut session: TimeSeriesSession,
        projector: EvProjector,
        config: LiveConfig,
    ) -> Result<Self, DataError> {
        let started = Instant::now();
        let started_wall = Local::now();
        let readings = session.initialize_at(&started_wall, config.seed_points)?;
        let first = LiveFrame {
            readings,
            adoption: projector.estimate_at(&started_wall),
            housekeeping: 0,
        };
        let (tx, frames) = watch::channel(first);

        let handle = tokio::spawn(async move {
            let mut ticks = interval_at(started + config.tick_every, config.tick_every);
            let mut housekeeping =
                interval_at(started + config.housekeeping_every, config.housekeeping_every);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            housekeeping.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut counter: u64 = 0;
            loop {
                tokio::select! {
                    scheduled = ticks.tick() => {
                        let at = wall_time(started, started_wall, scheduled);
                        match session.tick_at(&at) {
                            Ok(readings) => {
                                let adoption = projector.estimate_at(&at);
                                tx.send_modify(|frame| {
                                    frame.readings = readings;
                                    frame.adoption = adoption;
                                });
                            }
                            Err(e) => warn!("Live tick failed: {}", e),
                        }
                    }
                    _ = housekeeping.tick() => {
                        counter += 1;
                        tx.send_modify(|frame| frame.housekeeping = counter);
                    }
                }
                if tx.is_closed() {
                    debug!("Live feed has no subscribers, stopping");
                    break;
                }
            }
        });

        Ok(Self { handle, frames })
    }

    /// A receiver that sees every published frame.
    pub fn subscribe(&self) -> watch::Receiver<LiveFrame> {
        self.frames.clone()
    }

    /// The most recent frame.
    pub fn latest(&self) -> LiveFrame {
        self.frames.borrow().clone()
    }

    /// Cancel both timers.
    pub fn stop(self) {
        drop(self);
    }
}

/// Wall-clock time of a timer instant, measured from the feed's start.
fn wall_time(started: Instant, started_wall: DateTime<Local>, scheduled: Instant) -> DateTime<Local> {
    match TimeDelta::from_std(scheduled.saturating_duration_since(started)) {
        Ok(elapsed) => started_wall + elapsed,
        Err(_) => Local::now(),
    }
}

impl Drop for LiveFeed {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataConfig;
    use crate::historical::HistoricalDataset;
    use crate::strategy::StrategySelector;
    use std::sync::Arc;

    fn parts() -> (TimeSeriesSession, EvProjector) {
        parts_with(DataConfig {
            interval: TimeDelta::milliseconds(5),
            ..DataConfig::default()
        })
    }

    fn parts_with(config: DataConfig) -> (TimeSeriesSession, EvProjector) {
        let dataset = Arc::new(HistoricalDataset::embedded().unwrap());
        let selector = StrategySelector::new(dataset, &config);
        (
            TimeSeriesSession::new(selector.clone(), &config),
            EvProjector::new(selector, &config),
        )
    }

    fn fast() -> LiveConfig {
        LiveConfig {
            tick_every: Duration::from_millis(10),
            housekeeping_every: Duration::from_millis(10),
            seed_points: 3,
        }
    }

    #[tokio::test]
    async fn test_feed_grows_window() {
        let (session, projector) = parts();
        let feed = LiveFeed::spawn(session, projector, fast()).unwrap();
        assert_eq!(feed.latest().readings.len(), 3);
        let mut rx = feed.subscribe();
        let grown = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                rx.changed().await.unwrap();
                let frame = rx.borrow_and_update().clone();
                if frame.readings.len() >= 6 && frame.housekeeping > 0 {
                    return frame;
                }
            }
        })
        .await
        .unwrap();
        assert!(grown.readings.len() <= 20);
        feed.stop();
    }

    #[tokio::test]
    async fn test_every_tick_lands_when_periods_match() {
        let (session, projector) = parts_with(DataConfig {
            interval: TimeDelta::milliseconds(20),
            window_capacity: 10_000,
            ..DataConfig::default()
        });
        let config = LiveConfig {
            tick_every: Duration::from_millis(20),
            housekeeping_every: Duration::from_secs(60),
            seed_points: 1,
        };
        let feed = LiveFeed::spawn(session, projector, config).unwrap();
        let mut rx = feed.subscribe();
        let frame = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                rx.changed().await.unwrap();
                let frame = rx.borrow_and_update().clone();
                if frame.readings.len() >= 16 {
                    return frame;
                }
            }
        })
        .await
        .unwrap();
        feed.stop();

        // readings sit on the timer schedule; late wakeups skip whole periods
        // instead of dropping a tick that arrived a little early
        for pair in frame.readings.windows(2) {
            let gap = (pair[1].recorded_at - pair[0].recorded_at).num_milliseconds();
            assert!(gap >= 20 && gap % 20 == 0, "gap was {gap}ms");
        }
    }

    #[test]
    fn test_wall_time_follows_schedule() {
        let started = Instant::now();
        let started_wall = Local::now();
        let at = wall_time(started, started_wall, started + Duration::from_millis(3000));
        assert_eq!(at - started_wall, TimeDelta::milliseconds(3000));
        assert_eq!(wall_time(started, started_wall, started), started_wall);
    }

    #[tokio::test]
    async fn test_drop_cancels_timers() {
        let (session, projector) = parts();
        let feed = LiveFeed::spawn(session, projector, fast()).unwrap();
        let mut rx = feed.subscribe();
        drop(feed);
        let closed = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if rx.changed().await.is_err() {
                    return true;
                }
            }
        })
        .await
        .unwrap();
        assert!(closed);
    }
}
