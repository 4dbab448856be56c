//! Consent-gated analytics pipeline for one dashboard session.
//!
//! Nothing is recorded, sent or stored until [`AnalyticsPipeline::enable_analytics`]
//! has been called. Tracked events are sanitized, appended to the in-memory
//! session list in call order and handed to the [`StorageChain`] without
//! waiting for the outcome. Arrival order of events at a remote backend is
//! not guaranteed; session saves run one after another, so the last snapshot
//! taken is the last one written.
//!
//! Saves are spawned on the ambient tokio runtime. Outside a runtime they go
//! straight to the local buffer and the remote backends are skipped with a
//! warning.

use crate::adapters::Payload;
use crate::chain::{Delivery, StorageChain};
use crate::event::{self, AnalyticsEvent, EventData};
use crate::session::{truncate_session_id, ClientContext, SessionRecord, SessionSummary};
use chrono::{DateTime, TimeZone, Utc};
use log::{debug, info, warn};
use np_utils::dates::iso_timestamp;
use serde_json::json;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Kinds of environmental data interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    NoiseChart,
    EvData,
    NoiseLevel,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::NoiseChart => "noise_chart",
            InteractionKind::EvData => "ev_data",
            InteractionKind::NoiseLevel => "noise_level",
        }
    }
}

pub const ENVIRONMENTAL_INTERACTION: &str = "environmental_interaction";

pub struct AnalyticsPipeline {
    session: SessionRecord,
    events: Vec<AnalyticsEvent>,
    enabled: bool,
    chain: Arc<StorageChain>,
    pending: Vec<JoinHandle<Delivery>>,
    // Latest session save; it waits for the one before it.
    session_saves: Option<JoinHandle<Vec<Delivery>>>,
    warned_offline: bool,
}

impl AnalyticsPipeline {
    pub fn new(chain: Arc<StorageChain>, context: &ClientContext) -> Self {
        Self::new_at(chain, context, &Utc::now())
    }

    pub fn new_at<Tz: TimeZone>(chain: Arc<StorageChain>, context: &ClientContext, now: &DateTime<Tz>) -> Self {
        let session = SessionRecord::start(context, now);
        debug!("Analytics session {} started", truncate_session_id(&session.session_id));
        Self {
            session,
            events: Vec::new(),
            enabled: false,
            chain,
            pending: Vec::new(),
            session_saves: None,
            warned_offline: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn session(&self) -> &SessionRecord {
        &self.session
    }

    /// Events tracked so far in this session, in call order.
    pub fn events(&self) -> &[AnalyticsEvent] {
        &self.events
    }

    pub fn chain(&self) -> &StorageChain {
        &self.chain
    }

    pub fn enable_analytics(&mut self) {
        self.enable_analytics_at(&Utc::now())
    }

    /// Grant consent, emit `consent_given` and persist the session.
    ///
    /// Consent cannot be withdrawn within a session; calling this again does
    /// nothing.
    pub fn enable_analytics_at<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) {
        if self.enabled {
            return;
        }
        self.enabled = true;
        self.session.consent_given = true;
        self.session.consent_time = Some(iso_timestamp(now));
        info!(
            "Analytics consent granted for session {}",
            truncate_session_id(&self.session.session_id)
        );
        self.track_event_at(event::CONSENT_GIVEN, None, now);
        self.dispatch_session();
    }

    pub fn track_event(&mut self, name: &str, data: Option<EventData>) {
        self.track_event_at(name, data, &Utc::now())
    }

    /// Record an event. Does nothing before consent.
    pub fn track_event_at<Tz: TimeZone>(&mut self, name: &str, data: Option<EventData>, now: &DateTime<Tz>) {
        if !self.enabled {
            return;
        }
        let event = AnalyticsEvent::new(name, &self.session.session_id, data, now);
        debug!("Tracked {}", event.event_name);
        self.events.push(event.clone());
        self.dispatch_event(event);
    }

    pub fn track_page_view(&mut self, page: &str) {
        self.track_event(event::PAGE_VIEW, Some(event::event_data(json!({ "page": page }))));
    }

    pub fn track_feature_usage(&mut self, feature: &str, action: &str, data: Option<EventData>) {
        let base = event::event_data(json!({ "feature": feature, "action": action }));
        self.track_event(event::FEATURE_USAGE, Some(merge(base, data)));
    }

    pub fn track_environmental_interaction(&mut self, kind: InteractionKind, data: Option<EventData>) {
        let base = event::event_data(json!({ "type": kind.as_str() }));
        self.track_event(ENVIRONMENTAL_INTERACTION, Some(merge(base, data)));
    }

    /// Record the page being hidden or shown again.
    pub fn track_visibility(&mut self, hidden: bool) {
        let name = if hidden { event::TAB_HIDDEN } else { event::TAB_VISIBLE };
        self.track_event(name, None);
    }

    pub fn end_session(&mut self) {
        self.end_session_at(&Utc::now())
    }

    /// Close the session: emit `session_end` with the duration and the number
    /// of events tracked before it, then persist the final session state.
    ///
    /// Best effort. Call [`flush`](Self::flush) to wait for delivery.
    pub fn end_session_at<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) {
        if !self.enabled {
            return;
        }
        self.session.end_time = Some(iso_timestamp(now));
        let duration = self.session.duration_seconds(now);
        let total = self.events.len();
        self.track_event_at(
            event::SESSION_END,
            Some(event::event_data(json!({
                "duration_seconds": duration,
                "total_events": total,
            }))),
            now,
        );
        self.dispatch_session();
        info!(
            "Session {} ended after {}s with {} events",
            truncate_session_id(&self.session.session_id),
            duration,
            total
        );
    }

    pub fn session_summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: truncate_session_id(&self.session.session_id),
            language: self.session.language.clone(),
            device_class: self.session.device_class,
            timezone: self.session.timezone.clone(),
            consent_given: self.session.consent_given,
            event_count: self.events.len(),
            enabled: self.enabled,
            storage_backend: self.chain.primary_name().to_string(),
        }
    }

    /// Wait for the saves still in flight and report where each one landed.
    pub async fn flush(&mut self) -> Vec<Delivery> {
        let mut deliveries = Vec::with_capacity(self.pending.len() + 2);
        for handle in self.pending.drain(..) {
            match handle.await {
                Ok(delivery) => deliveries.push(delivery),
                Err(e) => {
                    warn!("Analytics dispatch task failed: {}", e);
                    deliveries.push(Delivery::Lost);
                }
            }
        }
        if let Some(handle) = self.session_saves.take() {
            match handle.await {
                Ok(saved) => deliveries.extend(saved),
                Err(e) => {
                    warn!("Session save task failed: {}", e);
                    deliveries.push(Delivery::Lost);
                }
            }
        }
        deliveries
    }

    fn dispatch_event(&mut self, event: AnalyticsEvent) {
        let chain = Arc::clone(&self.chain);
        match Handle::try_current() {
            Ok(handle) => {
                self.pending.retain(|h| !h.is_finished());
                self.pending
                    .push(handle.spawn(async move { chain.save_event(&event).await }));
            }
            Err(_) => {
                self.warn_offline();
                chain.save_locally(Payload::Event(&event));
            }
        }
    }

    fn dispatch_session(&mut self) {
        let chain = Arc::clone(&self.chain);
        let session = self.session.clone();
        match Handle::try_current() {
            Ok(handle) => {
                let previous = self.session_saves.take();
                self.session_saves = Some(handle.spawn(async move {
                    let mut saved = match previous {
                        Some(previous) => previous.await.unwrap_or_else(|e| {
                            warn!("Earlier session save task failed: {}", e);
                            vec![Delivery::Lost]
                        }),
                        None => Vec::new(),
                    };
                    saved.push(chain.save_session(&session).await);
                    saved
                }));
            }
            Err(_) => {
                self.warn_offline();
                chain.save_locally(Payload::Session(&session));
            }
        }
    }

    fn warn_offline(&mut self) {
        if self.warned_offline || self.chain.backend_names().len() == 1 {
            return;
        }
        self.warned_offline = true;
        warn!(
            "No async runtime; skipping remote backends {:?} and writing to the local buffer",
            self.chain.backend_names()
        );
    }
}

fn merge(mut base: EventData, extra: Option<EventData>) -> EventData {
    if let Some(extra) = extra {
        base.extend(extra);
    }
    base
}
