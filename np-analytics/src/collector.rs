//! Client for the event collector API.
//!
//! Endpoints:
//! - `POST /api/analytics` - store one event (`siteId` and `eventType` required)
//! - `GET /api/analytics?siteId=&eventType=&limit=` - newest events first
//! - `GET /api/analytics/summary?siteId=` - counts by event type, page, language
//! - `GET /health` - liveness probe
//!
//! The collector allows 100 `/api/` requests per 15 minutes per client; the
//! client keeps its own budget and fails fast with
//! [`StorageError::RateLimited`] instead of sending a request that would be
//! refused.

use crate::adapters::{check_status, http_client};
use crate::config::HttpConfig;
use crate::error::StorageError;
use crate::event::AnalyticsEvent;
use crate::rate_limit::RateLimiter;
use crate::session::SessionRecord;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Event type used when a session record is posted to the collector.
pub const SESSION_EVENT_TYPE: &str = "session";

/// Body of `POST /api/analytics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectorEvent {
    pub site_id: String,
    pub event_type: String,
    pub session_id: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl CollectorEvent {
    pub fn from_event(site_id: &str, event: &AnalyticsEvent) -> Self {
        let url = event
            .data
            .as_ref()
            .and_then(|d| d.get("page"))
            .and_then(Value::as_str)
            .map(str::to_string);
        Self {
            site_id: site_id.to_string(),
            event_type: event.event_name.clone(),
            session_id: event.session_id.clone(),
            timestamp: event.timestamp.clone(),
            url,
            language: None,
            data: event.data.clone().map(Value::Object),
        }
    }

    pub fn from_session(site_id: &str, session: &SessionRecord) -> Result<Self, StorageError> {
        Ok(Self {
            site_id: site_id.to_string(),
            event_type: SESSION_EVENT_TYPE.to_string(),
            session_id: session.session_id.clone(),
            timestamp: session
                .end_time
                .clone()
                .unwrap_or_else(|| session.start_time.clone()),
            url: None,
            language: Some(session.language.clone()),
            data: Some(serde_json::to_value(session)?),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub success: bool,
    pub event_id: String,
    pub timestamp: String,
}

/// Filters for `GET /api/analytics`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventQuery {
    pub site_id: Option<String>,
    pub event_type: Option<String>,
    pub limit: Option<usize>,
}

impl EventQuery {
    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(site_id) = &self.site_id {
            params.push(("siteId", site_id.clone()));
        }
        if let Some(event_type) = &self.event_type {
            params.push(("eventType", event_type.clone()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        params
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventList {
    pub success: bool,
    pub count: usize,
    pub total: usize,
    pub events: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectorSummary {
    pub total_events: usize,
    pub unique_sessions: usize,
    pub event_types: BTreeMap<String, usize>,
    pub pages: BTreeMap<String, usize>,
    pub languages: BTreeMap<String, usize>,
    pub last_updated: String,
}

#[derive(Debug, Deserialize)]
struct SummaryEnvelope {
    summary: CollectorSummary,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Health {
    pub status: String,
    pub timestamp: String,
    pub service: String,
}

#[derive(Debug, Clone)]
pub struct CollectorClient {
    client: reqwest::Client,
    config: HttpConfig,
    limiter: Arc<RateLimiter>,
}

impl CollectorClient {
    pub fn new(config: HttpConfig) -> Result<Self, StorageError> {
        Self::with_limiter(config, Arc::new(RateLimiter::default()))
    }

    /// Share a limiter between clients talking to the same collector.
    pub fn with_limiter(config: HttpConfig, limiter: Arc<RateLimiter>) -> Result<Self, StorageError> {
        Ok(Self {
            client: http_client()?,
            config,
            limiter,
        })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    pub fn site_id(&self) -> &str {
        &self.config.site_id
    }

    /// Whether the request budget has room for another call.
    pub fn has_budget(&self) -> bool {
        self.limiter.remaining_at(std::time::Instant::now()) > 0
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    fn acquire(&self) -> Result<(), StorageError> {
        if self.limiter.try_acquire() {
            Ok(())
        } else {
            Err(StorageError::RateLimited)
        }
    }

    /// Store one event. Any 2xx counts as stored; the receipt is `None` when
    /// the body is not the usual `{success, eventId, timestamp}`.
    pub async fn post_event(&self, event: &CollectorEvent) -> Result<Option<PostResponse>, StorageError> {
        self.acquire()?;
        let request = self.authorize(self.client.post(self.url("/api/analytics")).json(event));
        let response = check_status(request.send().await?)?;
        match response.json::<PostResponse>().await {
            Ok(body) => {
                debug!("Collector stored {} as {}", event.event_type, body.event_id);
                Ok(Some(body))
            }
            Err(e) => {
                debug!("Collector stored {} without a readable receipt: {}", event.event_type, e);
                Ok(None)
            }
        }
    }

    pub async fn list_events(&self, query: &EventQuery) -> Result<EventList, StorageError> {
        self.acquire()?;
        let request = self.authorize(
            self.client
                .get(self.url("/api/analytics"))
                .query(&query.params()),
        );
        let response = check_status(request.send().await?)?;
        Ok(response.json().await?)
    }

    pub async fn summary(&self, site_id: Option<&str>) -> Result<CollectorSummary, StorageError> {
        self.acquire()?;
        let mut request = self.client.get(self.url("/api/analytics/summary"));
        if let Some(site_id) = site_id {
            request = request.query(&[("siteId", site_id)]);
        }
        let response = check_status(self.authorize(request).send().await?)?;
        let envelope: SummaryEnvelope = response.json().await?;
        Ok(envelope.summary)
    }

    /// Liveness probe. Not counted against the budget.
    pub async fn health(&self) -> Result<Health, StorageError> {
        let response = check_status(self.client.get(self.url("/health")).send().await?)?;
        Ok(response.json().await?)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-process collector used by the adapter and pipeline tests.

    use axum::extract::{Query, State};
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    pub struct Received {
        pub events: Arc<Mutex<Vec<Value>>>,
        pub paths: Arc<Mutex<Vec<String>>>,
        pub bodies: Arc<Mutex<Vec<Value>>>,
    }

    impl Received {
        pub fn events(&self) -> Vec<Value> {
            self.events.lock().unwrap().clone()
        }

        pub fn paths(&self) -> Vec<String> {
            self.paths.lock().unwrap().clone()
        }

        pub fn bodies(&self) -> Vec<Value> {
            self.bodies.lock().unwrap().clone()
        }
    }

    async fn post_analytics(
        State(received): State<Received>,
        Json(event): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        received.paths.lock().unwrap().push("/api/analytics".to_string());
        if event.get("siteId").is_none() || event.get("eventType").is_none() {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Invalid event data", "required": ["siteId", "eventType"]})),
            );
        }
        let mut events = received.events.lock().unwrap();
        events.push(event);
        (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "eventId": format!("evt-{}", events.len()),
                "timestamp": "2025-06-03T08:00:00.000Z"
            })),
        )
    }

    async fn list_analytics(
        State(received): State<Received>,
        Query(params): Query<HashMap<String, String>>,
    ) -> Json<Value> {
        let all = received.events();
        let mut filtered: Vec<Value> = all
            .iter()
            .filter(|e| params.get("eventType").map_or(true, |t| e["eventType"] == t.as_str()))
            .cloned()
            .collect();
        filtered.reverse();
        if let Some(limit) = params.get("limit").and_then(|l| l.parse().ok()) {
            filtered.truncate(limit);
        }
        Json(json!({
            "success": true,
            "count": filtered.len(),
            "total": all.len(),
            "events": filtered
        }))
    }

    async fn summary(State(received): State<Received>) -> Json<Value> {
        let mut event_types: HashMap<String, usize> = HashMap::new();
        for e in received.events() {
            let key = e["eventType"].as_str().unwrap_or_default().to_string();
            *event_types.entry(key).or_default() += 1;
        }
        Json(json!({
            "success": true,
            "summary": {
                "totalEvents": received.events().len(),
                "uniqueSessions": 1,
                "eventTypes": event_types,
                "pages": {},
                "languages": {},
                "lastUpdated": "2025-06-03T08:00:00.000Z"
            }
        }))
    }

    async fn record(
        State(received): State<Received>,
        uri: axum::extract::OriginalUri,
        Json(body): Json<Value>,
    ) -> StatusCode {
        let target = match uri.0.query() {
            Some(query) => format!("{}?{}", uri.0.path(), query),
            None => uri.0.path().to_string(),
        };
        received.paths.lock().unwrap().push(target);
        received.bodies.lock().unwrap().push(body);
        StatusCode::CREATED
    }

    async fn fail() -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    // Fails every session save, but takes its time over the ones not yet closed.
    async fn fail_open_sessions_slowly(Json(body): Json<Value>) -> StatusCode {
        if !body["data"]["endTime"].is_string() {
            tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        }
        StatusCode::INTERNAL_SERVER_ERROR
    }

    /// Serve a collector on an ephemeral port. Requests under `/broken/`
    /// always fail with 500; `/terse/api/analytics` answers 200 with a plain
    /// text body; `/slow-open/api/analytics-session` fails, slowly for
    /// sessions without an end time; `/api/analytics-event`, `/api/analytics-session`
    /// and anything under `/store/` are accepted and their paths recorded.
    pub async fn spawn() -> (String, Received) {
        let received = Received::default();
        let app = Router::new()
            .route("/health", get(|| async {
                Json(json!({"status": "healthy", "timestamp": "2025-06-03T08:00:00.000Z", "service": "mock"}))
            }))
            .route("/api/analytics", post(post_analytics).get(list_analytics))
            .route("/api/analytics/summary", get(summary))
            .route("/api/analytics-event", post(record))
            .route("/api/analytics-session", post(record))
            .route("/store/{*rest}", post(record).put(record))
            .route("/broken/{*rest}", post(fail).get(fail).put(fail))
            .route("/terse/api/analytics", post(|| async { (StatusCode::OK, "stored") }))
            .route("/slow-open/api/analytics-session", post(fail_open_sessions_slowly))
            .with_state(received.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), received)
    }
}
