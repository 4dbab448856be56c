//! Serverless function backend.
//!
//! Events go to `/api/analytics-event`, sessions to `/api/analytics-session`,
//! each wrapped as `{type, data, timestamp}`. The function key, if any, is
//! passed as the `code` query parameter.

use super::{check_status, http_client};
use crate::config::FunctionConfig;
use crate::error::StorageError;
use crate::event::AnalyticsEvent;
use crate::session::SessionRecord;
use chrono::Utc;
use np_utils::dates::iso_timestamp;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct Envelope<'a, T: Serialize> {
    #[serde(rename = "type")]
    kind: &'static str,
    data: &'a T,
    timestamp: String,
}

#[derive(Debug, Clone)]
pub struct FunctionBackend {
    client: reqwest::Client,
    config: FunctionConfig,
}

impl FunctionBackend {
    pub fn new(config: FunctionConfig) -> Result<Self, StorageError> {
        Ok(Self {
            client: http_client()?,
            config,
        })
    }

    async fn send<T: Serialize>(
        &self,
        path: &str,
        kind: &'static str,
        data: &T,
        request_id: String,
    ) -> Result<(), StorageError> {
        let envelope = Envelope {
            kind,
            data,
            timestamp: iso_timestamp(&Utc::now()),
        };
        let mut request = self
            .client
            .post(format!("{}{}", self.config.base_url, path))
            .header("x-ms-client-request-id", request_id)
            .json(&envelope);
        if let Some(key) = &self.config.key {
            request = request.query(&[("code", key)]);
        }
        check_status(request.send().await?)?;
        Ok(())
    }

    pub async fn save_event(&self, event: &AnalyticsEvent) -> Result<(), StorageError> {
        let request_id = format!("{}_{}", event.session_id, Utc::now().timestamp_millis());
        self.send("/api/analytics-event", "event", event, request_id).await
    }

    pub async fn save_session(&self, session: &SessionRecord) -> Result<(), StorageError> {
        self.send("/api/analytics-session", "session", session, session.session_id.clone())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock;
    use crate::session::ClientContext;

    #[tokio::test]
    async fn test_event_and_session_endpoints() {
        let (base, received) = mock::spawn().await;
        let backend = FunctionBackend::new(FunctionConfig {
            base_url: base,
            key: Some("fn-key".into()),
        })
        .unwrap();
        let event = AnalyticsEvent::new("page_view", "sess_1", None, &Utc::now());
        backend.save_event(&event).await.unwrap();
        let session = SessionRecord::start(&ClientContext::default(), &Utc::now());
        backend.save_session(&session).await.unwrap();

        assert_eq!(
            received.paths(),
            vec!["/api/analytics-event?code=fn-key", "/api/analytics-session?code=fn-key"]
        );
        let bodies = received.bodies();
        assert_eq!(bodies[0]["type"], "event");
        assert_eq!(bodies[0]["data"]["eventName"], "page_view");
        assert_eq!(bodies[1]["type"], "session");
        assert_eq!(bodies[1]["data"]["sessionId"], session.session_id);
    }

    #[tokio::test]
    async fn test_unreachable_function_fails() {
        let backend = FunctionBackend::new(FunctionConfig {
            base_url: "http://127.0.0.1:9".into(),
            key: None,
        })
        .unwrap();
        let event = AnalyticsEvent::new("page_view", "sess_1", None, &Utc::now());
        assert!(backend.save_event(&event).await.is_err());
    }
}
