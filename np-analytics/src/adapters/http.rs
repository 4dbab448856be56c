//! Generic HTTP backend: the event collector API.

use crate::collector::{CollectorClient, CollectorEvent};
use crate::config::HttpConfig;
use crate::error::StorageError;
use crate::event::AnalyticsEvent;
use crate::session::SessionRecord;

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: CollectorClient,
}

impl HttpBackend {
    pub fn new(config: HttpConfig) -> Result<Self, StorageError> {
        Ok(Self {
            client: CollectorClient::new(config)?,
        })
    }

    pub fn from_client(client: CollectorClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &CollectorClient {
        &self.client
    }

    /// False once the collector request budget is spent.
    pub fn is_available(&self) -> bool {
        self.client.has_budget()
    }

    pub async fn save_event(&self, event: &AnalyticsEvent) -> Result<(), StorageError> {
        let body = CollectorEvent::from_event(self.client.site_id(), event);
        self.client.post_event(&body).await.map(|_| ())
    }

    pub async fn save_session(&self, session: &SessionRecord) -> Result<(), StorageError> {
        let body = CollectorEvent::from_session(self.client.site_id(), session)?;
        self.client.post_event(&body).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock;
    use crate::collector::SESSION_EVENT_TYPE;
    use crate::session::ClientContext;
    use chrono::Utc;

    #[tokio::test]
    async fn test_session_is_posted_as_event() {
        let (base, received) = mock::spawn().await;
        let backend = HttpBackend::new(HttpConfig::new(&base)).unwrap();
        let context = ClientContext {
            language_tag: "fr-CA".into(),
            ..ClientContext::default()
        };
        let session = SessionRecord::start(&context, &Utc::now());
        backend.save_session(&session).await.unwrap();
        let events = received.events();
        assert_eq!(events[0]["eventType"], SESSION_EVENT_TYPE);
        assert_eq!(events[0]["language"], "fr");
        assert_eq!(events[0]["siteId"], "noise-pulse");
    }
}
