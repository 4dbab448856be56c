//! Document-store backend (Cosmos DB REST API).
//!
//! Documents expire after a year. Events are partitioned by UTC month,
//! sessions share the `sessions` partition and are upserted by id.

use super::{check_status, http_client};
use crate::config::DocumentConfig;
use crate::error::StorageError;
use crate::event::AnalyticsEvent;
use crate::session::SessionRecord;
use chrono::Utc;
use np_utils::dates::iso_timestamp;
use serde_json::{json, Value};
use uuid::Uuid;

const API_VERSION: &str = "2020-07-15";
const SESSION_PARTITION: &str = "sessions";
/// One year, in seconds.
pub const DOCUMENT_TTL: i64 = 60 * 60 * 24 * 365;

#[derive(Debug, Clone)]
pub struct DocumentBackend {
    client: reqwest::Client,
    config: DocumentConfig,
}

impl DocumentBackend {
    pub fn new(config: DocumentConfig) -> Result<Self, StorageError> {
        Ok(Self {
            client: http_client()?,
            config,
        })
    }

    fn docs_url(&self) -> String {
        format!(
            "{}/dbs/{}/colls/{}/docs",
            self.config.endpoint, self.config.database, self.config.container
        )
    }

    async fn upsert(&self, partition: &str, document: &Value) -> Result<(), StorageError> {
        let request = self
            .client
            .post(self.docs_url())
            .header("Authorization", &self.config.key)
            .header("x-ms-date", Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string())
            .header("x-ms-version", API_VERSION)
            .header("x-ms-documentdb-partitionkey", format!("[\"{partition}\"]"))
            .header("x-ms-documentdb-is-upsert", "True")
            .json(document);
        check_status(request.send().await?)?;
        Ok(())
    }

    pub async fn save_event(&self, event: &AnalyticsEvent) -> Result<(), StorageError> {
        let document = event_document(event);
        self.upsert(event.month_key(), &document).await
    }

    pub async fn save_session(&self, session: &SessionRecord) -> Result<(), StorageError> {
        let document = session_document(session)?;
        self.upsert(SESSION_PARTITION, &document).await
    }
}

fn event_document(event: &AnalyticsEvent) -> Value {
    json!({
        "id": Uuid::new_v4().to_string(),
        "type": "event",
        "eventType": event.event_name,
        "timestamp": event.timestamp,
        "sessionId": event.session_id,
        "data": event.data.clone().unwrap_or_default(),
        "partitionKey": event.month_key(),
        "createdAt": iso_timestamp(&Utc::now()),
        "ttl": DOCUMENT_TTL,
    })
}

fn session_document(session: &SessionRecord) -> Result<Value, StorageError> {
    let mut document = serde_json::to_value(session)?;
    if let Value::Object(fields) = &mut document {
        fields.insert("id".into(), json!(session.session_id));
        fields.insert("type".into(), json!("session"));
        fields.insert("partitionKey".into(), json!(SESSION_PARTITION));
        fields.insert("createdAt".into(), json!(iso_timestamp(&Utc::now())));
        fields.insert("ttl".into(), json!(DOCUMENT_TTL));
    }
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock;
    use crate::session::ClientContext;
    use chrono::TimeZone;

    fn config(endpoint: &str) -> DocumentConfig {
        DocumentConfig {
            endpoint: endpoint.to_string(),
            key: "type=resource&ver=1.0&sig=abc".into(),
            database: "noise_pulse".into(),
            container: "events".into(),
        }
    }

    #[test]
    fn test_documents() {
        let at = Utc.with_ymd_and_hms(2025, 6, 30, 12, 0, 0).unwrap();
        let event = AnalyticsEvent::new("tab_hidden", "sess_1", None, &at);
        let doc = event_document(&event);
        assert_eq!(doc["partitionKey"], "2025-06");
        assert_eq!(doc["ttl"], 31_536_000);
        assert_eq!(doc["data"], json!({}));

        let session = SessionRecord::start(&ClientContext::default(), &at);
        let doc = session_document(&session).unwrap();
        assert_eq!(doc["id"], session.session_id);
        assert_eq!(doc["partitionKey"], "sessions");
        assert_eq!(doc["deviceClass"], "desktop");
    }

    #[tokio::test]
    async fn test_posts_documents() {
        let (base, received) = mock::spawn().await;
        let backend = DocumentBackend::new(config(&format!("{base}/store"))).unwrap();
        let event = AnalyticsEvent::new("page_view", "sess_1", None, &Utc::now());
        backend.save_event(&event).await.unwrap();
        assert_eq!(received.paths(), vec!["/store/dbs/noise_pulse/colls/events/docs"]);
        assert_eq!(received.bodies()[0]["eventType"], "page_view");
    }

    #[tokio::test]
    async fn test_failure_is_reported() {
        let (base, _) = mock::spawn().await;
        let backend = DocumentBackend::new(config(&format!("{base}/broken"))).unwrap();
        let session = SessionRecord::start(&ClientContext::default(), &Utc::now());
        assert!(matches!(backend.save_session(&session).await, Err(StorageError::Status(500))));
    }
}
