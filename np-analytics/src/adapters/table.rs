//! Table-store backend (Azure Table REST API, SAS-authorized).
//!
//! Events are partitioned by UTC day; sessions share the `sessions`
//! partition and are upserted by session id.

use super::{check_status, http_client};
use crate::config::TableConfig;
use crate::error::StorageError;
use crate::event::AnalyticsEvent;
use crate::session::SessionRecord;
use chrono::Utc;
use np_utils::dates::iso_timestamp;
use serde_json::{json, Value};
use uuid::Uuid;

const API_VERSION: &str = "2020-12-06";
const ACCEPT: &str = "application/json;odata=nometadata";
const SESSION_PARTITION: &str = "sessions";

#[derive(Debug, Clone)]
pub struct TableBackend {
    client: reqwest::Client,
    config: TableConfig,
    base_url: String,
}

impl TableBackend {
    pub fn new(config: TableConfig) -> Result<Self, StorageError> {
        let base_url = config.base_url();
        Ok(Self {
            client: http_client()?,
            config,
            base_url,
        })
    }

    /// Point at a different service root, e.g. a local storage emulator.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn request(&self, method: reqwest::Method, resource: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}?{}", self.base_url, resource, self.config.sas_token);
        self.client
            .request(method, url)
            .header("Accept", ACCEPT)
            .header("x-ms-version", API_VERSION)
    }

    pub async fn save_event(&self, event: &AnalyticsEvent) -> Result<(), StorageError> {
        let entity = event_entity(event)?;
        let request = self
            .request(reqwest::Method::POST, &self.config.table_name)
            .header("Prefer", "return-no-content")
            .json(&entity);
        check_status(request.send().await?)?;
        Ok(())
    }

    pub async fn save_session(&self, session: &SessionRecord) -> Result<(), StorageError> {
        let resource = format!(
            "{}(PartitionKey='{}',RowKey='{}')",
            self.config.table_name, SESSION_PARTITION, session.session_id
        );
        let request = self
            .request(reqwest::Method::PUT, &resource)
            .json(&session_entity(session));
        check_status(request.send().await?)?;
        Ok(())
    }
}

/// Row key: session id, epoch millis, and a short random suffix so two
/// events in the same millisecond do not collide.
fn row_key(event: &AnalyticsEvent) -> String {
    let millis = chrono::DateTime::parse_from_rfc3339(&event.timestamp)
        .map(|t| t.timestamp_millis())
        .unwrap_or_else(|_| Utc::now().timestamp_millis());
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}_{}", event.session_id, millis, &suffix[..6])
}

fn event_entity(event: &AnalyticsEvent) -> Result<Value, StorageError> {
    let data = match &event.data {
        Some(data) => serde_json::to_string(data)?,
        None => "{}".to_string(),
    };
    Ok(json!({
        "PartitionKey": event.date_key(),
        "RowKey": row_key(event),
        "EventType": event.event_name,
        "EventTimestamp": event.timestamp,
        "SessionId": event.session_id,
        "EventData": data,
        "CreatedAt": iso_timestamp(&Utc::now()),
    }))
}

fn session_entity(session: &SessionRecord) -> Value {
    json!({
        "PartitionKey": SESSION_PARTITION,
        "RowKey": session.session_id,
        "SessionId": session.session_id,
        "StartTime": session.start_time,
        "EndTime": session.end_time.clone().unwrap_or_default(),
        "Language": session.language,
        "Timezone": session.timezone,
        "DeviceType": session.device_class.as_str(),
        "ScreenSize": session.screen_size,
        "ConsentGiven": session.consent_given,
        "ConsentTime": session.consent_time.clone().unwrap_or_default(),
        "CreatedAt": iso_timestamp(&Utc::now()),
    })
}
