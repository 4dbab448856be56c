//! Analytics events and payload sanitization.

use chrono::{DateTime, TimeZone};
use np_utils::dates::iso_timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Payload attached to an event.
pub type EventData = Map<String, Value>;

/// Keys that may carry personal identifiers. Matched exactly, at any depth.
pub const DENYLIST: [&str; 6] = ["ip", "userAgent", "user_agent", "email", "name", "ipAddress"];

pub const CONSENT_GIVEN: &str = "consent_given";
pub const SESSION_END: &str = "session_end";
pub const PAGE_VIEW: &str = "page_view";
pub const FEATURE_USAGE: &str = "feature_usage";
pub const TAB_HIDDEN: &str = "tab_hidden";
pub const TAB_VISIBLE: &str = "tab_visible";

/// One tracked interaction. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    pub event_name: String,
    /// ISO-8601, millisecond precision
    pub timestamp: String,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<EventData>,
}

impl AnalyticsEvent {
    /// Build an event; `data` is sanitized on the way in.
    pub fn new<Tz: TimeZone>(
        event_name: &str,
        session_id: &str,
        data: Option<EventData>,
        at: &DateTime<Tz>,
    ) -> Self {
        Self {
            event_name: event_name.to_string(),
            timestamp: iso_timestamp(at),
            session_id: session_id.to_string(),
            data: data.map(sanitize),
        }
    }

    /// UTC date ("YYYY-MM-DD") of the event, used as a partition key.
    pub fn date_key(&self) -> &str {
        self.timestamp.get(..10).unwrap_or(&self.timestamp)
    }

    /// UTC month ("YYYY-MM") of the event.
    pub fn month_key(&self) -> &str {
        self.timestamp.get(..7).unwrap_or(&self.timestamp)
    }
}

/// Remove every denylisted key from `data`, recursing into nested objects
/// and arrays.
pub fn sanitize(mut data: EventData) -> EventData {
    data.retain(|key, _| !DENYLIST.contains(&key.as_str()));
    for value in data.values_mut() {
        scrub(value);
    }
    data
}

fn scrub(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|key, _| !DENYLIST.contains(&key.as_str()));
            map.values_mut().for_each(scrub);
        }
        Value::Array(items) => items.iter_mut().for_each(scrub),
        _ => {}
    }
}

/// Shorthand for building an [`EventData`] from a JSON literal. Anything
/// other than an object becomes an empty map.
pub fn event_data(value: Value) -> EventData {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
