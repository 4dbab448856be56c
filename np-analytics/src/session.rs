//! Session records.

use chrono::{DateTime, TimeZone, Utc};
use np_utils::dates::iso_timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Mobile,
    Tablet,
    Desktop,
}

impl DeviceClass {
    /// Classify by viewport width in CSS pixels.
    pub fn from_width(width: u32) -> Self {
        match width {
            0..=767 => DeviceClass::Mobile,
            768..=1023 => DeviceClass::Tablet,
            _ => DeviceClass::Desktop,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Mobile => "mobile",
            DeviceClass::Tablet => "tablet",
            DeviceClass::Desktop => "desktop",
        }
    }
}

/// What the client reports about itself when a session starts.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientContext {
    /// Raw language tag, e.g. "fr-CA"
    pub language_tag: String,
    /// IANA zone name
    pub timezone: String,
    pub screen_width: u32,
    pub screen_height: u32,
}

impl Default for ClientContext {
    fn default() -> Self {
        Self {
            language_tag: "en".to_string(),
            timezone: "UTC".to_string(),
            screen_width: 1280,
            screen_height: 800,
        }
    }
}

/// Reduce a language tag to the two supported dashboard languages.
pub fn normalize_language(tag: &str) -> &'static str {
    if tag.trim().to_ascii_lowercase().starts_with("fr") {
        "fr"
    } else {
        "en"
    }
}

/// Random, non-identifying session id: `sess_<9 hex>_<epoch millis>`.
pub fn generate_session_id<Tz: TimeZone>(now: &DateTime<Tz>) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("sess_{}_{}", &random[..9], now.timestamp_millis())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub session_id: String,
    pub start_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    pub language: String,
    pub timezone: String,
    pub device_class: DeviceClass,
    /// "WIDTHxHEIGHT"
    pub screen_size: String,
    pub consent_given: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consent_time: Option<String>,
}

impl SessionRecord {
    pub fn start<Tz: TimeZone>(context: &ClientContext, now: &DateTime<Tz>) -> Self {
        Self {
            session_id: generate_session_id(now),
            start_time: iso_timestamp(now),
            end_time: None,
            language: normalize_language(&context.language_tag).to_string(),
            timezone: context.timezone.clone(),
            device_class: DeviceClass::from_width(context.screen_width),
            screen_size: format!("{}x{}", context.screen_width, context.screen_height),
            consent_given: false,
            consent_time: None,
        }
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.start_time)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    /// Seconds from start to `now`, never negative.
    pub fn duration_seconds<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> i64 {
        self.started_at()
            .map(|start| (now.timestamp_millis() - start.timestamp_millis()).max(0) / 1000)
            .unwrap_or(0)
    }

    /// Month of the session start ("YYYY-MM").
    pub fn month_key(&self) -> &str {
        self.start_time.get(..7).unwrap_or(&self.start_time)
    }
}

/// Anonymised view of the running session for debugging output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// First 12 characters of the id followed by "..."
    pub session_id: String,
    pub language: String,
    pub device_class: DeviceClass,
    pub timezone: String,
    pub consent_given: bool,
    pub event_count: usize,
    pub enabled: bool,
    pub storage_backend: String,
}

pub fn truncate_session_id(id: &str) -> String {
    let head: String = id.chars().take(12).collect();
    format!("{head}...")
}
