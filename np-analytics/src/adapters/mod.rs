//! Storage backends.
//!
//! Each remote backend makes at most one attempt per call and reports the
//! outcome as a `Result`; retry and fallback belong to
//! [`StorageChain`](crate::chain::StorageChain).

pub mod document;
pub mod function;
pub mod http;
pub mod table;

use crate::buffer::LocalBuffer;
use crate::config::StorageBackendConfig;
use crate::error::StorageError;
use crate::event::AnalyticsEvent;
use crate::session::SessionRecord;
use std::time::Duration;

pub use document::DocumentBackend;
pub use function::FunctionBackend;
pub use http::HttpBackend;
pub use table::TableBackend;

/// Per-request timeout for every remote backend.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn http_client() -> Result<reqwest::Client, StorageError> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| StorageError::Network(e.to_string()))
}

/// Turn a non-2xx response into [`StorageError::Status`].
pub(crate) fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(StorageError::Status(status.as_u16()))
    }
}

/// What is being stored.
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    Event(&'a AnalyticsEvent),
    Session(&'a SessionRecord),
}

impl Payload<'_> {
    pub fn describe(&self) -> String {
        match self {
            Payload::Event(e) => format!("event {}", e.event_name),
            Payload::Session(s) => format!("session {}", crate::session::truncate_session_id(&s.session_id)),
        }
    }
}

/// One configured backend.
#[derive(Debug, Clone)]
pub enum Backend {
    Local(LocalBuffer),
    Table(TableBackend),
    Document(DocumentBackend),
    Function(FunctionBackend),
    Http(HttpBackend),
}

impl Backend {
    /// Build the backend for `config`. `Local` shares `buffer`.
    pub fn from_config(config: &StorageBackendConfig, buffer: &LocalBuffer) -> Result<Self, StorageError> {
        Ok(match config {
            StorageBackendConfig::Table(c) => Backend::Table(TableBackend::new(c.clone())?),
            StorageBackendConfig::Document(c) => Backend::Document(DocumentBackend::new(c.clone())?),
            StorageBackendConfig::Function(c) => Backend::Function(FunctionBackend::new(c.clone())?),
            StorageBackendConfig::Http(c) => Backend::Http(HttpBackend::new(c.clone())?),
            StorageBackendConfig::Local => Backend::Local(buffer.clone()),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Local(_) => "local",
            Backend::Table(_) => "table",
            Backend::Document(_) => "document",
            Backend::Function(_) => "function",
            Backend::Http(_) => "http",
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Backend::Local(_))
    }

    /// Whether a call is worth attempting right now.
    pub fn is_available(&self) -> bool {
        match self {
            Backend::Http(b) => b.is_available(),
            _ => true,
        }
    }

    pub async fn save(&self, payload: Payload<'_>) -> Result<(), StorageError> {
        match payload {
            Payload::Event(event) => self.save_event(event).await,
            Payload::Session(session) => self.save_session(session).await,
        }
    }

    pub async fn save_event(&self, event: &AnalyticsEvent) -> Result<(), StorageError> {
        match self {
            Backend::Local(buffer) => buffer.save_event(event),
            Backend::Table(b) => b.save_event(event).await,
            Backend::Document(b) => b.save_event(event).await,
            Backend::Function(b) => b.save_event(event).await,
            Backend::Http(b) => b.save_event(event).await,
        }
    }

    pub async fn save_session(&self, session: &SessionRecord) -> Result<(), StorageError> {
        match self {
            Backend::Local(buffer) => buffer.save_session(session),
            Backend::Table(b) => b.save_session(session).await,
            Backend::Document(b) => b.save_session(session).await,
            Backend::Function(b) => b.save_session(session).await,
            Backend::Http(b) => b.save_session(session).await,
        }
    }
}
