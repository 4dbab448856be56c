//! Ordered fallback across storage backends.
//!
//! A save walks the remote backends in priority order, skipping any that
//! report themselves unavailable, and stops at the first success. When every
//! remote backend fails, the payload goes to the local buffer exactly once.
//! If that fails too the loss is logged at error level.

use crate::adapters::{Backend, Payload};
use crate::buffer::LocalBuffer;
use crate::config::StorageBackendConfig;
use crate::event::AnalyticsEvent;
use crate::session::SessionRecord;
use log::{debug, error, info, warn};

/// Where a payload ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Accepted by the named remote backend.
    Remote(&'static str),
    /// Kept in the local buffer.
    Buffered,
    /// Every backend, the buffer included, refused it.
    Lost,
}

#[derive(Debug, Clone)]
pub struct StorageChain {
    remotes: Vec<Backend>,
    buffer: LocalBuffer,
}

impl StorageChain {
    /// Remote backends in priority order; `buffer` is always the last resort.
    pub fn new(remotes: Vec<Backend>, buffer: LocalBuffer) -> Self {
        let remotes = remotes.into_iter().filter(|b| !b.is_local()).collect();
        Self { remotes, buffer }
    }

    /// A chain with no remote backends.
    pub fn local(buffer: LocalBuffer) -> Self {
        Self::new(Vec::new(), buffer)
    }

    /// Build backends for each resolved config. A backend whose client cannot
    /// be built is logged and left out.
    pub fn from_configs(configs: &[StorageBackendConfig], buffer: LocalBuffer) -> Self {
        let mut remotes = Vec::new();
        for config in configs {
            match Backend::from_config(config, &buffer) {
                Ok(backend) => remotes.push(backend),
                Err(e) => warn!("Could not start {} backend: {}", config.name(), e),
            }
        }
        let chain = Self::new(remotes, buffer);
        info!("Primary storage backend: {}", chain.primary_name());
        chain
    }

    pub fn primary_name(&self) -> &'static str {
        self.remotes.first().map(|b| b.name()).unwrap_or("local")
    }

    /// Backend names in the order they are tried.
    pub fn backend_names(&self) -> Vec<&'static str> {
        self.remotes
            .iter()
            .map(|b| b.name())
            .chain(std::iter::once("local"))
            .collect()
    }

    pub fn buffer(&self) -> &LocalBuffer {
        &self.buffer
    }

    pub async fn save_event(&self, event: &AnalyticsEvent) -> Delivery {
        self.deliver(Payload::Event(event)).await
    }

    pub async fn save_session(&self, session: &SessionRecord) -> Delivery {
        self.deliver(Payload::Session(session)).await
    }

    /// Store directly in the local buffer, bypassing remote backends.
    pub fn save_locally(&self, payload: Payload<'_>) -> Delivery {
        let result = match payload {
            Payload::Event(event) => self.buffer.save_event(event),
            Payload::Session(session) => self.buffer.save_session(session),
        };
        match result {
            Ok(()) => Delivery::Buffered,
            Err(e) => {
                error!("Local buffer refused {}, dropping it: {}", payload.describe(), e);
                Delivery::Lost
            }
        }
    }

    async fn deliver(&self, payload: Payload<'_>) -> Delivery {
        let mut failures = 0;
        for backend in &self.remotes {
            if !backend.is_available() {
                debug!("Skipping unavailable {} backend", backend.name());
                continue;
            }
            match backend.save(payload).await {
                Ok(()) => {
                    if failures > 0 {
                        info!("Fallback {} backend stored {}", backend.name(), payload.describe());
                    }
                    return Delivery::Remote(backend.name());
                }
                Err(e) => {
                    warn!("{} backend failed to store {}: {}", backend.name(), payload.describe(), e);
                    failures += 1;
                }
            }
        }
        if failures > 0 {
            error!(
                "All {} remote backend(s) failed for {}; keeping it in the local buffer",
                failures,
                payload.describe()
            );
        }
        let delivery = self.save_locally(payload);
        if failures > 0 && delivery == Delivery::Buffered {
            info!("Local buffer stored {}", payload.describe());
        }
        delivery
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{FunctionBackend, HttpBackend};
    use crate::collector::{mock, CollectorClient};
    use crate::config::{FunctionConfig, HttpConfig};
    use crate::rate_limit::RateLimiter;
    use crate::session::ClientContext;
    use chrono::Utc;
    use std::sync::Arc;
    use std::time::Duration;

    fn event() -> AnalyticsEvent {
        AnalyticsEvent::new("page_view", "sess_1", None, &Utc::now())
    }

    fn function(base_url: &str) -> Backend {
        Backend::Function(
            FunctionBackend::new(FunctionConfig {
                base_url: base_url.to_string(),
                key: None,
            })
            .unwrap(),
        )
    }

    fn http(base_url: &str) -> Backend {
        Backend::Http(HttpBackend::new(HttpConfig::new(base_url)).unwrap())
    }

    #[tokio::test]
    async fn test_failing_primary_buffers_exactly_once() {
        let (base, _) = mock::spawn().await;
        let buffer = LocalBuffer::in_memory().unwrap();
        let chain = StorageChain::new(vec![function(&format!("{base}/broken"))], buffer.clone());
        let event = event();
        assert_eq!(chain.save_event(&event).await, Delivery::Buffered);
        assert_eq!(buffer.events().unwrap(), vec![event]);
    }

    #[tokio::test]
    async fn test_fallback_walks_in_order() {
        let (base, received) = mock::spawn().await;
        let buffer = LocalBuffer::in_memory().unwrap();
        let chain = StorageChain::new(
            vec![
                function(&format!("{base}/broken")),
                http("http://127.0.0.1:9"),
                http(&base),
                function(&base),
            ],
            buffer.clone(),
        );
        assert_eq!(chain.save_event(&event()).await, Delivery::Remote("http"));
        assert_eq!(received.events().len(), 1);
        // the later function backend was never tried
        assert!(received.paths().iter().all(|p| p == "/api/analytics"));
        assert_eq!(buffer.event_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stored_event_without_receipt_is_not_buffered() {
        let (base, _) = mock::spawn().await;
        let buffer = LocalBuffer::in_memory().unwrap();
        let chain = StorageChain::new(vec![http(&format!("{base}/terse"))], buffer.clone());
        assert_eq!(chain.save_event(&event()).await, Delivery::Remote("http"));
        assert_eq!(buffer.event_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_backend_is_skipped() {
        let (base, received) = mock::spawn().await;
        let limiter = Arc::new(RateLimiter::new(0, Duration::from_secs(900)));
        let spent = CollectorClient::with_limiter(HttpConfig::new(&base), limiter).unwrap();
        let buffer = LocalBuffer::in_memory().unwrap();
        let chain = StorageChain::new(
            vec![Backend::Http(HttpBackend::from_client(spent)), function(&base)],
            buffer,
        );
        assert_eq!(chain.save_event(&event()).await, Delivery::Remote("function"));
        assert!(received.events().is_empty());
    }

    #[tokio::test]
    async fn test_local_only_chain() {
        let buffer = LocalBuffer::in_memory().unwrap();
        let chain = StorageChain::from_configs(&[StorageBackendConfig::Local], buffer.clone());
        assert_eq!(chain.primary_name(), "local");
        assert_eq!(chain.backend_names(), vec!["local"]);
        let session = SessionRecord::start(&ClientContext::default(), &Utc::now());
        assert_eq!(chain.save_session(&session).await, Delivery::Buffered);
        assert_eq!(buffer.sessions().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_chain_from_configs_keeps_priority() {
        let buffer = LocalBuffer::in_memory().unwrap();
        let configs = vec![
            StorageBackendConfig::Function(FunctionConfig {
                base_url: "https://fn.example.net".into(),
                key: None,
            }),
            StorageBackendConfig::Http(HttpConfig::new("http://localhost:3000")),
            StorageBackendConfig::Local,
        ];
        let chain = StorageChain::from_configs(&configs, buffer);
        assert_eq!(chain.primary_name(), "function");
        assert_eq!(chain.backend_names(), vec!["function", "http", "local"]);
    }
}
