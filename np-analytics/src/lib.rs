//! Consent-gated analytics for the noise pulse dashboard.
//!
//! - [`event`] / [`session`]: event and session records, payload sanitization
//! - [`config`]: storage backend configuration resolved once at startup
//! - [`adapters`]: table, document, function and HTTP collector backends
//! - [`buffer`]: bounded local fallback buffer on SQLite
//! - [`chain`]: ordered fallback across backends, ending at the buffer
//! - [`collector`]: client for the event collector API with its request budget
//! - [`pipeline`]: the per-session tracking API
//!
//! # Usage
//!
//! ```rust,no_run
//! use np_analytics::{AnalyticsPipeline, ClientContext, LocalBuffer, StorageBackendConfig, StorageChain};
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), np_analytics::StorageError> {
//! let buffer = LocalBuffer::in_memory()?;
//! let chain = StorageChain::from_configs(&StorageBackendConfig::from_env(), buffer);
//! let mut pipeline = AnalyticsPipeline::new(Arc::new(chain), &ClientContext::default());
//! pipeline.enable_analytics();
//! pipeline.track_page_view("/");
//! pipeline.end_session();
//! pipeline.flush().await;
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod buffer;
pub mod chain;
pub mod collector;
pub mod config;
pub mod error;
pub mod event;
pub mod pipeline;
pub mod rate_limit;
pub mod schema;
pub mod session;

pub use adapters::Backend;
pub use buffer::{BufferSummary, LocalBuffer};
pub use chain::{Delivery, StorageChain};
pub use collector::{CollectorClient, EventQuery};
pub use config::StorageBackendConfig;
pub use error::{ConfigError, StorageError};
pub use event::{AnalyticsEvent, EventData};
pub use pipeline::{AnalyticsPipeline, InteractionKind};
pub use session::{ClientContext, DeviceClass, SessionRecord, SessionSummary};
