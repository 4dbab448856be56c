//! Analytics commands: emit events, query the collector, manage the buffer.

use anyhow::{anyhow, bail, Context};
use log::info;
use np_analytics::config::{HttpConfig, COLLECTOR_URL};
use np_analytics::event::EventData;
use np_analytics::{
    AnalyticsPipeline, ClientContext, CollectorClient, EventQuery, LocalBuffer,
    StorageBackendConfig, StorageChain,
};
use std::path::Path;
use std::sync::Arc;

/// Client context for a terminal session, read from `LANG` and `TZ`.
pub fn terminal_context() -> ClientContext {
    let mut context = ClientContext::default();
    if let Ok(lang) = std::env::var("LANG") {
        context.language_tag = lang;
    }
    if let Ok(tz) = std::env::var("TZ") {
        context.timezone = tz;
    }
    context
}

fn parse_data(raw: Option<&str>) -> anyhow::Result<Option<EventData>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match serde_json::from_str::<serde_json::Value>(raw).context("--data is not valid JSON")? {
        serde_json::Value::Object(map) => Ok(Some(map)),
        _ => bail!("--data must be a JSON object"),
    }
}

/// Collector settings from `--url`, falling back to the environment.
fn collector_config(url: Option<&str>) -> anyhow::Result<HttpConfig> {
    if let Some(url) = url {
        return Ok(HttpConfig::new(url));
    }
    StorageBackendConfig::from_env()
        .into_iter()
        .find_map(|backend| match backend {
            StorageBackendConfig::Http(config) => Some(config),
            _ => None,
        })
        .ok_or_else(|| anyhow!("No collector configured; pass --url or set {}", COLLECTOR_URL))
}

/// Grant consent, emit `event` and end the session, waiting for delivery.
pub async fn run_track(event: &str, data: Option<&str>, buffer_path: &Path) -> anyhow::Result<()> {
    let data = parse_data(data)?;
    let buffer = LocalBuffer::open(buffer_path)
        .with_context(|| format!("Failed to open buffer {}", buffer_path.display()))?;
    let chain = StorageChain::from_configs(&StorageBackendConfig::from_env(), buffer);
    let mut pipeline = AnalyticsPipeline::new(Arc::new(chain), &terminal_context());

    pipeline.enable_analytics();
    pipeline.track_event(event, data);
    pipeline.end_session();
    let deliveries = pipeline.flush().await;

    for delivery in &deliveries {
        info!("Delivered: {:?}", delivery);
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&pipeline.session_summary())?
    );
    Ok(())
}

pub async fn run_events(
    url: Option<&str>,
    event_type: Option<String>,
    site_id: Option<String>,
    limit: usize,
) -> anyhow::Result<()> {
    let client = CollectorClient::new(collector_config(url)?)?;
    let query = EventQuery {
        site_id,
        event_type,
        limit: Some(limit),
    };
    let list = client.list_events(&query).await?;
    info!("Collector returned {} of {} events", list.count, list.total);
    println!("{}", serde_json::to_string_pretty(&list.events)?);
    Ok(())
}

pub async fn run_collector_summary(url: Option<&str>, site_id: Option<&str>) -> anyhow::Result<()> {
    let client = CollectorClient::new(collector_config(url)?)?;
    let health = client.health().await?;
    info!("Collector {} is {}", health.service, health.status);
    let summary = client.summary(site_id).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

pub fn run_buffer(path: &Path, clear: bool, events: bool) -> anyhow::Result<()> {
    let buffer = LocalBuffer::open(path)
        .with_context(|| format!("Failed to open buffer {}", path.display()))?;
    if clear {
        buffer.clear_all()?;
        println!("Cleared {}", path.display());
        return Ok(());
    }
    if events {
        println!("{}", serde_json::to_string_pretty(&buffer.events()?)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&buffer.summary()?)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_data() {
        assert_eq!(parse_data(None).unwrap(), None);
        let data = parse_data(Some(r#"{"page": "/", "ip": "1.2.3.4"}"#)).unwrap().unwrap();
        assert_eq!(data.len(), 2);
        assert!(parse_data(Some("[1, 2]")).is_err());
        assert!(parse_data(Some("{")).is_err());
    }

    #[test]
    fn test_collector_config_prefers_flag() {
        let config = collector_config(Some("http://localhost:3000/")).unwrap();
        assert_eq!(config.base_url, "http://localhost:3000");
    }

    #[test]
    fn test_buffer_command() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("buffer.sqlite");
        run_buffer(&path, false, false).unwrap();
        run_buffer(&path, false, true).unwrap();
        run_buffer(&path, true, false).unwrap();
    }
}
