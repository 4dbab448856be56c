//! Storage backend configuration.
//!
//! Backends are chosen once at startup from key/value settings. Resolution
//! is a pure function over a lookup closure so it can be tested without
//! touching the process environment; [`StorageBackendConfig::from_env`]
//! wires it to `std::env`.

use crate::error::ConfigError;
use log::{info, warn};

pub const TABLE_ACCOUNT: &str = "NOISE_PULSE_TABLE_ACCOUNT";
pub const TABLE_SAS: &str = "NOISE_PULSE_TABLE_SAS";
pub const TABLE_NAME: &str = "NOISE_PULSE_TABLE_NAME";
pub const COSMOS_ENDPOINT: &str = "NOISE_PULSE_COSMOS_ENDPOINT";
pub const COSMOS_KEY: &str = "NOISE_PULSE_COSMOS_KEY";
pub const COSMOS_DATABASE: &str = "NOISE_PULSE_COSMOS_DATABASE";
pub const COSMOS_CONTAINER: &str = "NOISE_PULSE_COSMOS_CONTAINER";
pub const FUNCTIONS_URL: &str = "NOISE_PULSE_FUNCTIONS_URL";
pub const FUNCTIONS_KEY: &str = "NOISE_PULSE_FUNCTIONS_KEY";
pub const COLLECTOR_URL: &str = "NOISE_PULSE_COLLECTOR_URL";
pub const COLLECTOR_KEY: &str = "NOISE_PULSE_COLLECTOR_KEY";
pub const SITE_ID: &str = "NOISE_PULSE_SITE_ID";

pub const DEFAULT_TABLE_NAME: &str = "analytics";
pub const DEFAULT_DATABASE: &str = "noise_pulse";
pub const DEFAULT_CONTAINER: &str = "events";
pub const DEFAULT_SITE_ID: &str = "noise-pulse";

#[derive(Debug, Clone, PartialEq)]
pub struct TableConfig {
    pub account: String,
    /// Shared access signature query string, without the leading `?`
    pub sas_token: String,
    pub table_name: String,
}

impl TableConfig {
    pub fn base_url(&self) -> String {
        format!("https://{}.table.core.windows.net", self.account)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentConfig {
    pub endpoint: String,
    /// Pre-issued resource token, sent as the Authorization header
    pub key: String,
    pub database: String,
    pub container: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionConfig {
    pub base_url: String,
    pub key: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub site_id: String,
}

impl HttpConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: trim_url(base_url),
            api_key: None,
            site_id: DEFAULT_SITE_ID.to_string(),
        }
    }
}

/// One storage backend, fully configured.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageBackendConfig {
    Table(TableConfig),
    Document(DocumentConfig),
    Function(FunctionConfig),
    Http(HttpConfig),
    Local,
}

impl StorageBackendConfig {
    pub fn name(&self) -> &'static str {
        match self {
            StorageBackendConfig::Table(_) => "table",
            StorageBackendConfig::Document(_) => "document",
            StorageBackendConfig::Function(_) => "function",
            StorageBackendConfig::Http(_) => "http",
            StorageBackendConfig::Local => "local",
        }
    }

    /// Every configured backend in priority order, always ending with
    /// `Local`. Partially configured backends are logged and skipped.
    pub fn resolve_all<F>(lookup: F) -> Vec<StorageBackendConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let candidates = [
            table_config(&lookup).map(|r| r.map(StorageBackendConfig::Table)),
            document_config(&lookup).map(|r| r.map(StorageBackendConfig::Document)),
            function_config(&lookup).map(|r| r.map(StorageBackendConfig::Function)),
            http_config(&lookup).map(|r| r.map(StorageBackendConfig::Http)),
        ];
        let mut backends = Vec::new();
        for candidate in candidates.into_iter().flatten() {
            match candidate {
                Ok(backend) => backends.push(backend),
                Err(e) => warn!("Skipping storage backend: {}", e),
            }
        }
        backends.push(StorageBackendConfig::Local);
        info!(
            "Resolved storage backends: {}",
            backends.iter().map(|b| b.name()).collect::<Vec<_>>().join(" > ")
        );
        backends
    }

    /// The highest-priority configured backend.
    pub fn resolve<F>(lookup: F) -> StorageBackendConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::resolve_all(lookup)
            .into_iter()
            .next()
            .unwrap_or(StorageBackendConfig::Local)
    }

    /// [`resolve_all`](Self::resolve_all) over the process environment.
    pub fn from_env() -> Vec<StorageBackendConfig> {
        Self::resolve_all(|key| std::env::var(key).ok())
    }
}

fn trim_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn check_url(key: &'static str, url: &str) -> Result<String, ConfigError> {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(trim_url(url))
    } else {
        Err(ConfigError::Invalid {
            key,
            reason: format!("{url:?} is not an http(s) URL"),
        })
    }
}

// Each reader returns None when the backend is not configured at all.

fn table_config<F>(lookup: &F) -> Option<Result<TableConfig, ConfigError>>
where
    F: Fn(&str) -> Option<String>,
{
    let account = lookup(TABLE_ACCOUNT)?;
    Some(read_table(account.trim(), lookup))
}

fn read_table<F>(account: &str, lookup: &F) -> Result<TableConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if !account.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ConfigError::Invalid {
            key: TABLE_ACCOUNT,
            reason: "storage account names are alphanumeric".to_string(),
        });
    }
    let sas_token = lookup(TABLE_SAS).ok_or(ConfigError::Missing {
        backend: "table",
        key: TABLE_SAS,
    })?;
    Ok(TableConfig {
        account: account.to_string(),
        sas_token: sas_token.trim().trim_start_matches('?').to_string(),
        table_name: lookup(TABLE_NAME).unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string()),
    })
}

fn document_config<F>(lookup: &F) -> Option<Result<DocumentConfig, ConfigError>>
where
    F: Fn(&str) -> Option<String>,
{
    let endpoint = lookup(COSMOS_ENDPOINT)?;
    Some(read_document(&endpoint, lookup))
}

fn read_document<F>(endpoint: &str, lookup: &F) -> Result<DocumentConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let endpoint = check_url(COSMOS_ENDPOINT, endpoint)?;
    let key = lookup(COSMOS_KEY).ok_or(ConfigError::Missing {
        backend: "document",
        key: COSMOS_KEY,
    })?;
    Ok(DocumentConfig {
        endpoint,
        key,
        database: lookup(COSMOS_DATABASE).unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
        container: lookup(COSMOS_CONTAINER).unwrap_or_else(|| DEFAULT_CONTAINER.to_string()),
    })
}

fn function_config<F>(lookup: &F) -> Option<Result<FunctionConfig, ConfigError>>
where
    F: Fn(&str) -> Option<String>,
{
    let url = lookup(FUNCTIONS_URL)?;
    Some(check_url(FUNCTIONS_URL, &url).map(|base_url| FunctionConfig {
        base_url,
        key: lookup(FUNCTIONS_KEY),
    }))
}

fn http_config<F>(lookup: &F) -> Option<Result<HttpConfig, ConfigError>>
where
    F: Fn(&str) -> Option<String>,
{
    let url = lookup(COLLECTOR_URL)?;
    Some(check_url(COLLECTOR_URL, &url).map(|base_url| HttpConfig {
        base_url,
        api_key: lookup(COLLECTOR_KEY),
        site_id: lookup(SITE_ID).unwrap_or_else(|| DEFAULT_SITE_ID.to_string()),
    }))
}
