//! Configuration for the acquisition client.
//!
//! Loaded from an optional TOML file with environment overrides. The
//! webhook URL embeds an access token, so it is validated to be HTTPS at
//! load time and only ever displayed through [`Config::redacted_endpoint`].

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Environment variable overriding the webhook endpoint.
pub const WEBHOOK_URL_ENV: &str = "CRMFETCH_WEBHOOK_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("No webhook endpoint configured (set {WEBHOOK_URL_ENV} or webhook_url in the config file)")]
    MissingEndpoint,
    #[error("Webhook endpoint is not a valid URL")]
    InvalidEndpoint,
    #[error("Webhook endpoint must use https")]
    InsecureEndpoint,
}

/// Tunables for one client instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Webhook endpoint with the embedded access token. Secret.
    #[serde(default)]
    pub webhook_url: String,
    /// Request rate cap imposed by the service (default 2/s).
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,
    /// Per-attempt HTTP timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Attempt budget for retryable failures.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base of the exponential backoff schedule, in seconds.
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: f64,
    /// Response cache entry lifetime in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Page size the service uses for list methods.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Maximum sub-commands per physical batch call.
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,
}

fn default_requests_per_second() -> f64 {
    2.0
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_base_secs() -> f64 {
    1.0
}
fn default_cache_ttl_secs() -> u64 {
    15 * 60
}
fn default_page_size() -> usize {
    50
}
fn default_batch_limit() -> usize {
    50
}

impl Default for Config {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            requests_per_second: default_requests_per_second(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            backoff_base_secs: default_backoff_base_secs(),
            cache_ttl_secs: default_cache_ttl_secs(),
            page_size: default_page_size(),
            batch_limit: default_batch_limit(),
        }
    }
}

impl Config {
    /// Load from an optional TOML file, apply environment overrides, and
    /// validate the endpoint.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                toml::from_str(&text).map_err(|source| ConfigError::Parse {
                    path: path.display().to_string(),
                    source,
                })?
            }
            None => Self::default(),
        };

        if let Ok(url) = std::env::var(WEBHOOK_URL_ENV) {
            if !url.trim().is_empty() {
                config.webhook_url = url.trim().to_string();
            }
        }

        if config.webhook_url.is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        let endpoint = config.endpoint()?;
        if endpoint.scheme() != "https" {
            return Err(ConfigError::InsecureEndpoint);
        }
        Ok(config)
    }

    /// The parsed webhook endpoint.
    pub fn endpoint(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.webhook_url).map_err(|_| ConfigError::InvalidEndpoint)
    }

    /// Endpoint rendered with the token path segment masked, safe for logs.
    pub fn redacted_endpoint(&self) -> String {
        match Url::parse(&self.webhook_url) {
            Ok(url) => {
                let host = url.host_str().unwrap_or("?");
                let segments: Vec<&str> = url
                    .path_segments()
                    .map(|segments| segments.filter(|s| !s.is_empty()).collect())
                    .unwrap_or_default();
                // The token is the last path segment of a webhook URL; mask
                // everything after the first two segments to be safe.
                let masked: Vec<&str> = segments
                    .iter()
                    .enumerate()
                    .map(|(index, segment)| if index < 2 { *segment } else { "***" })
                    .collect();
                format!("{}://{}/{}/", url.scheme(), host, masked.join("/"))
            }
            Err(_) => "<invalid endpoint>".to_string(),
        }
    }
}
