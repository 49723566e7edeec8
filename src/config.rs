//! Transport and cache configuration.
//!
//! Defaults reproduce the values the web client booted with: the public
//! JSONPlaceholder API, a 10 second timeout, data fresh for five minutes and a
//! single retry for failed reads.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://jsonplaceholder.typicode.com/";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_RETRY: u32 = 1;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_GC_TIME: Duration = Duration::from_secs(5 * 60);
/// Upper bound for the exponential retry delay.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

pub const ENV_BASE_URL: &str = "ROUTE_QUERY_BASE_URL";
pub const ENV_TIMEOUT_MS: &str = "ROUTE_QUERY_TIMEOUT_MS";
pub const ENV_TOKEN_FILE: &str = "ROUTE_QUERY_TOKEN_FILE";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid base URL {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Invalid timeout {value:?}: expected milliseconds")]
    InvalidTimeout { value: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// HTTP transport settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
    /// JSON file holding the bearer token. `None` keeps the token in memory.
    pub token_file: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            token_file: None,
        }
    }
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_token_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_file = Some(path.into());
        self
    }

    /// Reads overrides from the process environment on top of the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_BASE_URL) {
            config.base_url = url;
        }
        if let Some(value) = lookup(ENV_TIMEOUT_MS) {
            let ms = value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidTimeout { value })?;
            config.timeout = Duration::from_millis(ms);
        }
        if let Some(path) = lookup(ENV_TOKEN_FILE) {
            config.token_file = Some(PathBuf::from(path));
        }
        config.parsed_base_url()?;
        Ok(config)
    }

    /// Parses the base URL, forcing a trailing slash so relative paths join
    /// beneath it instead of replacing its last segment.
    pub fn parsed_base_url(&self) -> Result<Url, ConfigError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        if url.cannot_be_a_base() {
            return Err(ConfigError::InvalidBaseUrl {
                url: self.base_url.clone(),
                reason: "cannot be used as a base".to_string(),
            });
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }
}

/// Cache behaviour applied to every query unless a hook overrides it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueryDefaults {
    #[serde(with = "duration_ms")]
    pub stale_time: Duration,
    pub retry: u32,
    /// Base delay for exponential backoff between retries.
    #[serde(with = "duration_ms")]
    pub retry_delay: Duration,
    /// Age after which an entry with no fetch in flight is evicted.
    #[serde(with = "duration_ms")]
    pub gc_time: Duration,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            stale_time: DEFAULT_STALE_TIME,
            retry: DEFAULT_RETRY,
            retry_delay: DEFAULT_RETRY_DELAY,
            gc_time: DEFAULT_GC_TIME,
        }
    }
}

impl QueryDefaults {
    pub fn backoff(&self, attempt: u32) -> Duration {
        backoff_delay(self.retry_delay, attempt)
    }
}

/// Delay before retry number `attempt` (0-based): `base * 2^attempt`, capped
/// at [`MAX_RETRY_DELAY`].
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt);
    base.checked_mul(factor)
        .unwrap_or(MAX_RETRY_DELAY)
        .min(MAX_RETRY_DELAY)
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
