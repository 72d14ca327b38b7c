//! Client configuration
//!
//! [`ClientConfig`] is the YAML-facing description of a catalog connection.
//! It converts into the transport's [`HttpClientConfig`].
//!
//! ```yaml
//! base_url: https://tenant.example.com
//! api_token: "..."
//! max_retries: 5
//! page_size: 300
//! rate_limit:
//!   requests_per_second: 20
//!   burst_size: 5
//! ```

use crate::error::{Error, Result};
use crate::http::{HttpClientConfig, RateLimiterConfig, RetryPolicy, DEFAULT_MAX_RETRIES};
use crate::search::{DEFAULT_PAGE_SIZE, DEFAULT_SEARCH_PATH, MAX_RESULT_WINDOW};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Environment variable holding the catalog base URL
pub const ENV_BASE_URL: &str = "CATALOG_BASE_URL";

/// Environment variable holding the API token
pub const ENV_API_TOKEN: &str = "CATALOG_API_TOKEN";

/// Connection settings for a catalog tenant
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Tenant base URL
    pub base_url: String,

    /// Bearer token
    pub api_token: Option<String>,

    /// Path of the search endpoint
    pub search_path: String,

    /// Total request timeout in seconds
    pub timeout_secs: u64,

    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,

    /// Retries after the first attempt
    pub max_retries: u32,

    /// Backoff before the first retry, in milliseconds
    pub initial_delay_ms: u64,

    /// Backoff ceiling, in milliseconds
    pub max_delay_ms: u64,

    /// Longest honored `Retry-After`, in seconds
    pub max_retry_after_secs: u64,

    /// Forward metrics of the previous request on the next one
    pub telemetry: bool,

    /// User agent override
    pub user_agent: Option<String>,

    /// Default search page size
    pub page_size: u64,

    /// Client-side rate limit
    pub rate_limit: Option<RateLimiterConfig>,

    /// Extra headers sent on every request
    pub headers: HashMap<String, String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let http = HttpClientConfig::default();
        let retry = RetryPolicy::default();
        Self {
            base_url: String::new(),
            api_token: None,
            search_path: DEFAULT_SEARCH_PATH.to_string(),
            timeout_secs: http.timeout.as_secs(),
            connect_timeout_secs: http.connect_timeout.as_secs(),
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay_ms: retry.initial_delay.as_millis() as u64,
            max_delay_ms: retry.max_delay.as_millis() as u64,
            max_retry_after_secs: retry.max_retry_after.as_secs(),
            telemetry: false,
            user_agent: None,
            page_size: DEFAULT_PAGE_SIZE,
            rate_limit: None,
            headers: HashMap::new(),
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "***"))
            .field("search_path", &self.search_path)
            .field("timeout_secs", &self.timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("initial_delay_ms", &self.initial_delay_ms)
            .field("max_delay_ms", &self.max_delay_ms)
            .field("max_retry_after_secs", &self.max_retry_after_secs)
            .field("telemetry", &self.telemetry)
            .field("user_agent", &self.user_agent)
            .field("page_size", &self.page_size)
            .field("rate_limit", &self.rate_limit)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ClientConfig {
    /// Config for a base URL with defaults elsewhere
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Set the API token
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Parse and validate YAML
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("Failed to parse client config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Build from `CATALOG_BASE_URL` and `CATALOG_API_TOKEN`
    pub fn from_env() -> Result<Self> {
        let config = Self::default().with_env_overrides_from(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Overlay the environment onto a loaded config
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_env_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_env_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(base_url) = lookup(ENV_BASE_URL).filter(|v| !v.is_empty()) {
            self.base_url = base_url;
        }
        if let Some(token) = lookup(ENV_API_TOKEN).filter(|v| !v.is_empty()) {
            self.api_token = Some(token);
        }
        self
    }

    /// Check the settings are usable
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(Error::missing_field("base_url"));
        }
        let url = url::Url::parse(&self.base_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "base_url must be http or https, got '{}'",
                url.scheme()
            )));
        }
        if !self.search_path.starts_with('/') {
            return Err(Error::config("search_path must start with '/'"));
        }
        if self.page_size == 0 || self.page_size > MAX_RESULT_WINDOW {
            return Err(Error::config(format!(
                "page_size must be between 1 and {MAX_RESULT_WINDOW}"
            )));
        }
        if self.timeout_secs == 0 {
            return Err(Error::config("timeout_secs must be positive"));
        }
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(Error::config(
                "initial_delay_ms cannot exceed max_delay_ms",
            ));
        }
        if let Some(limit) = &self.rate_limit {
            if limit.requests_per_second == 0 {
                return Err(Error::config("rate_limit.requests_per_second must be positive"));
            }
        }
        Ok(())
    }

    /// Retry policy described by this config
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries)
            .with_delays(
                Duration::from_millis(self.initial_delay_ms),
                Duration::from_millis(self.max_delay_ms),
            )
            .with_max_retry_after(Duration::from_secs(self.max_retry_after_secs))
    }

    /// Transport configuration
    pub fn into_http_config(self) -> HttpClientConfig {
        let mut builder = HttpClientConfig::builder()
            .base_url(self.base_url.as_str())
            .timeouts(
                Duration::from_secs(self.connect_timeout_secs),
                Duration::from_secs(self.timeout_secs),
            )
            .retry(self.retry_policy())
            .telemetry(self.telemetry);

        if let Some(token) = self.api_token {
            builder = builder.api_token(token);
        }
        if let Some(limit) = self.rate_limit {
            builder = builder.rate_limit(limit);
        }
        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }
        for (key, value) in self.headers {
            builder = builder.header(key, value);
        }
        builder.build()
    }
}
