//! HTTP transport with retry, telemetry and rate limiting
//!
//! [`HttpClient::send`] issues one logical request and retries it internally:
//! - connection failures classified as retryable (timeout, connect)
//! - `409 Conflict` and every `5xx` response
//!
//! Every attempt of a logical call carries the same `Idempotency-Key`. When
//! retries run out, the last connection error is returned, or the last
//! response is handed back for status translation.

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use super::retry::{classify, RetryPolicy};
use super::session::{RequestMetrics, Session};
use crate::error::{Error, Result};
use crate::types::{JsonValue, Method, StringMap};
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

/// Header carrying the idempotency key of a logical call
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Header describing the client library
pub const CLIENT_INFO_HEADER: &str = "X-Client-Info";

/// Header carrying metrics of the session's previous request
pub const TELEMETRY_HEADER: &str = "X-Client-Telemetry";

/// Response header with the server-assigned request id
pub const REQUEST_ID_HEADER: &str = "Request-Id";

/// Configuration for the HTTP client
#[derive(Clone)]
pub struct HttpClientConfig {
    /// Base URL for relative request paths
    pub base_url: Option<String>,
    /// Total time budget of a single attempt
    pub timeout: Duration,
    /// Connect budget of a single attempt
    pub connect_timeout: Duration,
    /// Retry policy
    pub retry: RetryPolicy,
    /// Rate limiter configuration
    pub rate_limit: Option<RateLimiterConfig>,
    /// Send the previous request's metrics with each request
    pub telemetry: bool,
    /// Bearer token for the `Authorization` header
    pub api_token: Option<String>,
    /// Default headers for all requests
    pub default_headers: HashMap<String, String>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(900),
            connect_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            rate_limit: None,
            telemetry: false,
            api_token: None,
            default_headers: HashMap::new(),
            user_agent: format!("{}/{}", crate::NAME, crate::VERSION),
        }
    }
}

impl std::fmt::Debug for HttpClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClientConfig")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("retry", &self.retry)
            .field("rate_limit", &self.rate_limit)
            .field("telemetry", &self.telemetry)
            .field("api_token", &self.api_token.as_ref().map(|_| "***"))
            .field("default_headers", &self.default_headers)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the per-attempt timeouts
    pub fn timeouts(mut self, connect: Duration, total: Duration) -> Self {
        self.config.connect_timeout = connect;
        self.config.timeout = total;
        self
    }

    /// Set the retry policy
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    /// Set max retries, keeping the current delays
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.retry.max_retries = retries;
        self
    }

    /// Set rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Enable or disable request telemetry
    pub fn telemetry(mut self, enabled: bool) -> Self {
        self.config.telemetry = enabled;
        self
    }

    /// Set the bearer token
    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.config.api_token = Some(token.into());
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// A single logical request
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL or path relative to the base URL
    pub url: String,
    /// Request headers
    pub headers: StringMap,
    /// Request body (JSON)
    pub body: Option<JsonValue>,
}

impl HttpRequest {
    /// Create a request
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            ..Self::default()
        }
    }

    /// Create a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Create a POST request
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set JSON body
    #[must_use]
    pub fn json(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }
}

/// The final response of a logical request
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body
    pub body: Bytes,
    /// Retries performed before this response was obtained
    pub retries: u32,
}

impl RawResponse {
    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Integer `Retry-After` header, in seconds
    pub fn retry_after(&self) -> Option<u64> {
        header_value(&self.headers, "retry-after").and_then(|v| v.trim().parse().ok())
    }

    /// Server-assigned request id
    pub fn request_id(&self) -> Option<&str> {
        header_value(&self.headers, REQUEST_ID_HEADER)
    }

    /// Body as text, lossily decoded
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Translate a non-success status into its typed error
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::from_status(
                self.status,
                self.text(),
                self.retry_after(),
            ))
        }
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// HTTP client with retry and rate limiting
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    rate_limiter: Option<RateLimiter>,
    client_info: String,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);
        let client_info = serde_json::json!({
            "name": crate::NAME,
            "version": crate::VERSION,
        })
        .to_string();

        Ok(Self {
            client,
            config,
            rate_limiter,
            client_info,
        })
    }

    /// Get the client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Check if rate limiting is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }

    /// Send a request, retrying transient failures.
    ///
    /// Non-success responses that are not retried, or that outlived their
    /// retries, are returned as-is; use [`RawResponse::error_for_status`] or
    /// [`HttpClient::execute`] to turn them into errors.
    pub async fn send(&self, session: &Session, request: &HttpRequest) -> Result<RawResponse> {
        let full_url = self.build_url(&request.url);
        let idempotency_key = Uuid::new_v4().to_string();
        let policy = &self.config.retry;
        let mut retries = 0;

        loop {
            if let Some(ref limiter) = self.rate_limiter {
                limiter.wait().await;
            }

            let started = Instant::now();
            let builder = self.build_request(session, request, &full_url, &idempotency_key);

            match self.attempt(builder).await {
                Ok(mut response) => {
                    if policy.should_retry_status(retries, response.status) {
                        retries += 1;
                        let delay = policy.next_delay(retries, response.retry_after());
                        warn!(
                            "{} {} returned {}, retry {}/{} in {:?}",
                            request.method,
                            full_url,
                            response.status,
                            retries,
                            policy.max_retries,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    let elapsed = started.elapsed();
                    response.retries = retries;
                    if response.is_success() {
                        self.record_metrics(session, &response, elapsed);
                    }
                    debug!(
                        "{} {} -> {} in {:?} after {} retries",
                        request.method, full_url, response.status, elapsed, retries
                    );
                    return Ok(response);
                }
                Err(error) => {
                    if policy.should_retry_error(retries, &error) {
                        retries += 1;
                        let delay = policy.next_delay(retries, None);
                        warn!(
                            "{} {} failed: {error}, retry {}/{} in {:?}",
                            request.method, full_url, retries, policy.max_retries, delay
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(error);
                }
            }
        }
    }

    /// Send a request and translate a non-success final status into an error
    pub async fn execute(&self, session: &Session, request: &HttpRequest) -> Result<RawResponse> {
        self.send(session, request).await?.error_for_status()
    }

    /// Send a request and decode a successful JSON response
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        session: &Session,
        request: &HttpRequest,
    ) -> Result<T> {
        self.execute(session, request).await?.json()
    }

    async fn attempt(&self, builder: reqwest::RequestBuilder) -> Result<RawResponse> {
        let response = builder.send().await.map_err(|e| classify(&e))?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| classify(&e))?;

        Ok(RawResponse {
            status,
            headers,
            body,
            retries: 0,
        })
    }

    fn build_request(
        &self,
        session: &Session,
        request: &HttpRequest,
        full_url: &str,
        idempotency_key: &str,
    ) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .request(request.method.into(), full_url)
            .timeout(self.config.timeout)
            .header(CLIENT_INFO_HEADER, self.client_info.as_str())
            .header(IDEMPOTENCY_KEY_HEADER, idempotency_key);

        if let Some(ref token) = self.config.api_token {
            req = req.bearer_auth(token);
        }

        if self.config.telemetry {
            if let Some(value) = session.telemetry_header() {
                req = req.header(TELEMETRY_HEADER, value);
            }
        }

        for (key, value) in &self.config.default_headers {
            req = req.header(key.as_str(), value.as_str());
        }

        for (key, value) in &request.headers {
            req = req.header(key.as_str(), value.as_str());
        }

        if let Some(ref body) = request.body {
            req = req.json(body);
        }

        req
    }

    fn record_metrics(&self, session: &Session, response: &RawResponse, elapsed: Duration) {
        if !self.config.telemetry {
            return;
        }
        if let Some(request_id) = response.request_id() {
            session.record(RequestMetrics {
                request_id: request_id.to_string(),
                duration_ms: elapsed.as_millis() as u64,
            });
        }
    }

    /// Build full URL from path
    fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        match &self.config.base_url {
            Some(base) => {
                let base = base.trim_end_matches('/');
                let path = path.trim_start_matches('/');
                format!("{base}/{path}")
            }
            None => path.to_string(),
        }
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}
