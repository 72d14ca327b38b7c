//! HTTP transport module
//!
//! Provides the retrying transport the search pipeline runs on.
//!
//! # Features
//!
//! - **Automatic Retries**: Exponential backoff with jitter, `Retry-After` support
//! - **Failure Classification**: TLS, timeout, connect, transport, unknown
//! - **Telemetry**: Per-session request id and duration forwarding
//! - **Rate Limiting**: Optional token bucket using governor

mod client;
mod rate_limit;
mod retry;
mod session;

pub use client::{
    HttpClient, HttpClientConfig, HttpClientConfigBuilder, HttpRequest, RawResponse,
    CLIENT_INFO_HEADER, IDEMPOTENCY_KEY_HEADER, REQUEST_ID_HEADER, TELEMETRY_HEADER,
};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use retry::{
    classify, RetryPolicy, DEFAULT_MAX_RETRIES, INITIAL_DELAY, MAX_DELAY, MAX_RETRY_AFTER,
};
pub use session::{RequestMetrics, Session};
