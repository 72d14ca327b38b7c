//! Retry policy and failure classification
//!
//! Decides whether an attempt is retried and how long to sleep first.
//! Delays grow exponentially from `initial_delay`, are capped at `max_delay`,
//! then scaled by a jitter factor in `[0.5, 1.0)` and floored at
//! `initial_delay`. A server-supplied `Retry-After` wins when it is longer
//! than the computed delay and not longer than `max_retry_after`.

use crate::error::{is_retryable_status, ConnectionErrorKind, Error};
use rand::Rng;
use std::error::Error as StdError;
use std::time::Duration;

/// Floor and starting point for backoff delays
pub const INITIAL_DELAY: Duration = Duration::from_millis(500);

/// Cap on the exponential delay before jitter
pub const MAX_DELAY: Duration = Duration::from_secs(5);

/// Longest `Retry-After` the client is willing to honor
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Retries attempted after the first request
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Retry configuration for the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry, and lower bound of every delay
    pub initial_delay: Duration,
    /// Upper bound of the exponential delay
    pub max_delay: Duration,
    /// `Retry-After` values above this are ignored
    pub max_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: INITIAL_DELAY,
            max_delay: MAX_DELAY,
            max_retry_after: MAX_RETRY_AFTER,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the default delays
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Policy that never retries
    pub fn none() -> Self {
        Self::new(0)
    }

    /// Set the delay bounds
    #[must_use]
    pub fn with_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_delay = initial;
        self.max_delay = max;
        self
    }

    /// Set the `Retry-After` ceiling
    #[must_use]
    pub fn with_max_retry_after(mut self, max: Duration) -> Self {
        self.max_retry_after = max;
        self
    }

    /// Whether a response with this status gets another attempt
    pub fn should_retry_status(&self, retries_done: u32, status: u16) -> bool {
        retries_done < self.max_retries && is_retryable_status(status)
    }

    /// Whether a failure without a response gets another attempt
    pub fn should_retry_error(&self, retries_done: u32, error: &Error) -> bool {
        retries_done < self.max_retries
            && matches!(error, Error::Connection { kind, .. } if kind.is_retryable())
    }

    /// Exponential delay for a 1-based retry number, before jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
            .max(self.initial_delay)
    }

    /// Delay after applying a jitter sample drawn from `[0, 1)`
    pub fn jittered_delay(&self, attempt: u32, sample: f64) -> Duration {
        let sample = sample.clamp(0.0, 1.0);
        self.base_delay(attempt)
            .mul_f64(0.5 * (1.0 + sample))
            .max(self.initial_delay)
    }

    /// Combine the computed delay with an optional `Retry-After` in seconds
    pub fn sleep_duration(&self, delay: Duration, retry_after: Option<u64>) -> Duration {
        match retry_after.map(Duration::from_secs) {
            Some(server_delay) if server_delay <= self.max_retry_after => delay.max(server_delay),
            _ => delay,
        }
    }

    /// Sleep to apply before retry number `attempt`
    pub fn next_delay(&self, attempt: u32, retry_after: Option<u64>) -> Duration {
        let sample: f64 = rand::thread_rng().gen();
        self.sleep_duration(self.jittered_delay(attempt, sample), retry_after)
    }
}

/// Map a reqwest failure onto the connection error taxonomy
pub fn classify(error: &reqwest::Error) -> Error {
    let kind = if error.is_timeout() {
        ConnectionErrorKind::Timeout
    } else if is_tls_failure(error) {
        ConnectionErrorKind::Tls
    } else if error.is_connect() {
        ConnectionErrorKind::Connect
    } else if error.is_builder()
        || error.is_request()
        || error.is_redirect()
        || error.is_body()
        || error.is_decode()
    {
        ConnectionErrorKind::Transport
    } else {
        ConnectionErrorKind::Unknown
    };

    let message = match kind {
        ConnectionErrorKind::Unknown => format!("Unexpected error while sending request: {error}"),
        _ => error_chain(error),
    };
    Error::connection(kind, message)
}

/// Whether a source of the error is a TLS failure. The top-level message
/// names the request URL and is never inspected.
fn is_tls_failure(error: &reqwest::Error) -> bool {
    let mut source = error.source();
    while let Some(inner) = source {
        if inner
            .downcast_ref::<std::io::Error>()
            .is_some_and(|io| io.kind() == std::io::ErrorKind::InvalidData)
        {
            return true;
        }
        let text = inner.to_string().to_lowercase();
        if text.contains("certificate") || text.contains("tls") || text.contains("handshake") {
            return true;
        }
        source = inner.source();
    }
    false
}

fn error_chain(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}
