//! Per-connection request telemetry
//!
//! A [`Session`] remembers the id and duration of the last successful request
//! made through it so the next request can report them to the server. Each
//! logical connection owns its own session; nothing here is global.

use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

/// Correlation data for a completed request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMetrics {
    /// Server-assigned request id (`Request-Id` response header)
    pub request_id: String,
    /// Wall-clock time of the request, in milliseconds
    pub duration_ms: u64,
}

/// Telemetry context for one logical connection
#[derive(Debug, Default)]
pub struct Session {
    last_request: Mutex<Option<RequestMetrics>>,
}

impl Session {
    /// Create an empty session
    pub fn new() -> Self {
        Self::default()
    }

    /// Metrics of the last recorded request, if any
    pub fn last_request(&self) -> Option<RequestMetrics> {
        self.last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the stored metrics
    pub fn record(&self, metrics: RequestMetrics) {
        *self
            .last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(metrics);
    }

    /// Forget the stored metrics
    pub fn clear(&self) {
        self.last_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Header value describing the previous request
    pub(crate) fn telemetry_header(&self) -> Option<String> {
        self.last_request()
            .and_then(|metrics| serde_json::to_string(&metrics).ok())
    }
}
