//! Error types for the catalog search client
//!
//! All public APIs return `Result<T, Error>` where Error is defined here.
//! Transient failures are absorbed by the transport's retry loop; what reaches
//! callers is either a connection error that outlived its retries, a status
//! error translated from the last response, or a payload error.

use std::fmt;
use thiserror::Error;

/// Classification of a failure that produced no HTTP response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// TLS handshake or certificate validation failed
    Tls,
    /// The attempt exceeded its connect or read timeout
    Timeout,
    /// The TCP connection could not be established
    Connect,
    /// Request building, redirect, or body transfer failed
    Transport,
    /// Anything the classifier does not recognize
    Unknown,
}

impl ConnectionErrorKind {
    /// Whether a failure of this kind is worth another attempt
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Timeout | Self::Connect)
    }
}

impl fmt::Display for ConnectionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Tls => "tls",
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::Transport => "transport",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// The main error type for the catalog search client
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Connection Errors
    // ============================================================================
    #[error("Connection error ({kind}): {message}")]
    Connection {
        kind: ConnectionErrorKind,
        message: String,
    },

    // ============================================================================
    // HTTP Status Errors
    // ============================================================================
    #[error("Invalid request (HTTP {status}): {body}")]
    InvalidRequest { status: u16, body: String },

    #[error("Authentication failed (HTTP {status}): {body}")]
    Authentication { status: u16, body: String },

    #[error("Permission denied (HTTP {status}): {body}")]
    Permission { status: u16, body: String },

    #[error("Not found (HTTP {status}): {body}")]
    NotFound { status: u16, body: String },

    #[error("Conflict (HTTP {status}): {body}")]
    Conflict { status: u16, body: String },

    #[error("Rate limited (HTTP {status}), retry after {retry_after_seconds:?}s: {body}")]
    RateLimited {
        status: u16,
        retry_after_seconds: Option<u64>,
        body: String,
    },

    #[error("Server error (HTTP {status}): {body}")]
    Server { status: u16, body: String },

    // ============================================================================
    // Payload Errors
    // ============================================================================
    #[error("Failed to decode search page: {message}")]
    PageDecode { message: String },

    // ============================================================================
    // Runtime Errors
    // ============================================================================
    #[error("Background fetch failed: {message}")]
    Task { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create a connection error
    pub fn connection(kind: ConnectionErrorKind, message: impl Into<String>) -> Self {
        Self::Connection {
            kind,
            message: message.into(),
        }
    }

    /// Create a page decode error
    pub fn page_decode(message: impl Into<String>) -> Self {
        Self::PageDecode {
            message: message.into(),
        }
    }

    /// Translate a non-success HTTP status into its typed error
    pub fn from_status(status: u16, body: impl Into<String>, retry_after: Option<u64>) -> Self {
        let body = body.into();
        match status {
            400 => Self::InvalidRequest { status, body },
            401 => Self::Authentication { status, body },
            403 => Self::Permission { status, body },
            404 => Self::NotFound { status, body },
            409 => Self::Conflict { status, body },
            429 => Self::RateLimited {
                status,
                retry_after_seconds: retry_after,
                body,
            },
            _ => Self::Server { status, body },
        }
    }

    /// HTTP status carried by this error, if it came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::InvalidRequest { status, .. }
            | Self::Authentication { status, .. }
            | Self::Permission { status, .. }
            | Self::NotFound { status, .. }
            | Self::Conflict { status, .. }
            | Self::RateLimited { status, .. }
            | Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if this error is retryable by the transport
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection { kind, .. } => kind.is_retryable(),
            _ => self.status().is_some_and(is_retryable_status),
        }
    }
}

/// Statuses the transport retries before surfacing
pub(crate) fn is_retryable_status(status: u16) -> bool {
    status == 409 || status >= 500
}

/// Result type alias for the catalog search client
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}
