// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]

//! # Catalog Search
//!
//! Client for the search endpoint of a metadata catalog, built to enumerate
//! result sets far larger than the backend's offset window.
//!
//! ## Features
//!
//! - **Resilient transport**: exponential backoff with jitter, `Retry-After`,
//!   idempotency keys and per-session request telemetry
//! - **Strategy-switching pagination**: offset paging for small result sets,
//!   creation-time paging with de-duplication once the count passes the window
//! - **Read-ahead**: the next offset page is fetched while the current one is
//!   consumed, with cancel-and-join teardown
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use catalog_search::{CatalogClient, ClientConfig, SearchCriteria, SortItem};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> catalog_search::Result<()> {
//!     let client = CatalogClient::new(ClientConfig::from_file("catalog.yaml")?)?;
//!
//!     let criteria = SearchCriteria::new(json!({"term": {"__typeName.keyword": "Table"}}))
//!         .sort(SortItem::asc("name.keyword"));
//!
//!     let mut results = client.search_prefetch(criteria, false);
//!     while let Some(entity) = results.next().await? {
//!         println!("{entity}");
//!     }
//!     results.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  SearchResults · PrefetchSearchResults · BlockingSearchResults│
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │ next_request / accept_page
//! ┌──────────────────────────────┴───────────────────────────────┐
//! │         PagingEngine (Offset ⇄ TimestampBulk, dedup)          │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │ AsyncPageFetcher / PageFetcher
//! ┌──────────────────────────────┴───────────────────────────────┐
//! │   HttpClient: retry · backoff · rate limit · Session metrics  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Client configuration
pub mod config;

/// HTTP client with retry and rate limiting
pub mod http;

/// Search pagination
pub mod search;

/// Catalog client
pub mod client;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use client::CatalogClient;
pub use config::ClientConfig;
pub use search::{
    PagingEngine, PrefetchSearchResults, SearchCriteria, SearchPage, SearchResults, SortItem,
    Strategy,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
