//! Page fetchers
//!
//! The paging engine only needs one capability: turn a [`SearchRequest`] into
//! a [`SearchPage`]. It comes in an async flavor for the async drivers and a
//! blocking flavor for [`BlockingSearchResults`](super::BlockingSearchResults).

use super::dsl::SearchRequest;
use super::types::SearchPage;
use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpRequest, Session};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

/// Default path of the search endpoint
pub const DEFAULT_SEARCH_PATH: &str = "/api/meta/search/indexsearch";

/// Fetch one page without blocking the caller's thread
#[async_trait]
pub trait AsyncPageFetcher: Send + Sync {
    /// Run one search request
    async fn fetch_page(&self, request: &SearchRequest) -> Result<SearchPage>;
}

/// Fetch one page, blocking until it arrives
pub trait PageFetcher {
    /// Run one search request
    fn fetch_page(&self, request: &SearchRequest) -> Result<SearchPage>;
}

#[async_trait]
impl<T: AsyncPageFetcher + ?Sized> AsyncPageFetcher for Arc<T> {
    async fn fetch_page(&self, request: &SearchRequest) -> Result<SearchPage> {
        (**self).fetch_page(request).await
    }
}

/// Search endpoint client with its own telemetry session
#[derive(Debug)]
pub struct SearchClient {
    http: Arc<HttpClient>,
    path: String,
    session: Session,
}

impl SearchClient {
    /// Create a client for the search endpoint at `path`
    pub fn new(http: Arc<HttpClient>, path: impl Into<String>) -> Self {
        Self {
            http,
            path: path.into(),
            session: Session::new(),
        }
    }

    /// Telemetry session of this client
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Path of the search endpoint
    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl AsyncPageFetcher for SearchClient {
    async fn fetch_page(&self, request: &SearchRequest) -> Result<SearchPage> {
        debug!(
            "Fetching search page from={} size={} ({:?})",
            request.from, request.size, request.strategy
        );
        let http_request = HttpRequest::post(self.path.as_str()).json(request.to_body());
        let response = self.http.execute(&self.session, &http_request).await?;
        SearchPage::from_slice(&response.body)
    }
}

/// Blocking adapter over [`SearchClient`] driving its own runtime.
///
/// Must not be used from inside an async context.
pub struct BlockingSearchClient {
    runtime: Runtime,
    inner: SearchClient,
}

impl BlockingSearchClient {
    /// Wrap a client with a dedicated single-threaded runtime
    pub fn new(inner: SearchClient) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::config(format!("Failed to start runtime: {e}")))?;
        Ok(Self { runtime, inner })
    }

    /// Telemetry session of the wrapped client
    pub fn session(&self) -> &Session {
        self.inner.session()
    }
}

impl PageFetcher for BlockingSearchClient {
    fn fetch_page(&self, request: &SearchRequest) -> Result<SearchPage> {
        self.runtime.block_on(self.inner.fetch_page(request))
    }
}

impl std::fmt::Debug for BlockingSearchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingSearchClient")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}
