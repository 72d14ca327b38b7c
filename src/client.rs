//! Catalog client
//!
//! Entry point tying the transport and the search pipeline together.
//!
//! ```rust,ignore
//! use catalog_search::{CatalogClient, ClientConfig, SearchCriteria};
//!
//! let client = CatalogClient::new(ClientConfig::from_env()?)?;
//! let mut results = client.search(SearchCriteria::match_all());
//! while let Some(entity) = results.next().await? {
//!     println!("{entity}");
//! }
//! ```

use crate::config::ClientConfig;
use crate::error::Result;
use crate::http::HttpClient;
use crate::search::{
    BlockingSearchClient, BlockingSearchResults, PagingEngine, PrefetchSearchResults,
    SearchClient, SearchCriteria, SearchResults,
};
use std::sync::Arc;
use tracing::debug;

/// Client for one catalog tenant
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: Arc<HttpClient>,
    search_path: String,
    page_size: u64,
}

impl CatalogClient {
    /// Validate the config and build the transport
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let search_path = config.search_path.clone();
        let page_size = config.page_size;
        let http = HttpClient::with_config(config.into_http_config())?;
        debug!("Catalog client ready (search path {search_path})");
        Ok(Self::from_http(Arc::new(http), search_path, page_size))
    }

    /// Wrap an existing transport
    pub fn from_http(http: Arc<HttpClient>, search_path: impl Into<String>, page_size: u64) -> Self {
        Self {
            http,
            search_path: search_path.into(),
            page_size,
        }
    }

    /// The shared transport
    pub fn http(&self) -> &Arc<HttpClient> {
        &self.http
    }

    /// Page size applied to criteria that do not set one
    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// A search endpoint client with a fresh telemetry session
    pub fn search_client(&self) -> SearchClient {
        SearchClient::new(Arc::clone(&self.http), self.search_path.as_str())
    }

    fn engine(&self, criteria: SearchCriteria, bulk: bool) -> PagingEngine {
        let criteria = match criteria.size {
            Some(_) => criteria,
            None => criteria.page_size(self.page_size),
        };
        PagingEngine::new(criteria).bulk(bulk)
    }

    /// Sequential async search
    pub fn search(&self, criteria: SearchCriteria) -> SearchResults<SearchClient> {
        SearchResults::new(self.engine(criteria, false), self.search_client())
    }

    /// Sequential async search using timestamp paging from the first page
    pub fn bulk_search(&self, criteria: SearchCriteria) -> SearchResults<SearchClient> {
        SearchResults::new(self.engine(criteria, true), self.search_client())
    }

    /// Async search reading the next offset page ahead
    pub fn search_prefetch(
        &self,
        criteria: SearchCriteria,
        bulk: bool,
    ) -> PrefetchSearchResults<SearchClient> {
        PrefetchSearchResults::new(self.engine(criteria, bulk), Arc::new(self.search_client()))
    }

    /// Blocking search; must be called outside an async runtime
    pub fn blocking_search(
        &self,
        criteria: SearchCriteria,
        bulk: bool,
    ) -> Result<BlockingSearchResults<BlockingSearchClient>> {
        let fetcher = BlockingSearchClient::new(self.search_client())?;
        Ok(BlockingSearchResults::new(
            self.engine(criteria, bulk),
            fetcher,
        ))
    }

    /// Approximate number of matches, from a single one-entity page
    pub async fn count(&self, criteria: SearchCriteria) -> Result<u64> {
        use crate::search::AsyncPageFetcher;

        let mut engine = PagingEngine::new(criteria.page_size(1).from(0));
        let Some(request) = engine.next_request() else {
            return Ok(0);
        };
        let page = self.search_client().fetch_page(&request).await?;
        Ok(page.approximate_count)
    }
}
