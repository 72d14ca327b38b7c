//! Read-ahead search results
//!
//! While the caller works through the current page, the next offset page is
//! already being fetched on a background task. At most one such task exists
//! per iterator. Timestamp paging cannot read ahead, since the request for
//! page N+1 depends on the contents of page N, so it is fetched inline.
//!
//! Teardown: [`PrefetchSearchResults::close`] aborts the in-flight task and
//! waits for it to finish; dropping the iterator aborts it without waiting.

use super::dsl::SearchRequest;
use super::engine::PagingEngine;
use super::fetcher::AsyncPageFetcher;
use super::types::{PageOutcome, SearchPage, Strategy};
use crate::error::{Error, Result};
use crate::types::JsonValue;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

/// The single background fetch of an iterator
struct PendingFetch {
    handle: JoinHandle<Result<SearchPage>>,
}

impl PendingFetch {
    fn spawn<F>(fetcher: Arc<F>, request: SearchRequest) -> Self
    where
        F: AsyncPageFetcher + 'static,
    {
        let handle = tokio::spawn(async move { fetcher.fetch_page(&request).await });
        Self { handle }
    }

    /// Wait for the page; task failures surface as errors
    async fn join(mut self) -> Result<SearchPage> {
        match (&mut self.handle).await {
            Ok(page) => page,
            Err(e) => Err(Error::Task {
                message: e.to_string(),
            }),
        }
    }

    /// Abort the task and wait until it is gone
    async fn cancel(mut self) {
        self.handle.abort();
        let _ = (&mut self.handle).await;
    }
}

impl Drop for PendingFetch {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Async search results that fetch the next offset page ahead of time
pub struct PrefetchSearchResults<F> {
    engine: PagingEngine,
    fetcher: Arc<F>,
    buffer: VecDeque<JsonValue>,
    pending: Option<PendingFetch>,
}

impl<F: AsyncPageFetcher + 'static> PrefetchSearchResults<F> {
    /// Create results over an engine and a shared fetcher
    pub fn new(engine: PagingEngine, fetcher: Arc<F>) -> Self {
        Self {
            engine,
            fetcher,
            buffer: VecDeque::new(),
            pending: None,
        }
    }

    /// The underlying engine
    pub fn engine(&self) -> &PagingEngine {
        &self.engine
    }

    /// Count reported by the most recent response
    pub fn approximate_count(&self) -> u64 {
        self.engine.approximate_count()
    }

    /// Whether a background fetch is in flight
    pub fn has_pending_fetch(&self) -> bool {
        self.pending.is_some()
    }

    /// Fetch the next non-empty page; entities still buffered by
    /// [`next`](Self::next) are returned first
    pub async fn next_page(&mut self) -> Result<Option<Vec<JsonValue>>> {
        if !self.buffer.is_empty() {
            return Ok(Some(self.buffer.drain(..).collect()));
        }

        loop {
            let page = match self.pending.take() {
                Some(pending) => pending.join().await?,
                None => {
                    let Some(request) = self.engine.next_request() else {
                        return Ok(None);
                    };
                    self.fetcher.fetch_page(&request).await?
                }
            };

            match self.engine.accept_page(page)? {
                PageOutcome::Page(entities) => {
                    self.schedule_prefetch();
                    if !entities.is_empty() {
                        return Ok(Some(entities));
                    }
                }
                PageOutcome::Refetch => {}
                PageOutcome::Done => return Ok(None),
            }
        }
    }

    /// Next entity, fetching pages as needed
    pub async fn next(&mut self) -> Result<Option<JsonValue>> {
        if self.buffer.is_empty() {
            match self.next_page().await? {
                Some(entities) => self.buffer.extend(entities),
                None => return Ok(None),
            }
        }
        Ok(self.buffer.pop_front())
    }

    /// Collect every remaining entity
    pub async fn collect_all(mut self) -> Result<Vec<JsonValue>> {
        let mut all = Vec::new();
        while let Some(page) = self.next_page().await? {
            all.extend(page);
        }
        Ok(all)
    }

    /// Stop iterating: abort any in-flight fetch and wait for it to end
    pub async fn close(mut self) {
        if let Some(pending) = self.pending.take() {
            debug!("Cancelling in-flight search page fetch");
            pending.cancel().await;
        }
    }

    fn schedule_prefetch(&mut self) {
        if self.pending.is_some()
            || self.engine.is_exhausted()
            || self.engine.strategy() != Strategy::Offset
        {
            return;
        }
        if let Some(request) = self.engine.next_request() {
            debug!("Prefetching search page from={}", request.from);
            self.pending = Some(PendingFetch::spawn(Arc::clone(&self.fetcher), request));
        }
    }
}

impl<F> std::fmt::Debug for PrefetchSearchResults<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrefetchSearchResults")
            .field("engine", &self.engine)
            .field("buffered", &self.buffer.len())
            .field("pending", &self.pending.is_some())
            .finish_non_exhaustive()
    }
}
