//! Sequential result iteration
//!
//! Async and blocking drivers around [`PagingEngine`]. Both yield entities in
//! page order and stop at the first error.

use super::engine::PagingEngine;
use super::fetcher::{AsyncPageFetcher, PageFetcher};
use super::types::PageOutcome;
use crate::error::{Error, Result};
use crate::types::JsonValue;
use futures::stream::{self, Stream};
use std::collections::VecDeque;

/// Drive the engine until it yields a non-empty page or runs out
pub(crate) async fn fetch_next_page<F>(
    engine: &mut PagingEngine,
    fetcher: &F,
) -> Result<Option<Vec<JsonValue>>>
where
    F: AsyncPageFetcher + ?Sized,
{
    while let Some(request) = engine.next_request() {
        let page = fetcher.fetch_page(&request).await?;
        match engine.accept_page(page)? {
            PageOutcome::Page(entities) if !entities.is_empty() => return Ok(Some(entities)),
            PageOutcome::Page(_) | PageOutcome::Refetch => {}
            PageOutcome::Done => return Ok(None),
        }
    }
    Ok(None)
}

/// Async, sequential search results
#[derive(Debug)]
pub struct SearchResults<F> {
    engine: PagingEngine,
    fetcher: F,
    buffer: VecDeque<JsonValue>,
}

impl<F: AsyncPageFetcher> SearchResults<F> {
    /// Create results over an engine and a fetcher
    pub fn new(engine: PagingEngine, fetcher: F) -> Self {
        Self {
            engine,
            fetcher,
            buffer: VecDeque::new(),
        }
    }

    /// The underlying engine
    pub fn engine(&self) -> &PagingEngine {
        &self.engine
    }

    /// The page fetcher
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Count reported by the most recent response
    pub fn approximate_count(&self) -> u64 {
        self.engine.approximate_count()
    }

    /// Fetch the next non-empty page; entities still buffered by
    /// [`next`](Self::next) are returned first
    pub async fn next_page(&mut self) -> Result<Option<Vec<JsonValue>>> {
        if !self.buffer.is_empty() {
            return Ok(Some(self.buffer.drain(..).collect()));
        }
        fetch_next_page(&mut self.engine, &self.fetcher).await
    }

    /// Next entity, fetching pages as needed
    pub async fn next(&mut self) -> Result<Option<JsonValue>> {
        if self.buffer.is_empty() {
            match fetch_next_page(&mut self.engine, &self.fetcher).await? {
                Some(entities) => self.buffer.extend(entities),
                None => return Ok(None),
            }
        }
        Ok(self.buffer.pop_front())
    }

    /// Collect every remaining entity
    pub async fn collect_all(mut self) -> Result<Vec<JsonValue>> {
        let mut all: Vec<JsonValue> = self.buffer.drain(..).collect();
        while let Some(page) = fetch_next_page(&mut self.engine, &self.fetcher).await? {
            all.extend(page);
        }
        Ok(all)
    }

    /// Turn the results into a stream of entities
    pub fn into_stream(self) -> impl Stream<Item = Result<JsonValue>> {
        stream::try_unfold(self, |mut results| async move {
            let next = results.next().await?;
            Ok::<_, Error>(next.map(|entity| (entity, results)))
        })
    }
}

/// Blocking, sequential search results
#[derive(Debug)]
pub struct BlockingSearchResults<F> {
    engine: PagingEngine,
    fetcher: F,
    buffer: VecDeque<JsonValue>,
    failed: bool,
}

impl<F: PageFetcher> BlockingSearchResults<F> {
    /// Create results over an engine and a fetcher
    pub fn new(engine: PagingEngine, fetcher: F) -> Self {
        Self {
            engine,
            fetcher,
            buffer: VecDeque::new(),
            failed: false,
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

    /// Fetch the next non-empty page
    pub fn next_page(&mut self) -> Result<Option<Vec<JsonValue>>> {
        if !self.buffer.is_empty() {
            return Ok(Some(self.buffer.drain(..).collect()));
        }
        while let Some(request) = self.engine.next_request() {
            let page = self.fetcher.fetch_page(&request)?;
            match self.engine.accept_page(page)? {
                PageOutcome::Page(entities) if !entities.is_empty() => return Ok(Some(entities)),
                PageOutcome::Page(_) | PageOutcome::Refetch => {}
                PageOutcome::Done => return Ok(None),
            }
        }
        Ok(None)
    }
}

impl<F: PageFetcher> Iterator for BlockingSearchResults<F> {
    type Item = Result<JsonValue>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if self.buffer.is_empty() {
            match self.next_page() {
                Ok(Some(entities)) => self.buffer.extend(entities),
                Ok(None) => return None,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}
