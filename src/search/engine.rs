//! Paging state machine
//!
//! [`PagingEngine`] decides what the next request looks like and digests the
//! response, but never performs I/O itself. Drivers alternate between
//! [`PagingEngine::next_request`] and [`PagingEngine::accept_page`]:
//!
//! ```text
//! loop {
//!     let request = engine.next_request()?;      // None: exhausted
//!     let page = fetcher.fetch_page(&request)?;  // any transport
//!     match engine.accept_page(page)? { .. }     // Page / Refetch / Done
//! }
//! ```
//!
//! The strategy is re-selected before every offset request because the
//! backend's approximate count can change between pages. Once a timestamp page
//! has been accepted the engine stays in timestamp paging: its counts then
//! describe the filtered query and say nothing about the full result set.
//! Offset paging walks `from`
//! forward in caller sort order. Timestamp paging sorts by creation time and
//! moves a `>=` filter to the last creation time seen; when a whole page shares
//! one creation time the filter cannot move, so `from` skips the entities
//! already processed instead. Ties at page boundaries are removed with the
//! processed-id set, and entities yielded by offset pages before the switch
//! are never yielded again.

use super::dsl::{
    add_timestamp_filter, pin_timestamp_sort, strip_timestamp_filter, SearchCriteria,
    SearchRequest,
};
use super::types::{
    entity_create_time, entity_id, PageOutcome, PageState, SearchPage, Strategy,
    DEFAULT_PAGE_SIZE,
};
use crate::error::{Error, Result};
use crate::types::JsonValue;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Paging position of the last bulk request: filter bound and offset
type BulkWindow = (Option<i64>, u64);

/// Strategy-switching pagination over one search
#[derive(Debug, Clone)]
pub struct PagingEngine {
    criteria: SearchCriteria,
    state: PageState,
    bulk: bool,
    pending: Option<Strategy>,
    bulk_started: bool,
    yielded_any: bool,
    offset_ids: HashSet<String>,
    last_bulk_window: Option<BulkWindow>,
    stalled: bool,
    exhausted: bool,
}

impl PagingEngine {
    /// Create an engine; a missing or zero page size falls back to the default
    pub fn new(criteria: SearchCriteria) -> Self {
        let size = criteria
            .size
            .filter(|size| *size > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        let state = PageState::new(criteria.from, size);

        Self {
            criteria,
            state,
            bulk: false,
            pending: None,
            bulk_started: false,
            yielded_any: false,
            offset_ids: HashSet::new(),
            last_bulk_window: None,
            stalled: false,
            exhausted: false,
        }
    }

    /// Force timestamp paging from the first page
    #[must_use]
    pub fn bulk(mut self, bulk: bool) -> Self {
        self.bulk = bulk;
        self
    }

    /// Change the page size for subsequent requests
    pub fn set_page_size(&mut self, size: u64) {
        if size > 0 {
            self.state.size = size;
        }
    }

    /// Strategy the next request will use
    pub fn strategy(&self) -> Strategy {
        if self.bulk_started {
            return Strategy::TimestampBulk;
        }
        Strategy::select(self.bulk, self.state.approximate_count)
    }

    /// Count reported by the most recent response
    pub fn approximate_count(&self) -> u64 {
        self.state.approximate_count
    }

    /// Page size of the next request
    pub fn page_size(&self) -> u64 {
        self.state.size
    }

    /// Distinct entities seen under timestamp paging
    pub fn processed_count(&self) -> usize {
        self.state.processed_ids.len()
    }

    /// Current paging state
    pub fn state(&self) -> &PageState {
        &self.state
    }

    /// Current criteria, as last rewritten
    pub fn criteria(&self) -> &SearchCriteria {
        &self.criteria
    }

    /// Whether the last response ended the results
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Build the next request, or `None` once results are exhausted.
    ///
    /// Calling this again before [`accept_page`](Self::accept_page) rebuilds
    /// the same request, so a failed fetch can simply be retried.
    pub fn next_request(&mut self) -> Option<SearchRequest> {
        if self.exhausted {
            return None;
        }

        let strategy = self.strategy();
        self.criteria.size = Some(self.state.size);

        match strategy {
            Strategy::Offset => {
                self.criteria.from = self.state.start;
            }
            Strategy::TimestampBulk => {
                if !self.prepare_timestamp_paging() {
                    self.exhausted = true;
                    return None;
                }
            }
        }

        self.pending = Some(strategy);
        Some(SearchRequest::from_criteria(&self.criteria, strategy))
    }

    /// Rewrite query, sort and offset for the next timestamp page.
    /// Returns false when paging has stalled.
    fn prepare_timestamp_paging(&mut self) -> bool {
        strip_timestamp_filter(&mut self.criteria.query);
        pin_timestamp_sort(&mut self.criteria.sort);

        if !self.bulk_started {
            self.state.first_timestamp = None;
            self.state.last_timestamp = None;
            self.criteria.from = 0;
            debug!(
                "Timestamp paging from the start (approximate count {}, {} offset ids to skip)",
                self.state.approximate_count,
                self.offset_ids.len()
            );
            return true;
        }

        let window = match self.state.last_timestamp {
            Some(last) if self.state.spans_multiple_timestamps() => {
                let query = std::mem::take(&mut self.criteria.query);
                self.criteria.query = add_timestamp_filter(query, last);
                self.criteria.from = 0;
                (Some(last), 0)
            }
            _ => {
                self.criteria.from = self.state.processed_ids.len() as u64;
                (None, self.criteria.from)
            }
        };

        if self.stalled && self.last_bulk_window == Some(window) {
            warn!(
                "Timestamp paging stalled at {:?} after {} entities, stopping",
                window,
                self.state.processed_ids.len()
            );
            return false;
        }

        debug!(
            "Timestamp page: created >= {:?}, from {}",
            window.0, self.criteria.from
        );
        self.last_bulk_window = Some(window);
        true
    }

    /// Digest the response to the request built by
    /// [`next_request`](Self::next_request)
    pub fn accept_page(&mut self, page: SearchPage) -> Result<PageOutcome> {
        let strategy = self
            .pending
            .take()
            .ok_or_else(|| Error::Other("no search request is awaiting a page".to_string()))?;

        self.state.approximate_count = page.approximate_count;

        let entities = match page.entities {
            Some(entities) if !entities.is_empty() => entities,
            _ => {
                debug!("Search exhausted ({strategy:?})");
                self.exhausted = true;
                return Ok(PageOutcome::Done);
            }
        };

        match strategy {
            Strategy::Offset => Ok(self.accept_offset_page(entities)),
            Strategy::TimestampBulk => Ok(self.accept_timestamp_page(entities)),
        }
    }

    fn accept_offset_page(&mut self, entities: Vec<JsonValue>) -> PageOutcome {
        if !self.yielded_any && self.strategy() == Strategy::TimestampBulk {
            debug!(
                "Approximate count {} exceeds the offset window, switching to timestamp paging",
                self.state.approximate_count
            );
            return PageOutcome::Refetch;
        }

        self.state.start += self.state.size;
        // bounded by the offset window
        self.offset_ids
            .extend(entities.iter().filter_map(entity_id).map(str::to_string));
        self.yielded_any = true;
        PageOutcome::Page(entities)
    }

    fn accept_timestamp_page(&mut self, entities: Vec<JsonValue>) -> PageOutcome {
        self.bulk_started = true;
        self.state.first_timestamp = entities.first().and_then(entity_create_time);
        self.state.last_timestamp = entities.last().and_then(entity_create_time);

        let processed = &mut self.state.processed_ids;
        let offset_ids = &self.offset_ids;
        let fresh: Vec<JsonValue> = entities
            .into_iter()
            .filter(|entity| {
                entity_id(entity).map_or(true, |id| {
                    processed.insert(id.to_string()) && !offset_ids.contains(id)
                })
            })
            .collect();

        self.stalled = fresh.is_empty();
        self.yielded_any |= !fresh.is_empty();
        PageOutcome::Page(fresh)
    }
}
