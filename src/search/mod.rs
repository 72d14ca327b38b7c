//! Search pagination module
//!
//! Enumerates arbitrarily large result sets from a search backend whose
//! offset paging stops at a fixed result window.
//!
//! # Overview
//!
//! - [`PagingEngine`] - transport-agnostic paging state machine
//! - [`AsyncPageFetcher`] / [`PageFetcher`] - the single "fetch one page" seam
//! - [`SearchResults`] / [`BlockingSearchResults`] - sequential drivers
//! - [`PrefetchSearchResults`] - reads the next offset page ahead

mod dsl;
mod engine;
mod fetcher;
mod prefetch;
mod results;
mod types;

pub use dsl::{
    add_timestamp_filter, is_timestamp_filter, pin_timestamp_sort, strip_timestamp_filter,
    SearchCriteria, SearchRequest, SortItem, TIMESTAMP_FIELD,
};
pub use engine::PagingEngine;
pub use fetcher::{
    AsyncPageFetcher, BlockingSearchClient, PageFetcher, SearchClient, DEFAULT_SEARCH_PATH,
};
pub use prefetch::PrefetchSearchResults;
pub use results::{BlockingSearchResults, SearchResults};
pub use types::{
    entity_create_time, entity_id, PageOutcome, PageState, SearchPage, Strategy,
    DEFAULT_PAGE_SIZE, ENTITY_CREATE_TIME_FIELD, ENTITY_ID_FIELD, MASS_EXTRACT_THRESHOLD,
    MAX_RESULT_WINDOW,
};
