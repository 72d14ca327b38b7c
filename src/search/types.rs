//! Paging types
//!
//! Page payloads, paging state and the strategy switch thresholds.

use crate::error::{Error, Result};
use crate::types::JsonValue;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Page size used when the caller does not pick one
pub const DEFAULT_PAGE_SIZE: u64 = 300;

/// Deepest `from + size` the search backend will serve
pub const MAX_RESULT_WINDOW: u64 = 100_000;

/// Approximate count above which timestamp paging takes over
pub const MASS_EXTRACT_THRESHOLD: u64 = MAX_RESULT_WINDOW - DEFAULT_PAGE_SIZE;

/// Entity field used for de-duplication
pub const ENTITY_ID_FIELD: &str = "guid";

/// Entity field holding the creation time, in epoch milliseconds
pub const ENTITY_CREATE_TIME_FIELD: &str = "createTime";

/// How the next page is addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Plain `from`/`size` paging in caller sort order
    #[default]
    Offset,
    /// Creation-time ordered paging with a moving lower-bound filter
    TimestampBulk,
}

impl Strategy {
    /// Pick the strategy for the next fetch
    pub fn select(bulk: bool, approximate_count: u64) -> Self {
        if bulk || approximate_count > MASS_EXTRACT_THRESHOLD {
            Self::TimestampBulk
        } else {
            Self::Offset
        }
    }
}

// ============================================================================
// Search Page
// ============================================================================

/// One decoded search response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    /// Matching entities; absent or empty means no more results
    #[serde(default)]
    pub entities: Option<Vec<JsonValue>>,
    /// Backend estimate of the total number of matches
    #[serde(default)]
    pub approximate_count: u64,
}

impl SearchPage {
    /// Create a page
    pub fn new(entities: Vec<JsonValue>, approximate_count: u64) -> Self {
        Self {
            entities: Some(entities),
            approximate_count,
        }
    }

    /// Decode a response body, rejecting anything that is not a page
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let page: Self = serde_json::from_slice(body)
            .map_err(|e| Error::page_decode(format!("invalid search response: {e}")))?;
        page.validate()
    }

    /// Decode an already parsed response
    pub fn from_value(value: JsonValue) -> Result<Self> {
        let page: Self = serde_json::from_value(value)
            .map_err(|e| Error::page_decode(format!("invalid search response: {e}")))?;
        page.validate()
    }

    fn validate(self) -> Result<Self> {
        if let Some(position) = self
            .entities
            .iter()
            .flatten()
            .position(|entity| !entity.is_object())
        {
            return Err(Error::page_decode(format!(
                "entity at position {position} is not an object"
            )));
        }
        Ok(self)
    }

    /// Whether the page signals the end of results
    pub fn is_last(&self) -> bool {
        self.entities.as_ref().map_or(true, Vec::is_empty)
    }
}

/// De-duplication key of an entity
pub fn entity_id(entity: &JsonValue) -> Option<&str> {
    entity.get(ENTITY_ID_FIELD).and_then(JsonValue::as_str)
}

/// Creation time of an entity
pub fn entity_create_time(entity: &JsonValue) -> Option<i64> {
    entity
        .get(ENTITY_CREATE_TIME_FIELD)
        .and_then(JsonValue::as_i64)
}

// ============================================================================
// Page State
// ============================================================================

/// Paging position and bookkeeping for one engine
#[derive(Debug, Clone, Default)]
pub struct PageState {
    /// Offset of the next offset-mode page
    pub start: u64,
    /// Page size of the next request
    pub size: u64,
    /// Count reported by the most recent response
    pub approximate_count: u64,
    /// Creation time of the first entity of the last bulk page
    pub first_timestamp: Option<i64>,
    /// Creation time of the last entity of the last bulk page
    pub last_timestamp: Option<i64>,
    /// Ids already seen under bulk paging
    pub processed_ids: HashSet<String>,
}

impl PageState {
    /// Create state starting at an offset
    pub fn new(start: u64, size: u64) -> Self {
        Self {
            start,
            size,
            ..Self::default()
        }
    }

    /// Whether the last bulk page spanned more than one creation time
    pub fn spans_multiple_timestamps(&self) -> bool {
        matches!(
            (self.first_timestamp, self.last_timestamp),
            (Some(first), Some(last)) if first != last
        )
    }
}

/// Result of feeding a response to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    /// Entities to yield; may be empty when every entity was a repeat
    Page(Vec<JsonValue>),
    /// The response was discarded; request the page again
    Refetch,
    /// No more results
    Done,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_threshold_constant() {
        assert_eq!(MASS_EXTRACT_THRESHOLD, 99_700);
    }

    #[test]
    fn test_strategy_select() {
        assert_eq!(Strategy::select(false, 0), Strategy::Offset);
        assert_eq!(Strategy::select(false, MASS_EXTRACT_THRESHOLD), Strategy::Offset);
        assert_eq!(
            Strategy::select(false, MASS_EXTRACT_THRESHOLD + 1),
            Strategy::TimestampBulk
        );
        assert_eq!(Strategy::select(true, 10), Strategy::TimestampBulk);
    }

    #[test]
    fn test_search_page_decode() {
        let page = SearchPage::from_slice(
            br#"{"entities": [{"guid": "a", "createTime": 5}], "approximateCount": 12}"#,
        )
        .unwrap();
        assert_eq!(page.approximate_count, 12);
        assert!(!page.is_last());

        let entity = &page.entities.as_ref().unwrap()[0];
        assert_eq!(entity_id(entity), Some("a"));
        assert_eq!(entity_create_time(entity), Some(5));
    }

    #[test]
    fn test_search_page_without_entities_is_last() {
        let page = SearchPage::from_slice(br#"{"approximateCount": 0}"#).unwrap();
        assert!(page.is_last());

        let page = SearchPage::from_slice(br#"{"entities": [], "approximateCount": 3}"#).unwrap();
        assert!(page.is_last());
    }

    #[test]
    fn test_search_page_decode_failures() {
        for body in [
            &b"not json"[..],
            br#"{"entities": {"guid": "a"}}"#,
            br#"{"entities": [], "approximateCount": "many"}"#,
            br#"{"entities": [1, 2]}"#,
            br#"[]"#,
        ] {
            let err = SearchPage::from_slice(body).unwrap_err();
            assert!(matches!(err, Error::PageDecode { .. }), "{err}");
        }
    }

    #[test]
    fn test_search_page_from_value() {
        let page = SearchPage::from_value(json!({"entities": [{"guid": "x"}]})).unwrap();
        assert_eq!(page.approximate_count, 0);
        assert!(SearchPage::from_value(json!("nope")).is_err());
    }

    #[test]
    fn test_page_state_spans_multiple_timestamps() {
        let mut state = PageState::new(0, 10);
        assert!(!state.spans_multiple_timestamps());

        state.first_timestamp = Some(1);
        state.last_timestamp = Some(1);
        assert!(!state.spans_multiple_timestamps());

        state.last_timestamp = Some(2);
        assert!(state.spans_multiple_timestamps());
    }
}
