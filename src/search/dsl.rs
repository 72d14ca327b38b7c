//! Search request DSL
//!
//! The query tree itself is opaque to this crate. The only structure it
//! inspects is the top-level `bool.filter` list, where timestamp paging keeps
//! its `range` on the creation-time field, and the sort list.

use super::types::{Strategy, DEFAULT_PAGE_SIZE};
use crate::types::{JsonObject, JsonValue, SortOrder};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::json;

/// Index field holding an entity's creation time, in epoch milliseconds
pub const TIMESTAMP_FIELD: &str = "__timestamp";

// ============================================================================
// Sort Items
// ============================================================================

/// One sort key, serialized as `{"<field>": {"order": "asc"}}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortItem {
    /// Index field to sort on
    pub field: String,
    /// Sort direction
    pub order: SortOrder,
}

impl SortItem {
    /// Create a sort item
    pub fn new(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            field: field.into(),
            order,
        }
    }

    /// Ascending sort on a field
    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, SortOrder::Asc)
    }

    /// Descending sort on a field
    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, SortOrder::Desc)
    }

    /// Parse `field` or `field:asc` / `field:desc`
    pub fn parse(spec: &str) -> Option<Self> {
        let (field, order) = match spec.split_once(':') {
            Some((field, "asc")) => (field, SortOrder::Asc),
            Some((field, "desc")) => (field, SortOrder::Desc),
            Some(_) => return None,
            None => (spec, SortOrder::Asc),
        };
        if field.is_empty() {
            return None;
        }
        Some(Self::new(field, order))
    }

    /// Read a sort item back from its DSL form
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        let (field, spec) = value.as_object()?.iter().next()?;
        let order = serde_json::from_value(spec.get("order")?.clone()).ok()?;
        Some(Self::new(field.clone(), order))
    }
}

impl Serialize for SortItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.field, &json!({ "order": self.order }))?;
        map.end()
    }
}

// ============================================================================
// Search Criteria
// ============================================================================

/// Mutable search state owned by a single paging engine
#[derive(Debug, Clone, PartialEq)]
pub struct SearchCriteria {
    /// Query tree
    pub query: JsonValue,
    /// Sort keys, most significant first
    pub sort: Vec<SortItem>,
    /// Offset of the first result
    pub from: u64,
    /// Page size; `None` leaves the choice to the client
    pub size: Option<u64>,
    /// Optional post filter tree
    pub post_filter: Option<JsonValue>,
}

impl SearchCriteria {
    /// Criteria for a query without an explicit page size
    pub fn new(query: JsonValue) -> Self {
        Self {
            query,
            sort: Vec::new(),
            from: 0,
            size: None,
            post_filter: None,
        }
    }

    /// Match every entity
    pub fn match_all() -> Self {
        Self::new(json!({ "match_all": {} }))
    }

    /// Add a sort key
    #[must_use]
    pub fn sort(mut self, item: SortItem) -> Self {
        self.sort.push(item);
        self
    }

    /// Set page size
    #[must_use]
    pub fn page_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Set starting offset
    #[must_use]
    pub fn from(mut self, from: u64) -> Self {
        self.from = from;
        self
    }

    /// Set post filter
    #[must_use]
    pub fn post_filter(mut self, filter: JsonValue) -> Self {
        self.post_filter = Some(filter);
        self
    }
}

// ============================================================================
// Search Request
// ============================================================================

/// Snapshot of the criteria for one page fetch
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// Query tree, rewritten for the strategy
    pub query: JsonValue,
    /// Sort keys
    pub sort: Vec<SortItem>,
    /// Offset of the first result
    pub from: u64,
    /// Page size
    pub size: u64,
    /// Optional post filter tree
    pub post_filter: Option<JsonValue>,
    /// Strategy the request was built for
    pub strategy: Strategy,
}

impl SearchRequest {
    pub(crate) fn from_criteria(criteria: &SearchCriteria, strategy: Strategy) -> Self {
        Self {
            query: criteria.query.clone(),
            sort: criteria.sort.clone(),
            from: criteria.from,
            size: criteria.size.unwrap_or(DEFAULT_PAGE_SIZE),
            post_filter: criteria.post_filter.clone(),
            strategy,
        }
    }

    /// The DSL document: `{query, sort, from, size, postFilter?}`
    pub fn dsl(&self) -> JsonValue {
        let mut dsl = json!({
            "query": self.query,
            "sort": self.sort,
            "from": self.from,
            "size": self.size,
        });
        if let (Some(filter), Some(map)) = (&self.post_filter, dsl.as_object_mut()) {
            map.insert("postFilter".to_string(), filter.clone());
        }
        dsl
    }

    /// Request body POSTed to the search endpoint
    pub fn to_body(&self) -> JsonValue {
        json!({ "dsl": self.dsl() })
    }

    /// Lower bound of the creation-time paging filter, if present
    pub fn timestamp_filter(&self) -> Option<i64> {
        paging_filters(&self.query)?
            .iter()
            .find_map(timestamp_filter_bound)
    }
}

// ============================================================================
// Query Rewrites
// ============================================================================

fn range_gte(field: &str, value: i64) -> JsonValue {
    let mut bound = JsonObject::new();
    bound.insert(field.to_string(), json!({ "gte": value }));
    json!({ "range": bound })
}

fn timestamp_filter_bound(node: &JsonValue) -> Option<i64> {
    node.get("range")?
        .get(TIMESTAMP_FIELD)?
        .get("gte")?
        .as_i64()
}

fn paging_filters(query: &JsonValue) -> Option<&Vec<JsonValue>> {
    query.get("bool")?.get("filter")?.as_array()
}

/// Whether a filter node is a `range` lower bound on the creation time
pub fn is_timestamp_filter(node: &JsonValue) -> bool {
    timestamp_filter_bound(node).is_some()
}

/// Remove creation-time lower bounds from the query's top-level filters
pub fn strip_timestamp_filter(query: &mut JsonValue) {
    let Some(filter) = query
        .get_mut("bool")
        .and_then(|b| b.as_object_mut())
        .and_then(|b| b.get_mut("filter"))
    else {
        return;
    };

    match filter {
        JsonValue::Array(filters) => filters.retain(|f| !is_timestamp_filter(f)),
        single if is_timestamp_filter(single) => *single = JsonValue::Array(Vec::new()),
        _ => {}
    }
}

/// Add `creation time >= timestamp` to the query's top-level filters.
///
/// A `bool` query gains the range in its `filter` list; any other query is
/// wrapped as the `must` clause of a new `bool`.
pub fn add_timestamp_filter(query: JsonValue, timestamp: i64) -> JsonValue {
    let range = range_gte(TIMESTAMP_FIELD, timestamp);

    match query {
        JsonValue::Object(mut root)
            if root.len() == 1 && root.get("bool").is_some_and(JsonValue::is_object) =>
        {
            if let Some(bool_query) = root.get_mut("bool").and_then(JsonValue::as_object_mut) {
                match bool_query.get_mut("filter") {
                    Some(JsonValue::Array(filters)) => filters.push(range),
                    Some(existing) => {
                        let previous = existing.take();
                        *existing = json!([previous, range]);
                    }
                    None => {
                        bool_query.insert("filter".to_string(), json!([range]));
                    }
                }
            }
            JsonValue::Object(root)
        }
        other => json!({ "bool": { "must": [other], "filter": [range] } }),
    }
}

/// Make ascending creation time the first sort key, dropping other
/// creation-time keys and keeping the rest in order
pub fn pin_timestamp_sort(sort: &mut Vec<SortItem>) {
    sort.retain(|item| item.field != TIMESTAMP_FIELD);
    sort.insert(0, SortItem::asc(TIMESTAMP_FIELD));
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sort_item_serialization() {
        let item = SortItem::desc("name.keyword");
        assert_eq!(
            serde_json::to_value(&item).unwrap(),
            json!({"name.keyword": {"order": "desc"}})
        );
        assert_eq!(
            SortItem::from_json(&json!({"name.keyword": {"order": "desc"}})),
            Some(item)
        );
    }

    #[test]
    fn test_sort_item_parse() {
        assert_eq!(SortItem::parse("name"), Some(SortItem::asc("name")));
        assert_eq!(SortItem::parse("name:desc"), Some(SortItem::desc("name")));
        assert_eq!(SortItem::parse("name:sideways"), None);
        assert_eq!(SortItem::parse(":asc"), None);
    }

    #[test]
    fn test_request_dsl_shape() {
        let criteria = SearchCriteria::new(json!({"term": {"typeName": "Table"}}))
            .sort(SortItem::asc("name"))
            .page_size(50)
            .from(100)
            .post_filter(json!({"term": {"status": "ACTIVE"}}));
        let request = SearchRequest::from_criteria(&criteria, Strategy::Offset);

        assert_eq!(
            request.to_body(),
            json!({
                "dsl": {
                    "query": {"term": {"typeName": "Table"}},
                    "sort": [{"name": {"order": "asc"}}],
                    "from": 100,
                    "size": 50,
                    "postFilter": {"term": {"status": "ACTIVE"}}
                }
            })
        );
    }

    #[test]
    fn test_request_dsl_omits_missing_post_filter() {
        let request = SearchRequest::from_criteria(&SearchCriteria::match_all(), Strategy::Offset);
        assert!(request.dsl().get("postFilter").is_none());
        assert_eq!(request.dsl()["size"], 300);
    }

    #[test]
    fn test_add_timestamp_filter_wraps_plain_query() {
        let query = add_timestamp_filter(json!({"term": {"typeName": "Table"}}), 1_000);
        assert_eq!(
            query,
            json!({
                "bool": {
                    "must": [{"term": {"typeName": "Table"}}],
                    "filter": [{"range": {"__timestamp": {"gte": 1000}}}]
                }
            })
        );
    }

    #[test]
    fn test_add_timestamp_filter_extends_bool_query() {
        let query = add_timestamp_filter(
            json!({"bool": {"filter": [{"term": {"typeName": "Table"}}]}}),
            42,
        );
        assert_eq!(
            query,
            json!({
                "bool": {
                    "filter": [
                        {"term": {"typeName": "Table"}},
                        {"range": {"__timestamp": {"gte": 42}}}
                    ]
                }
            })
        );
    }

    #[test]
    fn test_add_timestamp_filter_converts_single_filter() {
        let query = add_timestamp_filter(json!({"bool": {"filter": {"term": {"a": 1}}}}), 7);
        assert_eq!(
            query["bool"]["filter"],
            json!([{"term": {"a": 1}}, {"range": {"__timestamp": {"gte": 7}}}])
        );
    }

    #[test]
    fn test_strip_then_add_does_not_nest() {
        let mut query = add_timestamp_filter(json!({"match_all": {}}), 10);
        for ts in [20, 30, 40] {
            strip_timestamp_filter(&mut query);
            query = add_timestamp_filter(query, ts);
        }
        assert_eq!(
            query,
            json!({
                "bool": {
                    "must": [{"match_all": {}}],
                    "filter": [{"range": {"__timestamp": {"gte": 40}}}]
                }
            })
        );
    }

    #[test]
    fn test_strip_keeps_other_filters() {
        let mut query = json!({
            "bool": {
                "filter": [
                    {"range": {"__timestamp": {"gte": 5}}},
                    {"range": {"__modificationTimestamp": {"gte": 5}}},
                    {"range": {"__timestamp": {"lt": 5}}}
                ]
            }
        });
        strip_timestamp_filter(&mut query);
        assert_eq!(
            query["bool"]["filter"],
            json!([
                {"range": {"__modificationTimestamp": {"gte": 5}}},
                {"range": {"__timestamp": {"lt": 5}}}
            ])
        );
    }

    #[test]
    fn test_strip_ignores_non_bool_query() {
        let mut query = json!({"range": {"__timestamp": {"gte": 5}}});
        strip_timestamp_filter(&mut query);
        assert_eq!(query, json!({"range": {"__timestamp": {"gte": 5}}}));
    }

    #[test]
    fn test_timestamp_filter_accessor() {
        let query = add_timestamp_filter(json!({"match_all": {}}), 99);
        let mut criteria = SearchCriteria::new(query);
        assert_eq!(
            SearchRequest::from_criteria(&criteria, Strategy::TimestampBulk).timestamp_filter(),
            Some(99)
        );
        strip_timestamp_filter(&mut criteria.query);
        assert_eq!(
            SearchRequest::from_criteria(&criteria, Strategy::TimestampBulk).timestamp_filter(),
            None
        );
    }

    #[test]
    fn test_strip_removes_zero_and_negative_bounds() {
        for ts in [0, -5_000] {
            let mut query = add_timestamp_filter(json!({"match_all": {}}), ts);
            strip_timestamp_filter(&mut query);
            query = add_timestamp_filter(query, 10);
            assert_eq!(
                query["bool"]["filter"],
                json!([{"range": {"__timestamp": {"gte": 10}}}])
            );
        }
    }

    #[test]
    fn test_pin_timestamp_sort() {
        let mut sort = vec![
            SortItem::asc("name"),
            SortItem::desc(TIMESTAMP_FIELD),
            SortItem::desc("qualifiedName"),
        ];
        pin_timestamp_sort(&mut sort);
        assert_eq!(
            sort,
            vec![
                SortItem::asc(TIMESTAMP_FIELD),
                SortItem::asc("name"),
                SortItem::desc("qualifiedName"),
            ]
        );

        pin_timestamp_sort(&mut sort);
        assert_eq!(sort.len(), 3);
        assert_eq!(sort[0], SortItem::asc(TIMESTAMP_FIELD));
    }
}
