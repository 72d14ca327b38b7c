//! Integration tests using mock HTTP server
//!
//! Tests the full flow: client config → search requests → retried HTTP calls →
//! paged entities

use catalog_search::search::{DEFAULT_SEARCH_PATH, TIMESTAMP_FIELD};
use catalog_search::{CatalogClient, ClientConfig, Error, SearchCriteria, SortItem};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

// ============================================================================
// Mock Catalog
// ============================================================================

/// Search endpoint over a fixed entity list
struct CatalogResponder {
    entities: Vec<Value>,
    approximate_count: Option<u64>,
    fail_call: Option<(usize, u16)>,
    calls: Arc<AtomicUsize>,
}

impl CatalogResponder {
    fn new(n: usize, timestamp: impl Fn(usize) -> i64) -> Self {
        Self {
            entities: (0..n)
                .map(|i| json!({"guid": format!("g-{i}"), "createTime": timestamp(i), "typeName": "Table"}))
                .collect(),
            approximate_count: None,
            fail_call: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn reporting_count(mut self, count: u64) -> Self {
        self.approximate_count = Some(count);
        self
    }

    fn failing_once(mut self, call: usize, status: u16) -> Self {
        self.fail_call = Some((call, status));
        self
    }
}

fn timestamp_bound(query: &Value) -> Option<i64> {
    query["bool"]["filter"]
        .as_array()?
        .iter()
        .find_map(|f| f["range"][TIMESTAMP_FIELD]["gte"].as_i64())
}

impl Respond for CatalogResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some((fail_at, status)) = self.fail_call {
            if call == fail_at {
                return ResponseTemplate::new(status).set_body_string("try again");
            }
        }

        let Ok(body) = request.body_json::<Value>() else {
            return ResponseTemplate::new(400);
        };
        let dsl = &body["dsl"];
        let from = dsl["from"].as_u64().unwrap_or(0) as usize;
        let size = dsl["size"].as_u64().unwrap_or(0) as usize;

        let mut matching: Vec<Value> = match timestamp_bound(&dsl["query"]) {
            Some(bound) => self
                .entities
                .iter()
                .filter(|e| e["createTime"].as_i64().unwrap_or(0) >= bound)
                .cloned()
                .collect(),
            None => self.entities.clone(),
        };
        if dsl["sort"][0].get(TIMESTAMP_FIELD).is_some() {
            matching.sort_by_key(|e| e["createTime"].as_i64().unwrap_or(0));
        }

        let count = self
            .approximate_count
            .unwrap_or(matching.len() as u64);
        let page: Vec<Value> = matching.into_iter().skip(from).take(size).collect();

        ResponseTemplate::new(200)
            .insert_header("Request-Id", format!("req-{call}").as_str())
            .set_body_json(json!({"entities": page, "approximateCount": count}))
    }
}

async fn catalog(responder: CatalogResponder) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(DEFAULT_SEARCH_PATH))
        .respond_with(responder)
        .mount(&server)
        .await;
    server
}

fn client_for(server: &MockServer, page_size: u64) -> CatalogClient {
    let mut config = ClientConfig::new(server.uri()).with_token("test-token");
    config.page_size = page_size;
    config.initial_delay_ms = 1;
    config.max_delay_ms = 5;
    CatalogClient::new(config).unwrap()
}

fn guids(entities: &[Value]) -> Vec<String> {
    entities
        .iter()
        .filter_map(|e| e["guid"].as_str().map(str::to_string))
        .collect()
}

fn expected_guids(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("g-{i}")).collect()
}

async fn request_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter_map(|r| r.body_json::<Value>().ok())
        .collect()
}

// ============================================================================
// Search Pipeline Tests
// ============================================================================

#[tokio::test]
async fn test_search_pages_through_all_results() {
    let server = catalog(CatalogResponder::new(10, |i| 1_000 + i as i64)).await;
    let client = client_for(&server, 4);

    let entities = client
        .search(SearchCriteria::match_all().sort(SortItem::asc("name")))
        .collect_all()
        .await
        .unwrap();

    assert_eq!(guids(&entities), expected_guids(10));

    let bodies = request_bodies(&server).await;
    let froms: Vec<u64> = bodies
        .iter()
        .map(|b| b["dsl"]["from"].as_u64().unwrap())
        .collect();
    assert_eq!(froms, vec![0, 4, 8, 12]);
    assert_eq!(bodies[0]["dsl"]["sort"], json!([{"name": {"order": "asc"}}]));
    assert_eq!(bodies[0]["dsl"]["size"], 4);
}

#[tokio::test]
async fn test_explicit_page_size_overrides_configured_one() {
    let server = catalog(CatalogResponder::new(3, |i| 1_000 + i as i64)).await;
    let client = client_for(&server, 50);

    let explicit = client
        .search(SearchCriteria::match_all().page_size(300))
        .collect_all()
        .await
        .unwrap();
    let configured = client
        .search(SearchCriteria::match_all())
        .collect_all()
        .await
        .unwrap();

    assert_eq!(explicit, configured);
    let bodies = request_bodies(&server).await;
    assert_eq!(bodies[0]["dsl"]["size"], 300);
    assert_eq!(bodies.last().unwrap()["dsl"]["size"], 50);
}

#[tokio::test]
async fn test_search_sends_auth_and_client_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(DEFAULT_SEARCH_PATH))
        .and(header("Authorization", "Bearer test-token"))
        .and(header_exists("Idempotency-Key"))
        .and(header_exists("X-Client-Info"))
        .respond_with(CatalogResponder::new(2, |i| i as i64))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server, 5);
    let entities = assert_ok!(client.search(SearchCriteria::match_all()).collect_all().await);
    assert_eq!(entities.len(), 2);
}

#[tokio::test]
async fn test_transient_failure_mid_pagination_is_retried() {
    let responder = CatalogResponder::new(9, |i| 1_000 + i as i64).failing_once(1, 503);
    let calls = Arc::clone(&responder.calls);
    let server = catalog(responder).await;
    let client = client_for(&server, 3);

    let entities = client
        .search(SearchCriteria::match_all())
        .collect_all()
        .await
        .unwrap();

    assert_eq!(guids(&entities), expected_guids(9));
    // four pages plus the retried one
    assert_eq!(calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_client_error_stops_search() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(DEFAULT_SEARCH_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 5);
    let err = assert_err!(client.search(SearchCriteria::match_all()).collect_all().await);
    assert!(matches!(err, Error::Authentication { status: 401, .. }));
}

#[tokio::test]
async fn test_undecodable_page_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(DEFAULT_SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let client = client_for(&server, 5);
    let err = assert_err!(client.search(SearchCriteria::match_all()).collect_all().await);
    assert!(matches!(err, Error::PageDecode { .. }));
}

#[tokio::test]
async fn test_mass_result_set_uses_timestamp_paging() {
    let server = catalog(
        CatalogResponder::new(25, |i| 1_000 + 10 * (i / 3) as i64).reporting_count(250_000),
    )
    .await;
    let client = client_for(&server, 4);

    let entities = client
        .search(SearchCriteria::match_all())
        .collect_all()
        .await
        .unwrap();

    let unique: HashSet<String> = guids(&entities).into_iter().collect();
    assert_eq!(unique.len(), 25);
    assert_eq!(entities.len(), 25);

    let bodies = request_bodies(&server).await;
    assert!(bodies[0]["dsl"]["sort"].as_array().unwrap().is_empty());
    for body in &bodies[1..] {
        assert_eq!(
            body["dsl"]["sort"][0],
            json!({TIMESTAMP_FIELD: {"order": "asc"}})
        );
        assert_eq!(body["dsl"]["size"], 4);
    }
    assert!(bodies
        .iter()
        .any(|b| timestamp_bound(&b["dsl"]["query"]).is_some()));
}

#[tokio::test]
async fn test_bulk_search_starts_with_timestamp_paging() {
    let server = catalog(CatalogResponder::new(7, |i| 1_000 + 100 * i as i64)).await;
    let client = client_for(&server, 3);

    let entities = client
        .bulk_search(SearchCriteria::match_all())
        .collect_all()
        .await
        .unwrap();

    assert_eq!(guids(&entities), expected_guids(7));
    let bodies = request_bodies(&server).await;
    assert_eq!(
        bodies[0]["dsl"]["sort"][0],
        json!({TIMESTAMP_FIELD: {"order": "asc"}})
    );
}

#[tokio::test]
async fn test_prefetch_search_matches_sequential_search() {
    let sequential = catalog(CatalogResponder::new(17, |i| 1_000 + i as i64)).await;
    let prefetching = catalog(CatalogResponder::new(17, |i| 1_000 + i as i64)).await;

    let expected = client_for(&sequential, 5)
        .search(SearchCriteria::match_all())
        .collect_all()
        .await
        .unwrap();
    let actual = client_for(&prefetching, 5)
        .search_prefetch(SearchCriteria::match_all(), false)
        .collect_all()
        .await
        .unwrap();

    assert_eq!(actual, expected);
}

#[tokio::test]
async fn test_prefetch_close_after_partial_read() {
    let server = catalog(CatalogResponder::new(20, |i| 1_000 + i as i64)).await;
    let client = client_for(&server, 5);

    let mut results = client.search_prefetch(SearchCriteria::match_all(), false);
    let first = results.next().await.unwrap().unwrap();
    assert_eq!(first["guid"], "g-0");
    results.close().await;
}

#[tokio::test]
async fn test_count_uses_single_entity_page() {
    let server = catalog(CatalogResponder::new(3, |i| i as i64).reporting_count(4_242)).await;
    let client = client_for(&server, 50);

    let count = client.count(SearchCriteria::match_all()).await.unwrap();
    assert_eq!(count, 4_242);

    let bodies = request_bodies(&server).await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["dsl"]["size"], 1);
}

#[test]
fn test_blocking_search() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let server = runtime.block_on(catalog(CatalogResponder::new(8, |i| 1_000 + i as i64)));
    let client = client_for(&server, 3);

    let entities: Vec<Value> = client
        .blocking_search(SearchCriteria::match_all(), false)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(guids(&entities), expected_guids(8));
}
