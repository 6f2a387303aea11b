use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use latlab_common::{ErrorResponse, MeasurementPair, PerfLogRecord, TestType};
use latlab_server::{
    config::DEFAULT_LIST_LIMIT, handle_insert, handle_list, AppState, Clock, ListParams, Server,
    ServerConfig,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// --- Test helpers ---

const NOW_MS: u64 = 1_726_000_000_000;

struct MockClock(AtomicU64);

impl MockClock {
    fn new(now: u64) -> Arc<Self> {
        Arc::new(Self(AtomicU64::new(now)))
    }

    fn set(&self, now: u64) {
        self.0.store(now, Ordering::Relaxed);
    }
}

impl Clock for MockClock {
    fn unix_now_millis(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

fn empty_store() -> (AppState, Arc<MockClock>) {
    let clock = MockClock::new(NOW_MS);
    (AppState::new(clock.clone() as Arc<dyn Clock>), clock)
}

fn headers_with_idempotency_key(key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("idempotency-key", key.parse().unwrap());
    headers
}

/// Consume a response body into bytes.
async fn response_body(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

async fn response_record(response: Response) -> PerfLogRecord {
    serde_json::from_slice(&response_body(response).await).unwrap()
}

async fn response_records(response: Response) -> Vec<PerfLogRecord> {
    serde_json::from_slice(&response_body(response).await).unwrap()
}

async fn response_error(response: Response) -> String {
    serde_json::from_slice::<ErrorResponse>(&response_body(response).await).unwrap().error
}

/// Insert a row and return the stored version, asserting 201.
async fn insert_row(state: &AppState, record: PerfLogRecord, tok: &str) -> PerfLogRecord {
    let headers = headers_with_idempotency_key(tok);
    let response = handle_insert(State(state.clone()), headers, axum::Json(record)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    response_record(response).await
}

/// List rows with an optional limit.
async fn list_rows(state: &AppState, limit: Option<usize>) -> Vec<PerfLogRecord> {
    let response = handle_list(State(state.clone()), Query(ListParams { limit })).await;
    assert_eq!(response.status(), StatusCode::OK);
    response_records(response).await
}

fn baseline_row(latency: f64) -> PerfLogRecord {
    MeasurementPair::new(latency, 50.0).baseline_record()
}

fn optimized_row(latency: f64) -> PerfLogRecord {
    MeasurementPair::new(3500.0, latency).optimized_record()
}

// --- Server struct ---

#[test]
fn test_server_config_custom() {
    use std::net::SocketAddr;
    let addr: SocketAddr = "0.0.0.0:4100".parse().unwrap();
    let config = ServerConfig { address: addr };
    assert_eq!(config.address.to_string(), "0.0.0.0:4100");
}

#[test]
fn test_server_creation_with_config() {
    use std::net::SocketAddr;
    let addr: SocketAddr = "0.0.0.0:4100".parse().unwrap();
    let server = Server::new(ServerConfig { address: addr });
    assert_eq!(server.address().to_string(), "0.0.0.0:4100");
}

#[test]
fn test_router_creation() {
    let (state, _) = empty_store();
    let router = Server::create_router(state);
    assert!(std::mem::size_of_val(&router) > 0);
}

// --- POST /performance-logs ---

#[tokio::test]
async fn test_insert_assigns_timestamp_from_clock() {
    let (state, _) = empty_store();

    let stored = insert_row(&state, baseline_row(3500.0), "tok-1").await;

    assert_eq!(stored.test_type, TestType::Baseline);
    assert_eq!(stored.test_timestamp, Some(NOW_MS));
    assert_eq!(stored.average_latency_ms, 3500.0);
}

#[tokio::test]
async fn test_insert_ignores_client_supplied_timestamp() {
    let (state, _) = empty_store();

    let mut record = baseline_row(3500.0);
    record.test_timestamp = Some(7);
    let stored = insert_row(&state, record, "tok-1").await;

    assert_eq!(stored.test_timestamp, Some(NOW_MS));
}

#[tokio::test]
async fn test_insert_rejects_non_positive_latency() {
    let (state, _) = empty_store();

    for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
        let mut record = baseline_row(3500.0);
        record.average_latency_ms = bad;
        let response =
            handle_insert(State(state.clone()), headers_with_idempotency_key("tok"), axum::Json(record))
                .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "latency {bad} accepted");
        assert_eq!(response_error(response).await, "average_latency_ms must be > 0");
    }

    assert!(list_rows(&state, None).await.is_empty());
}

#[tokio::test]
async fn test_insert_requires_idempotency_key() {
    let (state, _) = empty_store();

    let response =
        handle_insert(State(state.clone()), HeaderMap::new(), axum::Json(baseline_row(3500.0))).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response_error(response).await, "Idempotency-Key header is required");
}

#[tokio::test]
async fn test_insert_replay_returns_original_row_without_appending() {
    let (state, clock) = empty_store();

    let first = insert_row(&state, baseline_row(3500.0), "tok-1").await;

    // Same key later: the clock has moved on but the stored row must not.
    clock.set(NOW_MS + 5_000);
    let response = handle_insert(
        State(state.clone()),
        headers_with_idempotency_key("tok-1"),
        axum::Json(baseline_row(3500.0)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let replayed = response_record(response).await;

    assert_eq!(replayed, first);
    assert_eq!(list_rows(&state, None).await.len(), 1);
}

#[tokio::test]
async fn test_timestamps_never_decrease() {
    let (state, clock) = empty_store();

    insert_row(&state, baseline_row(3500.0), "tok-1").await;

    // Clock steps backwards; the next row is clamped to the last timestamp.
    clock.set(NOW_MS - 10_000);
    let second = insert_row(&state, optimized_row(50.0), "tok-2").await;
    assert_eq!(second.test_timestamp, Some(NOW_MS));

    clock.set(NOW_MS + 1);
    let third = insert_row(&state, baseline_row(3400.0), "tok-3").await;
    assert_eq!(third.test_timestamp, Some(NOW_MS + 1));
}

// --- GET /performance-logs ---

#[tokio::test]
async fn test_list_empty_store() {
    let (state, _) = empty_store();
    assert!(list_rows(&state, None).await.is_empty());
}

#[tokio::test]
async fn test_list_returns_newest_first() {
    let (state, clock) = empty_store();

    insert_row(&state, baseline_row(3500.0), "tok-1").await;
    clock.set(NOW_MS + 1);
    insert_row(&state, optimized_row(50.0), "tok-2").await;
    clock.set(NOW_MS + 2);
    insert_row(&state, baseline_row(3400.0), "tok-3").await;

    let rows = list_rows(&state, None).await;
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].test_timestamp, Some(NOW_MS + 2));
    assert_eq!(rows[1].test_timestamp, Some(NOW_MS + 1));
    assert_eq!(rows[2].test_timestamp, Some(NOW_MS));
}

#[tokio::test]
async fn test_list_respects_limit() {
    let (state, clock) = empty_store();

    for i in 0..5 {
        clock.set(NOW_MS + i);
        insert_row(&state, baseline_row(3500.0), &format!("tok-{i}")).await;
    }

    let rows = list_rows(&state, Some(2)).await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].test_timestamp, Some(NOW_MS + 4));
    assert_eq!(rows[1].test_timestamp, Some(NOW_MS + 3));
}

#[tokio::test]
async fn test_list_default_limit() {
    let (state, clock) = empty_store();

    for i in 0..(DEFAULT_LIST_LIMIT as u64 + 3) {
        clock.set(NOW_MS + i);
        insert_row(&state, baseline_row(3500.0), &format!("tok-{i}")).await;
    }

    let rows = list_rows(&state, None).await;
    assert_eq!(rows.len(), DEFAULT_LIST_LIMIT);
    assert_eq!(rows[0].test_timestamp, Some(NOW_MS + DEFAULT_LIST_LIMIT as u64 + 2));
}
