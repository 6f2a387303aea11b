use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use latlab_common::{ErrorResponse, PerfLogRecord};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use tokio::time::timeout;

pub mod config;
use config::{DEFAULT_LIST_LIMIT, LOCK_TIMEOUT};

/// Abstraction over current time for testability.
pub trait Clock: Send + Sync {
    fn unix_now_millis(&self) -> u64;
}

/// Production clock backed by `SystemTime`.
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// The append-only performance log. Rows are never updated or removed,
/// and insertion order matches timestamp order, so newest-first is
/// reverse insertion order.
pub struct LogState {
    pub records: Vec<PerfLogRecord>,
    /// Idempotency-Key -> index into `records`. A replayed insert
    /// returns the original row instead of appending a duplicate.
    pub idempotency_cache: HashMap<String, usize>,
}

pub type Db = Arc<RwLock<LogState>>;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            db: Arc::new(RwLock::new(LogState {
                records: Vec::new(),
                idempotency_cache: HashMap::new(),
            })),
            clock,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: SocketAddr,
}

/// Performance log store server
pub struct Server {
    config: ServerConfig,
}

impl Server {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Get the server's configured address
    pub fn address(&self) -> SocketAddr {
        self.config.address
    }

    /// Create the application router with the given state
    pub fn create_router(state: AppState) -> Router {
        Router::new()
            .route("/performance-logs", get(handle_list).post(handle_insert))
            .with_state(state)
    }

    /// Run the server, signalling `ready_tx` with the bound address once accepting connections
    pub async fn run(
        self,
        ready_tx: tokio::sync::oneshot::Sender<SocketAddr>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let state = AppState::new(Arc::new(SystemClock));
        let app = Self::create_router(state);
        let listener = tokio::net::TcpListener::bind(self.config.address).await?;
        let local_addr = listener.local_addr()?;
        ready_tx.send(local_addr).ok();
        axum::serve(listener, app).await?;
        Ok(())
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse { error: message.into() })).into_response()
}

fn extract_idempotency_key(headers: &HeaderMap) -> Result<String, Response> {
    headers
        .get("idempotency-key")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .ok_or_else(|| error_response(StatusCode::BAD_REQUEST, "Idempotency-Key header is required"))
}

/// Timestamp for the next row: wall-clock millis, clamped so the
/// sequence never decreases even if the system clock steps backwards.
fn next_timestamp(records: &[PerfLogRecord], clock: &dyn Clock) -> u64 {
    let now = clock.unix_now_millis();
    match records.last().and_then(|r| r.test_timestamp) {
        Some(last) => now.max(last),
        None => now,
    }
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

/// Handler for GET /performance-logs — returns rows newest first,
/// at most `limit` of them (default [`DEFAULT_LIST_LIMIT`]).
pub async fn handle_list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Response {
    let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT);

    let db_guard = match timeout(LOCK_TIMEOUT, state.db.read()).await {
        Ok(guard) => guard,
        Err(_) => {
            return error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Server error: Lock acquisition timed out",
            )
        }
    };

    let rows: Vec<PerfLogRecord> = db_guard.records.iter().rev().take(limit).cloned().collect();
    (StatusCode::OK, Json(rows)).into_response()
}

/// Handler for POST /performance-logs — validates the row, assigns its
/// timestamp, and appends it; requires an Idempotency-Key header. A
/// replayed key returns the originally stored row with 200 instead of
/// appending again.
pub async fn handle_insert(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(record): Json<PerfLogRecord>,
) -> Response {
    if !record.average_latency_ms.is_finite() || record.average_latency_ms <= 0.0 {
        return error_response(StatusCode::BAD_REQUEST, "average_latency_ms must be > 0");
    }

    let idempotency_key = match extract_idempotency_key(&headers) {
        Ok(k) => k,
        Err(r) => return r,
    };

    let mut db_guard = match timeout(LOCK_TIMEOUT, state.db.write()).await {
        Ok(guard) => guard,
        Err(_) => {
            return error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Server error: Lock acquisition timed out",
            )
        }
    };

    if let Some(&idx) = db_guard.idempotency_cache.get(&idempotency_key) {
        let stored = db_guard.records[idx].clone();
        return (StatusCode::OK, Json(stored)).into_response();
    }

    let mut stored = record;
    stored.test_timestamp = Some(next_timestamp(&db_guard.records, state.clock.as_ref()));

    let idx = db_guard.records.len();
    db_guard.records.push(stored.clone());
    db_guard.idempotency_cache.insert(idempotency_key, idx);

    tracing::debug!(
        test_type = ?stored.test_type,
        average_latency_ms = stored.average_latency_ms,
        "appended performance log row"
    );

    (StatusCode::CREATED, Json(stored)).into_response()
}
