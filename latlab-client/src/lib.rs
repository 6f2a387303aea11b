use latlab_common::{
    ErrorResponse, MeasurementPair, PerfLogRecord, Result, StoreError, TestType,
};
use uuid::Uuid;

/// How many rows `load_latest` inspects: one run writes exactly two.
pub const LATEST_WINDOW: usize = 2;

/// Performance log store client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the store, e.g. `http://127.0.0.1:4100`.
    pub base_url: String,
}

/// Results store adapter: persists each run as two append-only rows and
/// reconstructs the most recent run on load.
pub struct Client {
    pub config: ClientConfig,
    http_client: reqwest::Client,
}

impl Client {
    /// Create a new client with the given configuration
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    /// Build the URL of the performance-logs collection.
    pub fn build_logs_url(&self) -> String {
        format!("{}/performance-logs", self.config.base_url)
    }

    /// Insert one row; returns the stored row with the timestamp the
    /// store assigned. Validates the latency before going to the wire.
    pub async fn insert(&self, record: &PerfLogRecord) -> Result<PerfLogRecord> {
        if !record.average_latency_ms.is_finite() || record.average_latency_ms <= 0.0 {
            return Err(StoreError::InvalidLatency(record.average_latency_ms));
        }

        let response = self
            .http_client
            .post(self.build_logs_url())
            .header("Idempotency-Key", Uuid::new_v4().to_string())
            .json(record)
            .send()
            .await
            .map_err(|e| StoreError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(parse_error_response(status, response).await);
        }

        response
            .json::<PerfLogRecord>()
            .await
            .map_err(|e| StoreError::NetworkError(e.to_string()))
    }

    /// Fetch the most recent rows, newest first, at most `limit` of them.
    pub async fn fetch_latest(&self, limit: usize) -> Result<Vec<PerfLogRecord>> {
        let response = self
            .http_client
            .get(self.build_logs_url())
            .query(&[("limit", limit)])
            .send()
            .await
            .map_err(|e| StoreError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(parse_error_response(status, response).await);
        }

        response
            .json::<Vec<PerfLogRecord>>()
            .await
            .map_err(|e| StoreError::NetworkError(e.to_string()))
    }

    /// Reconstruct the most recent run. Succeeds only when the two most
    /// recent rows contain one baseline and one optimized row; the
    /// improvement figure is recomputed from the stored latencies rather
    /// than trusted from the row. Returns `Ok(None)` when there is no
    /// complete prior run (fewer than two rows, or two rows of the same
    /// type left behind by a retried run).
    pub async fn load_latest(&self) -> Result<Option<MeasurementPair>> {
        let records = self.fetch_latest(LATEST_WINDOW).await?;
        if records.len() < 2 {
            return Ok(None);
        }

        let baseline = records.iter().find(|r| r.test_type == TestType::Baseline);
        let optimized = records.iter().find(|r| r.test_type == TestType::Optimized);

        match (baseline, optimized) {
            (Some(b), Some(o)) => Ok(Some(MeasurementPair::new(
                b.average_latency_ms,
                o.average_latency_ms,
            ))),
            _ => Ok(None),
        }
    }

    /// Persist one run as its two rows, baseline first. Both inserts are
    /// awaited before reporting; any failure is surfaced as a single
    /// aggregate error naming the side(s) that failed. The two inserts
    /// are not transactional, so a partial failure can leave an orphan
    /// baseline row behind.
    pub async fn save(&self, pair: &MeasurementPair) -> Result<()> {
        let baseline = self.insert(&pair.baseline_record()).await;
        let optimized = self.insert(&pair.optimized_record()).await;

        let mut failures = Vec::new();
        if let Err(e) = baseline {
            failures.push(format!("baseline: {e}"));
        }
        if let Err(e) = optimized {
            failures.push(format!("optimized: {e}"));
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(StoreError::SaveFailed(failures.join("; ")))
        }
    }
}

async fn parse_error_response(
    status: reqwest::StatusCode,
    response: reqwest::Response,
) -> StoreError {
    let error_msg = response
        .json::<ErrorResponse>()
        .await
        .map(|r| r.error)
        .unwrap_or_else(|_| format!("Server returned status: {}", status));

    StoreError::HttpError(status.as_u16(), error_msg)
}
