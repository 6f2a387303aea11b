use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Simulated concurrent request count per load-test run.
pub const SIMULATED_REQUEST_COUNT: u32 = 100;
/// Simulated CPU usage while the synchronous path handles the load.
pub const BASELINE_CPU_PCT: u32 = 95;
/// Simulated CPU usage while the worker-thread path handles the load.
pub const OPTIMIZED_CPU_PCT: u32 = 30;

pub const BASELINE_NOTES: &str = "Synchronous processing baseline test";
pub const OPTIMIZED_NOTES: &str = "Worker Thread optimization test";

/// Error types for store operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("HTTP {0}: {1}")]
    HttpError(u16, String),

    #[error("Invalid latency: {0} ms (must be a finite value > 0)")]
    InvalidLatency(f64),

    #[error("Failed to save run results: {0}")]
    SaveFailed(String),
}

/// JSON error envelope returned by the server for all error responses
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Which side of a run a persisted row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestType {
    Baseline,
    Optimized,
}

/// One completed simulated run: a baseline/optimized latency pair and
/// the improvement derived from it. Immutable once created; a new run
/// supersedes the previous pair rather than mutating it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementPair {
    pub baseline_ms: f64,
    pub optimized_ms: f64,
    /// `round2((baseline - optimized) / baseline * 100)`, always derived
    /// from the two latencies above via [`MeasurementPair::new`].
    pub improvement_pct: f64,
}

impl MeasurementPair {
    /// Build a pair, deriving `improvement_pct` with the 2-decimal
    /// rounding rule applied.
    pub fn new(baseline_ms: f64, optimized_ms: f64) -> Self {
        Self {
            baseline_ms,
            optimized_ms,
            improvement_pct: improvement_pct(baseline_ms, optimized_ms),
        }
    }

    /// The persisted row for the synchronous side of this run.
    pub fn baseline_record(&self) -> PerfLogRecord {
        PerfLogRecord {
            test_type: TestType::Baseline,
            average_latency_ms: self.baseline_ms,
            request_count: SIMULATED_REQUEST_COUNT,
            cpu_usage_percent: BASELINE_CPU_PCT,
            throughput_rps: throughput_rps(self.baseline_ms),
            improvement_percent: None,
            notes: Some(BASELINE_NOTES.to_string()),
            test_timestamp: None,
        }
    }

    /// The persisted row for the worker-thread side of this run.
    /// Carries the pair's improvement figure; baseline rows do not.
    pub fn optimized_record(&self) -> PerfLogRecord {
        PerfLogRecord {
            test_type: TestType::Optimized,
            average_latency_ms: self.optimized_ms,
            request_count: SIMULATED_REQUEST_COUNT,
            cpu_usage_percent: OPTIMIZED_CPU_PCT,
            throughput_rps: throughput_rps(self.optimized_ms),
            improvement_percent: Some(self.improvement_pct),
            notes: Some(OPTIMIZED_NOTES.to_string()),
            test_timestamp: None,
        }
    }
}

/// One persisted performance-log row. `test_timestamp` is assigned by
/// the store at insert time and is therefore `None` on the write path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerfLogRecord {
    pub test_type: TestType,
    pub average_latency_ms: f64,
    pub request_count: u32,
    pub cpu_usage_percent: u32,
    pub throughput_rps: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub improvement_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub notes: Option<String>,
    /// Unix epoch milliseconds; the store's ordering key.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub test_timestamp: Option<u64>,
}

/// Round to 2 decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Percentage improvement of `optimized_ms` over `baseline_ms`,
/// rounded to 2 decimal places.
pub fn improvement_pct(baseline_ms: f64, optimized_ms: f64) -> f64 {
    round2((baseline_ms - optimized_ms) / baseline_ms * 100.0)
}

/// Requests per second a single-threaded handler sustains at the given
/// per-request latency: `round(1000 / latency_ms)`. Latencies above
/// 2000 ms round down to 0 rps; callers display that as-is.
pub fn throughput_rps(latency_ms: f64) -> u32 {
    (1000.0 / latency_ms).round() as u32
}
