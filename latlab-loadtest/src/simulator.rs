use latlab_common::{MeasurementPair, SIMULATED_REQUEST_COUNT};
use rand::Rng;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

/// Simulated synchronous-path latency draw, milliseconds.
pub const BASELINE_LATENCY_RANGE_MS: Range<f64> = 3200.0..3600.0;
/// Simulated worker-thread-path latency draw, milliseconds.
pub const OPTIMIZED_LATENCY_RANGE_MS: Range<f64> = 45.0..60.0;

/// Progress advances in fixed steps of 5 within [0, 100].
pub const PROGRESS_STEP: u8 = 5;
/// Progress value at the end of the baseline phase.
pub const PHASE_BOUNDARY: u8 = 50;
/// Step cadence during the baseline phase.
pub const BASELINE_STEP_INTERVAL: Duration = Duration::from_millis(100);
/// Step cadence during the worker-thread phase.
pub const OPTIMIZED_STEP_INTERVAL: Duration = Duration::from_millis(80);
/// Pause at the 50% boundary, modeling the switch between phases.
pub const BASELINE_PHASE_PAUSE: Duration = Duration::from_millis(1000);
/// Pause after the worker-thread phase before results come out.
pub const OPTIMIZED_PHASE_PAUSE: Duration = Duration::from_millis(800);
/// How long a finished run lingers before progress resets to 0 and the
/// controller accepts the next run.
pub const SETTLE_DELAY: Duration = Duration::from_millis(1000);

/// Total wall clock from `start()` to the result:
/// 10 baseline steps + pause + 10 optimized steps + pause = 3600 ms.
pub const RUN_DURATION: Duration = Duration::from_millis(3600);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadTestError {
    #[error("a load test is already in flight")]
    AlreadyRunning,
}

/// Owns all run state for the simulated load test: the
/// at-most-one-in-flight guard and the progress counter. Callers hold
/// the controller in an `Arc`; `start()` needs it to detach the settle
/// timer.
pub struct LoadTestController {
    running: AtomicBool,
    progress_tx: watch::Sender<u8>,
}

impl Default for LoadTestController {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadTestController {
    pub fn new() -> Self {
        let (progress_tx, _) = watch::channel(0);
        Self {
            running: AtomicBool::new(false),
            progress_tx,
        }
    }

    /// `true` from the moment a run is admitted until the settle delay
    /// after its result has elapsed.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Current progress in [0, 100].
    pub fn progress(&self) -> u8 {
        *self.progress_tx.borrow()
    }

    /// Watch the progress counter; every step of a run is observable.
    pub fn subscribe(&self) -> watch::Receiver<u8> {
        self.progress_tx.subscribe()
    }

    /// Run one simulated load test and return its measurement pair.
    ///
    /// The run takes exactly [`RUN_DURATION`] of wall clock: progress
    /// climbs 0→50 at 100 ms per step, pauses 1000 ms, climbs 55→100 at
    /// 80 ms per step, pauses 800 ms, then the result is drawn. A second
    /// `start()` while a run is in flight (or still settling) fails with
    /// [`LoadTestError::AlreadyRunning`]; the simulation itself cannot
    /// fail.
    pub async fn start(self: Arc<Self>) -> Result<MeasurementPair, LoadTestError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(LoadTestError::AlreadyRunning);
        }

        self.progress_tx.send_replace(0);
        tracing::info!(
            "Starting load test with {} concurrent requests",
            SIMULATED_REQUEST_COUNT
        );

        let mut progress = 0u8;
        while progress < PHASE_BOUNDARY {
            tokio::time::sleep(BASELINE_STEP_INTERVAL).await;
            progress += PROGRESS_STEP;
            self.progress_tx.send_replace(progress);
        }
        tracing::info!("Baseline (synchronous) phase complete");
        tokio::time::sleep(BASELINE_PHASE_PAUSE).await;

        while progress < 100 {
            tokio::time::sleep(OPTIMIZED_STEP_INTERVAL).await;
            progress += PROGRESS_STEP;
            self.progress_tx.send_replace(progress);
        }
        tracing::info!("Worker-thread phase complete");
        tokio::time::sleep(OPTIMIZED_PHASE_PAUSE).await;

        let pair = draw_pair(&mut rand::thread_rng());
        tracing::info!(
            baseline_ms = pair.baseline_ms,
            optimized_ms = pair.optimized_ms,
            improvement_pct = pair.improvement_pct,
            "Load test complete"
        );

        // Hand the result back at the 3600 ms mark; the reset to idle
        // happens on its own timer.
        let controller = Arc::clone(&self);
        tokio::spawn(async move {
            tokio::time::sleep(SETTLE_DELAY).await;
            controller.progress_tx.send_replace(0);
            controller.running.store(false, Ordering::Release);
        });

        Ok(pair)
    }
}

/// Draw one run's results: latencies from their disjoint ranges, rounded
/// to whole milliseconds. The improvement figure is derived from the
/// rounded values, so reloading the saved integers reproduces it
/// exactly. Takes the RNG as a parameter for seedable tests.
pub fn draw_pair(rng: &mut impl Rng) -> MeasurementPair {
    let baseline_ms = rng.gen_range(BASELINE_LATENCY_RANGE_MS).round();
    let optimized_ms = rng.gen_range(OPTIMIZED_LATENCY_RANGE_MS).round();
    MeasurementPair::new(baseline_ms, optimized_ms)
}
