use latlab_common::MeasurementPair;
use serde::Serialize;

/// Offset label plus the baseline/optimized multipliers applied at that
/// offset. The ramp is cosmetic: fixed ratios of the steady-state pair
/// for the chart, not sampled data.
const RAMP: [(&str, f64, f64); 6] = [
    ("0s", 0.0, 0.0),
    ("2s", 0.8, 0.9),
    ("4s", 0.95, 1.05),
    ("6s", 1.1, 1.1),
    ("8s", 1.0, 0.95),
    ("10s", 0.98, 1.0),
];

/// One point of the latency-over-time chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub offset_label: &'static str,
    pub baseline: f64,
    pub optimized: f64,
}

/// Map one measurement pair into the 6-point series the latency chart
/// plots. Pure and deterministic; never persisted, recomputed from the
/// latest pair on every render. The `0s` point is always zero on both
/// sides.
pub fn build_series(pair: &MeasurementPair) -> Vec<SeriesPoint> {
    RAMP.iter()
        .map(|&(offset_label, baseline_mult, optimized_mult)| SeriesPoint {
            offset_label,
            baseline: pair.baseline_ms * baseline_mult,
            optimized: pair.optimized_ms * optimized_mult,
        })
        .collect()
}
