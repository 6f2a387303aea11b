use crate::series::{build_series, SeriesPoint};
use latlab_common::{
    throughput_rps, MeasurementPair, BASELINE_CPU_PCT, OPTIMIZED_CPU_PCT, SIMULATED_REQUEST_COUNT,
};
use serde::Serialize;
use std::fmt::Write;

/// Cost-equivalence factor: 1 ms of latency ≈ 0.05 KSH per request.
pub const COST_PER_MS_KSH: f64 = 0.05;
/// Daily request volume the cost card assumes.
pub const REQUESTS_PER_DAY: u64 = 10_000;

/// Estimated infrastructure savings per day, in KSH, from the latency
/// reduction of one run.
pub fn daily_savings_ksh(pair: &MeasurementPair) -> f64 {
    (pair.baseline_ms - pair.optimized_ms) * COST_PER_MS_KSH * REQUESTS_PER_DAY as f64
}

/// Everything the dashboard shows for one run, derived from the pair.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub results: MeasurementPair,
    pub baseline_rps: u32,
    pub optimized_rps: u32,
    pub baseline_cpu_pct: u32,
    pub optimized_cpu_pct: u32,
    pub daily_savings_ksh: f64,
    pub latency_series: Vec<SeriesPoint>,
}

impl RunSummary {
    pub fn from_pair(pair: &MeasurementPair) -> Self {
        Self {
            results: *pair,
            baseline_rps: throughput_rps(pair.baseline_ms),
            optimized_rps: throughput_rps(pair.optimized_ms),
            baseline_cpu_pct: BASELINE_CPU_PCT,
            optimized_cpu_pct: OPTIMIZED_CPU_PCT,
            daily_savings_ksh: daily_savings_ksh(pair),
            latency_series: build_series(pair),
        }
    }
}

/// Render the dashboard as text: the metric cards, the throughput/CPU
/// comparison, and the latency-over-time table.
pub fn render_report(summary: &RunSummary) -> String {
    let pair = &summary.results;
    let mut out = String::new();

    let _ = writeln!(out, "Latency Lab Results");
    let _ = writeln!(out, "===================");
    let _ = writeln!(
        out,
        "Simulated load:        {} concurrent requests",
        SIMULATED_REQUEST_COUNT
    );
    let _ = writeln!(
        out,
        "Baseline latency:      {:.0} ms   (synchronous processing)",
        pair.baseline_ms
    );
    let _ = writeln!(
        out,
        "Optimized latency:     {:.0} ms     (worker threads)",
        pair.optimized_ms
    );
    let _ = writeln!(
        out,
        "Improvement:           {}%   ({:.0} ms faster)",
        pair.improvement_pct,
        pair.baseline_ms - pair.optimized_ms
    );
    let _ = writeln!(
        out,
        "Cost savings:          KSH {:.0} per day ({} requests)",
        summary.daily_savings_ksh, REQUESTS_PER_DAY
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "Throughput & CPU");
    let _ = writeln!(
        out,
        "  Baseline:            {} rps at {}% CPU",
        summary.baseline_rps, summary.baseline_cpu_pct
    );
    let _ = writeln!(
        out,
        "  Optimized:           {} rps at {}% CPU",
        summary.optimized_rps, summary.optimized_cpu_pct
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "Latency over time (ms)");
    let _ = writeln!(out, "  {:<8} {:>10} {:>10}", "offset", "baseline", "optimized");
    for point in &summary.latency_series {
        let _ = writeln!(
            out,
            "  {:<8} {:>10.1} {:>10.1}",
            point.offset_label, point.baseline, point.optimized
        );
    }

    out
}
