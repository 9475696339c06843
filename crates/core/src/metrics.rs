//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Job manager (submissions, terminal states)
//! - Stage executor (per-stage durations)
//! - Translation backend calls
//! - Artifact cleanup

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Job Metrics
// =============================================================================

/// Jobs accepted at submission.
pub static JOBS_SUBMITTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("scribe_jobs_submitted_total", "Total jobs submitted").unwrap()
});

/// Jobs reaching a terminal state.
pub static JOBS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("scribe_jobs_finished_total", "Total jobs finished"),
        &["result"], // "completed", "failed"
    )
    .unwrap()
});

// =============================================================================
// Stage Metrics
// =============================================================================

/// Stage duration in seconds.
pub static STAGE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "scribe_stage_duration_seconds",
            "Duration of each pipeline stage",
        )
        .buckets(vec![
            0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0,
        ]),
        &["stage", "result"], // result: "success", "failure", "timeout"
    )
    .unwrap()
});

// =============================================================================
// Translation Metrics
// =============================================================================

/// Calls to the translation backend.
pub static TRANSLATION_CALLS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "scribe_translation_calls_total",
            "Translation backend calls",
        ),
        &["model", "result"], // result: "success" or an error label
    )
    .unwrap()
});

// =============================================================================
// Cleanup Metrics
// =============================================================================

/// Artifacts deleted.
pub static ARTIFACTS_REMOVED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("scribe_artifacts_removed_total", "Artifacts removed"),
        &["trigger"], // "pipeline", "deferred", "flush", "sweep", "direct"
    )
    .unwrap()
});

/// All core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(JOBS_SUBMITTED.clone()),
        Box::new(JOBS_FINISHED.clone()),
        Box::new(STAGE_DURATION.clone()),
        Box::new(TRANSLATION_CALLS.clone()),
        Box::new(ARTIFACTS_REMOVED.clone()),
    ]
}
