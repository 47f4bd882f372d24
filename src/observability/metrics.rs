//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `replica_sync_reconciliations_total` - Total number of autoscaler reconciliations
//! - `replica_sync_reconciliation_errors_total` - Total number of failed reconciliations
//! - `replica_sync_reconciliation_duration_seconds` - Duration of reconciliations
//! - `replica_sync_replica_patches_total` - Scale targets whose replica field was rewritten
//! - `replica_sync_unsupported_kinds_total` - Reconciles skipped for a kind without replica field mapping
//! - `replica_sync_requeues_total` - Requeues scheduled by the error policy
//! - `replica_sync_label_events_total` - Label events handled, by event kind and result
//! - `replica_sync_label_queue_depth` - Label events waiting for a worker
//! - `replica_sync_reschedule_requests_total` - Reschedule commands, by result
//! - `replica_sync_bindings_stamped_total` - Bindings whose reschedule trigger was advanced

use anyhow::Result;
use prometheus::core::Collector;
use prometheus::{Histogram, IntCounter, IntCounterVec, IntGauge, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "replica_sync_reconciliations_total",
        "Total number of autoscaler reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "replica_sync_reconciliation_errors_total",
        "Total number of failed autoscaler reconciliations",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "replica_sync_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static REPLICA_PATCHES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "replica_sync_replica_patches_total",
        "Total number of scale targets whose replica field was rewritten",
    )
    .expect("Failed to create REPLICA_PATCHES_TOTAL metric - this should never happen")
});

static UNSUPPORTED_KINDS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "replica_sync_unsupported_kinds_total",
        "Total number of reconciles skipped because the target kind has no replica field mapping",
    )
    .expect("Failed to create UNSUPPORTED_KINDS_TOTAL metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "replica_sync_requeues_total",
            "Total number of requeues scheduled, by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static LABEL_EVENTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "replica_sync_label_events_total",
            "Total number of label events handled, by event kind and result",
        ),
        &["event", "result"],
    )
    .expect("Failed to create LABEL_EVENTS_TOTAL metric - this should never happen")
});

static LABEL_QUEUE_DEPTH: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "replica_sync_label_queue_depth",
        "Number of label events waiting for a worker",
    )
    .expect("Failed to create LABEL_QUEUE_DEPTH metric - this should never happen")
});

static RESCHEDULE_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "replica_sync_reschedule_requests_total",
            "Total number of reschedule commands, by result",
        ),
        &["result"],
    )
    .expect("Failed to create RESCHEDULE_REQUESTS_TOTAL metric - this should never happen")
});

static BINDINGS_STAMPED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "replica_sync_bindings_stamped_total",
        "Total number of bindings whose reschedule trigger was advanced",
    )
    .expect("Failed to create BINDINGS_STAMPED_TOTAL metric - this should never happen")
});

/// Register every metric with [`REGISTRY`]
///
/// Safe to call more than once; metrics that are already registered are kept.
pub fn register_metrics() -> Result<()> {
    let collectors: Vec<Box<dyn Collector>> = vec![
        Box::new(RECONCILIATIONS_TOTAL.clone()),
        Box::new(RECONCILIATION_ERRORS_TOTAL.clone()),
        Box::new(RECONCILIATION_DURATION.clone()),
        Box::new(REPLICA_PATCHES_TOTAL.clone()),
        Box::new(UNSUPPORTED_KINDS_TOTAL.clone()),
        Box::new(REQUEUES_TOTAL.clone()),
        Box::new(LABEL_EVENTS_TOTAL.clone()),
        Box::new(LABEL_QUEUE_DEPTH.clone()),
        Box::new(RESCHEDULE_REQUESTS_TOTAL.clone()),
        Box::new(BINDINGS_STAMPED_TOTAL.clone()),
    ];
    for collector in collectors {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_replica_patches() {
    REPLICA_PATCHES_TOTAL.inc();
}

pub fn increment_unsupported_kinds() {
    UNSUPPORTED_KINDS_TOTAL.inc();
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}

pub fn increment_label_events(event: &str, result: &str) {
    LABEL_EVENTS_TOTAL.with_label_values(&[event, result]).inc();
}

pub fn increment_label_queue_depth() {
    LABEL_QUEUE_DEPTH.inc();
}

pub fn decrement_label_queue_depth() {
    LABEL_QUEUE_DEPTH.dec();
}

pub fn increment_reschedule_requests(result: &str) {
    RESCHEDULE_REQUESTS_TOTAL.with_label_values(&[result]).inc();
}

pub fn increment_bindings_stamped(count: usize) {
    BINDINGS_STAMPED_TOTAL.inc_by(count as u64);
}
