//! Prometheus metrics for the sample operator
//!
//! # Exported metrics
//! The `/metrics` endpoint exports the following metrics:
//! - `mongo_sample_reconcile_duration_seconds` (histogram): iteration duration labeled by task.
//! - `mongo_sample_reconcile_runs_total` (counter): iterations started labeled by task.
//! - `mongo_sample_reconcile_errors_total` (counter): failed iterations labeled by task and kind.
//! - `mongo_sample_health_probes_total` (counter): liveness probes labeled by result.
//! - `mongo_sample_demo_operations_total` (counter): demonstration operations labeled by operation and result.

use std::sync::atomic::AtomicU64;

use once_cell::sync::Lazy;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

/// Labels for reconcile metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ReconcileLabels {
    /// Task name, e.g. "process-loop"
    pub task: String,
}

/// Labels for reconcile error metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    pub task: String,
    /// Error kind, see `Error::kind`
    pub kind: String,
}

/// Labels for health probe metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ProbeLabels {
    /// "success" or "failure"
    pub result: String,
}

/// Labels for demonstration operation metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OperationLabels {
    pub operation: String,
    /// "success", "failure" or "skipped"
    pub result: String,
}

/// Histogram tracking reconcile duration (seconds)
pub static RECONCILE_DURATION_SECONDS: Lazy<Family<ReconcileLabels, Histogram>> = Lazy::new(|| {
    fn reconcile_histogram() -> Histogram {
        // 1ms .. ~32s across 16 buckets.
        Histogram::new(exponential_buckets(0.001, 2.0, 16))
    }

    Family::new_with_constructor(reconcile_histogram)
});

/// Counter tracking reconcile iterations
pub static RECONCILE_RUNS_TOTAL: Lazy<Family<ReconcileLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

/// Counter tracking reconcile errors
pub static RECONCILE_ERRORS_TOTAL: Lazy<Family<ErrorLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

/// Counter tracking health gate probes
pub static HEALTH_PROBES_TOTAL: Lazy<Family<ProbeLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

/// Counter tracking demonstration operations
pub static DEMO_OPERATIONS_TOTAL: Lazy<Family<OperationLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let mut registry = Registry::default();

    registry.register(
        "mongo_sample_reconcile_duration_seconds",
        "Duration of reconcile iterations in seconds",
        RECONCILE_DURATION_SECONDS.clone(),
    );
    registry.register(
        "mongo_sample_reconcile_runs",
        "Total number of reconcile iterations",
        RECONCILE_RUNS_TOTAL.clone(),
    );
    registry.register(
        "mongo_sample_reconcile_errors",
        "Total number of failed reconcile iterations",
        RECONCILE_ERRORS_TOTAL.clone(),
    );
    registry.register(
        "mongo_sample_health_probes",
        "Total number of database liveness probes",
        HEALTH_PROBES_TOTAL.clone(),
    );
    registry.register(
        "mongo_sample_demo_operations",
        "Total number of demonstration database operations",
        DEMO_OPERATIONS_TOTAL.clone(),
    );

    registry
});

/// Observe a reconcile duration in seconds.
pub fn observe_reconcile_duration_seconds(task: &str, seconds: f64) {
    let labels = ReconcileLabels {
        task: task.to_string(),
    };
    RECONCILE_DURATION_SECONDS
        .get_or_create(&labels)
        .observe(seconds);
}

/// Increment the reconcile run counter.
pub fn inc_reconcile_run(task: &str) {
    let labels = ReconcileLabels {
        task: task.to_string(),
    };
    RECONCILE_RUNS_TOTAL.get_or_create(&labels).inc();
}

/// Increment the reconcile error counter.
pub fn inc_reconcile_error(task: &str, kind: &str) {
    let labels = ErrorLabels {
        task: task.to_string(),
        kind: kind.to_string(),
    };
    RECONCILE_ERRORS_TOTAL.get_or_create(&labels).inc();
}

/// Record the outcome of one liveness probe.
pub fn inc_health_probe(success: bool) {
    let labels = ProbeLabels {
        result: if success { "success" } else { "failure" }.to_string(),
    };
    HEALTH_PROBES_TOTAL.get_or_create(&labels).inc();
}

/// Record the outcome of one demonstration operation.
pub fn inc_demo_operation(operation: &str, result: &str) {
    let labels = OperationLabels {
        operation: operation.to_string(),
        result: result.to_string(),
    };
    DEMO_OPERATIONS_TOTAL.get_or_create(&labels).inc();
}

/// Render the registry in the OpenMetrics text format.
pub fn encode_registry() -> Result<String, std::fmt::Error> {
    let mut buffer = String::new();
    prometheus_client::encoding::text::encode(&mut buffer, &REGISTRY)?;
    Ok(buffer)
}
