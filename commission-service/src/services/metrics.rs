//! Metrics module for commission-service.
//! Provides Prometheus metrics for commission operations and per-tenant metering.

use once_cell::sync::Lazy;
use prometheus::{
    histogram_opts, opts, register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec,
    IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;

/// Database query duration histogram
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        histogram_opts!(
            "commission_db_query_duration_seconds",
            "Database query duration"
        ),
        &["operation"]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Commission operations counter (per-tenant metering)
pub static COMMISSION_OPERATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Assignment reconciliation outcomes (per-tenant metering)
pub static ASSIGNMENT_OUTCOMES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Plan operations counter (per-tenant metering)
pub static PLAN_OPERATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// gRPC request counter
pub static GRPC_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// gRPC request duration histogram
pub static GRPC_REQUEST_DURATION: OnceLock<HistogramVec> = OnceLock::new();

/// Error counter for alerting
pub static ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Calculated commission amount counter (monetary tracking)
pub static COMMISSION_AMOUNT_TOTAL: OnceLock<prometheus::CounterVec> = OnceLock::new();

/// Initialize all metrics. Call once at startup.
pub fn init_metrics() {
    COMMISSION_OPERATIONS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "commission_operations_total",
                "Total commission operations by tenant and operation type"
            ),
            &["tenant_id", "operation"]
        )
        .expect("Failed to register COMMISSION_OPERATIONS_TOTAL")
    });

    ASSIGNMENT_OUTCOMES_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "commission_assignment_outcomes_total",
                "Assignment reconciliation outcomes by tenant, slot and result"
            ),
            &["tenant_id", "slot", "outcome"]
        )
        .expect("Failed to register ASSIGNMENT_OUTCOMES_TOTAL")
    });

    PLAN_OPERATIONS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "commission_plan_operations_total",
                "Total plan operations by tenant and operation type"
            ),
            &["tenant_id", "operation"]
        )
        .expect("Failed to register PLAN_OPERATIONS_TOTAL")
    });

    GRPC_REQUESTS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!("commission_grpc_requests_total", "Total gRPC requests"),
            &["method", "status"]
        )
        .expect("Failed to register GRPC_REQUESTS_TOTAL")
    });

    // Custom buckets sized for single-row commission workloads
    GRPC_REQUEST_DURATION.get_or_init(|| {
        register_histogram_vec!(
            histogram_opts!(
                "commission_grpc_request_duration_seconds",
                "gRPC request duration",
                vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
            ),
            &["method"]
        )
        .expect("Failed to register GRPC_REQUEST_DURATION")
    });

    ERRORS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "commission_errors_total",
                "Total errors by type for alerting"
            ),
            &["error_type", "method"]
        )
        .expect("Failed to register ERRORS_TOTAL")
    });

    COMMISSION_AMOUNT_TOTAL.get_or_init(|| {
        prometheus::register_counter_vec!(
            prometheus::opts!(
                "commission_amount_total",
                "Total calculated commission amount by tenant and slot"
            ),
            &["tenant_id", "slot"]
        )
        .expect("Failed to register COMMISSION_AMOUNT_TOTAL")
    });

    // Force initialization of lazy statics
    let _ = &*DB_QUERY_DURATION;
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("Failed to encode metrics");
    String::from_utf8(buffer).expect("Failed to convert metrics to string")
}

/// Record a commission operation.
pub fn record_commission_operation(tenant_id: &str, operation: &str) {
    if let Some(counter) = COMMISSION_OPERATIONS_TOTAL.get() {
        counter.with_label_values(&[tenant_id, operation]).inc();
    }
}

/// Record an assignment reconciliation outcome.
pub fn record_assignment_outcome(tenant_id: &str, slot: &str, outcome: &str) {
    if let Some(counter) = ASSIGNMENT_OUTCOMES_TOTAL.get() {
        counter
            .with_label_values(&[tenant_id, slot, outcome])
            .inc();
    }
}

/// Record a plan operation.
pub fn record_plan_operation(tenant_id: &str, operation: &str) {
    if let Some(counter) = PLAN_OPERATIONS_TOTAL.get() {
        counter.with_label_values(&[tenant_id, operation]).inc();
    }
}

/// Record a gRPC request.
pub fn record_grpc_request(method: &str, status: &str) {
    if let Some(counter) = GRPC_REQUESTS_TOTAL.get() {
        counter.with_label_values(&[method, status]).inc();
    }
}

/// Record a gRPC request duration.
pub fn record_grpc_request_duration(method: &str, duration_secs: f64) {
    if let Some(histogram) = GRPC_REQUEST_DURATION.get() {
        histogram
            .with_label_values(&[method])
            .observe(duration_secs);
    }
}

/// Record an error for alerting.
pub fn record_error(error_type: &str, method: &str) {
    if let Some(counter) = ERRORS_TOTAL.get() {
        counter.with_label_values(&[error_type, method]).inc();
    }
}

/// Record a calculated commission amount for financial tracking.
pub fn record_commission_amount(tenant_id: &str, slot: &str, amount: f64) {
    if let Some(counter) = COMMISSION_AMOUNT_TOTAL.get() {
        counter
            .with_label_values(&[tenant_id, slot])
            .inc_by(amount.abs());
    }
}
