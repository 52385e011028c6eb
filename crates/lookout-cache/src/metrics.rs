//! Cache operation metrics.
//!
//! Only the `metrics` facade is used here; installing an exporter is left to
//! the embedding process.

use metrics::{counter, gauge};

/// Metric names as constants for consistency.
pub mod names {
    pub const CACHE_OPERATIONS_TOTAL: &str = "cache_operations_total";
    pub const CACHE_DEGRADED: &str = "cache_degraded";
}

/// Record the outcome of one cache operation.
///
/// `status` is one of `hit`, `miss`, `error`, `success` or `conflict`.
pub fn record_operation(operation: &'static str, status: &'static str) {
    counter!(
        names::CACHE_OPERATIONS_TOTAL,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
}

/// Record a `success`/`error` outcome from a result.
pub(crate) fn record_result<T, E>(operation: &'static str, result: &Result<T, E>) {
    let status = if result.is_ok() { "success" } else { "error" };
    record_operation(operation, status);
}

/// Flag whether the cache layer is running on the in-process fallback.
pub fn set_degraded(degraded: bool) {
    gauge!(names::CACHE_DEGRADED).set(if degraded { 1.0 } else { 0.0 });
}
