use std::time::Duration;

use metrics::{counter, histogram};

/// Counter of repository calls, labelled by table, operation and outcome
pub const OPERATIONS_TOTAL: &str = "clinic_cache_operations_total";
/// Histogram of repository call latency
pub const OPERATION_DURATION: &str = "clinic_cache_operation_duration_seconds";
/// Counter of failed repository calls
pub const ERRORS_TOTAL: &str = "clinic_cache_errors_total";

/// Record one repository call. A no-op until the host installs a recorder.
pub fn record_operation(table: &'static str, operation: &'static str, duration: Duration, success: bool) {
    let status = if success { "success" } else { "error" };
    counter!(OPERATIONS_TOTAL, "table" => table, "operation" => operation, "status" => status).increment(1);
    histogram!(OPERATION_DURATION, "table" => table, "operation" => operation).record(duration.as_secs_f64());
    if !success {
        counter!(ERRORS_TOTAL, "table" => table, "operation" => operation).increment(1);
    }
}
