//! Metrics collection.
//!
//! Recorded through the `metrics` facade; the embedding process decides
//! whether and how to export them.
//!
//! # Metrics
//! - `supervisor_connections_accepted_total` (counter)
//! - `supervisor_active_connections` (gauge)
//! - `supervisor_shutdowns_total` (counter): by `outcome` = graceful | forced

use crate::lifecycle::shutdown::ShutdownOutcome;

pub const CONNECTIONS_ACCEPTED: &str = "supervisor_connections_accepted_total";
pub const ACTIVE_CONNECTIONS: &str = "supervisor_active_connections";
pub const SHUTDOWNS: &str = "supervisor_shutdowns_total";

pub fn record_connection_accepted() {
    metrics::counter!(CONNECTIONS_ACCEPTED).increment(1);
}

pub fn set_active_connections(count: u64) {
    metrics::gauge!(ACTIVE_CONNECTIONS).set(count as f64);
}

pub fn record_shutdown(outcome: ShutdownOutcome) {
    metrics::counter!(SHUTDOWNS, "outcome" => outcome.as_str()).increment(1);
}
