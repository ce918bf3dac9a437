//! Metrics definitions for the auth service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `auth_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! - `outcome`: 5 values (authenticated, cache_hit, already_pending, failed, dropped)
//! - `auth_type`: 3 values (bounded by `AuthType`)
//! - `error_type`: bounded by `AuthError::error_type`
//! - `reason`: 4 values (expired, identity_deleted, node_deleted, rotation)
//! - `operation`: 2 values (update, delete)

use common::AuthType;
use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Why entries were deleted from the auth map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteReason {
    Expired,
    IdentityDeleted,
    NodeDeleted,
    Rotation,
}

impl DeleteReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            DeleteReason::Expired => "expired",
            DeleteReason::IdentityDeleted => "identity_deleted",
            DeleteReason::NodeDeleted => "node_deleted",
            DeleteReason::Rotation => "rotation",
        }
    }
}

/// Record a signal dropped because the request queue was full.
///
/// Metric: `auth_signals_dropped_total`
pub fn record_signal_dropped() {
    counter!("auth_signals_dropped_total").increment(1);
}

/// Record the outcome of one authentication request.
///
/// Metric: `auth_requests_total`
/// Labels: `outcome`
pub fn record_request(outcome: &'static str) {
    counter!("auth_requests_total", "outcome" => outcome).increment(1);
}

/// Record how long a handler took to authenticate, successful or not.
///
/// Metric: `auth_handshake_duration_seconds`
/// Labels: `auth_type`
pub fn record_handshake_duration(auth_type: AuthType, duration: Duration) {
    histogram!(
        "auth_handshake_duration_seconds",
        "auth_type" => auth_type.as_str()
    )
    .record(duration.as_secs_f64());
}

/// Record a failed authentication.
///
/// Metric: `auth_failures_total`
/// Labels: `auth_type`, `error_type`
pub fn record_failure(auth_type: AuthType, error_type: &'static str) {
    counter!(
        "auth_failures_total",
        "auth_type" => auth_type.as_str(),
        "error_type" => error_type
    )
    .increment(1);
}

/// Set the number of entries in the cache mirror.
///
/// Metric: `auth_map_entries`
pub fn set_map_entries(count: usize) {
    // usize to f64 is exact for any realistic map size (< 2^53)
    #[allow(clippy::cast_precision_loss)]
    gauge!("auth_map_entries").set(count as f64);
}

/// Record entries removed from the auth map.
///
/// Metric: `auth_entries_deleted_total`
/// Labels: `reason`
pub fn record_entries_deleted(reason: DeleteReason, count: usize) {
    if count == 0 {
        return;
    }
    counter!("auth_entries_deleted_total", "reason" => reason.as_str())
        .increment(u64::try_from(count).unwrap_or(u64::MAX));
}

/// Record a store operation that did not take effect.
///
/// Metric: `auth_store_errors_total`
/// Labels: `operation`
pub fn record_store_error(operation: &'static str) {
    counter!("auth_store_errors_total", "operation" => operation).increment(1);
}
