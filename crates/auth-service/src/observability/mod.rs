//! Observability for the auth service.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `auth_signals_dropped_total` | Counter | none | Signals dropped on a full queue |
//! | `auth_requests_total` | Counter | `outcome` | Processed authentication requests |
//! | `auth_handshake_duration_seconds` | Histogram | `auth_type` | Handler latency |
//! | `auth_failures_total` | Counter | `auth_type`, `error_type` | Failed authentications |
//! | `auth_map_entries` | Gauge | none | Entries in the cache mirror |
//! | `auth_entries_deleted_total` | Counter | `reason` | Entries removed by GC or rotation |
//! | `auth_store_errors_total` | Counter | `operation` | Store calls that did not take effect |
//!
//! Labels are bounded by enums in this crate; identities and node ids are
//! never used as labels.

pub mod metrics;
