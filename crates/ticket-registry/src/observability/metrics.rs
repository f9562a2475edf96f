//! Metrics definitions for the ticket registry
//!
//! All metrics follow Prometheus naming conventions:
//! - `cas_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `kind`: 3 values (login_ticket, ticket_granting_ticket, service_ticket)
//! - `status`: 2 values (success, error)
//! - `outcome`: bounded by code
//! - `error_category`: 3 values (invalid_ticket, integrity, internal)
//! - `operation`: bounded by code (select, insert, update)
//! - `table`: 3 tables

use metrics::{counter, histogram};
use std::time::Duration;

// ============================================================================
// Ticket Metrics
// ============================================================================

/// Record ticket issuance duration and outcome
///
/// Metric: `cas_ticket_issuance_duration_seconds`, `cas_tickets_issued_total`
/// Labels: `kind`, `status`
pub fn record_ticket_issuance(kind: &str, status: &str, duration: Duration) {
    histogram!("cas_ticket_issuance_duration_seconds", "kind" => kind.to_string(), "status" => status.to_string())
        .record(duration.as_secs_f64());

    counter!("cas_tickets_issued_total", "kind" => kind.to_string(), "status" => status.to_string())
        .increment(1);
}

/// Record ticket invalidation
///
/// Metric: `cas_tickets_invalidated_total`
/// Labels: `kind`, `status`
pub fn record_ticket_invalidation(kind: &str, status: &str) {
    counter!("cas_tickets_invalidated_total", "kind" => kind.to_string(), "status" => status.to_string())
        .increment(1);
}

/// Record a unique ticket lookup
///
/// Metric: `cas_ticket_lookups_total`
/// Labels: `kind`, `outcome` (found, not_found, integrity, error)
pub fn record_ticket_lookup(kind: &str, outcome: &str) {
    counter!("cas_ticket_lookups_total", "kind" => kind.to_string(), "outcome" => outcome.to_string())
        .increment(1);
}

/// Record single-logout bookkeeping
///
/// Metric: `cas_service_logins_tracked_total`
/// Labels: `outcome` (recorded, already_tracked, not_persisted)
///
/// A rising `not_persisted` rate means single logout will miss services.
pub fn record_service_login_tracked(outcome: &str) {
    counter!("cas_service_logins_tracked_total", "outcome" => outcome.to_string()).increment(1);
}

// ============================================================================
// Database Metrics
// ============================================================================

/// Record database query execution
///
/// Metric: `cas_db_query_duration_seconds`, `cas_db_queries_total`
/// Labels: `operation`, `table`, `status`
pub fn record_db_query(operation: &str, table: &str, status: &str, duration: Duration) {
    histogram!("cas_db_query_duration_seconds", "operation" => operation.to_string(), "table" => table.to_string())
        .record(duration.as_secs_f64());

    counter!("cas_db_queries_total", "operation" => operation.to_string(), "table" => table.to_string(), "status" => status.to_string())
        .increment(1);
}

// ============================================================================
// Error Metrics
// ============================================================================

/// Record error by category
///
/// Metric: `cas_errors_total`
/// Labels: `operation`, `error_category`
pub fn record_error(operation: &str, error_category: &str) {
    counter!("cas_errors_total",
        "operation" => operation.to_string(),
        "error_category" => error_category.to_string()
    )
    .increment(1);
}
