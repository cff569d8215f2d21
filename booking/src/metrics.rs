//! Business metrics for bay booking.
//!
//! ## Counters
//! - `bays_holds_total{outcome}` - hold attempts by outcome (acquired, full, error)
//! - `bays_reaped_total` - stale holds deleted
//! - `bays_reap_failures_total` - holds the reaper had to skip
//! - `bays_bookings_confirmed_total` - bookings confirmed
//! - `bays_notifications_total{outcome}` - confirmation notifications (sent, failed)
//!
//! ## Gauges
//! - `bays_available` - free bays seen by the latest capacity check
//! - `bays_sessions_active` - sessions held by the registry

use crate::lease::ReapReport;
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use thiserror::Error;

/// Failure installing the Prometheus exporter.
#[derive(Error, Debug)]
#[error("Failed to install metrics exporter: {0}")]
pub struct MetricsError(String);

/// Install the Prometheus recorder with an HTTP listener on `addr`, then
/// register metric descriptions.
///
/// Must be called from within a Tokio runtime, once per process.
///
/// # Errors
///
/// Returns [`MetricsError`] if a recorder is already installed or the
/// listener cannot be built.
pub fn install_exporter(addr: SocketAddr) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| MetricsError(e.to_string()))?;

    register_business_metrics();
    tracing::info!(%addr, "Metrics exporter listening at http://{addr}/metrics");
    Ok(())
}

/// Register all business metric descriptions.
pub fn register_business_metrics() {
    describe_counter!("bays_holds_total", "Hold attempts by outcome (acquired, full, error)");
    describe_counter!("bays_reaped_total", "Stale temporary holds deleted by the reaper");
    describe_counter!(
        "bays_reap_failures_total",
        "Temporary holds skipped by the reaper (bad timestamp or failed delete)"
    );
    describe_counter!("bays_bookings_confirmed_total", "Bookings confirmed");
    describe_counter!(
        "bays_notifications_total",
        "Confirmation notifications by outcome (sent, failed)"
    );
    describe_gauge!("bays_available", "Free bays seen by the latest capacity check");
    describe_gauge!("bays_sessions_active", "Booking sessions held in memory");
}

/// Outcome label for `bays_holds_total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldOutcome {
    /// A hold was taken.
    Acquired,
    /// Every bay was occupied.
    Full,
    /// The store failed.
    Error,
}

impl HoldOutcome {
    const fn label(self) -> &'static str {
        match self {
            Self::Acquired => "acquired",
            Self::Full => "full",
            Self::Error => "error",
        }
    }
}

/// Record one hold attempt.
pub fn record_hold(outcome: HoldOutcome) {
    metrics::counter!("bays_holds_total", "outcome" => outcome.label()).increment(1);
}

/// Record a reap pass.
pub fn record_reap(report: &ReapReport) {
    metrics::counter!("bays_reaped_total").increment(report.deleted_count() as u64);
    if !report.failures.is_empty() {
        metrics::counter!("bays_reap_failures_total").increment(report.failures.len() as u64);
    }
}

/// Record a confirmed booking.
pub fn record_booking_confirmed() {
    metrics::counter!("bays_bookings_confirmed_total").increment(1);
}

/// Record a notification attempt.
pub fn record_notification(delivered: bool) {
    let outcome = if delivered { "sent" } else { "failed" };
    metrics::counter!("bays_notifications_total", "outcome" => outcome).increment(1);
}

/// Publish the latest free-bay count.
pub fn set_available(available: u16) {
    metrics::gauge!("bays_available").set(f64::from(available));
}

/// Publish the number of live sessions.
#[allow(clippy::cast_precision_loss)]
pub fn set_active_sessions(count: usize) {
    metrics::gauge!("bays_sessions_active").set(count as f64);
}
