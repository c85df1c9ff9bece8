//! Prometheus Metrics Module
//!
//! Exposes application metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Events**: Normalized events published and dropped
//! - **Streams**: Frames received, session state, reconnects
//! - **Heartbeat**: Liveness probes sent and timed out
//! - **Snapshots**: REST snapshot fetch outcomes
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port. Recording
//! before `init_metrics` is a no-op.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::domain::market::EventKind;
use crate::domain::streaming::{SessionState, StreamKind};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder. Later calls return the
/// handle installed by the first.
///
/// # Errors
///
/// Returns `BuildError` if the recorder cannot be installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "orderbook_sync_events_published_total",
        "Normalized events delivered to the output channel"
    );
    describe_counter!(
        "orderbook_sync_events_dropped_total",
        "Events discarded before or after reaching the output channel"
    );
    describe_counter!(
        "orderbook_sync_messages_received_total",
        "Raw frames received from venue streams"
    );
    describe_gauge!(
        "orderbook_sync_session_state",
        "Stream session state (0=closed, 1=connecting, 2=active, 3=draining)"
    );
    describe_counter!(
        "orderbook_sync_reconnects_total",
        "Stream reconnections"
    );
    describe_counter!(
        "orderbook_sync_heartbeat_probes_total",
        "Liveness pings sent after stream silence"
    );
    describe_counter!(
        "orderbook_sync_heartbeat_timeouts_total",
        "Liveness pings left unanswered"
    );
    describe_counter!(
        "orderbook_sync_snapshot_fetches_total",
        "REST snapshot fetches by outcome"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Why an event never reached a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Frame could not be decoded.
    Malformed,
    /// No consumer attached.
    NoReceivers,
    /// Overwritten before a lagging consumer read it.
    Lagged,
}

impl DropReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::NoReceivers => "no_receivers",
            Self::Lagged => "lagged",
        }
    }
}

/// Record an event delivered to the output channel.
pub fn record_event_published(kind: EventKind) {
    counter!(
        "orderbook_sync_events_published_total",
        "event" => kind.as_str()
    )
    .increment(1);
}

/// Record a dropped event.
pub fn record_event_dropped(reason: DropReason) {
    counter!(
        "orderbook_sync_events_dropped_total",
        "reason" => reason.as_str()
    )
    .increment(1);
}

/// Record events a lagging consumer never saw.
pub fn record_events_lagged(count: u64) {
    counter!(
        "orderbook_sync_events_dropped_total",
        "reason" => DropReason::Lagged.as_str()
    )
    .increment(count);
}

/// Record a raw frame from a stream.
pub fn record_message_received(stream: StreamKind) {
    counter!(
        "orderbook_sync_messages_received_total",
        "stream" => stream.as_str()
    )
    .increment(1);
}

/// Update the session-state gauge for a stream.
pub fn set_session_state(stream: StreamKind, state: SessionState) {
    gauge!(
        "orderbook_sync_session_state",
        "stream" => stream.as_str()
    )
    .set(state.as_gauge());
}

/// Record a stream reconnection.
pub fn record_reconnect(stream: StreamKind) {
    counter!(
        "orderbook_sync_reconnects_total",
        "stream" => stream.as_str()
    )
    .increment(1);
}

/// Record a liveness probe.
pub fn record_heartbeat_probe(stream: StreamKind) {
    counter!(
        "orderbook_sync_heartbeat_probes_total",
        "stream" => stream.as_str()
    )
    .increment(1);
}

/// Record an unanswered liveness probe.
pub fn record_heartbeat_timeout(stream: StreamKind) {
    counter!(
        "orderbook_sync_heartbeat_timeouts_total",
        "stream" => stream.as_str()
    )
    .increment(1);
}

/// Record a snapshot fetch outcome.
pub fn record_snapshot_fetch(success: bool) {
    let outcome = if success { "ok" } else { "error" };
    counter!(
        "orderbook_sync_snapshot_fetches_total",
        "outcome" => outcome
    )
    .increment(1);
}

// =============================================================================
// Tests
// =============================================================================
