//! Prometheus Metrics Module
//!
//! Exposes application metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Ingestion**: Bus messages received, discarded (by reason), persisted
//! - **Fanout**: Events delivered to and dropped at client outboxes
//! - **Connections**: Live WebSocket clients and MQTT session state
//! - **Subscriptions**: Subscribe outcomes
//! - **Latency**: Time from bus receipt to publish
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the HTTP server port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Subsequent calls return the already-installed handle.
///
/// # Errors
///
/// Returns an error if the global recorder cannot be installed.
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
    // Ingestion counters
    describe_counter!(
        "telemetry_relay_messages_received_total",
        "Total messages received from the MQTT bus"
    );
    describe_counter!(
        "telemetry_relay_messages_discarded_total",
        "Total bus messages discarded as malformed, by reason"
    );
    describe_counter!(
        "telemetry_relay_telemetry_persisted_total",
        "Total telemetry records written to the store"
    );
    describe_counter!(
        "telemetry_relay_persistence_skipped_total",
        "Total telemetry records not persisted, by reason"
    );

    // Fanout counters
    describe_counter!(
        "telemetry_relay_events_delivered_total",
        "Total events queued to client outboxes"
    );
    describe_counter!(
        "telemetry_relay_events_dropped_total",
        "Total events dropped at full or closed client outboxes"
    );

    // Connection gauges
    describe_gauge!(
        "telemetry_relay_websocket_clients",
        "Number of live WebSocket client connections"
    );
    describe_gauge!(
        "telemetry_relay_mqtt_connected",
        "1 when the MQTT session is established, 0 otherwise"
    );

    // Subscription and auth counters
    describe_counter!(
        "telemetry_relay_subscribe_total",
        "Total room subscribe attempts by outcome"
    );
    describe_counter!(
        "telemetry_relay_auth_failures_total",
        "Total rejected session tokens by surface"
    );

    // Error counters
    describe_counter!(
        "telemetry_relay_mqtt_reconnects_total",
        "Total MQTT reconnection attempts"
    );

    // Latency histograms
    describe_histogram!(
        "telemetry_relay_ingestion_processing_seconds",
        "Time from bus receipt to room publish"
    );
}

// =============================================================================
// Metric Labels
// =============================================================================

/// Why a bus message was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Topic did not match `<namespace>/<asset_id>/telemetry`.
    MalformedTopic,
    /// Payload did not decode.
    MalformedPayload,
}

impl DiscardReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::MalformedTopic => "malformed_topic",
            Self::MalformedPayload => "malformed_payload",
        }
    }
}

/// Why a decoded reading was not persisted.
#[derive(Debug, Clone, Copy)]
pub enum PersistSkip {
    /// No asset with that identifier exists.
    UnknownAsset,
    /// Owner lookup failed.
    StoreUnavailable,
    /// The insert itself failed.
    WriteFailed,
}

impl PersistSkip {
    const fn as_str(self) -> &'static str {
        match self {
            Self::UnknownAsset => "unknown_asset",
            Self::StoreUnavailable => "store_unavailable",
            Self::WriteFailed => "write_failed",
        }
    }
}

/// Why an event could not be queued to a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Outbox at capacity.
    Full,
    /// Client writer already gone.
    Closed,
}

impl DropReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Closed => "closed",
        }
    }
}

/// Outcome label for subscribe attempts.
#[derive(Debug, Clone, Copy)]
pub enum SubscribeOutcome {
    /// Joined the room.
    Joined,
    /// Asset does not exist.
    NotFound,
    /// Asset owned by another account.
    Unauthorized,
    /// Store lookup failed.
    Error,
}

impl SubscribeOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Joined => "joined",
            Self::NotFound => "not_found",
            Self::Unauthorized => "unauthorized",
            Self::Error => "error",
        }
    }
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a message received from the bus.
pub fn record_message_received() {
    counter!("telemetry_relay_messages_received_total").increment(1);
}

/// Record a discarded bus message.
pub fn record_message_discarded(reason: DiscardReason) {
    counter!(
        "telemetry_relay_messages_discarded_total",
        "reason" => reason.as_str()
    )
    .increment(1);
}

/// Record a persisted telemetry record.
pub fn record_telemetry_persisted() {
    counter!("telemetry_relay_telemetry_persisted_total").increment(1);
}

/// Record a reading that was broadcast but not persisted.
pub fn record_persistence_skipped(reason: PersistSkip) {
    counter!(
        "telemetry_relay_persistence_skipped_total",
        "reason" => reason.as_str()
    )
    .increment(1);
}

/// Record events queued to client outboxes.
pub fn record_events_delivered(count: u64) {
    counter!("telemetry_relay_events_delivered_total").increment(count);
}

/// Record an event dropped at a client outbox.
pub fn record_event_dropped(reason: DropReason) {
    counter!(
        "telemetry_relay_events_dropped_total",
        "reason" => reason.as_str()
    )
    .increment(1);
}

/// Update the live WebSocket client count.
#[allow(clippy::cast_precision_loss)]
pub fn set_websocket_clients(count: usize) {
    gauge!("telemetry_relay_websocket_clients").set(count as f64);
}

/// Update the MQTT session state.
pub fn set_mqtt_connected(connected: bool) {
    gauge!("telemetry_relay_mqtt_connected").set(if connected { 1.0 } else { 0.0 });
}

/// Record a subscribe attempt.
pub fn record_subscribe(outcome: SubscribeOutcome) {
    counter!(
        "telemetry_relay_subscribe_total",
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record a rejected session token.
pub fn record_auth_failure(surface: &'static str) {
    counter!(
        "telemetry_relay_auth_failures_total",
        "surface" => surface
    )
    .increment(1);
}

/// Record an MQTT reconnection attempt.
pub fn record_reconnect() {
    counter!("telemetry_relay_mqtt_reconnects_total").increment(1);
}

/// Record time from bus receipt to room publish.
pub fn record_processing_duration(duration: Duration) {
    histogram!("telemetry_relay_ingestion_processing_seconds").record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================
