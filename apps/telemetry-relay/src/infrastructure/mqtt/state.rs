//! Bus Connection State
//!
//! Shared, lock-light view of the MQTT session for health and readiness
//! reporting. Written by the client loop, read by HTTP handlers.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// MQTT session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BusConnectionState {
    /// Not started or stopped.
    Disconnected,
    /// First connection attempt in progress.
    Connecting,
    /// Broker acknowledged the session.
    Connected,
    /// Waiting to retry after a failure.
    Reconnecting,
}

/// Shared MQTT session state.
#[derive(Debug)]
pub struct BusState {
    state: parking_lot::RwLock<BusConnectionState>,
    last_connected_at: parking_lot::RwLock<Option<DateTime<Utc>>>,
    last_error: parking_lot::RwLock<Option<String>>,
    reconnect_attempts: AtomicU32,
    messages_received: AtomicU64,
}

impl Default for BusState {
    fn default() -> Self {
        Self::new()
    }
}

impl BusState {
    /// Create a disconnected state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: parking_lot::RwLock::new(BusConnectionState::Disconnected),
            last_connected_at: parking_lot::RwLock::new(None),
            last_error: parking_lot::RwLock::new(None),
            reconnect_attempts: AtomicU32::new(0),
            messages_received: AtomicU64::new(0),
        }
    }

    /// Set the session state. `Connected` clears the error and attempt count.
    pub fn set_state(&self, state: BusConnectionState) {
        *self.state.write() = state;
        if state == BusConnectionState::Connected {
            *self.last_connected_at.write() = Some(Utc::now());
            *self.last_error.write() = None;
            self.reconnect_attempts.store(0, Ordering::Relaxed);
        }
    }

    /// Record a connection failure and enter `Reconnecting`.
    pub fn record_failure(&self, message: String) {
        *self.state.write() = BusConnectionState::Reconnecting;
        *self.last_error.write() = Some(message);
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an inbound publish.
    pub fn record_message(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> BusConnectionState {
        *self.state.read()
    }

    /// Whether the broker session is up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == BusConnectionState::Connected
    }

    /// Failures since the last successful connection.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }

    /// Point-in-time snapshot for reporting.
    #[must_use]
    pub fn snapshot(&self) -> BusStatus {
        BusStatus {
            state: self.state(),
            connected: self.is_connected(),
            last_connected_at: *self.last_connected_at.read(),
            last_error: self.last_error.read().clone(),
            reconnect_attempts: self.reconnect_attempts(),
            messages_received: self.messages_received.load(Ordering::Relaxed),
        }
    }
}

/// Serializable snapshot of [`BusState`].
#[derive(Debug, Clone, Serialize)]
pub struct BusStatus {
    /// Session state.
    pub state: BusConnectionState,
    /// Whether the session is up.
    pub connected: bool,
    /// Last successful connection.
    pub last_connected_at: Option<DateTime<Utc>>,
    /// Most recent failure, cleared on connect.
    pub last_error: Option<String>,
    /// Failures since the last successful connection.
    pub reconnect_attempts: u32,
    /// Publishes received since startup.
    pub messages_received: u64,
}
