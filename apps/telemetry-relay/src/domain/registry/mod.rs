//! Connection Registry
//!
//! Tracks every live WebSocket connection, the account it authenticated as,
//! and the asset rooms it has joined.
//!
//! # Design
//!
//! Two sharded concurrent maps:
//! - `connections`: connection ID to its account and joined rooms
//! - `rooms`: asset ID to the set of member connection IDs
//!
//! Rooms hold IDs only; the connection entry is the source of truth for
//! which rooms a connection is in, so removal is O(rooms joined).
//!
//! Lock order is always `connections` then `rooms`. `join` holds the
//! connection's shard guard while it inserts into the room, so a join that
//! races `remove_connection` either completes first (and is evicted by the
//! removal) or observes the connection as gone and fails.

use std::collections::HashSet;
use std::fmt;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::asset::{AccountId, AssetId};

// =============================================================================
// Types
// =============================================================================

/// Unique identifier for a live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Registry operation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The connection was never registered or has already been removed.
    #[error("unknown connection: {0}")]
    UnknownConnection(ConnectionId),
}

#[derive(Debug)]
struct ConnectionEntry {
    account: AccountId,
    rooms: HashSet<AssetId>,
}

// =============================================================================
// Registry
// =============================================================================

/// Concurrent registry of connections and room memberships.
///
/// # Example
///
/// ```rust
/// use telemetry_relay::domain::asset::{AccountId, AssetId};
/// use telemetry_relay::domain::registry::ConnectionRegistry;
///
/// let registry = ConnectionRegistry::new();
/// let conn = registry.add_connection(AccountId::new("acct-a"));
///
/// registry.join(conn, AssetId::new("rig-7")).unwrap();
/// assert!(registry.members_of(&AssetId::new("rig-7")).contains(&conn));
///
/// registry.remove_connection(conn);
/// assert!(registry.members_of(&AssetId::new("rig-7")).is_empty());
/// ```
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, ConnectionEntry>,
    rooms: DashMap<AssetId, HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection for `account` with no rooms.
    pub fn add_connection(&self, account: AccountId) -> ConnectionId {
        let id = ConnectionId::new();
        self.connections.insert(
            id,
            ConnectionEntry {
                account,
                rooms: HashSet::new(),
            },
        );
        id
    }

    /// Remove a connection and evict it from every room it joined.
    ///
    /// Returns the account the connection belonged to, or `None` if it was
    /// already gone.
    pub fn remove_connection(&self, id: ConnectionId) -> Option<AccountId> {
        let (_, entry) = self.connections.remove(&id)?;

        for asset in &entry.rooms {
            self.evict(asset, id);
        }

        Some(entry.account)
    }

    /// Add a connection to an asset room.
    ///
    /// Returns `true` if the connection was not already a member.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownConnection`] if the connection is not
    /// registered.
    pub fn join(&self, id: ConnectionId, asset: AssetId) -> Result<bool, RegistryError> {
        let mut entry = self
            .connections
            .get_mut(&id)
            .ok_or(RegistryError::UnknownConnection(id))?;

        if !entry.rooms.insert(asset.clone()) {
            return Ok(false);
        }
        self.rooms.entry(asset).or_default().insert(id);
        drop(entry);

        Ok(true)
    }

    /// Remove a connection from an asset room.
    ///
    /// Returns `true` if the connection was a member. Leaving a room that
    /// was never joined, or leaving from an unknown connection, is a no-op.
    pub fn leave(&self, id: ConnectionId, asset: &AssetId) -> bool {
        let Some(mut entry) = self.connections.get_mut(&id) else {
            return false;
        };

        if !entry.rooms.remove(asset) {
            return false;
        }
        self.evict(asset, id);
        drop(entry);

        true
    }

    /// Snapshot of the connections currently in an asset room.
    #[must_use]
    pub fn members_of(&self, asset: &AssetId) -> HashSet<ConnectionId> {
        self.rooms
            .get(asset)
            .map(|members| members.clone())
            .unwrap_or_default()
    }

    /// Account a connection authenticated as.
    #[must_use]
    pub fn account_of(&self, id: ConnectionId) -> Option<AccountId> {
        self.connections.get(&id).map(|entry| entry.account.clone())
    }

    /// Rooms a connection has joined.
    #[must_use]
    pub fn rooms_of(&self, id: ConnectionId) -> HashSet<AssetId> {
        self.connections
            .get(&id)
            .map(|entry| entry.rooms.clone())
            .unwrap_or_default()
    }

    /// Whether a connection is registered.
    #[must_use]
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Current registry statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            connection_count: self.connections.len(),
            room_count: self.rooms.len(),
            membership_count: self.rooms.iter().map(|room| room.len()).sum(),
        }
    }

    fn evict(&self, asset: &AssetId, id: ConnectionId) {
        if let Some(mut members) = self.rooms.get_mut(asset) {
            members.remove(&id);
        }
        self.rooms.remove_if(asset, |_, members| members.is_empty());
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Registry statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Live connections.
    pub connection_count: usize,
    /// Non-empty rooms.
    pub room_count: usize,
    /// Sum of room sizes.
    pub membership_count: usize,
}

// =============================================================================
// Tests
// =============================================================================
