//! Accounts and Assets
//!
//! Identity types for the two stored entities the relay reasons about.
//! An [`Asset`] is a tracked device identified by a globally unique external
//! identifier; each asset has exactly one owning [`Account`]. An account may
//! point at one of its assets as the "selected" asset, which drives the
//! automatic room join when a WebSocket connection is established.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Identifiers
// =============================================================================

/// Opaque account identifier (the `sub` claim of a session token).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Create a new account identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// External asset identifier, unique across all accounts.
///
/// The identifier doubles as the room name on the real-time transport and
/// as the middle segment of the MQTT topic the asset publishes on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    /// Create an asset identifier without validation.
    ///
    /// Used for identifiers that arrive from the bus or from a client
    /// request, where the only question is whether the asset exists.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create an asset identifier for registration, enforcing the
    /// `[A-Za-z0-9_-]+` format.
    ///
    /// # Errors
    ///
    /// Returns [`AssetIdError`] if the identifier is empty or contains a
    /// character outside the allowed set.
    pub fn parse(id: &str) -> Result<Self, AssetIdError> {
        if id.is_empty() {
            return Err(AssetIdError::Empty);
        }
        if let Some(c) = id
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(AssetIdError::InvalidCharacter(c));
        }
        Ok(Self(id.to_string()))
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rejected asset identifier at registration time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssetIdError {
    /// Identifier is empty.
    #[error("asset id is required")]
    Empty,
    /// Identifier contains a character outside `[A-Za-z0-9_-]`.
    #[error("invalid asset id character {0:?}: allowed are letters, numbers, '-', '_'")]
    InvalidCharacter(char),
}

// =============================================================================
// Entities
// =============================================================================

/// A user account as seen by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account identifier.
    pub id: AccountId,
    /// Login email.
    pub email: String,
    /// Credential hash. Produced and checked by the session issuer; the
    /// relay only carries it.
    #[serde(default, skip_serializing)]
    pub credential_hash: String,
    /// Currently selected asset, if any.
    #[serde(default)]
    pub selected_asset: Option<AssetId>,
    /// Signup time.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Create an account with no selected asset.
    #[must_use]
    pub fn new(id: AccountId, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            credential_hash: String::new(),
            selected_asset: None,
            created_at: Utc::now(),
        }
    }

    /// Builder-style setter for the selected asset.
    #[must_use]
    pub fn with_selected_asset(mut self, asset: AssetId) -> Self {
        self.selected_asset = Some(asset);
        self
    }
}

/// A tracked asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// External identifier.
    pub id: AssetId,
    /// Owning account.
    pub owner: AccountId,
    /// Registration time.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Asset {
    /// Create a new asset owned by `owner`.
    #[must_use]
    pub fn new(id: AssetId, owner: AccountId) -> Self {
        Self {
            id,
            owner,
            created_at: Utc::now(),
        }
    }

    /// Whether `account` owns this asset.
    #[must_use]
    pub fn is_owned_by(&self, account: &AccountId) -> bool {
        &self.owner == account
    }
}

// =============================================================================
// Tests
// =============================================================================
