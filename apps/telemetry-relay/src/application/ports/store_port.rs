//! Store Port (Driven Port)
//!
//! Interface for the persistent store of accounts, assets, and telemetry
//! records.

use async_trait::async_trait;

use crate::domain::asset::{Account, AccountId, Asset, AssetId};
use crate::domain::telemetry::{TelemetryEvent, TelemetrySummary};

/// Store operation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Backend unreachable or the operation failed.
    #[error("store unavailable: {message}")]
    Unavailable {
        /// Backend-specific detail.
        message: String,
    },

    /// Unique constraint violated.
    #[error("conflict: {message}")]
    Conflict {
        /// Which key conflicted.
        message: String,
    },

    /// Referenced entity does not exist.
    #[error("not found: {message}")]
    NotFound {
        /// What was missing.
        message: String,
    },
}

impl StoreError {
    /// Shorthand for [`StoreError::Unavailable`].
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// Port for account, asset, and telemetry persistence.
#[async_trait]
pub trait StorePort: Send + Sync {
    /// Find an asset by its external identifier.
    async fn find_asset_by_external_id(&self, id: &AssetId) -> Result<Option<Asset>, StoreError>;

    /// Find an account by ID.
    async fn find_account_by_id(&self, id: &AccountId) -> Result<Option<Account>, StoreError>;

    /// Set or clear an account's selected asset.
    ///
    /// Returns [`StoreError::NotFound`] if the account does not exist.
    async fn update_selected_asset(
        &self,
        account: &AccountId,
        asset: Option<&AssetId>,
    ) -> Result<(), StoreError>;

    /// Append a telemetry record.
    async fn insert_telemetry_event(&self, event: TelemetryEvent) -> Result<(), StoreError>;

    /// List the assets owned by an account.
    async fn find_assets_by_owner(&self, owner: &AccountId) -> Result<Vec<Asset>, StoreError>;

    /// Register a new asset.
    ///
    /// Returns [`StoreError::Conflict`] if the identifier is taken.
    async fn insert_asset(&self, asset: Asset) -> Result<(), StoreError>;

    /// Most recent telemetry record for an asset.
    async fn latest_telemetry(&self, asset: &AssetId)
    -> Result<Option<TelemetryEvent>, StoreError>;

    /// Up to `limit` records for an asset, newest first.
    async fn telemetry_history(
        &self,
        asset: &AssetId,
        limit: usize,
    ) -> Result<Vec<TelemetryEvent>, StoreError>;

    /// Aggregate over every record of an asset. `None` when there are none.
    async fn telemetry_summary(
        &self,
        asset: &AssetId,
    ) -> Result<Option<TelemetrySummary>, StoreError>;
}
