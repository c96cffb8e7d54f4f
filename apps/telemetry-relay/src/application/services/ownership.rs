//! Ownership Resolution
//!
//! Maps an asset identifier to its owning account. Shared by ingestion (to
//! attach the owner to persisted records) and the broker (to authorize room
//! joins). Every call is one store round trip; nothing is cached so a
//! transferred or deleted asset is observed immediately.

use std::sync::Arc;

use crate::application::ports::StorePort;
use crate::domain::asset::{AccountId, AssetId};

/// Owner lookup failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OwnershipError {
    /// No asset with this identifier exists.
    #[error("asset not found: {0}")]
    NotFound(AssetId),

    /// The store could not answer.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

/// Resolves asset owners against the store.
#[derive(Clone)]
pub struct OwnershipResolver {
    store: Arc<dyn StorePort>,
}

impl std::fmt::Debug for OwnershipResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnershipResolver").finish_non_exhaustive()
    }
}

impl OwnershipResolver {
    /// Create a resolver over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn StorePort>) -> Self {
        Self { store }
    }

    /// Look up the account that owns `asset`.
    ///
    /// # Errors
    ///
    /// Returns [`OwnershipError::NotFound`] for an unknown asset and
    /// [`OwnershipError::StoreUnavailable`] if the lookup fails.
    pub async fn resolve_owner(&self, asset: &AssetId) -> Result<AccountId, OwnershipError> {
        match self.store.find_asset_by_external_id(asset).await {
            Ok(Some(found)) => Ok(found.owner),
            Ok(None) => Err(OwnershipError::NotFound(asset.clone())),
            Err(e) => Err(OwnershipError::StoreUnavailable(e.to_string())),
        }
    }
}
