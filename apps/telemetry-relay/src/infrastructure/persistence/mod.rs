//! In-Memory Store
//!
//! `StorePort` adapter backed by `parking_lot::RwLock`-guarded maps. Used by
//! the binary when no external store is wired and by every test.
//!
//! # Seeding
//!
//! The store can be pre-populated from a JSON document:
//!
//! ```json
//! {
//!   "accounts": [{"id": "acct-a", "email": "a@example.com", "selected_asset": "rig-7"}],
//!   "assets": [{"id": "rig-7", "owner": "acct-a"}]
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;

use crate::application::ports::{StoreError, StorePort};
use crate::domain::asset::{Account, AccountId, Asset, AssetId};
use crate::domain::telemetry::{TelemetryEvent, TelemetrySummary};

// =============================================================================
// Seed Document
// =============================================================================

/// Errors loading a seed document.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    /// File could not be read.
    #[error("failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    /// File is not a valid seed document.
    #[error("invalid seed document: {0}")]
    Json(#[from] serde_json::Error),

    /// An asset references an account that is not in the document.
    #[error("asset {asset} references unknown owner {owner}")]
    UnknownOwner {
        /// Offending asset.
        asset: AssetId,
        /// Missing owner.
        owner: AccountId,
    },
}

/// Seed document contents.
#[derive(Debug, Default, Deserialize)]
pub struct SeedDocument {
    /// Accounts to create.
    #[serde(default)]
    pub accounts: Vec<Account>,
    /// Assets to create.
    #[serde(default)]
    pub assets: Vec<Asset>,
}

// =============================================================================
// Store
// =============================================================================

/// In-memory implementation of [`StorePort`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    accounts: RwLock<HashMap<AccountId, Account>>,
    assets: RwLock<HashMap<AssetId, Asset>>,
    telemetry: RwLock<HashMap<AssetId, Vec<TelemetryEvent>>>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a seed document.
    ///
    /// # Errors
    ///
    /// Returns [`SeedError::UnknownOwner`] if an asset's owner is not among
    /// the seeded accounts.
    pub fn from_seed(seed: SeedDocument) -> Result<Self, SeedError> {
        let store = Self::new();
        for account in seed.accounts {
            store.insert_account(account);
        }
        for asset in seed.assets {
            if !store.accounts.read().contains_key(&asset.owner) {
                return Err(SeedError::UnknownOwner {
                    asset: asset.id,
                    owner: asset.owner,
                });
            }
            store.put_asset(asset);
        }
        Ok(store)
    }

    /// Load a seed document from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`SeedError`] if the file cannot be read or parsed.
    pub fn load_seed(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let bytes = std::fs::read(path)?;
        let seed: SeedDocument = serde_json::from_slice(&bytes)?;
        Self::from_seed(seed)
    }

    /// Insert or replace an account (for test setup and seeding).
    pub fn insert_account(&self, account: Account) {
        self.accounts.write().insert(account.id.clone(), account);
    }

    /// Insert or replace an asset without conflict checking (for test setup
    /// and seeding).
    pub fn put_asset(&self, asset: Asset) {
        self.assets.write().insert(asset.id.clone(), asset);
    }

    /// Number of telemetry records stored for an asset.
    #[must_use]
    pub fn telemetry_count(&self, asset: &AssetId) -> usize {
        self.telemetry.read().get(asset).map_or(0, Vec::len)
    }

    /// Number of telemetry records across every asset.
    #[must_use]
    pub fn total_telemetry_count(&self) -> usize {
        self.telemetry.read().values().map(Vec::len).sum()
    }
}

#[async_trait]
impl StorePort for InMemoryStore {
    async fn find_asset_by_external_id(&self, id: &AssetId) -> Result<Option<Asset>, StoreError> {
        Ok(self.assets.read().get(id).cloned())
    }

    async fn find_account_by_id(&self, id: &AccountId) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.read().get(id).cloned())
    }

    async fn update_selected_asset(
        &self,
        account: &AccountId,
        asset: Option<&AssetId>,
    ) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write();
        let entry = accounts.get_mut(account).ok_or_else(|| StoreError::NotFound {
            message: format!("account {account}"),
        })?;
        entry.selected_asset = asset.cloned();
        drop(accounts);
        Ok(())
    }

    async fn insert_telemetry_event(&self, event: TelemetryEvent) -> Result<(), StoreError> {
        self.telemetry
            .write()
            .entry(event.asset_id.clone())
            .or_default()
            .push(event);
        Ok(())
    }

    async fn find_assets_by_owner(&self, owner: &AccountId) -> Result<Vec<Asset>, StoreError> {
        let mut owned: Vec<Asset> = self
            .assets
            .read()
            .values()
            .filter(|asset| asset.is_owned_by(owner))
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(owned)
    }

    async fn insert_asset(&self, asset: Asset) -> Result<(), StoreError> {
        let mut assets = self.assets.write();
        if assets.contains_key(&asset.id) {
            return Err(StoreError::Conflict {
                message: format!("asset {} already exists", asset.id),
            });
        }
        assets.insert(asset.id.clone(), asset);
        drop(assets);
        Ok(())
    }

    async fn latest_telemetry(
        &self,
        asset: &AssetId,
    ) -> Result<Option<TelemetryEvent>, StoreError> {
        Ok(self
            .telemetry
            .read()
            .get(asset)
            .and_then(|events| events.iter().max_by_key(|event| event.timestamp))
            .cloned())
    }

    async fn telemetry_history(
        &self,
        asset: &AssetId,
        limit: usize,
    ) -> Result<Vec<TelemetryEvent>, StoreError> {
        let mut events = self
            .telemetry
            .read()
            .get(asset)
            .cloned()
            .unwrap_or_default();
        events.reverse();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        events.truncate(limit);
        Ok(events)
    }

    async fn telemetry_summary(
        &self,
        asset: &AssetId,
    ) -> Result<Option<TelemetrySummary>, StoreError> {
        let telemetry = self.telemetry.read();
        Ok(telemetry
            .get(asset)
            .and_then(|events| TelemetrySummary::compute(asset, events)))
    }
}

// =============================================================================
// Tests
// =============================================================================
