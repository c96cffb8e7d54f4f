//! Hand-written port fakes for unit tests.

use async_trait::async_trait;

use super::{StoreError, StorePort};
use crate::domain::asset::{Account, AccountId, Asset, AssetId};
use crate::domain::telemetry::{TelemetryEvent, TelemetrySummary};

/// Store whose every operation fails as unreachable.
pub struct UnavailableStore;

fn refused<T>() -> Result<T, StoreError> {
    Err(StoreError::unavailable("connection refused"))
}

#[async_trait]
impl StorePort for UnavailableStore {
    async fn find_asset_by_external_id(&self, _id: &AssetId) -> Result<Option<Asset>, StoreError> {
        refused()
    }

    async fn find_account_by_id(&self, _id: &AccountId) -> Result<Option<Account>, StoreError> {
        refused()
    }

    async fn update_selected_asset(
        &self,
        _account: &AccountId,
        _asset: Option<&AssetId>,
    ) -> Result<(), StoreError> {
        refused()
    }

    async fn insert_telemetry_event(&self, _event: TelemetryEvent) -> Result<(), StoreError> {
        refused()
    }

    async fn find_assets_by_owner(&self, _owner: &AccountId) -> Result<Vec<Asset>, StoreError> {
        refused()
    }

    async fn insert_asset(&self, _asset: Asset) -> Result<(), StoreError> {
        refused()
    }

    async fn latest_telemetry(
        &self,
        _asset: &AssetId,
    ) -> Result<Option<TelemetryEvent>, StoreError> {
        refused()
    }

    async fn telemetry_history(
        &self,
        _asset: &AssetId,
        _limit: usize,
    ) -> Result<Vec<TelemetryEvent>, StoreError> {
        refused()
    }

    async fn telemetry_summary(
        &self,
        _asset: &AssetId,
    ) -> Result<Option<TelemetrySummary>, StoreError> {
        refused()
    }
}
