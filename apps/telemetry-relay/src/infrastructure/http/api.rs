//! REST API
//!
//! Account routes require `Authorization: Bearer <token>` and answer 401
//! `{"message":"Unauthorized"}` otherwise. Telemetry aggregation routes are
//! read-only and keyed by asset ID.
//!
//! Errors are JSON `{"message": ...}` bodies; store failures surface as 500
//! without detail.

use std::sync::Arc;

use axum::Json;
use axum::extract::{FromRequestParts, Path, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use super::AppState;
use crate::application::ports::StoreError;
use crate::domain::asset::{AccountId, Asset, AssetId};
use crate::domain::telemetry::TelemetryEvent;
use crate::infrastructure::auth::bearer_token;
use crate::infrastructure::metrics;

// =============================================================================
// Errors
// =============================================================================

/// REST error with its HTTP status.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or invalid bearer token.
    #[error("Unauthorized")]
    Unauthorized,

    /// Malformed request.
    #[error("{0}")]
    BadRequest(String),

    /// Caller does not own the resource.
    #[error("{0}")]
    Forbidden(String),

    /// Resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Identifier already taken.
    #[error("{0}")]
    Conflict(String),

    /// Store failure.
    #[error("Internal server error")]
    Store(#[source] StoreError),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { message } => Self::NotFound(message),
            StoreError::Conflict { message } => Self::Conflict(message),
            unavailable @ StoreError::Unavailable { .. } => Self::Store(unavailable),
        }
    }
}

impl ApiError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Store(cause) = &self {
            warn!(error = %cause, "Store failure while serving request");
        }
        (self.status(), Json(json!({ "message": self.to_string() }))).into_response()
    }
}

// =============================================================================
// Authentication
// =============================================================================

/// Account authenticated by bearer token.
#[derive(Debug, Clone)]
pub(super) struct Authenticated(pub AccountId);

impl FromRequestParts<Arc<AppState>> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let account = bearer_token(&parts.headers)
            .ok_or(ApiError::Unauthorized)
            .and_then(|token| {
                state
                    .auth
                    .authenticate(token)
                    .map_err(|_| ApiError::Unauthorized)
            });

        if account.is_err() {
            metrics::record_auth_failure("rest");
        }
        account.map(Self)
    }
}

// =============================================================================
// Request and Response Bodies
// =============================================================================

#[derive(Debug, Deserialize)]
pub(super) struct AssetRequest {
    #[serde(default)]
    asset_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct AccountView {
    id: AccountId,
    email: String,
    assets: Vec<Asset>,
    selected_asset: Option<AssetId>,
}

#[derive(Debug, Serialize)]
struct AssetList {
    assets: Vec<Asset>,
    selected_asset: Option<AssetId>,
}

#[derive(Debug, Serialize)]
struct WhoamiView {
    account_id: AccountId,
    selected_asset: Option<AssetId>,
    assets: Vec<Asset>,
}

fn required_asset_id(body: &AssetRequest) -> Result<&str, ApiError> {
    body.asset_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("asset_id is required".to_string()))
}

// =============================================================================
// Account Routes
// =============================================================================

pub(super) async fn me(
    State(state): State<Arc<AppState>>,
    Authenticated(account): Authenticated,
) -> Result<impl IntoResponse, ApiError> {
    let found = state
        .store
        .find_account_by_id(&account)
        .await?
        .ok_or_else(|| ApiError::NotFound("Account not found".to_string()))?;
    let assets = state.store.find_assets_by_owner(&account).await?;

    Ok(Json(AccountView {
        id: found.id,
        email: found.email,
        assets,
        selected_asset: found.selected_asset,
    }))
}

pub(super) async fn list_assets(
    State(state): State<Arc<AppState>>,
    Authenticated(account): Authenticated,
) -> Result<impl IntoResponse, ApiError> {
    let assets = state.store.find_assets_by_owner(&account).await?;
    let selected_asset = state
        .store
        .find_account_by_id(&account)
        .await?
        .and_then(|a| a.selected_asset);

    Ok(Json(AssetList {
        assets,
        selected_asset,
    }))
}

/// Register an asset and select it. Re-registering an owned asset only
/// re-selects it.
pub(super) async fn register_asset(
    State(state): State<Arc<AppState>>,
    Authenticated(account): Authenticated,
    Json(body): Json<AssetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let asset_id =
        AssetId::parse(required_asset_id(&body)?).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    if let Some(existing) = state.store.find_asset_by_external_id(&asset_id).await? {
        if !existing.is_owned_by(&account) {
            return Err(ApiError::Conflict("asset_id already exists".to_string()));
        }
        state
            .store
            .update_selected_asset(&account, Some(&asset_id))
            .await?;
        return Ok((StatusCode::OK, Json(json!({ "asset": existing }))));
    }

    let asset = Asset::new(asset_id.clone(), account.clone());
    state
        .store
        .insert_asset(asset.clone())
        .await
        .map_err(|e| match e {
            StoreError::Conflict { .. } => {
                ApiError::Conflict("asset_id already exists".to_string())
            }
            other => other.into(),
        })?;
    state
        .store
        .update_selected_asset(&account, Some(&asset_id))
        .await?;

    info!(account_id = %account, asset_id = %asset_id, "Asset registered");
    Ok((StatusCode::CREATED, Json(json!({ "asset": asset }))))
}

pub(super) async fn select_asset(
    State(state): State<Arc<AppState>>,
    Authenticated(account): Authenticated,
    Json(body): Json<AssetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let asset_id = AssetId::new(required_asset_id(&body)?);

    let asset = state
        .store
        .find_asset_by_external_id(&asset_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("asset not found".to_string()))?;
    if !asset.is_owned_by(&account) {
        return Err(ApiError::Forbidden("Not owner of asset".to_string()));
    }

    state
        .store
        .update_selected_asset(&account, Some(&asset_id))
        .await?;
    Ok(Json(json!({ "selected_asset": asset_id })))
}

pub(super) async fn whoami(
    State(state): State<Arc<AppState>>,
    Authenticated(account): Authenticated,
) -> Result<impl IntoResponse, ApiError> {
    let found = state
        .store
        .find_account_by_id(&account)
        .await?
        .ok_or_else(|| ApiError::NotFound("Account not found".to_string()))?;
    let assets = state.store.find_assets_by_owner(&account).await?;

    Ok(Json(WhoamiView {
        account_id: account,
        selected_asset: found.selected_asset,
        assets,
    }))
}

// =============================================================================
// Telemetry Aggregation
// =============================================================================

pub(super) async fn latest_telemetry(
    State(state): State<Arc<AppState>>,
    Path(asset_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let latest = state.store.latest_telemetry(&AssetId::new(asset_id)).await?;
    Ok(Json(latest.map_or_else(|| json!({}), |event| json!(event))))
}

pub(super) async fn telemetry_history(
    State(state): State<Arc<AppState>>,
    Path(asset_id): Path<String>,
) -> Result<Json<Vec<TelemetryEvent>>, ApiError> {
    let history = state
        .store
        .telemetry_history(&AssetId::new(asset_id), state.history_limit)
        .await?;
    Ok(Json(history))
}

pub(super) async fn telemetry_summary(
    State(state): State<Arc<AppState>>,
    Path(asset_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let summary = state.store.telemetry_summary(&AssetId::new(asset_id)).await?;
    Ok(Json(summary.map_or_else(|| json!({}), |s| json!(s))))
}
