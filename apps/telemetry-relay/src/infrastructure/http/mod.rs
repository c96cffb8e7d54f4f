//! HTTP Surface
//!
//! One axum router serves the WebSocket endpoint, the REST API, and the
//! operational endpoints.
//!
//! # Routes
//!
//! - `GET /ws` - WebSocket upgrade, token required at the handshake
//! - `GET /api/me`, `GET|POST /api/assets`, `POST /api/select-asset`,
//!   `GET /api/whoami` - account routes, bearer token required
//! - `GET /api/telemetry/{asset_id}/latest|history|summary` - read-only
//!   aggregation
//! - `GET /health`, `/healthz`, `/readyz`, `/metrics` - operations

mod api;
mod health;
mod ws;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use api::ApiError;
pub use health::{HealthResponse, HealthStatus};

use crate::application::ports::StorePort;
use crate::application::services::FanoutBroker;
use crate::infrastructure::auth::SessionAuthenticator;
use crate::infrastructure::config::ServerSettings;
use crate::infrastructure::mqtt::BusState;

// =============================================================================
// Shared State
// =============================================================================

/// State shared by every handler.
pub struct AppState {
    broker: Arc<FanoutBroker>,
    store: Arc<dyn StorePort>,
    auth: SessionAuthenticator,
    bus: Arc<BusState>,
    outbox_capacity: usize,
    history_limit: usize,
    version: String,
    started_at: Instant,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("broker", &self.broker)
            .field("outbox_capacity", &self.outbox_capacity)
            .field("history_limit", &self.history_limit)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Create handler state.
    #[must_use]
    pub fn new(
        broker: Arc<FanoutBroker>,
        store: Arc<dyn StorePort>,
        auth: SessionAuthenticator,
        bus: Arc<BusState>,
        settings: &ServerSettings,
    ) -> Self {
        Self {
            broker,
            store,
            auth,
            bus,
            outbox_capacity: settings.outbox_capacity.max(1),
            history_limit: settings.history_limit,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Instant::now(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Close live WebSocket connections when `token` is cancelled.
    #[must_use]
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }
}

/// Build the relay's router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/api/me", get(api::me))
        .route("/api/assets", get(api::list_assets).post(api::register_asset))
        .route("/api/select-asset", post(api::select_asset))
        .route("/api/whoami", get(api::whoami))
        .route("/api/telemetry/{asset_id}/latest", get(api::latest_telemetry))
        .route("/api/telemetry/{asset_id}/history", get(api::telemetry_history))
        .route("/api/telemetry/{asset_id}/summary", get(api::telemetry_summary))
        .route("/health", get(health::health_handler))
        .route("/healthz", get(health::liveness_handler))
        .route("/readyz", get(health::readiness_handler))
        .route("/metrics", get(health::metrics_handler))
        .with_state(state)
}

// =============================================================================
// Server
// =============================================================================

/// HTTP server for the relay.
pub struct HttpServer {
    port: u16,
    state: Arc<AppState>,
    cancel: CancellationToken,
}

impl HttpServer {
    /// Create a new server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<AppState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Bind and serve until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `ServerError` if binding fails or the server stops with a
    /// fatal error.
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindFailed(self.port, e.to_string()))?;

        serve(listener, self.state, self.cancel).await
    }
}

/// Serve on an already-bound listener until cancelled.
///
/// # Errors
///
/// Returns `ServerError::ServerFailed` if the server stops with a fatal
/// error.
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    cancel: CancellationToken,
) -> Result<(), ServerError> {
    let local = listener.local_addr().ok();
    tracing::info!(addr = ?local, "HTTP server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| ServerError::ServerFailed(e.to_string()))?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

/// HTTP server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}
