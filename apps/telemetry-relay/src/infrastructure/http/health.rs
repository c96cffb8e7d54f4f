//! Health Check and Metrics Endpoints
//!
//! - `GET /health` - JSON status with bus state and connection counts
//! - `GET /healthz` - liveness probe (simple OK)
//! - `GET /readyz` - readiness probe, ready iff the MQTT session is up
//! - `GET /metrics` - Prometheus metrics in text format

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::AppState;
use crate::domain::registry::RegistryStats;
use crate::infrastructure::metrics::get_metrics_handle;
use crate::infrastructure::mqtt::{BusConnectionState, BusStatus};

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: HealthStatus,
    /// Relay version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// MQTT session status.
    pub bus: BusStatus,
    /// Live connection and room counts.
    pub connections: RegistryStats,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Bus connected.
    Healthy,
    /// Bus connecting or reconnecting; WebSocket and REST still served.
    Degraded,
    /// Bus stopped.
    Unhealthy,
}

pub(super) async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

pub(super) async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub(super) async fn readiness_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.bus.is_connected() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

pub(super) async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                handle.render(),
            )
        },
    )
}

fn build_health_response(state: &AppState) -> HealthResponse {
    let bus = state.bus.snapshot();
    HealthResponse {
        status: determine_health_status(bus.state),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        bus,
        connections: state.broker.registry().stats(),
    }
}

const fn determine_health_status(bus: BusConnectionState) -> HealthStatus {
    match bus {
        BusConnectionState::Connected => HealthStatus::Healthy,
        BusConnectionState::Connecting | BusConnectionState::Reconnecting => {
            HealthStatus::Degraded
        }
        BusConnectionState::Disconnected => HealthStatus::Unhealthy,
    }
}
