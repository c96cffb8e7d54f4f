//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer, plus the relay's transports.

/// Session token validation and issuance.
pub mod auth;

/// Configuration from environment variables.
pub mod config;

/// Axum router: WebSocket, REST, and health endpoints.
pub mod http;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// MQTT message bus client.
pub mod mqtt;

/// Logging and OpenTelemetry tracing.
pub mod observability;

/// In-memory store adapter.
pub mod persistence;
