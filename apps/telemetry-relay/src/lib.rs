#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Telemetry Relay - Asset Telemetry Fanout
//!
//! Subscribes to per-asset telemetry on an MQTT bus, persists each reading
//! against the asset's owner, and pushes it in real time to the WebSocket
//! connections of that owner that joined the asset's room.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Identities, telemetry types, topic parsing, and the
//!   connection registry
//!   - `asset`: Accounts, assets, identifiers
//!   - `telemetry`: Payload decoding, readings, records, summaries
//!   - `topic`: `<namespace>/<asset_id>/telemetry` parsing
//!   - `registry`: Connection and room membership tracking
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Store interface
//!   - `services`: Ingestion pipeline, ownership resolver, fanout broker
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `mqtt`: Bus client with reconnect and resubscribe
//!   - `http`: WebSocket, REST, and health endpoints
//!   - `auth`: Session token validation
//!   - `persistence`: In-memory store
//!   - `config`, `metrics`, `observability`
//!
//! # Data Flow
//!
//! ```text
//!                                       ┌──────────────┐
//!                                  ┌───►│    Store     │
//! MQTT ──► Bus Client ──► Ingestion│    └──────────────┘
//!                         Pipeline │    ┌──────────────┐
//!                                  └───►│ Fanout Broker│──► WS client 1
//!                                       │  (rooms)     │──► WS client N
//!                                       └──────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core telemetry types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::asset::{Account, AccountId, Asset, AssetId};
pub use domain::registry::{ConnectionId, ConnectionRegistry, RegistryStats};
pub use domain::telemetry::{
    BehaviorStatus, TelemetryEvent, TelemetryPayload, TelemetryReading, TelemetrySummary,
};

// Application services
pub use application::ports::{StoreError, StorePort};
pub use application::services::{
    BusMessage, ClientMessage, FanoutBroker, IngestionOutcome, IngestionPipeline, ServerEvent,
    SubscribeError,
};

// Infrastructure
pub use infrastructure::auth::{AuthError, SessionAuthenticator};
pub use infrastructure::config::{ConfigError, RelayConfig};
pub use infrastructure::http::{AppState, HttpServer, ServerError, router};
pub use infrastructure::metrics::init_metrics;
pub use infrastructure::mqtt::{BusState, MqttBusClient};
pub use infrastructure::persistence::InMemoryStore;
