//! Domain Layer - Core telemetry types and business logic.
//!
//! This layer contains the identity, telemetry, topic, and connection
//! registry types with no I/O. All types here are pure Rust with
//! serialization support.

/// Accounts, assets, and their identifiers.
pub mod asset;

/// Live connection and room membership tracking.
pub mod registry;

/// Telemetry payloads, readings, persisted records, and summaries.
pub mod telemetry;

/// MQTT topic parsing.
pub mod topic;
