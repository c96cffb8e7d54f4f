//! MQTT Message Bus Adapter
//!
//! Connects to the broker, subscribes to asset telemetry topics, and feeds
//! inbound publishes into the ingestion pipeline.
//!
//! # Components
//!
//! - [`MqttBusClient`]: session loop with reconnect and resubscribe
//! - [`BusState`]: shared connection state for health reporting
//! - [`ReconnectPolicy`]: exponential backoff between connection attempts

mod client;
mod reconnect;
mod state;

pub use client::{BusClientError, MqttBusClient, mqtt_options};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use state::{BusConnectionState, BusState, BusStatus};
