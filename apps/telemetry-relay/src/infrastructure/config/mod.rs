//! Configuration Module
//!
//! Configuration loading for the relay service.

mod settings;

pub use settings::{
    BrokerSettings, ConfigError, JwtSecret, MqttCredentials, ReconnectSettings, RelayConfig,
    ServerSettings, SessionSettings, parse_broker_url,
};
