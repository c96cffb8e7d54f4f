//! Relay Configuration Settings
//!
//! Configuration types for the telemetry relay, loaded from environment
//! variables.

use std::path::PathBuf;
use std::time::Duration;

/// Default MQTT port when the broker URL omits one.
const DEFAULT_MQTT_PORT: u16 = 1883;

/// Optional MQTT username/password pair.
#[derive(Clone, PartialEq, Eq)]
pub struct MqttCredentials {
    username: String,
    password: String,
}

impl MqttCredentials {
    /// Create new credentials.
    #[must_use]
    pub const fn new(username: String, password: String) -> Self {
        Self { username, password }
    }

    /// Get the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Get the password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for MqttCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// HMAC secret used to sign and verify session tokens.
#[derive(Clone)]
pub struct JwtSecret(String);

impl JwtSecret {
    /// Wrap a secret.
    #[must_use]
    pub const fn new(secret: String) -> Self {
        Self(secret)
    }

    /// Raw secret bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl std::fmt::Debug for JwtSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JwtSecret([REDACTED])")
    }
}

/// MQTT broker connection settings.
#[derive(Debug, Clone)]
pub struct BrokerSettings {
    /// Broker host.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Client identifier presented to the broker.
    pub client_id: String,
    /// Optional login.
    pub credentials: Option<MqttCredentials>,
    /// Keep-alive interval.
    pub keep_alive: Duration,
    /// Request channel capacity of the MQTT client.
    pub channel_capacity: usize,
    /// First topic level; the relay subscribes to `<namespace>/+/telemetry`.
    pub topic_namespace: String,
}

/// Session token settings.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Signing secret.
    pub jwt_secret: JwtSecret,
    /// Lifetime of issued tokens.
    pub token_ttl: Duration,
}

/// Reconnection settings for the MQTT session.
#[derive(Debug, Clone)]
pub struct ReconnectSettings {
    /// Initial reconnection delay.
    pub delay_initial: Duration,
    /// Maximum reconnection delay.
    pub delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub delay_multiplier: f64,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            delay_initial: Duration::from_millis(500),
            delay_max: Duration::from_secs(30),
            delay_multiplier: 2.0,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Port for REST, WebSocket, health, and metrics.
    pub http_port: u16,
    /// Per-connection outbound event queue capacity.
    pub outbox_capacity: usize,
    /// Maximum records returned by the history endpoint.
    pub history_limit: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            http_port: 4000,
            outbox_capacity: 256,
            history_limit: 200,
        }
    }
}

/// Complete relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// MQTT broker settings.
    pub broker: BrokerSettings,
    /// Session token settings.
    pub session: SessionSettings,
    /// HTTP server settings.
    pub server: ServerSettings,
    /// MQTT reconnection settings.
    pub reconnect: ReconnectSettings,
    /// Upper bound on waiting for in-flight writes at shutdown.
    pub shutdown_timeout: Duration,
    /// Optional JSON seed for the in-memory store.
    pub seed_file: Option<PathBuf>,
}

impl RelayConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `JWT_SECRET` or `MQTT_BROKER` is missing or empty,
    /// or if the broker URL cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`RelayConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = &lookup;

        let jwt_secret = required(env, "JWT_SECRET")?;
        let broker_url = required(env, "MQTT_BROKER")?;
        let (host, port) = parse_broker_url(&broker_url)?;

        let credentials = match (env("MQTT_USERNAME"), env("MQTT_PASSWORD")) {
            (Some(username), password) if !username.is_empty() => Some(MqttCredentials::new(
                username,
                password.unwrap_or_default(),
            )),
            _ => None,
        };

        let broker = BrokerSettings {
            host,
            port,
            client_id: env("MQTT_CLIENT_ID")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| format!("telemetry-relay-{}", uuid::Uuid::new_v4().simple())),
            credentials,
            keep_alive: parse_duration_secs(env, "MQTT_KEEP_ALIVE_SECS", Duration::from_secs(30)),
            channel_capacity: parse_usize(env, "MQTT_CHANNEL_CAPACITY", 1024).max(1),
            topic_namespace: env("MQTT_TOPIC_NAMESPACE")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| "devices".to_string()),
        };

        let session = SessionSettings {
            jwt_secret: JwtSecret::new(jwt_secret),
            token_ttl: parse_duration_secs(
                env,
                "RELAY_TOKEN_TTL_SECS",
                Duration::from_secs(12 * 60 * 60),
            ),
        };

        let server = ServerSettings {
            http_port: parse_u16(env, "RELAY_HTTP_PORT", ServerSettings::default().http_port),
            outbox_capacity: parse_usize(
                env,
                "RELAY_OUTBOX_CAPACITY",
                ServerSettings::default().outbox_capacity,
            )
            .max(1),
            history_limit: parse_usize(
                env,
                "RELAY_HISTORY_LIMIT",
                ServerSettings::default().history_limit,
            ),
        };

        let reconnect = ReconnectSettings {
            delay_initial: parse_duration_millis(
                env,
                "RELAY_RECONNECT_DELAY_INITIAL_MS",
                ReconnectSettings::default().delay_initial,
            ),
            delay_max: parse_duration_secs(
                env,
                "RELAY_RECONNECT_DELAY_MAX_SECS",
                ReconnectSettings::default().delay_max,
            ),
            delay_multiplier: parse_f64(
                env,
                "RELAY_RECONNECT_DELAY_MULTIPLIER",
                ReconnectSettings::default().delay_multiplier,
            ),
        };

        Ok(Self {
            broker,
            session,
            server,
            reconnect,
            shutdown_timeout: parse_duration_secs(
                env,
                "RELAY_SHUTDOWN_TIMEOUT_SECS",
                Duration::from_secs(10),
            ),
            seed_file: env("RELAY_SEED_FILE")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// `MQTT_BROKER` is not `[mqtt://|tcp://]host[:port]`.
    #[error("invalid MQTT broker URL {0:?}")]
    InvalidBrokerUrl(String),
}

/// Split a broker URL into host and port.
///
/// Accepts `mqtt://host:port`, `tcp://host:port`, `host:port`, or a bare
/// host (port 1883).
///
/// # Errors
///
/// Returns [`ConfigError::InvalidBrokerUrl`] for an unsupported scheme, an
/// empty host, or a non-numeric port.
pub fn parse_broker_url(url: &str) -> Result<(String, u16), ConfigError> {
    let invalid = || ConfigError::InvalidBrokerUrl(url.to_string());

    let rest = match url.split_once("://") {
        Some(("mqtt" | "tcp", rest)) => rest,
        Some(_) => return Err(invalid()),
        None => url,
    };
    let authority = rest.trim_end_matches('/');

    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => (host, port.parse::<u16>().map_err(|_| invalid())?),
        None => (authority, DEFAULT_MQTT_PORT),
    };

    if host.is_empty() || host.contains('/') {
        return Err(invalid());
    }
    Ok((host.to_string(), port))
}

fn required(env: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String, ConfigError> {
    let value = env(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))?;
    if value.is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }
    Ok(value)
}

fn parse_u16(env: &impl Fn(&str) -> Option<String>, key: &str, default: u16) -> u16 {
    env(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn parse_usize(env: &impl Fn(&str) -> Option<String>, key: &str, default: usize) -> usize {
    env(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn parse_f64(env: &impl Fn(&str) -> Option<String>, key: &str, default: f64) -> f64 {
    env(key)
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 1.0)
        .unwrap_or(default)
}

fn parse_duration_secs(
    env: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Duration {
    env(key)
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_duration_millis(
    env: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Duration {
    env(key)
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
