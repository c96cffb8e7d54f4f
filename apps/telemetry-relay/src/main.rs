//! Telemetry Relay Binary
//!
//! Starts the MQTT ingestion pipeline and the WebSocket/REST server.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin telemetry-relay
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `JWT_SECRET`: HS256 session token secret
//! - `MQTT_BROKER`: Broker address, `mqtt://host:port` or `host:port`
//!
//! ## Optional
//! - `MQTT_TOPIC_NAMESPACE`: Topic namespace (default: devices)
//! - `MQTT_CLIENT_ID`, `MQTT_USERNAME`, `MQTT_PASSWORD`
//! - `RELAY_HTTP_PORT`: HTTP/WebSocket port (default: 4000)
//! - `RELAY_SEED_FILE`: JSON seed for the in-memory store
//! - `RELAY_SHUTDOWN_TIMEOUT_SECS`: Wait for in-flight writes (default: 10)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `RUST_LOG`: Log filter (default: `telemetry_relay=info`)

use std::sync::Arc;

use telemetry_relay::application::ports::StorePort;
use telemetry_relay::application::services::{BusMessage, FanoutBroker, IngestionPipeline};
use telemetry_relay::infrastructure::auth::SessionAuthenticator;
use telemetry_relay::infrastructure::http::{AppState, HttpServer};
use telemetry_relay::infrastructure::mqtt::{BusState, MqttBusClient, ReconnectConfig};
use telemetry_relay::infrastructure::observability;
use telemetry_relay::infrastructure::persistence::InMemoryStore;
use telemetry_relay::{RelayConfig, init_metrics};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_dotenv();

    let _telemetry_guard = observability::init()?;

    tracing::info!("Starting Telemetry Relay");

    if let Err(e) = init_metrics() {
        tracing::warn!(error = %e, "Prometheus recorder not installed");
    }

    let config = RelayConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let store: Arc<dyn StorePort> = match &config.seed_file {
        Some(path) => {
            let store = InMemoryStore::load_seed(path)?;
            tracing::info!(path = %path.display(), "Store seeded");
            Arc::new(store)
        }
        None => Arc::new(InMemoryStore::new()),
    };

    let broker = Arc::new(FanoutBroker::new(Arc::clone(&store)));
    let pipeline = Arc::new(IngestionPipeline::new(
        config.broker.topic_namespace.clone(),
        Arc::clone(&broker),
        Arc::clone(&store),
    ));

    // Bus client -> ingestion pipeline
    let (bus_tx, bus_rx) = mpsc::channel::<BusMessage>(config.broker.channel_capacity);
    let bus_state = Arc::new(BusState::new());
    let bus_client = MqttBusClient::new(
        config.broker.clone(),
        ReconnectConfig::from_settings(&config.reconnect),
        Arc::clone(&bus_state),
        bus_tx,
        shutdown_token.clone(),
    );

    let ingestion_pipeline = Arc::clone(&pipeline);
    let ingestion_cancel = shutdown_token.clone();
    let ingestion = tokio::spawn(async move {
        ingestion_pipeline.run(bus_rx, ingestion_cancel).await;
    });

    let bus = tokio::spawn(bus_client.run());

    // HTTP server
    let authenticator = SessionAuthenticator::new(&config.session.jwt_secret, config.session.token_ttl);
    let app_state = Arc::new(
        AppState::new(
            Arc::clone(&broker),
            Arc::clone(&store),
            authenticator,
            Arc::clone(&bus_state),
            &config.server,
        )
        .with_shutdown(shutdown_token.clone()),
    );
    let http_server = HttpServer::new(config.server.http_port, app_state, shutdown_token.clone());
    let http_cancel = shutdown_token.clone();
    let http = tokio::spawn(async move {
        if let Err(e) = http_server.run().await {
            tracing::error!(error = %e, "HTTP server error");
            http_cancel.cancel();
        }
    });

    tracing::info!("Telemetry relay ready");

    await_shutdown(shutdown_token).await;

    for (name, task) in [("bus", bus), ("ingestion", ingestion), ("http", http)] {
        if let Err(e) = task.await {
            tracing::error!(task = name, error = %e, "Task panicked");
        }
    }

    if !pipeline.shutdown(config.shutdown_timeout).await {
        tracing::warn!(
            pending = pipeline.in_flight(),
            "Shutdown timeout reached with writes in flight"
        );
    }

    tracing::info!("Telemetry relay stopped");
    Ok(())
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &RelayConfig) {
    tracing::info!(
        broker_host = %config.broker.host,
        broker_port = config.broker.port,
        namespace = %config.broker.topic_namespace,
        http_port = config.server.http_port,
        "Configuration loaded"
    );
    tracing::debug!(
        client_id = %config.broker.client_id,
        outbox_capacity = config.server.outbox_capacity,
        history_limit = config.server.history_limit,
        shutdown_timeout_secs = config.shutdown_timeout.as_secs(),
        "Relay limits"
    );
}

/// Wait for SIGTERM or SIGINT, or for a task to cancel the token.
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
        () = shutdown_token.cancelled() => {
            tracing::info!("Shutdown requested by a failing task");
        }
    }

    shutdown_token.cancel();
}
