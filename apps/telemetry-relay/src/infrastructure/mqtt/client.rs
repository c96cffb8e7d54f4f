//! MQTT Bus Client
//!
//! Holds the broker session, (re)subscribes to `{namespace}/+/telemetry` on
//! every acknowledged connection, and forwards each inbound publish to the
//! ingestion channel as a [`BusMessage`].
//!
//! # Design
//!
//! - `rumqttc` reconnects when its event loop is polled again after an
//!   error; this client owns the delay between those polls
//! - Sessions are clean, so the subscription is re-issued on each `ConnAck`
//! - Forwarding awaits channel capacity, so a slow pipeline pauses polling
//!   instead of dropping messages
//! - Cancellation is observed while polling and while backing off

use std::sync::Arc;

use chrono::Utc;
use rumqttc::{
    AsyncClient, ClientError, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS,
    SubscribeReasonCode,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use super::state::{BusConnectionState, BusState};
use crate::application::services::BusMessage;
use crate::domain::topic::subscription_filter;
use crate::infrastructure::config::BrokerSettings;
use crate::infrastructure::metrics;

/// Bus client errors.
#[derive(Debug, thiserror::Error)]
pub enum BusClientError {
    /// The broker connection failed or dropped.
    #[error("broker connection failed: {0}")]
    Connection(#[from] ConnectionError),

    /// The subscribe request could not be queued.
    #[error("subscribe request failed: {0}")]
    Subscribe(#[from] ClientError),
}

/// How a session ended without a connection error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Cancelled,
    SinkClosed,
}

/// MQTT client feeding the ingestion pipeline.
pub struct MqttBusClient {
    settings: BrokerSettings,
    reconnect: ReconnectConfig,
    state: Arc<BusState>,
    sink: mpsc::Sender<BusMessage>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for MqttBusClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttBusClient")
            .field("host", &self.settings.host)
            .field("port", &self.settings.port)
            .field("client_id", &self.settings.client_id)
            .field("namespace", &self.settings.topic_namespace)
            .finish_non_exhaustive()
    }
}

impl MqttBusClient {
    /// Create a client. Nothing connects until [`run`](Self::run).
    #[must_use]
    pub const fn new(
        settings: BrokerSettings,
        reconnect: ReconnectConfig,
        state: Arc<BusState>,
        sink: mpsc::Sender<BusMessage>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            settings,
            reconnect,
            state,
            sink,
            cancel,
        }
    }

    /// Shared session state.
    #[must_use]
    pub fn state(&self) -> Arc<BusState> {
        Arc::clone(&self.state)
    }

    /// Run until cancelled or the ingestion channel closes.
    ///
    /// Connection failures never end the loop; they are logged, counted, and
    /// retried with backoff.
    pub async fn run(self) {
        let (client, mut eventloop) =
            AsyncClient::new(mqtt_options(&self.settings), self.settings.channel_capacity);
        let mut policy = ReconnectPolicy::new(self.reconnect.clone());

        self.state.set_state(BusConnectionState::Connecting);
        tracing::info!(
            host = %self.settings.host,
            port = self.settings.port,
            filter = %subscription_filter(&self.settings.topic_namespace),
            "Connecting to MQTT broker"
        );

        loop {
            match self.session(&client, &mut eventloop, &mut policy).await {
                Ok(SessionEnd::Cancelled) => {
                    tracing::info!("MQTT client cancelled");
                    if let Err(e) = client.try_disconnect() {
                        tracing::debug!(error = %e, "MQTT disconnect not sent");
                    }
                    break;
                }
                Ok(SessionEnd::SinkClosed) => {
                    tracing::info!("Ingestion channel closed, stopping MQTT client");
                    break;
                }
                Err(e) => {
                    self.state.record_failure(e.to_string());
                    metrics::set_mqtt_connected(false);
                    metrics::record_reconnect();

                    let delay = policy.next_delay();
                    tracing::warn!(
                        error = %e,
                        attempt = policy.attempt_count(),
                        delay_ms = delay.as_millis(),
                        "MQTT connection error, reconnecting"
                    );

                    tokio::select! {
                        () = self.cancel.cancelled() => {
                            tracing::info!("MQTT client cancelled during reconnect delay");
                            break;
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        self.state.set_state(BusConnectionState::Disconnected);
        metrics::set_mqtt_connected(false);
    }

    /// Poll the event loop until cancellation, sink closure, or an error.
    async fn session(
        &self,
        client: &AsyncClient,
        eventloop: &mut EventLoop,
        policy: &mut ReconnectPolicy,
    ) -> Result<SessionEnd, BusClientError> {
        loop {
            let event = tokio::select! {
                () = self.cancel.cancelled() => return Ok(SessionEnd::Cancelled),
                event = eventloop.poll() => event?,
            };

            match event {
                Event::Incoming(Packet::ConnAck(_)) => {
                    policy.reset();
                    self.state.set_state(BusConnectionState::Connected);
                    metrics::set_mqtt_connected(true);

                    let filter = subscription_filter(&self.settings.topic_namespace);
                    client.try_subscribe(filter.clone(), QoS::AtLeastOnce)?;
                    tracing::info!(%filter, "MQTT connected, subscribing");
                }
                Event::Incoming(Packet::SubAck(ack)) => {
                    if ack.return_codes.contains(&SubscribeReasonCode::Failure) {
                        tracing::error!(pkid = ack.pkid, "Broker rejected telemetry subscription");
                    } else {
                        tracing::debug!(pkid = ack.pkid, "Telemetry subscription acknowledged");
                    }
                }
                Event::Incoming(Packet::Publish(publish)) => {
                    self.state.record_message();
                    let message = BusMessage {
                        topic: publish.topic,
                        payload: publish.payload.to_vec(),
                        received_at: Utc::now(),
                    };

                    tokio::select! {
                        () = self.cancel.cancelled() => return Ok(SessionEnd::Cancelled),
                        sent = self.sink.send(message) => {
                            if sent.is_err() {
                                return Ok(SessionEnd::SinkClosed);
                            }
                        }
                    }
                }
                Event::Incoming(Packet::Disconnect) => {
                    tracing::warn!("Broker sent disconnect");
                }
                Event::Incoming(_) | Event::Outgoing(_) => {}
            }
        }
    }
}

/// Build client options from broker settings.
#[must_use]
pub fn mqtt_options(settings: &BrokerSettings) -> MqttOptions {
    let mut options = MqttOptions::new(
        settings.client_id.clone(),
        settings.host.clone(),
        settings.port,
    );
    options.set_keep_alive(settings.keep_alive);
    options.set_clean_session(true);
    if let Some(credentials) = &settings.credentials {
        options.set_credentials(credentials.username(), credentials.password());
    }
    options
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::infrastructure::config::MqttCredentials;

    fn settings(port: u16) -> BrokerSettings {
        BrokerSettings {
            host: "127.0.0.1".to_string(),
            port,
            client_id: "relay-test".to_string(),
            credentials: None,
            keep_alive: Duration::from_secs(15),
            channel_capacity: 16,
            topic_namespace: "fleet".to_string(),
        }
    }

    fn fast_reconnect() -> ReconnectConfig {
        ReconnectConfig {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
            multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }

    #[test]
    fn options_carry_broker_settings() {
        let mut broker = settings(1883);
        broker.credentials = Some(MqttCredentials::new("relay".to_string(), "pw".to_string()));

        let options = mqtt_options(&broker);

        assert_eq!(options.broker_address(), ("127.0.0.1".to_string(), 1883));
        assert_eq!(options.client_id(), "relay-test");
        assert_eq!(options.keep_alive(), Duration::from_secs(15));
        assert!(options.clean_session());
    }

    #[test]
    fn debug_omits_credentials() {
        let mut broker = settings(1883);
        broker.credentials = Some(MqttCredentials::new("relay".to_string(), "hunter2".to_string()));
        let (tx, _rx) = mpsc::channel(1);
        let client = MqttBusClient::new(
            broker,
            fast_reconnect(),
            Arc::new(BusState::new()),
            tx,
            CancellationToken::new(),
        );

        assert!(!format!("{client:?}").contains("hunter2"));
    }

    #[tokio::test]
    async fn unreachable_broker_retries_until_cancelled() {
        // Bind then drop to get a port with nothing listening.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let (tx, _rx) = mpsc::channel(1);
        let state = Arc::new(BusState::new());
        let cancel = CancellationToken::new();
        let client = MqttBusClient::new(
            settings(port),
            fast_reconnect(),
            Arc::clone(&state),
            tx,
            cancel.clone(),
        );

        let handle = tokio::spawn(client.run());
        tokio::time::sleep(Duration::from_millis(200)).await;

        let snapshot = state.snapshot();
        assert!(!snapshot.connected);
        assert!(snapshot.reconnect_attempts >= 1);
        assert!(snapshot.last_error.is_some());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.state(), BusConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn cancelled_before_start_returns_promptly() {
        let (tx, _rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let state = Arc::new(BusState::new());

        let client =
            MqttBusClient::new(settings(1), fast_reconnect(), Arc::clone(&state), tx, cancel);

        tokio::time::timeout(Duration::from_secs(2), client.run())
            .await
            .unwrap();
        assert_eq!(state.state(), BusConnectionState::Disconnected);
    }
}
