//! Fanout Broker
//!
//! Room-based pub/sub core between the ingestion pipeline and live
//! WebSocket connections.
//!
//! # Design
//!
//! Each connection owns a bounded `mpsc` outbox drained by its writer task.
//! The broker keeps the sender half keyed by connection ID next to the
//! [`ConnectionRegistry`]. Every send is a non-blocking `try_send`: a slow or
//! dead client loses events, it never stalls ingestion or its neighbours.
//!
//! Room joins are authorized against the store on every attempt. There is
//! no ownership cache, so a transferred asset is enforced on the next join.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use super::ownership::{OwnershipError, OwnershipResolver};
use crate::application::ports::StorePort;
use crate::domain::asset::{AccountId, AssetId};
use crate::domain::registry::{ConnectionId, ConnectionRegistry};
use crate::domain::telemetry::TelemetryReading;
use crate::infrastructure::metrics::{self, DropReason, SubscribeOutcome};

// =============================================================================
// Wire Messages
// =============================================================================

/// Frames a client may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Join an asset room.
    Subscribe {
        /// Room to join.
        asset_id: AssetId,
    },
    /// Leave an asset room.
    Unsubscribe {
        /// Room to leave.
        asset_id: AssetId,
    },
    /// Ask who the connection is authenticated as.
    Whoami {
        /// Opaque correlation value echoed in the reply.
        #[serde(default)]
        ack: Option<serde_json::Value>,
    },
}

/// Events the server pushes to a client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ServerEvent {
    /// Room joined.
    Subscribed {
        /// Room joined.
        asset_id: AssetId,
    },
    /// Room left (or was never joined).
    Unsubscribed {
        /// Room left.
        asset_id: AssetId,
    },
    /// Request failed.
    Error {
        /// Human-readable reason.
        message: String,
    },
    /// Live telemetry reading.
    Telemetry(TelemetryReading),
    /// Reply to a whoami request.
    Whoami(WhoamiReply),
}

/// Reply to a whoami request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WhoamiReply {
    /// Identity of the connection.
    Identity {
        /// Echoed correlation value.
        #[serde(skip_serializing_if = "Option::is_none")]
        ack: Option<serde_json::Value>,
        /// Authenticated account.
        account_id: AccountId,
        /// Account's selected asset.
        selected_asset: Option<AssetId>,
    },
    /// Lookup failed.
    Failure {
        /// Echoed correlation value.
        #[serde(skip_serializing_if = "Option::is_none")]
        ack: Option<serde_json::Value>,
        /// Always `"server error"`.
        error: String,
    },
}

// =============================================================================
// Errors and Reports
// =============================================================================

/// Subscribe rejection. `Display` is the message sent to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubscribeError {
    /// No such asset.
    #[error("asset not found")]
    NotFound,

    /// Asset owned by another account.
    #[error("unauthorized to subscribe to this asset")]
    Unauthorized,

    /// Ownership lookup failed.
    #[error("server error")]
    StoreUnavailable,

    /// The connection was removed while the request was in flight.
    #[error("connection closed")]
    ConnectionClosed,
}

/// Result of a room publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Outboxes the event was queued to.
    pub delivered: usize,
    /// Members whose outbox was full or closed.
    pub dropped: usize,
}

// =============================================================================
// Broker
// =============================================================================

/// Room-based pub/sub over live connections.
pub struct FanoutBroker {
    registry: ConnectionRegistry,
    outboxes: DashMap<ConnectionId, mpsc::Sender<ServerEvent>>,
    resolver: OwnershipResolver,
    store: Arc<dyn StorePort>,
}

impl std::fmt::Debug for FanoutBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutBroker")
            .field("registry", &self.registry)
            .field("outboxes", &self.outboxes.len())
            .finish_non_exhaustive()
    }
}

impl FanoutBroker {
    /// Create a broker backed by `store`.
    #[must_use]
    pub fn new(store: Arc<dyn StorePort>) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            outboxes: DashMap::new(),
            resolver: OwnershipResolver::new(Arc::clone(&store)),
            store,
        }
    }

    /// The underlying connection registry.
    #[must_use]
    pub const fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Register an authenticated connection and its outbox.
    pub fn connect(&self, account: AccountId, outbox: mpsc::Sender<ServerEvent>) -> ConnectionId {
        let id = self.registry.add_connection(account.clone());
        self.outboxes.insert(id, outbox);

        let count = self.registry.stats().connection_count;
        metrics::set_websocket_clients(count);
        info!(connection_id = %id, account_id = %account, clients = count, "Client connected");
        id
    }

    /// Remove a connection from every room and drop its outbox.
    ///
    /// Returns `false` if the connection was already gone.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.outboxes.remove(&id);
        let Some(account) = self.registry.remove_connection(id) else {
            return false;
        };

        let count = self.registry.stats().connection_count;
        metrics::set_websocket_clients(count);
        info!(connection_id = %id, account_id = %account, clients = count, "Client disconnected");
        true
    }

    /// Join `asset`'s room if the connection's account owns it.
    ///
    /// Emits `subscribed` on success or `error` with the rejection reason.
    ///
    /// # Errors
    ///
    /// Returns [`SubscribeError`] describing why the join was refused. Room
    /// membership is unchanged on error.
    pub async fn subscribe(&self, id: ConnectionId, asset: AssetId) -> Result<(), SubscribeError> {
        let result = self.authorize_and_join(id, &asset).await;

        let (event, outcome) = match result {
            Ok(()) => (
                ServerEvent::Subscribed {
                    asset_id: asset.clone(),
                },
                SubscribeOutcome::Joined,
            ),
            Err(e) => {
                let outcome = match e {
                    SubscribeError::NotFound => SubscribeOutcome::NotFound,
                    SubscribeError::Unauthorized => SubscribeOutcome::Unauthorized,
                    SubscribeError::StoreUnavailable | SubscribeError::ConnectionClosed => {
                        SubscribeOutcome::Error
                    }
                };
                (
                    ServerEvent::Error {
                        message: e.to_string(),
                    },
                    outcome,
                )
            }
        };

        metrics::record_subscribe(outcome);
        let _ = self.deliver(id, event);
        result
    }

    async fn authorize_and_join(
        &self,
        id: ConnectionId,
        asset: &AssetId,
    ) -> Result<(), SubscribeError> {
        let account = self
            .registry
            .account_of(id)
            .ok_or(SubscribeError::ConnectionClosed)?;

        let owner = self.resolver.resolve_owner(asset).await.map_err(|e| match e {
            OwnershipError::NotFound(_) => SubscribeError::NotFound,
            OwnershipError::StoreUnavailable(cause) => {
                warn!(connection_id = %id, asset_id = %asset, error = %cause, "Ownership lookup failed");
                SubscribeError::StoreUnavailable
            }
        })?;

        if owner != account {
            warn!(
                connection_id = %id,
                account_id = %account,
                asset_id = %asset,
                "Rejected subscribe to foreign asset"
            );
            return Err(SubscribeError::Unauthorized);
        }

        self.registry
            .join(id, asset.clone())
            .map_err(|_| SubscribeError::ConnectionClosed)?;
        debug!(connection_id = %id, asset_id = %asset, "Joined room");
        Ok(())
    }

    /// Leave `asset`'s room. Always acknowledged with `unsubscribed`.
    ///
    /// Returns whether the connection was a member.
    pub fn unsubscribe(&self, id: ConnectionId, asset: AssetId) -> bool {
        let was_member = self.registry.leave(id, &asset);
        debug!(connection_id = %id, asset_id = %asset, was_member, "Left room");
        let _ = self.deliver(id, ServerEvent::Unsubscribed { asset_id: asset });
        was_member
    }

    /// Join the account's selected asset, if it still owns it.
    ///
    /// Emits `subscribed` on join. Lookup failures are logged and leave the
    /// connection with no rooms.
    pub async fn auto_join(&self, id: ConnectionId, account: &AccountId) -> Option<AssetId> {
        let selected = match self.store.find_account_by_id(account).await {
            Ok(Some(found)) => found.selected_asset?,
            Ok(None) => {
                debug!(connection_id = %id, account_id = %account, "No account record for auto-join");
                return None;
            }
            Err(e) => {
                warn!(connection_id = %id, account_id = %account, error = %e, "Auto-join lookup failed");
                return None;
            }
        };

        match self.resolver.resolve_owner(&selected).await {
            Ok(owner) if &owner == account => {}
            Ok(_) | Err(OwnershipError::NotFound(_)) => {
                debug!(connection_id = %id, asset_id = %selected, "Selected asset no longer owned");
                return None;
            }
            Err(OwnershipError::StoreUnavailable(cause)) => {
                warn!(connection_id = %id, asset_id = %selected, error = %cause, "Auto-join lookup failed");
                return None;
            }
        }

        if self.registry.join(id, selected.clone()).is_err() {
            return None;
        }
        info!(connection_id = %id, asset_id = %selected, "Auto-joined selected asset");
        let _ = self.deliver(
            id,
            ServerEvent::Subscribed {
                asset_id: selected.clone(),
            },
        );
        Some(selected)
    }

    /// Report the connection's account and selected asset.
    ///
    /// The reply is both returned and delivered to the connection.
    pub async fn whoami(&self, id: ConnectionId, ack: Option<serde_json::Value>) -> WhoamiReply {
        let reply = match self.registry.account_of(id) {
            None => WhoamiReply::Failure {
                ack,
                error: "server error".to_string(),
            },
            Some(account) => match self.store.find_account_by_id(&account).await {
                Ok(found) => WhoamiReply::Identity {
                    ack,
                    account_id: account,
                    selected_asset: found.and_then(|a| a.selected_asset),
                },
                Err(e) => {
                    warn!(connection_id = %id, error = %e, "Whoami lookup failed");
                    WhoamiReply::Failure {
                        ack,
                        error: "server error".to_string(),
                    }
                }
            },
        };

        let _ = self.deliver(id, ServerEvent::Whoami(reply.clone()));
        reply
    }

    /// Send an `error` event to a single connection.
    pub fn send_error(&self, id: ConnectionId, message: impl Into<String>) {
        let _ = self.deliver(
            id,
            ServerEvent::Error {
                message: message.into(),
            },
        );
    }

    /// Queue a telemetry reading to every member of `asset`'s room.
    ///
    /// Never blocks. Full or closed outboxes are counted and skipped.
    pub fn publish(&self, asset: &AssetId, reading: &TelemetryReading) -> PublishReport {
        let mut report = PublishReport::default();

        for id in self.registry.members_of(asset) {
            match self.deliver(id, ServerEvent::Telemetry(reading.clone())) {
                Ok(()) => report.delivered += 1,
                Err(reason) => {
                    report.dropped += 1;
                    debug!(connection_id = %id, asset_id = %asset, ?reason, "Dropped telemetry event");
                }
            }
        }

        if report.delivered > 0 {
            metrics::record_events_delivered(report.delivered as u64);
        }
        if report.dropped > 0 {
            warn!(asset_id = %asset, dropped = report.dropped, "Slow or closed clients skipped");
        }
        report
    }

    fn deliver(&self, id: ConnectionId, event: ServerEvent) -> Result<(), DropReason> {
        let reason = match self.outboxes.get(&id) {
            None => DropReason::Closed,
            Some(outbox) => match outbox.try_send(event) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(_)) => DropReason::Full,
                Err(TrySendError::Closed(_)) => DropReason::Closed,
            },
        };
        metrics::record_event_dropped(reason);
        Err(reason)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::application::ports::fakes::UnavailableStore;
    use crate::domain::asset::{Account, Asset};
    use crate::domain::telemetry::BehaviorStatus;
    use crate::infrastructure::persistence::InMemoryStore;

    fn acct(name: &str) -> AccountId {
        AccountId::new(name)
    }

    fn rig(name: &str) -> AssetId {
        AssetId::new(name)
    }

    fn reading(asset: &str) -> TelemetryReading {
        TelemetryReading {
            asset_id: rig(asset),
            speed: 72.0,
            behavior_status: BehaviorStatus::Good,
            engine_rpm: 2400.0,
            timestamp: Utc::now(),
        }
    }

    /// Store with acct-a owning rig-7 (selected) and acct-b owning rig-8.
    fn seeded_store() -> Arc<InMemoryStore> {
        let store = InMemoryStore::new();
        store.insert_account(
            Account::new(acct("acct-a"), "a@example.com").with_selected_asset(rig("rig-7")),
        );
        store.insert_account(Account::new(acct("acct-b"), "b@example.com"));
        store.put_asset(Asset::new(rig("rig-7"), acct("acct-a")));
        store.put_asset(Asset::new(rig("rig-8"), acct("acct-b")));
        Arc::new(store)
    }

    fn connect(
        broker: &FanoutBroker,
        account: &str,
    ) -> (ConnectionId, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(16);
        (broker.connect(acct(account), tx), rx)
    }

    #[tokio::test]
    async fn subscribe_owned_asset_joins_and_acks() {
        let broker = FanoutBroker::new(seeded_store());
        let (conn, mut rx) = connect(&broker, "acct-a");

        broker.subscribe(conn, rig("rig-7")).await.unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            ServerEvent::Subscribed {
                asset_id: rig("rig-7")
            }
        );
        assert!(broker.registry().members_of(&rig("rig-7")).contains(&conn));
    }

    #[tokio::test]
    async fn subscribe_foreign_asset_is_unauthorized() {
        let broker = FanoutBroker::new(seeded_store());
        let (conn, mut rx) = connect(&broker, "acct-b");

        let err = broker.subscribe(conn, rig("rig-7")).await.unwrap_err();

        assert_eq!(err, SubscribeError::Unauthorized);
        assert_eq!(
            rx.try_recv().unwrap(),
            ServerEvent::Error {
                message: "unauthorized to subscribe to this asset".to_string()
            }
        );
        assert!(broker.registry().rooms_of(conn).is_empty());
    }

    #[tokio::test]
    async fn subscribe_unknown_asset_is_not_found() {
        let broker = FanoutBroker::new(seeded_store());
        let (conn, mut rx) = connect(&broker, "acct-a");

        let err = broker.subscribe(conn, rig("unknown-9")).await.unwrap_err();

        assert_eq!(err, SubscribeError::NotFound);
        assert_eq!(
            rx.try_recv().unwrap(),
            ServerEvent::Error {
                message: "asset not found".to_string()
            }
        );
    }

    #[tokio::test]
    async fn subscribe_with_store_down_reports_server_error() {
        let broker = FanoutBroker::new(Arc::new(UnavailableStore));
        let (conn, mut rx) = connect(&broker, "acct-a");

        let err = broker.subscribe(conn, rig("rig-7")).await.unwrap_err();

        assert_eq!(err, SubscribeError::StoreUnavailable);
        assert_eq!(
            rx.try_recv().unwrap(),
            ServerEvent::Error {
                message: "server error".to_string()
            }
        );
        assert!(broker.registry().rooms_of(conn).is_empty());
    }

    #[tokio::test]
    async fn subscribe_after_disconnect_fails() {
        let broker = FanoutBroker::new(seeded_store());
        let (conn, _rx) = connect(&broker, "acct-a");
        broker.disconnect(conn);

        assert_eq!(
            broker.subscribe(conn, rig("rig-7")).await,
            Err(SubscribeError::ConnectionClosed)
        );
        assert!(broker.registry().members_of(&rig("rig-7")).is_empty());
    }

    #[tokio::test]
    async fn repeated_subscribe_does_not_duplicate_delivery() {
        let broker = FanoutBroker::new(seeded_store());
        let (conn, mut rx) = connect(&broker, "acct-a");

        broker.subscribe(conn, rig("rig-7")).await.unwrap();
        broker.subscribe(conn, rig("rig-7")).await.unwrap();
        while rx.try_recv().is_ok() {}

        let report = broker.publish(&rig("rig-7"), &reading("rig-7"));

        assert_eq!(report.delivered, 1);
        assert!(matches!(rx.try_recv(), Ok(ServerEvent::Telemetry(_))));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribe_always_acks() {
        let broker = FanoutBroker::new(seeded_store());
        let (conn, mut rx) = connect(&broker, "acct-a");

        assert!(!broker.unsubscribe(conn, rig("rig-8")));
        assert_eq!(
            rx.try_recv().unwrap(),
            ServerEvent::Unsubscribed {
                asset_id: rig("rig-8")
            }
        );

        broker.subscribe(conn, rig("rig-7")).await.unwrap();
        assert!(broker.unsubscribe(conn, rig("rig-7")));
        assert!(broker.registry().rooms_of(conn).is_empty());
    }

    #[tokio::test]
    async fn publish_reaches_members_only() {
        let broker = FanoutBroker::new(seeded_store());
        let (member_a, mut rx_a) = connect(&broker, "acct-a");
        let (member_b, mut rx_b) = connect(&broker, "acct-a");
        let (_outsider, mut rx_out) = connect(&broker, "acct-b");
        broker.subscribe(member_a, rig("rig-7")).await.unwrap();
        broker.subscribe(member_b, rig("rig-7")).await.unwrap();
        rx_a.try_recv().unwrap();
        rx_b.try_recv().unwrap();

        let report = broker.publish(&rig("rig-7"), &reading("rig-7"));

        assert_eq!(
            report,
            PublishReport {
                delivered: 2,
                dropped: 0
            }
        );
        assert!(
            matches!(rx_a.try_recv(), Ok(ServerEvent::Telemetry(r)) if r.asset_id == rig("rig-7"))
        );
        assert!(matches!(rx_b.try_recv(), Ok(ServerEvent::Telemetry(_))));
        assert!(rx_out.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_to_empty_room_is_noop() {
        let broker = FanoutBroker::new(seeded_store());
        assert_eq!(
            broker.publish(&rig("unknown-9"), &reading("unknown-9")),
            PublishReport::default()
        );
    }

    #[tokio::test]
    async fn disconnected_connection_is_unreachable() {
        let broker = FanoutBroker::new(seeded_store());
        let (conn, mut rx) = connect(&broker, "acct-a");
        broker.subscribe(conn, rig("rig-7")).await.unwrap();
        rx.try_recv().unwrap();

        assert!(broker.disconnect(conn));
        assert!(!broker.disconnect(conn));

        let report = broker.publish(&rig("rig-7"), &reading("rig-7"));
        assert_eq!(report, PublishReport::default());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn full_outbox_drops_without_blocking() {
        let broker = FanoutBroker::new(seeded_store());
        let (tx, mut rx) = mpsc::channel(1);
        let conn = broker.connect(acct("acct-a"), tx);
        broker.subscribe(conn, rig("rig-7")).await.unwrap();

        // outbox now holds the `subscribed` ack
        let report = broker.publish(&rig("rig-7"), &reading("rig-7"));

        assert_eq!(report.dropped, 1);
        assert!(matches!(rx.try_recv(), Ok(ServerEvent::Subscribed { .. })));
    }

    #[tokio::test]
    async fn publish_preserves_order() {
        let broker = FanoutBroker::new(seeded_store());
        let (conn, mut rx) = connect(&broker, "acct-a");
        broker.subscribe(conn, rig("rig-7")).await.unwrap();
        rx.try_recv().unwrap();

        for speed in [1.0, 2.0, 3.0] {
            let mut r = reading("rig-7");
            r.speed = speed;
            broker.publish(&rig("rig-7"), &r);
        }

        let mut speeds = vec![];
        while let Ok(ServerEvent::Telemetry(r)) = rx.try_recv() {
            speeds.push(r.speed);
        }
        assert_eq!(speeds, vec![1.0, 2.0, 3.0]);
    }

    #[tokio::test]
    async fn auto_join_selected_owned_asset() {
        let broker = FanoutBroker::new(seeded_store());
        let (conn, mut rx) = connect(&broker, "acct-a");

        let joined = broker.auto_join(conn, &acct("acct-a")).await;

        assert_eq!(joined, Some(rig("rig-7")));
        assert_eq!(
            rx.try_recv().unwrap(),
            ServerEvent::Subscribed {
                asset_id: rig("rig-7")
            }
        );
    }

    #[tokio::test]
    async fn auto_join_skips_when_nothing_selected_or_not_owned() {
        let store = seeded_store();
        store.insert_account(
            Account::new(acct("acct-b"), "b@example.com").with_selected_asset(rig("rig-7")),
        );
        let broker = FanoutBroker::new(store);
        let (conn, mut rx) = connect(&broker, "acct-b");

        assert_eq!(broker.auto_join(conn, &acct("acct-b")).await, None);
        assert!(rx.try_recv().is_err());
        assert!(broker.registry().rooms_of(conn).is_empty());

        let (ghost, _rx) = connect(&broker, "ghost");
        assert_eq!(broker.auto_join(ghost, &acct("ghost")).await, None);
    }

    #[tokio::test]
    async fn whoami_reports_identity() {
        let broker = FanoutBroker::new(seeded_store());
        let (conn, mut rx) = connect(&broker, "acct-a");

        let reply = broker.whoami(conn, Some(serde_json::json!(3))).await;

        let expected = WhoamiReply::Identity {
            ack: Some(serde_json::json!(3)),
            account_id: acct("acct-a"),
            selected_asset: Some(rig("rig-7")),
        };
        assert_eq!(reply, expected);
        assert_eq!(rx.try_recv().unwrap(), ServerEvent::Whoami(expected));
    }

    #[tokio::test]
    async fn whoami_with_store_down_is_server_error() {
        let broker = FanoutBroker::new(Arc::new(UnavailableStore));
        let (conn, _rx) = connect(&broker, "acct-a");

        let reply = broker.whoami(conn, None).await;

        assert_eq!(
            reply,
            WhoamiReply::Failure {
                ack: None,
                error: "server error".to_string()
            }
        );
    }

    #[test]
    fn server_events_serialize_to_wire_format() {
        let subscribed = serde_json::to_value(ServerEvent::Subscribed {
            asset_id: rig("rig-7"),
        })
        .unwrap();
        assert_eq!(
            subscribed,
            serde_json::json!({"event": "subscribed", "data": {"asset_id": "rig-7"}})
        );

        let error = serde_json::to_value(ServerEvent::Error {
            message: "asset not found".to_string(),
        })
        .unwrap();
        assert_eq!(
            error,
            serde_json::json!({"event": "error", "data": {"message": "asset not found"}})
        );

        let whoami = serde_json::to_value(ServerEvent::Whoami(WhoamiReply::Failure {
            ack: Some(serde_json::json!(1)),
            error: "server error".to_string(),
        }))
        .unwrap();
        assert_eq!(
            whoami,
            serde_json::json!({"event": "whoami", "data": {"ack": 1, "error": "server error"}})
        );

        let telemetry = serde_json::to_value(ServerEvent::Telemetry(reading("rig-7"))).unwrap();
        assert_eq!(telemetry["event"], "telemetry");
        assert_eq!(telemetry["data"]["asset_id"], "rig-7");
        assert_eq!(telemetry["data"]["behavior_status"], "good");
    }

    #[test]
    fn client_messages_parse_from_wire_format() {
        let subscribe: ClientMessage =
            serde_json::from_str(r#"{"event":"subscribe","asset_id":"rig-7"}"#).unwrap();
        assert_eq!(
            subscribe,
            ClientMessage::Subscribe {
                asset_id: rig("rig-7")
            }
        );

        let whoami: ClientMessage = serde_json::from_str(r#"{"event":"whoami"}"#).unwrap();
        assert_eq!(whoami, ClientMessage::Whoami { ack: None });

        assert!(serde_json::from_str::<ClientMessage>(r#"{"event":"dance"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>(r#"{"event":"subscribe"}"#).is_err());
    }
}
