//! Ingestion Pipeline
//!
//! Turns raw bus messages into persisted records and live room events.
//!
//! # Design
//!
//! The consumer loop handles one message at a time in arrival order:
//!
//! 1. Parse the topic into an asset ID (discard on no match)
//! 2. Decode the payload (discard on failure)
//! 3. Spawn a tracked task that resolves the owner and persists the record
//! 4. Publish the reading to the asset's room
//!
//! Step 4 is synchronous and non-blocking, so per-asset publish order
//! follows bus order and never waits on the store. Step 3 runs detached;
//! an unknown asset or store failure only skips persistence. Shutdown
//! closes the tracker and waits (bounded) for outstanding writes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use super::broker::{FanoutBroker, PublishReport};
use super::ownership::{OwnershipError, OwnershipResolver};
use crate::application::ports::StorePort;
use crate::domain::asset::AssetId;
use crate::domain::telemetry::{TelemetryEvent, TelemetryPayload, TelemetryReading};
use crate::domain::topic;
use crate::infrastructure::metrics::{self, DiscardReason, PersistSkip};

/// A message received from the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Concrete topic the message was published on.
    pub topic: String,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
    /// Local receipt time.
    pub received_at: DateTime<Utc>,
}

impl BusMessage {
    /// Create a message stamped with the current time.
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            received_at: Utc::now(),
        }
    }
}

/// What happened to a single bus message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestionOutcome {
    /// Decoded and published; persistence is in flight.
    Published {
        /// Asset the reading belongs to.
        asset_id: AssetId,
        /// Fanout result.
        report: PublishReport,
    },
    /// Dropped before publish.
    Discarded(DiscardReason),
}

/// Bus-to-broker ingestion pipeline.
pub struct IngestionPipeline {
    namespace: String,
    broker: Arc<FanoutBroker>,
    resolver: OwnershipResolver,
    store: Arc<dyn StorePort>,
    tracker: TaskTracker,
}

impl std::fmt::Debug for IngestionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionPipeline")
            .field("namespace", &self.namespace)
            .field("in_flight", &self.tracker.len())
            .finish_non_exhaustive()
    }
}

impl IngestionPipeline {
    /// Create a pipeline for topics under `namespace`.
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        broker: Arc<FanoutBroker>,
        store: Arc<dyn StorePort>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            broker,
            resolver: OwnershipResolver::new(Arc::clone(&store)),
            store,
            tracker: TaskTracker::new(),
        }
    }

    /// Process one bus message.
    ///
    /// Must be called from within a Tokio runtime (persistence is spawned).
    pub fn handle(&self, message: BusMessage) -> IngestionOutcome {
        let started = Instant::now();
        metrics::record_message_received();

        let Some(asset_id) = topic::parse_asset_id(&self.namespace, &message.topic) else {
            warn!(topic = %message.topic, "Discarding message on unrecognized topic");
            metrics::record_message_discarded(DiscardReason::MalformedTopic);
            return IngestionOutcome::Discarded(DiscardReason::MalformedTopic);
        };

        let payload = match TelemetryPayload::decode(&message.payload) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(asset_id = %asset_id, error = %e, "Discarding malformed telemetry payload");
                metrics::record_message_discarded(DiscardReason::MalformedPayload);
                return IngestionOutcome::Discarded(DiscardReason::MalformedPayload);
            }
        };

        let reading = payload.into_reading(asset_id.clone(), message.received_at);

        self.tracker.spawn(persist(
            self.resolver.clone(),
            Arc::clone(&self.store),
            reading.clone(),
        ));

        let report = self.broker.publish(&asset_id, &reading);
        metrics::record_processing_duration(started.elapsed());
        debug!(
            asset_id = %asset_id,
            delivered = report.delivered,
            dropped = report.dropped,
            "Published telemetry"
        );

        IngestionOutcome::Published { asset_id, report }
    }

    /// Consume messages until the channel closes or `cancel` fires.
    pub async fn run(&self, mut messages: mpsc::Receiver<BusMessage>, cancel: CancellationToken) {
        info!(namespace = %self.namespace, "Ingestion pipeline started");

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                next = messages.recv() => match next {
                    Some(message) => {
                        self.handle(message);
                    }
                    None => break,
                },
            }
        }

        info!("Ingestion pipeline stopped");
    }

    /// Number of persistence writes still running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Stop accepting new writes and wait for outstanding ones.
    ///
    /// Returns `false` if `timeout` elapsed first.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            info!(pending, "Waiting for in-flight telemetry writes");
        }

        if tokio::time::timeout(timeout, self.tracker.wait()).await.is_ok() {
            true
        } else {
            warn!(
                pending = self.tracker.len(),
                "Timed out waiting for telemetry writes"
            );
            false
        }
    }
}

async fn persist(resolver: OwnershipResolver, store: Arc<dyn StorePort>, reading: TelemetryReading) {
    let owner = match resolver.resolve_owner(&reading.asset_id).await {
        Ok(owner) => owner,
        Err(OwnershipError::NotFound(asset)) => {
            warn!(asset_id = %asset, "Telemetry for unregistered asset, broadcast only");
            metrics::record_persistence_skipped(PersistSkip::UnknownAsset);
            return;
        }
        Err(OwnershipError::StoreUnavailable(cause)) => {
            error!(asset_id = %reading.asset_id, error = %cause, "Owner lookup failed, telemetry not persisted");
            metrics::record_persistence_skipped(PersistSkip::StoreUnavailable);
            return;
        }
    };

    let event = TelemetryEvent::from_reading(&reading, owner);
    match store.insert_telemetry_event(event).await {
        Ok(()) => {
            metrics::record_telemetry_persisted();
            debug!(asset_id = %reading.asset_id, "Persisted telemetry");
        }
        Err(e) => {
            error!(asset_id = %reading.asset_id, error = %e, "Failed to persist telemetry");
            metrics::record_persistence_skipped(PersistSkip::WriteFailed);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::fakes::UnavailableStore;
    use crate::application::services::broker::ServerEvent;
    use crate::domain::asset::{AccountId, Asset};
    use crate::infrastructure::persistence::InMemoryStore;

    const GOOD_PAYLOAD: &[u8] = br#"{"speed":72,"behavior_status":"good","engine_rpm":2400}"#;

    struct Harness {
        store: Arc<InMemoryStore>,
        broker: Arc<FanoutBroker>,
        pipeline: IngestionPipeline,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryStore::new());
        store.put_asset(Asset::new(AssetId::new("rig-7"), AccountId::new("acct-a")));
        let broker = Arc::new(FanoutBroker::new(Arc::clone(&store) as Arc<dyn StorePort>));
        let pipeline = IngestionPipeline::new(
            "devices",
            Arc::clone(&broker),
            Arc::clone(&store) as Arc<dyn StorePort>,
        );
        Harness {
            store,
            broker,
            pipeline,
        }
    }

    #[tokio::test]
    async fn known_asset_is_persisted_with_owner_and_published() {
        let h = harness();
        let (tx, mut rx) = mpsc::channel(8);
        let conn = h.broker.connect(AccountId::new("acct-a"), tx);
        h.broker.subscribe(conn, AssetId::new("rig-7")).await.unwrap();
        rx.try_recv().unwrap();

        let outcome = h
            .pipeline
            .handle(BusMessage::new("devices/rig-7/telemetry", GOOD_PAYLOAD));
        assert!(h.pipeline.shutdown(Duration::from_secs(1)).await);

        assert!(matches!(
            outcome,
            IngestionOutcome::Published { report, .. } if report.delivered == 1
        ));
        match rx.try_recv().unwrap() {
            ServerEvent::Telemetry(reading) => {
                assert_eq!(reading.asset_id, AssetId::new("rig-7"));
                assert!((reading.speed - 72.0).abs() < f64::EPSILON);
            }
            other => panic!("expected telemetry, got {other:?}"),
        }

        let latest = h
            .store
            .latest_telemetry(&AssetId::new("rig-7"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.owner, AccountId::new("acct-a"));
    }

    #[tokio::test]
    async fn unknown_asset_is_broadcast_only() {
        let h = harness();

        let outcome = h
            .pipeline
            .handle(BusMessage::new("devices/unknown-9/telemetry", GOOD_PAYLOAD));
        assert!(h.pipeline.shutdown(Duration::from_secs(1)).await);

        assert_eq!(
            outcome,
            IngestionOutcome::Published {
                asset_id: AssetId::new("unknown-9"),
                report: PublishReport::default(),
            }
        );
        assert_eq!(h.store.total_telemetry_count(), 0);
    }

    #[tokio::test]
    async fn missing_behavior_status_is_discarded() {
        let h = harness();
        let (tx, mut rx) = mpsc::channel(8);
        let conn = h.broker.connect(AccountId::new("acct-a"), tx);
        h.broker.subscribe(conn, AssetId::new("rig-7")).await.unwrap();
        rx.try_recv().unwrap();

        let outcome = h.pipeline.handle(BusMessage::new(
            "devices/rig-7/telemetry",
            br#"{"speed":72,"engine_rpm":2400}"#.as_slice(),
        ));
        assert!(h.pipeline.shutdown(Duration::from_secs(1)).await);

        assert_eq!(
            outcome,
            IngestionOutcome::Discarded(DiscardReason::MalformedPayload)
        );
        assert!(rx.try_recv().is_err());
        assert_eq!(h.store.total_telemetry_count(), 0);
    }

    #[tokio::test]
    async fn bad_topic_is_discarded() {
        let h = harness();

        let outcome = h
            .pipeline
            .handle(BusMessage::new("devices/rig-7/status", GOOD_PAYLOAD));

        assert_eq!(
            outcome,
            IngestionOutcome::Discarded(DiscardReason::MalformedTopic)
        );
    }

    #[tokio::test]
    async fn store_failure_still_publishes() {
        let store: Arc<dyn StorePort> = Arc::new(UnavailableStore);
        let broker = Arc::new(FanoutBroker::new(Arc::clone(&store)));
        let pipeline = IngestionPipeline::new("devices", Arc::clone(&broker), store);

        let outcome = pipeline.handle(BusMessage::new("devices/rig-7/telemetry", GOOD_PAYLOAD));
        assert!(pipeline.shutdown(Duration::from_secs(1)).await);

        assert!(matches!(outcome, IngestionOutcome::Published { .. }));
    }

    #[tokio::test]
    async fn run_consumes_until_channel_closes() {
        let h = harness();
        let (tx, rx) = mpsc::channel(8);
        for speed in [10, 20, 30] {
            let payload = format!(r#"{{"speed":{speed},"behavior_status":"bad","engine_rpm":1}}"#);
            tx.send(BusMessage::new("devices/rig-7/telemetry", payload))
                .await
                .unwrap();
        }
        drop(tx);

        h.pipeline.run(rx, CancellationToken::new()).await;
        assert!(h.pipeline.shutdown(Duration::from_secs(1)).await);

        assert_eq!(h.store.telemetry_count(&AssetId::new("rig-7")), 3);
        assert_eq!(h.pipeline.in_flight(), 0);
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let h = harness();
        let (_tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), h.pipeline.run(rx, cancel))
            .await
            .unwrap();
    }
}
