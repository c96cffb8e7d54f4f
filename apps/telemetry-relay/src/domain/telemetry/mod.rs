//! Telemetry Types
//!
//! Core domain types for asset telemetry: the payload an asset publishes on
//! the bus, the reading broadcast to live clients, and the record persisted
//! to the store.
//!
//! # Payload Format
//!
//! ```json
//! {"speed": 72, "behavior_status": "good", "engine_rpm": 2400, "timestamp": "2026-01-04T12:00:00Z"}
//! ```
//!
//! `timestamp` is optional and may be an ISO-8601 string or an epoch number.
//! ISO-8601 strings without an offset are read as UTC.
//! Epoch values below `1e11` are read as seconds (fractions allowed), larger
//! values as milliseconds. Unknown fields are ignored.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::asset::{AccountId, AssetId};

/// Epoch values at or above this are milliseconds, below are seconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;

/// ISO-8601 local forms accepted when no offset is given; read as UTC.
const NAIVE_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

// =============================================================================
// Behavior Classification
// =============================================================================

/// Driving behavior classification attached to each reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BehaviorStatus {
    /// Within normal operating envelope.
    Good,
    /// Harsh acceleration, braking, or over-revving detected upstream.
    Bad,
}

// =============================================================================
// Payload Decoding
// =============================================================================

/// Errors decoding a bus payload.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// Not JSON, or a required field is missing or of the wrong type.
    #[error("malformed telemetry payload: {0}")]
    Json(#[from] serde_json::Error),

    /// `timestamp` present but not convertible to a point in time.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

#[derive(Debug, Deserialize)]
struct RawPayload {
    speed: f64,
    behavior_status: BehaviorStatus,
    engine_rpm: f64,
    #[serde(default)]
    timestamp: Option<RawTimestamp>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Epoch(f64),
    Text(String),
}

impl RawTimestamp {
    fn resolve(self) -> Result<DateTime<Utc>, PayloadError> {
        match self {
            Self::Text(text) => {
                parse_iso8601(&text).ok_or_else(|| PayloadError::InvalidTimestamp(text))
            }
            Self::Epoch(value) => {
                let millis = if value.abs() < EPOCH_MILLIS_THRESHOLD {
                    value * 1000.0
                } else {
                    value
                };
                #[allow(clippy::cast_possible_truncation)]
                let millis = millis.round() as i64;
                DateTime::from_timestamp_millis(millis)
                    .ok_or_else(|| PayloadError::InvalidTimestamp(value.to_string()))
            }
        }
    }
}

/// Parse an ISO-8601 instant. Strings without an offset, including bare
/// dates, are taken as UTC.
fn parse_iso8601(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}

/// A decoded telemetry payload, not yet attached to an asset.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryPayload {
    /// Vehicle speed.
    pub speed: f64,
    /// Behavior classification.
    pub behavior_status: BehaviorStatus,
    /// Engine revolutions per minute.
    pub engine_rpm: f64,
    /// Reported time, if the asset supplied one.
    pub timestamp: Option<DateTime<Utc>>,
}

impl TelemetryPayload {
    /// Decode a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError`] for malformed JSON, a missing or mistyped
    /// required field, an unknown behavior classification, or an
    /// unconvertible timestamp.
    pub fn decode(bytes: &[u8]) -> Result<Self, PayloadError> {
        let raw: RawPayload = serde_json::from_slice(bytes)?;
        let timestamp = raw.timestamp.map(RawTimestamp::resolve).transpose()?;

        Ok(Self {
            speed: raw.speed,
            behavior_status: raw.behavior_status,
            engine_rpm: raw.engine_rpm,
            timestamp,
        })
    }

    /// Attach the payload to an asset, defaulting the timestamp to
    /// `received_at` when the asset did not supply one.
    #[must_use]
    pub fn into_reading(self, asset_id: AssetId, received_at: DateTime<Utc>) -> TelemetryReading {
        TelemetryReading {
            asset_id,
            speed: self.speed,
            behavior_status: self.behavior_status,
            engine_rpm: self.engine_rpm,
            timestamp: self.timestamp.unwrap_or(received_at),
        }
    }
}

// =============================================================================
// Reading and Record
// =============================================================================

/// A telemetry reading as delivered to live clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryReading {
    /// Asset the reading came from.
    pub asset_id: AssetId,
    /// Vehicle speed.
    pub speed: f64,
    /// Behavior classification.
    pub behavior_status: BehaviorStatus,
    /// Engine revolutions per minute.
    pub engine_rpm: f64,
    /// Reading time.
    pub timestamp: DateTime<Utc>,
}

/// A persisted telemetry record. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    /// Asset the record belongs to.
    pub asset_id: AssetId,
    /// Owner of the asset at ingestion time.
    pub owner: AccountId,
    /// Vehicle speed.
    pub speed: f64,
    /// Behavior classification.
    pub behavior_status: BehaviorStatus,
    /// Engine revolutions per minute.
    pub engine_rpm: f64,
    /// Reading time.
    pub timestamp: DateTime<Utc>,
}

impl TelemetryEvent {
    /// Build a record from a live reading and its resolved owner.
    #[must_use]
    pub fn from_reading(reading: &TelemetryReading, owner: AccountId) -> Self {
        Self {
            asset_id: reading.asset_id.clone(),
            owner,
            speed: reading.speed,
            behavior_status: reading.behavior_status,
            engine_rpm: reading.engine_rpm,
            timestamp: reading.timestamp,
        }
    }
}

// =============================================================================
// Summary
// =============================================================================

/// Aggregate over all stored records of one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySummary {
    /// Asset the summary covers.
    pub asset_id: AssetId,
    /// Mean speed, rounded to two decimals.
    pub avg_speed: f64,
    /// Maximum speed.
    pub max_speed: f64,
    /// Share of `good` readings as a whole percentage.
    pub behavior_score: u32,
    /// Number of records aggregated.
    pub total_count: usize,
}

impl TelemetrySummary {
    /// Compute the summary over `events`. Returns `None` when empty.
    #[must_use]
    pub fn compute<'a>(
        asset_id: &AssetId,
        events: impl IntoIterator<Item = &'a TelemetryEvent>,
    ) -> Option<Self> {
        let mut total = 0usize;
        let mut good = 0usize;
        let mut speed_sum = 0.0;
        let mut max_speed = f64::NEG_INFINITY;

        for event in events {
            total += 1;
            speed_sum += event.speed;
            max_speed = max_speed.max(event.speed);
            if event.behavior_status == BehaviorStatus::Good {
                good += 1;
            }
        }

        if total == 0 {
            return None;
        }

        #[allow(clippy::cast_precision_loss)]
        let avg = speed_sum / total as f64;
        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let behavior_score = ((good as f64 / total as f64) * 100.0).round() as u32;

        Some(Self {
            asset_id: asset_id.clone(),
            avg_speed: (avg * 100.0).round() / 100.0,
            max_speed,
            behavior_score,
            total_count: total,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn event(speed: f64, status: BehaviorStatus) -> TelemetryEvent {
        TelemetryEvent {
            asset_id: AssetId::new("rig-7"),
            owner: AccountId::new("acct-a"),
            speed,
            behavior_status: status,
            engine_rpm: 2000.0,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn decode_minimal_payload() {
        let payload =
            TelemetryPayload::decode(br#"{"speed":72,"behavior_status":"good","engine_rpm":2400}"#)
                .unwrap();

        assert!((payload.speed - 72.0).abs() < f64::EPSILON);
        assert_eq!(payload.behavior_status, BehaviorStatus::Good);
        assert!((payload.engine_rpm - 2400.0).abs() < f64::EPSILON);
        assert!(payload.timestamp.is_none());
    }

    #[test]
    fn decode_iso_timestamp() {
        let payload = TelemetryPayload::decode(
            br#"{"speed":1.5,"behavior_status":"bad","engine_rpm":900,"timestamp":"2026-01-04T12:00:00Z"}"#,
        )
        .unwrap();

        assert_eq!(
            payload.timestamp,
            Some(Utc.with_ymd_and_hms(2026, 1, 4, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn decode_iso_timestamp_without_offset() {
        let decode = |ts: &str| {
            let body = format!(
                r#"{{"speed":1,"behavior_status":"good","engine_rpm":1,"timestamp":"{ts}"}}"#
            );
            TelemetryPayload::decode(body.as_bytes()).unwrap().timestamp.unwrap()
        };
        let noon = Utc.with_ymd_and_hms(2026, 1, 4, 12, 0, 0).unwrap();

        assert_eq!(decode("2026-01-04T12:00:00"), noon);
        assert_eq!(decode("2026-01-04T12:00"), noon);
        assert_eq!(
            decode("2026-01-04T12:00:00.123456"),
            noon + chrono::Duration::microseconds(123_456)
        );
        assert_eq!(
            decode("2026-01-04"),
            Utc.with_ymd_and_hms(2026, 1, 4, 0, 0, 0).unwrap()
        );
        assert_eq!(decode("2026-01-04T14:00:00+02:00"), noon);
    }

    #[test]
    fn decode_epoch_seconds_with_fraction() {
        let payload = TelemetryPayload::decode(
            br#"{"speed":1,"behavior_status":"good","engine_rpm":1,"timestamp":1634567890.123}"#,
        )
        .unwrap();

        assert_eq!(
            payload.timestamp.unwrap().timestamp_millis(),
            1_634_567_890_123
        );
    }

    #[test]
    fn decode_epoch_millis() {
        let payload = TelemetryPayload::decode(
            br#"{"speed":1,"behavior_status":"good","engine_rpm":1,"timestamp":1634567890123}"#,
        )
        .unwrap();

        assert_eq!(
            payload.timestamp.unwrap().timestamp_millis(),
            1_634_567_890_123
        );
    }

    #[test]
    fn decode_rejects_missing_behavior_status() {
        let err = TelemetryPayload::decode(br#"{"speed":72,"engine_rpm":2400}"#).unwrap_err();
        assert!(matches!(err, PayloadError::Json(_)));
    }

    #[test]
    fn decode_rejects_wrong_types() {
        assert!(
            TelemetryPayload::decode(br#"{"speed":"fast","behavior_status":"good","engine_rpm":1}"#)
                .is_err()
        );
        assert!(
            TelemetryPayload::decode(br#"{"speed":1,"behavior_status":"average","engine_rpm":1}"#)
                .is_err()
        );
        assert!(TelemetryPayload::decode(b"not json").is_err());
        assert!(TelemetryPayload::decode(b"[1,2,3]").is_err());
    }

    #[test]
    fn decode_rejects_garbage_timestamp() {
        let err = TelemetryPayload::decode(
            br#"{"speed":1,"behavior_status":"good","engine_rpm":1,"timestamp":"yesterday"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, PayloadError::InvalidTimestamp(_)));
    }

    #[test]
    fn decode_ignores_unknown_fields_and_null_timestamp() {
        let payload = TelemetryPayload::decode(
            br#"{"speed":1,"behavior_status":"good","engine_rpm":1,"timestamp":null,"rcz":0.4}"#,
        )
        .unwrap();
        assert!(payload.timestamp.is_none());
    }

    #[test]
    fn reading_defaults_timestamp_to_receipt_time() {
        let received = Utc.with_ymd_and_hms(2026, 3, 1, 8, 30, 0).unwrap();
        let payload = TelemetryPayload {
            speed: 10.0,
            behavior_status: BehaviorStatus::Good,
            engine_rpm: 1000.0,
            timestamp: None,
        };

        let reading = payload.into_reading(AssetId::new("rig-7"), received);
        assert_eq!(reading.timestamp, received);
        assert_eq!(reading.asset_id.as_str(), "rig-7");
    }

    #[test]
    fn reading_serializes_with_wire_field_names() {
        let reading = TelemetryReading {
            asset_id: AssetId::new("rig-7"),
            speed: 72.0,
            behavior_status: BehaviorStatus::Good,
            engine_rpm: 2400.0,
            timestamp: Utc.with_ymd_and_hms(2026, 1, 4, 12, 0, 0).unwrap(),
        };
        let value = serde_json::to_value(&reading).unwrap();

        assert_eq!(value["asset_id"], "rig-7");
        assert_eq!(value["behavior_status"], "good");
        assert_eq!(value["engine_rpm"], 2400.0);
    }

    #[test]
    fn summary_of_empty_is_none() {
        assert!(TelemetrySummary::compute(&AssetId::new("rig-7"), &[]).is_none());
    }

    #[test]
    fn summary_aggregates_speed_and_behavior() {
        let events = vec![
            event(60.0, BehaviorStatus::Good),
            event(80.0, BehaviorStatus::Good),
            event(70.333, BehaviorStatus::Bad),
        ];

        let summary = TelemetrySummary::compute(&AssetId::new("rig-7"), &events).unwrap();

        assert!((summary.avg_speed - 70.11).abs() < 1e-9);
        assert!((summary.max_speed - 80.0).abs() < f64::EPSILON);
        assert_eq!(summary.behavior_score, 67);
        assert_eq!(summary.total_count, 3);
    }
}
