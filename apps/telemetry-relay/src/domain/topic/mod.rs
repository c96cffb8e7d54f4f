//! Topic Parsing
//!
//! Assets publish on `<namespace>/<asset_id>/telemetry`. The relay subscribes
//! with a single-level wildcard and recovers the asset identifier from the
//! concrete topic of each message.

use super::asset::AssetId;

/// Trailing topic level for telemetry messages.
pub const TELEMETRY_SUFFIX: &str = "telemetry";

/// MQTT subscription filter covering every asset in `namespace`.
#[must_use]
pub fn subscription_filter(namespace: &str) -> String {
    format!("{namespace}/+/{TELEMETRY_SUFFIX}")
}

/// Extract the asset identifier from a concrete telemetry topic.
///
/// Returns `None` unless the topic is exactly three levels, the first equals
/// `namespace`, the last is `telemetry`, and the middle is non-empty and free
/// of MQTT wildcard characters.
#[must_use]
pub fn parse_asset_id(namespace: &str, topic: &str) -> Option<AssetId> {
    let mut levels = topic.split('/');

    let ns = levels.next()?;
    let asset = levels.next()?;
    let suffix = levels.next()?;

    if levels.next().is_some() || ns != namespace || suffix != TELEMETRY_SUFFIX {
        return None;
    }
    if asset.is_empty() || asset.contains(['+', '#']) {
        return None;
    }

    Some(AssetId::new(asset))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn filter_uses_namespace() {
        assert_eq!(subscription_filter("devices"), "devices/+/telemetry");
        assert_eq!(subscription_filter("fleet"), "fleet/+/telemetry");
    }

    #[test]
    fn parses_well_formed_topic() {
        assert_eq!(
            parse_asset_id("devices", "devices/rig-7/telemetry"),
            Some(AssetId::new("rig-7"))
        );
    }

    #[test]
    fn rejects_malformed_topics() {
        for topic in [
            "",
            "devices",
            "devices/rig-7",
            "devices//telemetry",
            "devices/rig-7/telemetry/extra",
            "devices/rig-7/status",
            "fleet/rig-7/telemetry",
            "devices/+/telemetry",
            "devices/#/telemetry",
            "devices/rig+7/telemetry",
            "/devices/rig-7/telemetry",
        ] {
            assert_eq!(parse_asset_id("devices", topic), None, "topic {topic:?}");
        }
    }

    proptest! {
        #[test]
        fn well_formed_topics_roundtrip(id in "[A-Za-z0-9_.:-]{1,32}") {
            let topic = format!("devices/{id}/telemetry");
            prop_assert_eq!(parse_asset_id("devices", &topic), Some(AssetId::new(id)));
        }

        #[test]
        fn topics_with_slash_in_asset_never_match(a in "[a-z0-9]{1,8}", b in "[a-z0-9]{1,8}") {
            let topic = format!("devices/{a}/{b}/telemetry");
            prop_assert_eq!(parse_asset_id("devices", &topic), None);
        }

        #[test]
        fn parser_is_total(topic in ".*") {
            let _ = parse_asset_id("devices", &topic);
        }
    }
}
