//! Maps a device's raw shadow-property payload into a [`SensorReading`].
//!
//! Parsing never fails. Missing payloads, missing property lists, and
//! properties we can't decode all degrade to absent fields.

use serde_json::Value;

use crate::models::{RawProperty, SensorReading};

// ---

const CODE_TEMPERATURE: &str = "temp_current";
const CODE_HUMIDITY: &str = "humidity_value";
const CODE_BATTERY: &str = "battery_state";

/// Parse a `{ "properties": [...] }` payload.
///
/// The reading timestamp is the latest `time` among all properties, not a
/// per-field timestamp.
pub fn parse(raw: Option<&Value>) -> SensorReading {
    // ---
    let mut reading = SensorReading::default();

    let Some(properties) = raw
        .and_then(|r| r.get("properties"))
        .and_then(Value::as_array)
    else {
        return reading;
    };

    for (i, item) in properties.iter().enumerate() {
        let Some(prop) = RawProperty::from_item(item) else {
            tracing::debug!("Skipping property {}: not an object - Raw item: {}", i, item);
            continue;
        };

        // Every property counts toward the latest time, mapped or not.
        if let Some(time) = prop.time {
            if reading.timestamp.map_or(true, |latest| time > latest) {
                reading.timestamp = Some(time);
            }
        }

        let Some(code) = prop.code.as_deref() else {
            tracing::debug!("Property {} has no code - Raw item: {}", i, item);
            continue;
        };

        match code {
            CODE_TEMPERATURE => reading.temperature = prop.value.as_f64().map(|v| v / 10.0),
            CODE_HUMIDITY => reading.humidity = prop.value.as_f64(),
            CODE_BATTERY => reading.battery = battery_level(&prop.value),
            _ => {}
        }
    }

    reading
}

/// Battery percentage from either a category string or a numeric value.
fn battery_level(value: &Value) -> Option<f64> {
    // ---
    match value {
        Value::String(state) => match state.to_ascii_lowercase().as_str() {
            "high" => Some(100.0),
            "medium" => Some(50.0),
            "low" => Some(20.0),
            "very_low" => Some(10.0),
            _ => None,
        },
        other => other.as_f64(),
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    fn payload(properties: Value) -> Value {
        json!({ "properties": properties })
    }

    #[test]
    fn test_absent_input_yields_empty_reading() {
        // ---
        assert_eq!(parse(None), SensorReading::default());
        assert_eq!(parse(Some(&Value::Null)), SensorReading::default());
        assert_eq!(parse(Some(&json!({}))), SensorReading::default());
        assert_eq!(
            parse(Some(&json!({"properties": "not a list"}))),
            SensorReading::default()
        );
    }

    #[test]
    fn test_temperature_is_scaled_from_decidegrees() {
        // ---
        let raw = payload(json!([{"code": "temp_current", "value": 215, "time": 1}]));
        assert_eq!(parse(Some(&raw)).temperature, Some(21.5));
    }

    #[test]
    fn test_humidity_passes_through() {
        // ---
        let raw = payload(json!([{"code": "humidity_value", "value": 55, "time": 1}]));
        assert_eq!(parse(Some(&raw)).humidity, Some(55.0));
    }

    #[test]
    fn test_battery_categories() {
        // ---
        let cases = [
            (json!("high"), Some(100.0)),
            (json!("Medium"), Some(50.0)),
            (json!("low"), Some(20.0)),
            (json!("VERY_LOW"), Some(10.0)),
            (json!("unknown_x"), None),
            (json!(87), Some(87.0)),
            (json!(null), None),
        ];

        for (value, expected) in cases {
            let raw = payload(json!([{"code": "battery_state", "value": value.clone()}]));
            assert_eq!(parse(Some(&raw)).battery, expected, "battery value {value}");
        }
    }

    #[test]
    fn test_timestamp_is_latest_time() {
        // ---
        let raw = payload(json!([
            {"code": "temp_current", "value": 200, "time": 1_700_000_000_500_i64},
            {"code": "humidity_value", "value": 40, "time": 1_700_000_009_000_i64},
            {"code": "battery_state", "value": "high", "time": 1_700_000_001_000_i64},
        ]));
        assert_eq!(parse(Some(&raw)).timestamp, Some(1_700_000_009_000));
    }

    #[test]
    fn test_no_time_means_no_timestamp() {
        // ---
        let raw = payload(json!([{"code": "temp_current", "value": 200}]));
        let reading = parse(Some(&raw));
        assert_eq!(reading.temperature, Some(20.0));
        assert_eq!(reading.timestamp, None);
    }

    #[test]
    fn test_unknown_codes_and_bad_items_are_ignored() {
        // ---
        let raw = payload(json!([
            {"code": "switch_led", "value": true, "time": 5},
            {"value": 12},
            "garbage",
            {"code": "temp_current", "value": "warm", "time": 3},
        ]));
        let reading = parse(Some(&raw));

        assert_eq!(reading.temperature, None);
        assert_eq!(reading.humidity, None);
        assert_eq!(reading.battery, None);
        // Unknown codes still count toward the freshest observation time.
        assert_eq!(reading.timestamp, Some(5));
    }

    #[test]
    fn test_float_time_is_truncated_and_value_kept() {
        // ---
        let raw = payload(json!([
            {"code": "temp_current", "value": 215, "time": 1_700_000_000_000.0_f64}
        ]));
        let reading = parse(Some(&raw));
        assert_eq!(reading.temperature, Some(21.5));
        assert_eq!(reading.timestamp, Some(1_700_000_000_000));
    }

    #[test]
    fn test_codeless_property_still_counts_toward_time() {
        // ---
        let raw = payload(json!([
            {"code": "humidity_value", "value": 40, "time": 5},
            {"value": 1, "time": 9},
        ]));
        let reading = parse(Some(&raw));
        assert_eq!(reading.humidity, Some(40.0));
        assert_eq!(reading.timestamp, Some(9));
    }
}
