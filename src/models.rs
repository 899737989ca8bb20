//! Data models shared by the fetch and write halves of the pipeline.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{json, Value};

// ---

/// A single entry from a device's shadow property list.
///
/// Read field by field rather than through serde so a loosely typed `time`
/// or a missing `code` degrades only that part of the entry.
#[derive(Debug, Clone, PartialEq)]
pub struct RawProperty {
    // ---
    pub code: Option<String>,
    pub value: Value,
    pub time: Option<i64>,
}

impl RawProperty {
    // ---
    /// Read one property list item. Returns `None` unless it is an object.
    pub fn from_item(item: &Value) -> Option<Self> {
        let obj = item.as_object()?;
        Some(Self {
            code: obj.get("code").and_then(Value::as_str).map(str::to_string),
            value: obj.get("value").cloned().unwrap_or(Value::Null),
            time: obj.get("time").and_then(epoch_ms),
        })
    }
}

/// An integer epoch timestamp, truncating a float one.
fn epoch_ms(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|v| v.is_finite() && *v >= i64::MIN as f64 && *v < i64::MAX as f64)
            .map(|v| v.trunc() as i64)
    })
}

/// Normalized reading parsed from a device's property list.
///
/// Every metric is optional: a device that omits a property, or reports it
/// in a shape we don't understand, simply leaves the field empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SensorReading {
    // ---
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub battery: Option<f64>,
    /// Latest property `time` seen, as reported by the cloud (epoch ms).
    pub timestamp: Option<i64>,
}

impl SensorReading {
    // ---
    /// Iterate the present metrics as `(field_name, value)` pairs, in the
    /// fixed column order used by both sinks.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, f64)> {
        [
            ("temperature", self.temperature),
            ("humidity", self.humidity),
            ("battery", self.battery),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
    }

    pub fn has_fields(&self) -> bool {
        self.fields().next().is_some()
    }
}

/// Result of fetching one device. Exactly one per requested device id.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    // ---
    Success {
        device_id: String,
        reading: SensorReading,
        raw: Value,
    },
    Failure {
        device_id: String,
        error: String,
    },
}

impl FetchOutcome {
    // ---
    pub fn device_id(&self) -> &str {
        match self {
            Self::Success { device_id, .. } | Self::Failure { device_id, .. } => device_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The parsed reading, if the fetch succeeded.
    pub fn reading(&self) -> Option<&SensorReading> {
        match self {
            Self::Success { reading, .. } => Some(reading),
            Self::Failure { .. } => None,
        }
    }

    /// Flattened JSON view used for the run summary log.
    pub fn summary(&self) -> Value {
        // ---
        match self {
            Self::Success {
                device_id, reading, ..
            } => json!({
                "deviceId": device_id,
                "success": true,
                "temperature": reading.temperature,
                "humidity": reading.humidity,
                "battery": reading.battery,
                "timestamp": reading.timestamp,
            }),
            Self::Failure { device_id, error } => json!({
                "deviceId": device_id,
                "success": false,
                "error": error,
            }),
        }
    }
}

/// Device id to custom display name, built from the batch lookup.
///
/// Names only decorate written points with a `custom_name` tag; an empty
/// index is always a valid fallback.
#[derive(Debug, Clone, Default)]
pub struct DeviceNameIndex {
    names: HashMap<String, String>,
}

impl DeviceNameIndex {
    // ---
    /// Build the index from the raw `result` array of a batch lookup.
    ///
    /// Entries without a string `id` are ignored; a missing or null
    /// `custom_name` becomes the empty string.
    pub fn from_batch(batch: &[Value]) -> Self {
        // ---
        let names = batch
            .iter()
            .filter_map(|device| {
                let id = device.get("id")?.as_str()?;
                let name = device
                    .get("custom_name")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                Some((id.to_string(), name.to_string()))
            })
            .collect();

        Self { names }
    }

    pub fn insert(&mut self, device_id: impl Into<String>, name: impl Into<String>) {
        self.names.insert(device_id.into(), name.into());
    }

    /// The display name for a device, if one is set and non-empty.
    pub fn custom_name(&self, device_id: &str) -> Option<&str> {
        self.names
            .get(device_id)
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Why a point was not written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoTimestamp,
    NoFields,
    Error,
}

/// Per-device result of a sink write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteOutcome {
    // ---
    pub device_id: String,
    pub written: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<SkipReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WriteOutcome {
    // ---
    pub fn written(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            written: true,
            reason: None,
            error: None,
        }
    }

    pub fn skipped(device_id: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            device_id: device_id.into(),
            written: false,
            reason: Some(reason),
            error: None,
        }
    }

    pub fn failed(device_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            written: false,
            reason: Some(SkipReason::Error),
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn full_reading() -> SensorReading {
        // ---
        SensorReading {
            temperature: Some(21.5),
            humidity: Some(55.0),
            battery: Some(100.0),
            timestamp: Some(1_700_000_000),
        }
    }

    #[test]
    fn test_fields_in_column_order() {
        // ---
        let fields: Vec<_> = full_reading().fields().collect();
        assert_eq!(
            fields,
            vec![("temperature", 21.5), ("humidity", 55.0), ("battery", 100.0)]
        );
    }

    #[test]
    fn test_fields_skip_absent_metrics() {
        // ---
        let reading = SensorReading {
            humidity: None,
            ..full_reading()
        };
        let names: Vec<_> = reading.fields().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["temperature", "battery"]);

        assert!(!SensorReading::default().has_fields());
    }

    #[test]
    fn test_outcome_is_success_xor_failure() {
        // ---
        let ok = FetchOutcome::Success {
            device_id: "dev-1".into(),
            reading: full_reading(),
            raw: Value::Null,
        };
        let failed = FetchOutcome::Failure {
            device_id: "dev-2".into(),
            error: "boom".into(),
        };

        assert!(ok.is_success());
        assert!(ok.reading().is_some());
        assert!(!failed.is_success());
        assert!(failed.reading().is_none());
        assert_eq!(failed.device_id(), "dev-2");
    }

    #[test]
    fn test_summary_shapes() {
        // ---
        let failed = FetchOutcome::Failure {
            device_id: "dev-2".into(),
            error: "boom".into(),
        };
        assert_eq!(
            failed.summary(),
            json!({"deviceId": "dev-2", "success": false, "error": "boom"})
        );

        let ok = FetchOutcome::Success {
            device_id: "dev-1".into(),
            reading: full_reading(),
            raw: Value::Null,
        };
        assert_eq!(ok.summary()["temperature"], json!(21.5));
        assert_eq!(ok.summary()["success"], json!(true));
    }

    #[test]
    fn test_name_index_from_batch() {
        // ---
        let batch = vec![
            json!({"id": "dev-1", "custom_name": "Living Room"}),
            json!({"id": "dev-2", "custom_name": null}),
            json!({"id": "dev-3"}),
            json!({"name": "no id here"}),
        ];
        let index = DeviceNameIndex::from_batch(&batch);

        assert_eq!(index.len(), 3);
        assert_eq!(index.custom_name("dev-1"), Some("Living Room"));
        assert_eq!(index.custom_name("dev-2"), None);
        assert_eq!(index.custom_name("dev-3"), None);
        assert_eq!(index.custom_name("missing"), None);
    }

    #[test]
    fn test_write_outcome_serialization() {
        // ---
        let skipped = WriteOutcome::skipped("dev-1", SkipReason::NoTimestamp);
        assert_eq!(
            serde_json::to_value(&skipped).unwrap(),
            json!({"device_id": "dev-1", "written": false, "reason": "no_timestamp"})
        );

        let written = WriteOutcome::written("dev-2");
        assert_eq!(
            serde_json::to_value(&written).unwrap(),
            json!({"device_id": "dev-2", "written": true})
        );

        let failed = WriteOutcome::failed("dev-3", "HTTP 500: nope");
        assert_eq!(failed.reason, Some(SkipReason::Error));
        assert_eq!(failed.error.as_deref(), Some("HTTP 500: nope"));
    }
}
