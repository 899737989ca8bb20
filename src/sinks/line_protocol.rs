//! Line-protocol (ILP) encoding shared by both time-series sinks.
//!
//! `measurement,tag=v,... field=v,... timestamp`

use std::fmt::Write as _;

use crate::models::SensorReading;

// ---

/// Measurement (and QuestDB table) name for every sensor point.
pub const MEASUREMENT: &str = "temp";

/// Escape a tag key or value: backslash, comma, equals, and space.
pub fn escape_tag(value: &str) -> String {
    // ---
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | ',' | '=' | ' ') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// One time-series point before encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    // ---
    pub measurement: &'static str,
    pub tags: Vec<(&'static str, String)>,
    pub fields: Vec<(&'static str, f64)>,
    pub timestamp: i64,
}

impl Point {
    // ---
    /// Build the point for a device reading.
    ///
    /// Returns `None` when the reading has no timestamp or no metrics.
    /// The timestamp is kept at the reading's own precision (epoch ms).
    pub fn from_reading(
        device_id: &str,
        custom_name: Option<&str>,
        reading: &SensorReading,
    ) -> Option<Self> {
        // ---
        let timestamp = reading.timestamp?;
        let fields: Vec<_> = reading.fields().collect();
        if fields.is_empty() {
            return None;
        }

        let mut tags = vec![("device_id", device_id.to_string())];
        if let Some(name) = custom_name.filter(|n| !n.is_empty()) {
            tags.push(("custom_name", name.to_string()));
        }

        Some(Self {
            measurement: MEASUREMENT,
            tags,
            fields,
            timestamp,
        })
    }

    /// Same point with its timestamp rescaled by `factor`.
    pub fn scaled(mut self, factor: i64) -> Self {
        self.timestamp = self.timestamp.saturating_mul(factor);
        self
    }

    /// Encode as a single newline-terminated ILP line.
    pub fn to_line(&self) -> String {
        // ---
        let mut line = String::from(self.measurement);
        for (key, value) in &self.tags {
            let _ = write!(line, ",{}={}", escape_tag(key), escape_tag(value));
        }

        let fields = self
            .fields
            .iter()
            .map(|(key, value)| format!("{}={}", escape_tag(key), value))
            .collect::<Vec<_>>()
            .join(",");

        let _ = writeln!(line, " {fields} {}", self.timestamp);
        line
    }
}

/// A stored row, as read back from another store for bulk loading.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoricalRow {
    // ---
    pub device_id: String,
    pub custom_name: Option<String>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub battery: Option<f64>,
    /// Epoch milliseconds.
    pub timestamp_ms: i64,
}

impl HistoricalRow {
    // ---
    /// Encode as an ILP line, or `None` if the row carries no metrics.
    pub fn to_line(&self) -> Option<String> {
        // ---
        let reading = SensorReading {
            temperature: self.temperature,
            humidity: self.humidity,
            battery: self.battery,
            timestamp: Some(self.timestamp_ms),
        };
        Point::from_reading(&self.device_id, self.custom_name.as_deref(), &reading)
            .map(|point| point.to_line())
    }
}
