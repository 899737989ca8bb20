//! Time-series sinks.
//!
//! Each backend implements [`TimeSeriesSink`]. The active set is assembled
//! once at startup by [`build_sinks`], and the orchestrator only ever sees
//! the trait.

use async_trait::async_trait;

use crate::config::{Config, SinkKind};
use crate::error::Result;
use crate::models::{DeviceNameIndex, FetchOutcome, SkipReason, WriteOutcome};

mod influx;
pub mod line_protocol;
mod questdb;

pub use influx::{InfluxConfig, InfluxSink};
pub use line_protocol::{escape_tag, HistoricalRow, Point, MEASUREMENT};
pub use questdb::{QuestDbSink, QUESTDB_BATCH_SIZE};

// ---

/// A store that can persist a batch of device readings.
#[async_trait]
pub trait TimeSeriesSink: Send + Sync {
    /// Short backend name for logs and reports.
    fn name(&self) -> &'static str;

    /// Write every successful outcome that carries a reading.
    ///
    /// Returns one [`WriteOutcome`] per successful fetch, in input order.
    /// Failed fetches produce no outcome and no write. A failure writing
    /// one device never affects another.
    async fn write_many(
        &self,
        outcomes: &[FetchOutcome],
        names: &DeviceNameIndex,
    ) -> Vec<WriteOutcome>;
}

/// What to do with one successful fetch.
#[derive(Debug, Clone)]
pub(crate) enum Planned {
    /// Resolved without touching the store.
    Skip(WriteOutcome),
    /// A point to hand to the store.
    Write { device_id: String, point: Point },
}

/// Turn fetch outcomes into per-device write plans.
///
/// Readings without a timestamp (or with a zero one) are skipped with
/// `no_timestamp`, readings without any metric with `no_fields`.
pub(crate) fn plan_writes(outcomes: &[FetchOutcome], names: &DeviceNameIndex) -> Vec<Planned> {
    // ---
    outcomes
        .iter()
        .filter_map(|outcome| match outcome {
            FetchOutcome::Success {
                device_id, reading, ..
            } => Some((device_id, reading)),
            FetchOutcome::Failure { .. } => None,
        })
        .map(|(device_id, reading)| {
            // A zero epoch is a device that never reported, not 1970.
            if reading.timestamp.map_or(true, |t| t == 0) {
                tracing::info!("Skipping {}: no timestamp", device_id);
                return Planned::Skip(WriteOutcome::skipped(device_id, SkipReason::NoTimestamp));
            }
            match Point::from_reading(device_id, names.custom_name(device_id), reading) {
                Some(point) => Planned::Write {
                    device_id: device_id.clone(),
                    point,
                },
                None => {
                    tracing::info!("Skipping {}: no fields", device_id);
                    Planned::Skip(WriteOutcome::skipped(device_id, SkipReason::NoFields))
                }
            }
        })
        .collect()
}

/// Build the configured sinks, in `WRITE_DB` order.
pub fn build_sinks(cfg: &Config) -> Result<Vec<Box<dyn TimeSeriesSink>>> {
    // ---
    let mut sinks: Vec<Box<dyn TimeSeriesSink>> = Vec::with_capacity(cfg.sinks.len());

    for kind in &cfg.sinks {
        match kind {
            SinkKind::InfluxDb => sinks.push(Box::new(InfluxSink::new(cfg.influx.clone())?)),
            SinkKind::QuestDb => sinks.push(Box::new(QuestDbSink::new(cfg.questdb_url.clone())?)),
        }
    }

    Ok(sinks)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::SensorReading;
    use serde_json::Value;

    fn success(device_id: &str, reading: SensorReading) -> FetchOutcome {
        FetchOutcome::Success {
            device_id: device_id.into(),
            reading,
            raw: Value::Null,
        }
    }

    #[test]
    fn test_plan_skips_failures_and_classifies() {
        // ---
        let full = SensorReading {
            temperature: Some(21.5),
            humidity: Some(55.0),
            battery: Some(100.0),
            timestamp: Some(1_700_000_000),
        };
        let outcomes = vec![
            success("full", full),
            FetchOutcome::Failure {
                device_id: "down".into(),
                error: "timeout".into(),
            },
            success(
                "stale",
                SensorReading {
                    timestamp: None,
                    ..full
                },
            ),
            success(
                "empty",
                SensorReading {
                    timestamp: Some(1),
                    ..SensorReading::default()
                },
            ),
        ];

        let mut names = DeviceNameIndex::default();
        names.insert("full", "Office");

        let plans = plan_writes(&outcomes, &names);
        assert_eq!(plans.len(), 3);

        match &plans[0] {
            Planned::Write { device_id, point } => {
                assert_eq!(device_id, "full");
                assert!(point.tags.contains(&("custom_name", "Office".to_string())));
            }
            other => panic!("expected write, got {other:?}"),
        }
        match &plans[1] {
            Planned::Skip(outcome) => {
                assert_eq!(outcome.device_id, "stale");
                assert_eq!(outcome.reason, Some(SkipReason::NoTimestamp));
            }
            other => panic!("expected skip, got {other:?}"),
        }
        match &plans[2] {
            Planned::Skip(outcome) => assert_eq!(outcome.reason, Some(SkipReason::NoFields)),
            other => panic!("expected skip, got {other:?}"),
        }
    }

    #[test]
    fn test_plan_treats_zero_timestamp_as_missing() {
        // ---
        let epoch = SensorReading {
            temperature: Some(20.0),
            timestamp: Some(0),
            ..SensorReading::default()
        };
        let plans = plan_writes(&[success("dev-1", epoch)], &DeviceNameIndex::default());

        match &plans[0] {
            Planned::Skip(outcome) => assert_eq!(outcome.reason, Some(SkipReason::NoTimestamp)),
            other => panic!("expected skip, got {other:?}"),
        }
    }
}
