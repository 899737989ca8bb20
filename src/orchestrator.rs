//! One batch pass: authenticate, fetch every device, write to every sink.

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cloud::CloudClient;
use crate::error::Result;
use crate::models::{DeviceNameIndex, FetchOutcome, WriteOutcome};
use crate::parser;
use crate::sinks::TimeSeriesSink;

// ---

/// Write results from one sink.
#[derive(Debug, Clone, Serialize)]
pub struct SinkReport {
    pub sink: &'static str,
    pub results: Vec<WriteOutcome>,
}

/// Everything a batch run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcomes: Vec<FetchOutcome>,
    pub sinks: Vec<SinkReport>,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Fetch and parse every device, one at a time.
///
/// Always returns exactly one outcome per id, in input order. A failure for
/// one device (auth, transport, or API) is recorded on that device's outcome
/// and the loop moves on.
pub async fn fetch_all(client: &CloudClient, device_ids: &[String]) -> Vec<FetchOutcome> {
    // ---
    let mut outcomes = Vec::with_capacity(device_ids.len());

    for device_id in device_ids {
        let outcome = match client.get_device_properties(device_id).await {
            Ok(raw) => FetchOutcome::Success {
                device_id: device_id.clone(),
                reading: parser::parse(Some(&raw)),
                raw,
            },
            Err(e) => {
                warn!("Fetch failed for {}: {}", device_id, e);
                FetchOutcome::Failure {
                    device_id: device_id.clone(),
                    error: e.to_string(),
                }
            }
        };
        outcomes.push(outcome);
    }

    outcomes
}

/// Look up custom names for the devices. Names only decorate writes, so a
/// failed lookup is logged and yields an empty index.
pub async fn fetch_device_names(client: &CloudClient, device_ids: &[String]) -> DeviceNameIndex {
    // ---
    match client.get_device_batch(device_ids).await {
        Ok(batch) => DeviceNameIndex::from_batch(&batch),
        Err(e) => {
            warn!("{}; writing without custom names", e);
            DeviceNameIndex::default()
        }
    }
}

/// Hand the outcomes to every sink concurrently and collect their reports.
pub async fn write_all(
    sinks: &[Box<dyn TimeSeriesSink>],
    outcomes: &[FetchOutcome],
    names: &DeviceNameIndex,
) -> Vec<SinkReport> {
    // ---
    join_all(sinks.iter().map(|sink| async move {
        let results = sink.write_many(outcomes, names).await;
        SinkReport {
            sink: sink.name(),
            results,
        }
    }))
    .await
}

/// Run one full batch.
///
/// Authentication failure aborts the run: nothing is fetched or written.
/// Every other failure is contained in the returned report.
pub async fn run(
    client: &CloudClient,
    device_ids: &[String],
    sinks: &[Box<dyn TimeSeriesSink>],
) -> Result<RunReport> {
    // ---
    info!("Authenticating...");
    client.authenticate().await?;
    info!("Authentication successful");

    debug!("Step 1: device names");
    let names = fetch_device_names(client, device_ids).await;

    debug!("Step 2: fetch {} devices", device_ids.len());
    let outcomes = fetch_all(client, device_ids).await;

    let summary: Vec<_> = outcomes.iter().map(FetchOutcome::summary).collect();
    info!(
        "Fetch summary: {}",
        serde_json::to_string_pretty(&summary).unwrap_or_default()
    );

    debug!("Step 3: write to {} sinks", sinks.len());
    let reports = write_all(sinks, &outcomes, &names).await;

    let report = RunReport {
        outcomes,
        sinks: reports,
    };
    info!(
        "Batch complete: {} fetched, {} failed",
        report.succeeded(),
        report.failed()
    );
    Ok(report)
}
