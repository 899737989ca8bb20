//! InfluxDB v2 sink
//!
//! Points are buffered in a `WriteApi` and sent in one request when the batch
//! is closed, at nanosecond precision.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, error, info};
use url::Url;

use super::line_protocol::Point;
use super::{plan_writes, Planned, TimeSeriesSink};
use crate::cloud::DEFAULT_REQUEST_TIMEOUT;
use crate::error::{Error, Result};
use crate::models::{DeviceNameIndex, FetchOutcome, WriteOutcome};

// ---

/// Readings carry epoch milliseconds; InfluxDB is written in nanoseconds.
const MS_TO_NS: i64 = 1_000_000;

/// Connection settings for an InfluxDB v2 bucket.
#[derive(Debug, Clone)]
pub struct InfluxConfig {
    pub url: Url,
    pub token: SecretString,
    pub org: String,
    pub bucket: String,
}

/// Buffering sink for InfluxDB v2.
///
/// Every point accepted into the buffer is reported `written: true`. The
/// buffer is flushed once at the end of `write_many`; a flush failure is
/// logged but does NOT change the outcomes already reported. Callers that
/// need strict durability must not rely on these outcomes.
#[derive(Debug)]
pub struct InfluxSink {
    http: reqwest::Client,
    config: InfluxConfig,
}

impl InfluxSink {
    // ---
    pub fn new(config: InfluxConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()?;
        Ok(Self::with_client(http, config))
    }

    pub fn with_client(http: reqwest::Client, config: InfluxConfig) -> Self {
        Self { http, config }
    }

    /// `{url}/api/v2/write?org=..&bucket=..&precision=ns`
    fn write_url(&self) -> Result<Url> {
        // ---
        let mut url = self.config.url.join("/api/v2/write")?;
        url.query_pairs_mut()
            .append_pair("org", &self.config.org)
            .append_pair("bucket", &self.config.bucket)
            .append_pair("precision", "ns");
        Ok(url)
    }

    /// Start a new buffered write batch.
    pub fn write_api(&self) -> WriteApi<'_> {
        WriteApi {
            sink: self,
            buffer: Vec::new(),
        }
    }
}

/// A batch of points waiting to be flushed.
#[derive(Debug)]
pub struct WriteApi<'a> {
    sink: &'a InfluxSink,
    buffer: Vec<String>,
}

impl WriteApi<'_> {
    // ---
    /// Buffer a point whose timestamp is already in nanoseconds.
    pub fn write_point(&mut self, point: &Point) {
        self.buffer.push(point.to_line());
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Flush all buffered points in a single request.
    pub async fn close(self) -> Result<()> {
        // ---
        if self.buffer.is_empty() {
            return Ok(());
        }

        let url = self.sink.write_url()?;
        debug!("POST {} ({} points)", url, self.buffer.len());

        let resp = self
            .sink
            .http
            .post(url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Token {}", self.sink.config.token.expose_secret()),
            )
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(self.buffer.concat())
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        Err(Error::Write {
            message: format!("HTTP {}: {}", status.as_u16(), body),
        })
    }
}

#[async_trait]
impl TimeSeriesSink for InfluxSink {
    // ---
    fn name(&self) -> &'static str {
        "influxdb"
    }

    async fn write_many(
        &self,
        outcomes: &[FetchOutcome],
        names: &DeviceNameIndex,
    ) -> Vec<WriteOutcome> {
        // ---
        let mut write_api = self.write_api();

        let results: Vec<WriteOutcome> = plan_writes(outcomes, names)
            .into_iter()
            .map(|planned| match planned {
                Planned::Skip(outcome) => outcome,
                Planned::Write { device_id, point } => {
                    write_api.write_point(&point.scaled(MS_TO_NS));
                    WriteOutcome::written(device_id)
                }
            })
            .collect();

        let buffered = write_api.len();
        match write_api.close().await {
            Ok(()) => info!("Flushed {} points to InfluxDB", buffered),
            Err(e) => error!("Error flushing InfluxDB writes: {}", e),
        }

        results
    }
}
