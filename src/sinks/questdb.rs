//! QuestDB sink
//!
//! Writes ILP text over HTTP (`POST /write?precision=ms`), one request per
//! point. The destination table is created on first use.

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use url::Url;

use super::line_protocol::Point;
use super::{plan_writes, Planned, TimeSeriesSink};
use crate::cloud::DEFAULT_REQUEST_TIMEOUT;
use crate::error::{Error, Result};
use crate::models::{DeviceNameIndex, FetchOutcome, WriteOutcome};
use crate::schema;

// ---

/// Maximum ILP lines per request on the bulk path.
pub const QUESTDB_BATCH_SIZE: usize = 5000;

/// Line-protocol sink for QuestDB.
#[derive(Debug)]
pub struct QuestDbSink {
    http: reqwest::Client,
    base_url: Url,
    table_ready: OnceCell<()>,
}

impl QuestDbSink {
    // ---
    pub fn new(base_url: Url) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            table_ready: OnceCell::new(),
        }
    }

    /// Create the `temp` table if needed.
    ///
    /// Only a successful bootstrap is remembered; after a failure the next
    /// call tries again.
    pub async fn ensure_table(&self) -> Result<()> {
        self.table_ready
            .get_or_try_init(|| schema::create_schema(&self.http, &self.base_url))
            .await
            .map(|_| ())
    }

    fn write_url(&self) -> Result<Url> {
        // ---
        let mut url = self.base_url.join("/write")?;
        url.query_pairs_mut().append_pair("precision", "ms");
        Ok(url)
    }

    /// POST an ILP body. Non-2xx responses become `Error::Write`.
    async fn post_lines(&self, body: String) -> Result<()> {
        // ---
        let url = self.write_url()?;
        debug!("POST {} ({} bytes)", url, body.len());

        let resp = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Write {
                message: e.to_string(),
            })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        Err(Error::Write {
            message: format!("HTTP {}: {}", status.as_u16(), body),
        })
    }

    /// Write one point as its own request.
    async fn write_point(&self, device_id: String, point: &Point) -> WriteOutcome {
        match self.post_lines(point.to_line()).await {
            Ok(()) => WriteOutcome::written(device_id),
            Err(e) => {
                warn!("QuestDB write failed for {}: {}", device_id, e);
                WriteOutcome::failed(device_id, e.to_string())
            }
        }
    }

    /// Bulk-load pre-encoded lines in chunks of [`QUESTDB_BATCH_SIZE`].
    ///
    /// Stops at the first rejected chunk. Returns the number of lines
    /// written.
    pub async fn write_lines(&self, lines: &[String]) -> Result<usize> {
        // ---
        if lines.is_empty() {
            return Ok(0);
        }

        self.ensure_table().await?;

        let mut written = 0;
        for chunk in lines.chunks(QUESTDB_BATCH_SIZE) {
            self.post_lines(chunk.concat()).await?;
            written += chunk.len();
            info!("  {} / {}", written, lines.len());
        }

        Ok(written)
    }
}

#[async_trait]
impl TimeSeriesSink for QuestDbSink {
    // ---
    fn name(&self) -> &'static str {
        "questdb"
    }

    async fn write_many(
        &self,
        outcomes: &[FetchOutcome],
        names: &DeviceNameIndex,
    ) -> Vec<WriteOutcome> {
        // ---
        let plans = plan_writes(outcomes, names);

        let schema_error = match self.ensure_table().await {
            Ok(()) => None,
            Err(e) => {
                warn!("{}; skipping QuestDB writes for this batch", e);
                Some(e.to_string())
            }
        };

        let writes = plans.into_iter().map(|planned| {
            let schema_error = schema_error.clone();
            async move {
                match (planned, schema_error) {
                    (Planned::Skip(outcome), _) => outcome,
                    (Planned::Write { device_id, .. }, Some(error)) => {
                        WriteOutcome::failed(device_id, error)
                    }
                    (Planned::Write { device_id, point }, None) => {
                        self.write_point(device_id, &point).await
                    }
                }
            }
        });

        join_all(writes).await
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_write_url_uses_ms_precision() {
        // ---
        let sink = QuestDbSink::new(Url::parse("http://localhost:9000").unwrap()).unwrap();
        assert_eq!(
            sink.write_url().unwrap().as_str(),
            "http://localhost:9000/write?precision=ms"
        );
    }

    #[tokio::test]
    async fn test_empty_bulk_load_is_a_no_op() {
        // ---
        let sink = QuestDbSink::new(Url::parse("http://127.0.0.1:9").unwrap()).unwrap();
        assert_eq!(sink.write_lines(&[]).await.unwrap(), 0);
    }
}
