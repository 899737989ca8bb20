//! Table schema management for the QuestDB sink.
//!
//! Ensures the `temp` table exists before the first write. Called lazily by
//! `QuestDbSink` and memoized there, so a healthy run issues the DDL once.

use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};

// ---

/// DDL for the sensor table.
///
/// Rows are deduplicated on `(timestamp, device_id)`: replaying a point for
/// the same device and instant overwrites the existing row.
pub const TEMP_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS temp ( \
    device_id SYMBOL, \
    custom_name SYMBOL, \
    temperature DOUBLE, \
    humidity DOUBLE, \
    battery DOUBLE, \
    timestamp TIMESTAMP \
    ) TIMESTAMP(timestamp) PARTITION BY DAY \
    DEDUP UPSERT KEYS(timestamp, device_id);";

/// `{base}/exec?query=<url-encoded sql>`
pub fn exec_url(base_url: &Url, sql: &str) -> Result<Url> {
    // ---
    let mut url = base_url.join("/exec")?;
    url.query_pairs_mut().append_pair("query", sql);
    Ok(url)
}

/// Create the sensor table if it does not exist (idempotent).
///
/// Any non-2xx response is treated as a failure, with the body included in
/// the error.
pub async fn create_schema(http: &reqwest::Client, base_url: &Url) -> Result<()> {
    // ---
    let url = exec_url(base_url, TEMP_TABLE_SQL)?;
    debug!("GET {}", url);

    let resp = http.get(url).send().await.map_err(|e| Error::Schema {
        message: e.to_string(),
    })?;

    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();

    if !status.is_success() {
        warn!(
            "QuestDB /exec returned HTTP {} for table bootstrap: {}",
            status.as_u16(),
            body
        );
        return Err(Error::Schema {
            message: format!("HTTP {}: {}", status.as_u16(), body),
        });
    }

    info!("QuestDB table `temp` is ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_ddl_declares_dedup_key() {
        // ---
        assert!(TEMP_TABLE_SQL.starts_with("CREATE TABLE IF NOT EXISTS temp ("));
        assert!(TEMP_TABLE_SQL.contains("PARTITION BY DAY"));
        assert!(TEMP_TABLE_SQL.contains("DEDUP UPSERT KEYS(timestamp, device_id)"));
    }

    #[test]
    fn test_exec_url_encodes_sql() {
        // ---
        let base = Url::parse("http://localhost:9000").unwrap();
        let url = exec_url(&base, "SELECT 1, 2;").unwrap();

        assert_eq!(url.path(), "/exec");
        let (key, value) = url.query_pairs().next().unwrap();
        assert_eq!(key, "query");
        assert_eq!(value, "SELECT 1, 2;");
        assert!(!url.as_str().contains(' '));
    }
}
