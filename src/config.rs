//! Configuration loader for the `tuya-sensorsink` poller.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Every required value is checked here, before any
//! network activity happens.
//!
use std::{env, str::FromStr, time::Duration};

use anyhow::{anyhow, bail, Result};
use secrecy::SecretString;
use url::Url;

use crate::cloud::{parse_base_url, DEFAULT_REQUEST_TIMEOUT};
use crate::sinks::InfluxConfig;

/// Read a variable, treating empty values as unset.
macro_rules! optional_env {
    ($lookup:expr, $var_name:expr) => {
        $lookup($var_name)
            .map(|v: String| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
}

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u64 {
    ($lookup:expr, $var_name:expr, $default:expr) => {
        optional_env!($lookup, $var_name)
            .map(|v| v.parse::<u64>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($lookup:expr, $var_name:expr) => {
        optional_env!($lookup, $var_name)
            .ok_or_else(|| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Parse a URL environment variable with a default value.
macro_rules! parse_env_url {
    ($lookup:expr, $var_name:expr, $default:expr) => {
        Url::parse(&optional_env!($lookup, $var_name).unwrap_or_else(|| $default.to_string()))
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
    };
}

/// A time-series backend selectable through `WRITE_DB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    InfluxDb,
    QuestDb,
}

impl FromStr for SinkKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "influxdb" => Ok(Self::InfluxDb),
            "questdb" => Ok(Self::QuestDb),
            other => bail!("Unknown WRITE_DB target '{other}' (expected influxdb or questdb)"),
        }
    }
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Tuya Cloud client id.
    pub client_id: String,

    /// Tuya Cloud client secret, used as the signing key.
    pub client_secret: SecretString,

    /// Tuya Cloud API base URL.
    pub api_base_url: Url,

    /// Per-request transport timeout for the cloud API.
    pub request_timeout: Duration,

    /// Devices to poll, in report order.
    pub device_ids: Vec<String>,

    /// Sinks to write to, in `WRITE_DB` order, without duplicates.
    pub sinks: Vec<SinkKind>,

    /// InfluxDB settings. The token is only required when selected.
    pub influx: InfluxConfig,

    /// QuestDB HTTP endpoint.
    pub questdb_url: Url,
}

/// Load configuration from the process environment.
///
/// Required:
/// - `TUYA_CLIENT_ID`, `TUYA_CLIENT_SECRET` – API credentials
/// - `TUYA_DEVICE_IDS` – comma-separated device ids
/// - `INFLUXDB_TOKEN` – only when `WRITE_DB` includes `influxdb`
///
/// Optional:
/// - `TUYA_BASE_URL` – API host (default: `openapi.tuyaeu.com`)
/// - `TUYA_REQUEST_TIMEOUT` – request timeout in ms (default: 30000)
/// - `WRITE_DB` – comma-separated sinks (default: `influxdb`)
/// - `INFLUXDB_URL` (default: `http://localhost:8086`), `INFLUXDB_ORG`
///   (default: `default`), `INFLUXDB_BUCKET` (default: `tuya`)
/// - `QUESTDB_URL` (default: `http://localhost:9000`)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    load_from(|name| env::var(name).ok())
}

/// Load configuration through an arbitrary variable lookup.
pub fn load_from<F>(lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    // ---
    let client_id = require_env!(lookup, "TUYA_CLIENT_ID");
    let client_secret = require_env!(lookup, "TUYA_CLIENT_SECRET");

    let base_host =
        optional_env!(lookup, "TUYA_BASE_URL").unwrap_or_else(|| "openapi.tuyaeu.com".into());
    let api_base_url =
        parse_base_url(&base_host).map_err(|e| anyhow!("Invalid TUYA_BASE_URL: {}", e))?;

    let default_timeout_ms = u64::try_from(DEFAULT_REQUEST_TIMEOUT.as_millis()).unwrap_or(30_000);
    let request_timeout = Duration::from_millis(parse_env_u64!(
        lookup,
        "TUYA_REQUEST_TIMEOUT",
        default_timeout_ms
    ));

    let device_ids = split_list(&optional_env!(lookup, "TUYA_DEVICE_IDS").unwrap_or_default());
    if device_ids.is_empty() {
        bail!("TUYA_DEVICE_IDS must be set in .env or environment (comma-separated list)");
    }

    let mut sinks = Vec::new();
    for name in split_list(&optional_env!(lookup, "WRITE_DB").unwrap_or_else(|| "influxdb".into()))
    {
        let kind: SinkKind = name.parse()?;
        if !sinks.contains(&kind) {
            sinks.push(kind);
        }
    }
    if sinks.is_empty() {
        bail!("WRITE_DB must name at least one of influxdb, questdb");
    }

    let influx_token = optional_env!(lookup, "INFLUXDB_TOKEN");
    if sinks.contains(&SinkKind::InfluxDb) && influx_token.is_none() {
        bail!("INFLUXDB_TOKEN must be set when WRITE_DB includes influxdb");
    }

    let influx = InfluxConfig {
        url: parse_env_url!(lookup, "INFLUXDB_URL", "http://localhost:8086"),
        token: SecretString::from(influx_token.unwrap_or_default()),
        org: optional_env!(lookup, "INFLUXDB_ORG").unwrap_or_else(|| "default".into()),
        bucket: optional_env!(lookup, "INFLUXDB_BUCKET").unwrap_or_else(|| "tuya".into()),
    };

    let questdb_url = parse_env_url!(lookup, "QUESTDB_URL", "http://localhost:9000");

    Ok(Config {
        client_id,
        client_secret: SecretString::from(client_secret),
        api_base_url,
        request_timeout,
        device_ids,
        sinks,
        influx,
        questdb_url,
    })
}

/// Split a comma-separated list, trimming entries and dropping empties.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    ///
    /// Secrets are never printed; the InfluxDB token is only reported as
    /// set or unset.
    pub fn log_config(&self) {
        // ---
        let sinks: Vec<&str> = self
            .sinks
            .iter()
            .map(|kind| match kind {
                SinkKind::InfluxDb => "influxdb",
                SinkKind::QuestDb => "questdb",
            })
            .collect();

        tracing::info!("Configuration loaded:");
        tracing::info!("  TUYA_CLIENT_ID       : {}", self.client_id);
        tracing::info!("  TUYA_CLIENT_SECRET   : ****");
        tracing::info!("  TUYA_BASE_URL        : {}", self.api_base_url);
        tracing::info!("  TUYA_REQUEST_TIMEOUT : {}ms", self.request_timeout.as_millis());
        tracing::info!("  TUYA_DEVICE_IDS      : {}", self.device_ids.join(", "));
        tracing::info!("  WRITE_DB             : {}", sinks.join(","));
        if self.sinks.contains(&SinkKind::InfluxDb) {
            tracing::info!("  INFLUXDB_URL         : {}", self.influx.url);
            tracing::info!("  INFLUXDB_ORG         : {}", self.influx.org);
            tracing::info!("  INFLUXDB_BUCKET      : {}", self.influx.bucket);
            tracing::info!("  INFLUXDB_TOKEN       : ****");
        }
        if self.sinks.contains(&SinkKind::QuestDb) {
            tracing::info!("  QUESTDB_URL          : {}", self.questdb_url);
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    const BASE: &[(&str, &str)] = &[
        ("TUYA_CLIENT_ID", "cid"),
        ("TUYA_CLIENT_SECRET", "secret"),
        ("TUYA_DEVICE_IDS", " dev-1, dev-2 ,,dev-3 "),
        ("INFLUXDB_TOKEN", "tok"),
    ];

    #[test]
    fn test_defaults() {
        // ---
        let cfg = load_from(lookup(BASE)).unwrap();

        assert_eq!(cfg.client_id, "cid");
        assert_eq!(cfg.client_secret.expose_secret(), "secret");
        assert_eq!(cfg.api_base_url.as_str(), "https://openapi.tuyaeu.com/");
        assert_eq!(cfg.request_timeout, Duration::from_millis(30_000));
        assert_eq!(cfg.device_ids, vec!["dev-1", "dev-2", "dev-3"]);
        assert_eq!(cfg.sinks, vec![SinkKind::InfluxDb]);
        assert_eq!(cfg.influx.url.as_str(), "http://localhost:8086/");
        assert_eq!(cfg.influx.org, "default");
        assert_eq!(cfg.influx.bucket, "tuya");
        assert_eq!(cfg.questdb_url.as_str(), "http://localhost:9000/");
    }

    #[test]
    fn test_missing_credentials_are_fatal() {
        // ---
        let err = load_from(lookup(&[("TUYA_CLIENT_ID", "cid")])).unwrap_err();
        assert!(err.to_string().contains("TUYA_CLIENT_SECRET"));

        let err = load_from(lookup(&[("TUYA_CLIENT_ID", ""), ("TUYA_CLIENT_SECRET", "s")]))
            .unwrap_err();
        assert!(err.to_string().contains("TUYA_CLIENT_ID"));
    }

    #[test]
    fn test_device_ids_required() {
        // ---
        let err = load_from(lookup(&[
            ("TUYA_CLIENT_ID", "cid"),
            ("TUYA_CLIENT_SECRET", "secret"),
            ("TUYA_DEVICE_IDS", " , "),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("TUYA_DEVICE_IDS"));
    }

    #[test]
    fn test_influx_token_only_required_when_selected() {
        // ---
        let vars = &[
            ("TUYA_CLIENT_ID", "cid"),
            ("TUYA_CLIENT_SECRET", "secret"),
            ("TUYA_DEVICE_IDS", "dev-1"),
        ];
        let err = load_from(lookup(vars)).unwrap_err();
        assert!(err.to_string().contains("INFLUXDB_TOKEN"));

        let mut with_questdb = vars.to_vec();
        with_questdb.push(("WRITE_DB", "QuestDB"));
        let cfg = load_from(lookup(&with_questdb)).unwrap();
        assert_eq!(cfg.sinks, vec![SinkKind::QuestDb]);
    }

    #[test]
    fn test_write_db_list() {
        // ---
        let mut vars = BASE.to_vec();
        vars.push(("WRITE_DB", "questdb, influxdb,questdb"));
        let cfg = load_from(lookup(&vars)).unwrap();
        assert_eq!(cfg.sinks, vec![SinkKind::QuestDb, SinkKind::InfluxDb]);

        let mut vars = BASE.to_vec();
        vars.push(("WRITE_DB", "influxdb,sqlite"));
        let err = load_from(lookup(&vars)).unwrap_err();
        assert!(err.to_string().contains("sqlite"));
    }

    #[test]
    fn test_invalid_timeout() {
        // ---
        let mut vars = BASE.to_vec();
        vars.push(("TUYA_REQUEST_TIMEOUT", "soon"));
        let err = load_from(lookup(&vars)).unwrap_err();
        assert!(err.to_string().contains("Invalid TUYA_REQUEST_TIMEOUT"));

        let mut vars = BASE.to_vec();
        vars.push(("TUYA_REQUEST_TIMEOUT", "5000"));
        let cfg = load_from(lookup(&vars)).unwrap();
        assert_eq!(cfg.request_timeout, Duration::from_millis(5000));
    }
}
