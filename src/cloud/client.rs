//! Tuya Cloud OpenAPI HTTP client
//!
//! Wraps `reqwest::Client` with request signing, the `{ success, result, msg }`
//! envelope, and the access-token lifecycle. Every authenticated call goes
//! through `ensure_authenticated` first.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::session::{Session, SessionGate, DEFAULT_TOKEN_LIFETIME_SECS};
use super::signer;
use crate::error::{Error, Result};

// ---

const TOKEN_PATH: &str = "/v1.0/token?grant_type=1";

/// Default per-request transport timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(30_000);

/// API credentials and endpoint. Immutable for the life of the process.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: SecretString,
    pub base_url: Url,
    pub timeout: Duration,
}

impl Credentials {
    // ---
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        base_url: Url,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
            base_url,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Parse the configured API host. A bare hostname gets `https://`.
pub fn parse_base_url(host: &str) -> Result<Url> {
    // ---
    let host = host.trim().trim_end_matches('/');
    if host.contains("://") {
        Ok(Url::parse(host)?)
    } else {
        Ok(Url::parse(&format!("https://{host}"))?)
    }
}

/// Signed client for the Tuya Cloud API.
///
/// Owns the access token exclusively. Callers never see the token state
/// directly, only [`Session`] snapshots.
#[derive(Debug)]
pub struct CloudClient {
    http: reqwest::Client,
    credentials: Credentials,
    session: SessionGate,
}

impl CloudClient {
    // ---
    pub fn new(credentials: Credentials) -> Result<Self> {
        // ---
        let http = reqwest::Client::builder()
            .timeout(credentials.timeout)
            .user_agent(concat!("tuya-sensorsink/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self::with_client(http, credentials))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    ///
    /// The transport timeout is whatever `http` was built with; the
    /// credential timeout is only used for error messages.
    pub fn with_client(http: reqwest::Client, credentials: Credentials) -> Self {
        Self {
            http,
            credentials,
            session: SessionGate::default(),
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Seed a previously issued session.
    pub async fn restore_session(&self, session: Session) {
        self.session.replace(session).await;
    }

    /// The session currently held, if any.
    pub async fn session(&self) -> Option<Session> {
        self.session.current().await
    }

    // ── Session lifecycle ────────────────────────────────────────────

    /// Issue a new access token unconditionally.
    pub async fn authenticate(&self) -> Result<Session> {
        self.session
            .get_or_refresh(true, || self.issue_token())
            .await
    }

    /// Return a session that is valid for at least the refresh margin,
    /// re-authenticating first if needed.
    pub async fn ensure_authenticated(&self) -> Result<Session> {
        self.session
            .get_or_refresh(false, || self.issue_token())
            .await
    }

    async fn issue_token(&self) -> Result<Session> {
        // ---
        debug!("Requesting access token");

        let response = self
            .get_signed(TOKEN_PATH, None)
            .await
            .map_err(|e| Error::Auth {
                message: e.to_string(),
            })?;

        let result = response.get("result").filter(|r| !r.is_null());
        let token = result
            .and_then(|r| r.get("access_token"))
            .and_then(Value::as_str);

        match (response.get("success").and_then(Value::as_bool), token) {
            (Some(true), Some(token)) => {
                let lifetime = result
                    .and_then(|r| r.get("expire_time"))
                    .and_then(Value::as_i64)
                    .filter(|secs| *secs > 0)
                    .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
                debug!("Access token issued, valid for {}s", lifetime);
                Session::issued_now(token, lifetime)
            }
            _ => Err(Error::Auth {
                message: server_message(&response).unwrap_or("Authentication failed").to_string(),
            }),
        }
    }

    // ── Device endpoints ─────────────────────────────────────────────

    /// Look up device metadata for a set of ids. Returns the raw `result`
    /// array, or an empty list if the server sends none.
    pub async fn get_device_batch(&self, device_ids: &[String]) -> Result<Vec<Value>> {
        // ---
        let session = self.ensure_authenticated().await?;
        let path = format!("/v2.0/cloud/thing/batch?device_ids={}", device_ids.join(","));

        let response = self
            .get_signed(&path, Some(session.access_token()))
            .await
            .map_err(|e| Error::DeviceBatch {
                message: e.to_string(),
            })?;

        Ok(response
            .get("result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    /// Fetch a device's shadow properties. Returns the raw `result` payload.
    pub async fn get_device_properties(&self, device_id: &str) -> Result<Value> {
        // ---
        let session = self.ensure_authenticated().await?;
        let path = format!("/v2.0/cloud/thing/{device_id}/shadow/properties");

        let response = self
            .get_signed(&path, Some(session.access_token()))
            .await
            .map_err(|e| Error::Fetch {
                device_id: device_id.to_string(),
                message: e.to_string(),
            })?;

        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a signed GET and unwrap the envelope.
    async fn get_signed(&self, path_with_query: &str, access_token: Option<&str>) -> Result<Value> {
        // ---
        let url = self.credentials.base_url.join(path_with_query)?;
        debug!("GET {}", url);

        let headers = signer::sign_request(
            &self.credentials.client_id,
            self.credentials.client_secret.expose_secret(),
            access_token,
            "GET",
            path_with_query,
        );

        let mut request = self
            .http
            .get(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        for (name, value) in headers.pairs() {
            request = request.header(name, value);
        }

        let resp = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| self.transport_error(e))?;

        parse_envelope(status, &body)
    }

    fn transport_error(&self, err: reqwest::Error) -> Error {
        let timeout_ms = u64::try_from(self.credentials.timeout.as_millis()).unwrap_or(u64::MAX);
        Error::from_transport(err, timeout_ms)
    }
}

/// Decode a `{ success, result, msg }` body. An explicit `success: false`
/// is an error carrying the server's `msg`.
fn parse_envelope(status: reqwest::StatusCode, body: &str) -> Result<Value> {
    // ---
    let parsed: Value = serde_json::from_str(body).map_err(|e| Error::Decode {
        message: format!("{e} (HTTP {status})"),
    })?;

    if parsed.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(Error::Api {
            message: server_message(&parsed)
                .unwrap_or("API request failed")
                .to_string(),
        });
    }

    Ok(parsed)
}

fn server_message(response: &Value) -> Option<&str> {
    response
        .get("msg")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
}
