//! Error taxonomy for the sensor sink pipeline.
//!
//! Every failure the library can report lives here. How each variant is
//! handled differs by layer: auth failures abort the batch, fetch failures
//! become a failed `FetchOutcome`, and write/schema failures become a
//! `WriteOutcome`. The binary wraps these in `anyhow` at the top level.

use thiserror::Error;

/// Top-level error type for the `sensorsink` library.
#[derive(Debug, Error)]
pub enum Error {
    // ── Cloud API ───────────────────────────────────────────────────
    /// Token issuance or refresh failed.
    #[error("Authentication error: {message}")]
    Auth { message: String },

    /// Per-device property fetch failed.
    #[error("Failed to get device properties for {device_id}: {message}")]
    Fetch { device_id: String, message: String },

    /// Batch device lookup failed.
    #[error("Failed to get device batch: {message}")]
    DeviceBatch { message: String },

    /// The API envelope reported `success: false`.
    #[error("{message}")]
    Api { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// The request exceeded the configured transport timeout.
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The response body was not the JSON we expected.
    #[error("Failed to parse response: {message}")]
    Decode { message: String },

    // ── Sinks ───────────────────────────────────────────────────────
    /// A point (or chunk of points) was rejected by a time-series store.
    #[error("{message}")]
    Write { message: String },

    /// Table bootstrap on the line-protocol store failed.
    #[error("Failed to ensure table: {message}")]
    Schema { message: String },
}

impl Error {
    /// Map a `reqwest` failure, giving timeouts their own message.
    pub(crate) fn from_transport(err: reqwest::Error, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout { timeout_ms }
        } else {
            Self::Transport(err)
        }
    }

    /// Returns `true` if this error came from token issuance.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
