//! Access-token session state and its single-flight refresh gate.

use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::error::{Error, Result};

// ---

/// Token lifetime assumed when the server omits `expire_time`.
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 7200;

/// A session is refreshed once it is this close to expiry.
pub const REFRESH_MARGIN_MS: i64 = 60_000;

/// An issued access token and the instant it stops being valid.
///
/// Immutable once issued; a refresh produces a new `Session`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl Session {
    // ---
    /// A session issued now that lives for `lifetime_secs`.
    ///
    /// Fails when the lifetime puts the expiry outside the representable
    /// date range.
    pub fn issued_now(access_token: impl Into<String>, lifetime_secs: i64) -> Result<Self> {
        let expires_at = Duration::try_seconds(lifetime_secs)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| Error::Auth {
                message: format!("invalid expire_time: {lifetime_secs}"),
            })?;
        Ok(Self::with_expiry(access_token, expires_at))
    }

    pub fn with_expiry(access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Usable at `now`, keeping the refresh margin in hand.
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty()
            && now < self.expires_at - Duration::milliseconds(REFRESH_MARGIN_MS)
    }
}

/// Holds the current session behind an async lock.
///
/// The lock is held across a refresh, so concurrent callers queue behind
/// the one refresh in flight and then see its result instead of issuing
/// their own.
#[derive(Debug, Default)]
pub(crate) struct SessionGate {
    state: Mutex<Option<Session>>,
}

impl SessionGate {
    // ---
    /// Return the cached session if still fresh, otherwise run `refresh`
    /// and cache its result. With `force`, always refresh.
    pub(crate) async fn get_or_refresh<F, Fut>(&self, force: bool, refresh: F) -> Result<Session>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Session>>,
    {
        // ---
        let mut guard = self.state.lock().await;

        if !force {
            if let Some(session) = guard.as_ref().filter(|s| s.is_fresh_at(Utc::now())) {
                return Ok(session.clone());
            }
        }

        let session = refresh().await?;
        *guard = Some(session.clone());
        Ok(session)
    }

    pub(crate) async fn replace(&self, session: Session) {
        *self.state.lock().await = Some(session);
    }

    pub(crate) async fn current(&self) -> Option<Session> {
        self.state.lock().await.clone()
    }
}
