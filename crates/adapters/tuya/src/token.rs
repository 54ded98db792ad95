//! Access-token lifecycle.
//!
//! [`TokenManager`] hands out a cached token while it is comfortably inside
//! its lifetime and collapses concurrent refreshes into a single fetch:
//! callers that queue behind an in-flight refresh receive that refresh's
//! outcome, success or failure, instead of starting their own.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// A bearer token with its absolute expiry.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    /// A token valid for `ttl` from now.
    #[must_use]
    pub fn new(value: impl Into<String>, ttl: Duration) -> Self {
        Self {
            value: value.into(),
            expires_at: Instant::now() + ttl,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    fn is_fresh(&self, margin: Duration) -> bool {
        Instant::now() + margin < self.expires_at
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"***")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Why a token could not be obtained.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// The token endpoint answered but refused the credentials.
    #[error("token request rejected (status {status:?}, code {code:?}): {message}")]
    Rejected {
        status: Option<u16>,
        code: Option<i64>,
        message: String,
    },
    /// The token endpoint could not be reached.
    #[error("token endpoint unreachable: {message}")]
    Unreachable { message: String },
}

/// Something that can mint a fresh access token.
pub trait TokenSource: Send + Sync {
    fn fetch_token(&self) -> impl Future<Output = Result<AccessToken, TokenError>> + Send;
}

#[derive(Default)]
struct TokenState {
    token: Option<AccessToken>,
    stale: bool,
    /// Incremented by every completed fetch.
    generation: u64,
    last_outcome: Option<Result<AccessToken, TokenError>>,
}

impl TokenState {
    fn usable(&self, margin: Duration) -> Option<&AccessToken> {
        self.token
            .as_ref()
            .filter(|token| !self.stale && token.is_fresh(margin))
    }
}

/// Caches one access token and refreshes it single-flight.
pub struct TokenManager<S> {
    source: S,
    margin: Duration,
    state: Mutex<TokenState>,
    refresh: Mutex<()>,
}

impl<S: TokenSource> TokenManager<S> {
    /// A token is considered expired `margin` before its actual expiry.
    #[must_use]
    pub fn new(source: S, margin: Duration) -> Self {
        Self {
            source,
            margin,
            state: Mutex::new(TokenState::default()),
            refresh: Mutex::new(()),
        }
    }

    /// Return a usable token, fetching one if needed.
    ///
    /// # Errors
    ///
    /// Returns the [`TokenError`] of the fetch this call took part in.
    /// A failure is not cached: the next call after it starts a new fetch.
    pub async fn acquire(&self) -> Result<AccessToken, TokenError> {
        let observed = {
            let state = self.state.lock().await;
            if let Some(token) = state.usable(self.margin) {
                return Ok(token.clone());
            }
            state.generation
        };

        let _refresh = self.refresh.lock().await;
        {
            let state = self.state.lock().await;
            if state.generation != observed
                && let Some(outcome) = &state.last_outcome
            {
                tracing::debug!("reusing outcome of concurrent token refresh");
                return outcome.clone();
            }
        }

        tracing::debug!("fetching access token");
        let outcome = self.source.fetch_token().await;

        let mut state = self.state.lock().await;
        state.generation += 1;
        match &outcome {
            Ok(token) => {
                tracing::info!(expires_at = ?token.expires_at(), "access token refreshed");
                state.token = Some(token.clone());
                state.stale = false;
            }
            Err(err) => {
                tracing::warn!(error = %err, "access token refresh failed");
                state.token = None;
            }
        }
        state.last_outcome = Some(outcome.clone());
        outcome
    }

    /// Mark `rejected` as unusable so the next [`acquire`](Self::acquire)
    /// refreshes. Has no effect if a newer token is already cached.
    pub async fn invalidate(&self, rejected: &AccessToken) {
        let mut state = self.state.lock().await;
        if state
            .token
            .as_ref()
            .is_some_and(|current| current.value == rejected.value)
        {
            tracing::debug!("access token invalidated");
            state.stale = true;
        }
    }
}
