//! Tuya cloud configuration.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::error::TuyaError;
use crate::retry::RetryPolicy;

/// Default regional endpoint (Western America data center).
pub const DEFAULT_BASE_URL: &str = "https://openapi.tuyaus.com";

/// A credential that never shows up in `Debug` output or logs.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw secret, for signing only.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("Secret(<empty>)")
        } else {
            f.write_str("Secret(***)")
        }
    }
}

/// Client id and secret of a Tuya cloud project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: Secret,
}

/// Backoff settings for one class of retryable failure.
///
/// Every field is required once the table is present.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RetrySettings {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Fraction in `[0, 1]` by which a delay may be stretched at random.
    pub jitter: f64,
}

impl RetrySettings {
    /// Defaults for HTTP 429 responses.
    #[must_use]
    pub const fn rate_limit() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 1_500,
            max_delay_ms: 30_000,
            jitter: 0.5,
        }
    }

    /// Defaults for connection failures and timeouts.
    #[must_use]
    pub const fn transient() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 5_000,
            jitter: 0.5,
        }
    }

    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
            self.jitter,
        )
    }
}

/// Configuration of the Tuya cloud adapter.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TuyaConfig {
    /// Regional OpenAPI endpoint, without a trailing slash.
    pub base_url: String,
    pub client_id: String,
    pub client_secret: Secret,
    /// Per-request timeout, in seconds.
    pub request_timeout_secs: u64,
    /// A token is refreshed this many seconds before it expires.
    pub token_margin_secs: u64,
    /// Devices requested per page during discovery.
    pub page_size: u32,
    /// Also retry 502, 503 and 504 with the transient policy.
    pub retry_on_server_error: bool,
    #[serde(default = "RetrySettings::rate_limit")]
    pub rate_limit: RetrySettings,
    #[serde(default = "RetrySettings::transient")]
    pub transient: RetrySettings,
}

impl Default for TuyaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            client_id: String::new(),
            client_secret: Secret::default(),
            request_timeout_secs: 15,
            token_margin_secs: 30,
            page_size: 20,
            retry_on_server_error: false,
            rate_limit: RetrySettings::rate_limit(),
            transient: RetrySettings::transient(),
        }
    }
}

impl TuyaConfig {
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
        }
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn token_margin(&self) -> Duration {
        Duration::from_secs(self.token_margin_secs)
    }

    /// Base URL with any trailing slash removed.
    #[must_use]
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// # Errors
    ///
    /// Returns [`TuyaError::Config`] when credentials are missing, the base
    /// URL is not an absolute http(s) URL, or a numeric setting is zero.
    pub fn validate(&self) -> Result<(), TuyaError> {
        if self.client_id.trim().is_empty() {
            return Err(TuyaError::Config("client_id is required".to_string()));
        }
        if self.client_secret.is_empty() {
            return Err(TuyaError::Config("client_secret is required".to_string()));
        }
        let url = url::Url::parse(self.normalized_base_url())
            .map_err(|err| TuyaError::Config(format!("invalid base_url: {err}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TuyaError::Config(format!(
                "base_url must use http or https, got {:?}",
                url.scheme()
            )));
        }
        if self.page_size == 0 {
            return Err(TuyaError::Config("page_size must be positive".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(TuyaError::Config(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
