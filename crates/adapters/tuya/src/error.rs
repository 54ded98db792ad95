//! Tuya adapter error types.

use scenehub_domain::error::{CloudError, SceneHubError};

use crate::token::TokenError;

/// Errors specific to the Tuya adapter.
#[derive(Debug, thiserror::Error)]
pub enum TuyaError {
    /// The adapter configuration is unusable.
    #[error("invalid tuya configuration: {0}")]
    Config(String),

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),

    /// The request could not be delivered, even after transient retries.
    #[error("{operation} failed after {attempts} attempt(s)")]
    Network {
        operation: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    /// The token endpoint could not be reached.
    #[error("{operation} could not obtain an access token: {message}")]
    TokenUnavailable {
        operation: String,
        attempts: u32,
        message: String,
    },

    /// Credentials were rejected, or a refreshed token was rejected again.
    #[error("{operation} unauthorized (status {status:?}) after {attempts} attempt(s): {message}")]
    Unauthorized {
        operation: String,
        status: Option<u16>,
        attempts: u32,
        message: String,
    },

    /// HTTP 429 persisted through the whole rate-limit budget.
    #[error("{operation} still rate limited after {attempts} attempts")]
    RateLimited { operation: String, attempts: u32 },

    /// A non-retryable status, or an envelope with `success = false`.
    #[error("{operation} rejected with status {status} (code {vendor_code:?}): {message}")]
    Rejected {
        operation: String,
        status: u16,
        vendor_code: Option<i64>,
        attempts: u32,
        message: String,
    },

    /// Cancellation was requested while the call was retrying.
    #[error("{operation} cancelled after {attempts} attempt(s)")]
    Cancelled { operation: String, attempts: u32 },

    /// The response body does not have the expected shape.
    #[error("unexpected response for {operation}: {message}")]
    Decode { operation: String, message: String },
}

impl TuyaError {
    pub(crate) fn decode(operation: &str, message: impl ToString) -> Self {
        Self::Decode {
            operation: operation.to_string(),
            message: message.to_string(),
        }
    }

    /// Map a failed token acquisition onto the call that needed the token.
    pub(crate) fn from_token(operation: &str, attempts: u32, err: TokenError) -> Self {
        match err {
            TokenError::Rejected {
                status, message, ..
            } => Self::Unauthorized {
                operation: operation.to_string(),
                status,
                attempts,
                message: format!("token request rejected: {message}"),
            },
            TokenError::Unreachable { message } => Self::TokenUnavailable {
                operation: operation.to_string(),
                attempts,
                message,
            },
        }
    }

    /// Convert into a [`CloudError`] wrapped in [`SceneHubError`] for
    /// propagation across port boundaries.
    #[must_use]
    pub fn into_domain(self) -> SceneHubError {
        let cloud = match self {
            Self::Config(message) => CloudError::Auth {
                operation: "configure".to_string(),
                status: None,
                attempts: 0,
                message,
            },
            Self::Client(source) => CloudError::Network {
                operation: "configure".to_string(),
                attempts: 0,
                message: source.to_string(),
            },
            Self::Network {
                operation,
                attempts,
                source,
            } => CloudError::Network {
                operation,
                attempts,
                message: source.to_string(),
            },
            Self::TokenUnavailable {
                operation,
                attempts,
                message,
            } => CloudError::Network {
                operation,
                attempts,
                message,
            },
            Self::Unauthorized {
                operation,
                status,
                attempts,
                message,
            } => CloudError::Auth {
                operation,
                status,
                attempts,
                message,
            },
            Self::RateLimited {
                operation,
                attempts,
            } => CloudError::RateLimitExceeded {
                operation,
                attempts,
            },
            Self::Rejected {
                operation,
                status,
                vendor_code,
                attempts,
                message,
            } => CloudError::Api {
                operation,
                status,
                vendor_code,
                attempts,
                message,
            },
            Self::Cancelled {
                operation,
                attempts,
            } => CloudError::Cancelled {
                operation,
                attempts,
            },
            Self::Decode { operation, message } => CloudError::Decode { operation, message },
        };
        SceneHubError::Cloud(cloud)
    }
}

impl From<TuyaError> for SceneHubError {
    fn from(err: TuyaError) -> Self {
        err.into_domain()
    }
}
