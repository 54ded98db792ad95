//! Error taxonomy shared across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`SceneHubError`] at the port boundary. Errors carry enough context
//! (operation, device or rule identifier, status, attempt count) for a
//! user to act on them without re-running with debug logging.

use std::fmt;

/// Top-level error returned by domain logic, ports and services.
#[derive(Debug, thiserror::Error)]
pub enum SceneHubError {
    /// A payload or heuristic input failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A logical property could not be mapped to a datapoint code.
    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// The cloud API failed after internal retries were exhausted.
    #[error(transparent)]
    Cloud(#[from] CloudError),

    /// The idempotency check found more than one live rule for a key.
    #[error(transparent)]
    Conflict(#[from] SceneConflictError),

    /// A mutating command was submitted without affirmative confirmation.
    #[error("{operation} requires explicit confirmation")]
    ConfirmationRequired {
        /// Name of the refused operation.
        operation: &'static str,
    },

    /// The batch was cancelled before this item started.
    #[error("operation cancelled before {operation} started")]
    Cancelled {
        /// Name of the skipped operation.
        operation: &'static str,
    },
}

/// Invariant violations detected before anything is sent to the cloud.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A scene payload has an empty name.
    #[error("scene name must not be empty")]
    EmptyName,

    /// A scene payload has no conditions.
    #[error("scene {scene:?} has no conditions")]
    NoConditions { scene: String },

    /// A scene payload has no actions.
    #[error("scene {scene:?} has no actions")]
    NoActions { scene: String },

    /// A condition or action is missing its datapoint/function `code`.
    #[error("{fragment} #{order} of scene {scene:?} is missing its code")]
    MissingCode {
        scene: String,
        fragment: Fragment,
        order: u32,
    },

    /// The shadow snapshot lacks a datapoint a heuristic needs.
    #[error("device {device_id} reports no value for {code:?}")]
    MissingTelemetry { device_id: String, code: String },

    /// A datapoint is present but not numeric.
    #[error("device {device_id} reports a non-numeric value for {code:?}")]
    NonNumericTelemetry { device_id: String, code: String },

    /// Heuristic thresholds are inconsistent with each other.
    #[error("invalid thresholds for {heuristic}: {reason}")]
    InvalidThresholds {
        heuristic: &'static str,
        reason: &'static str,
    },

    /// A clock value is not a valid `HH:MM` time.
    #[error("invalid clock time {0:?}, expected HH:MM")]
    InvalidClockTime(String),

    /// A weekday loop mask is not seven `0`/`1` characters.
    #[error("invalid weekday mask {0:?}, expected seven 0/1 characters")]
    InvalidWeekdays(String),

    /// An identifier is empty.
    #[error("{kind} identifier must not be empty")]
    EmptyIdentifier { kind: &'static str },

    /// A heuristic names a device that discovery did not return.
    #[error("device {device_id} was not discovered")]
    UnknownDevice { device_id: String },

    /// Two proposals in one batch carry the same idempotency key.
    #[error("idempotency key {key:?} appears more than once in the batch")]
    DuplicateKey { key: String },

    /// A heuristic needs the shadow of a device that was not inspected.
    #[error("no shadow snapshot for device {device_id}")]
    MissingShadow { device_id: String },

    /// An extra action names neither a function code nor a logical function.
    #[error("extra action for device {device_id} needs a code or a function")]
    IncompleteAction { device_id: String },
}

/// The kind of scene fragment a [`ValidationError::MissingCode`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fragment {
    Condition,
    Action,
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Condition => f.write_str("condition"),
            Self::Action => f.write_str("action"),
        }
    }
}

/// A single logical property that has no mapping for a device.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no datapoint mapping for {logical_name:?} on device {device_id} (category {category:?})")]
pub struct MappingNotFoundError {
    pub logical_name: String,
    pub device_id: String,
    pub category: String,
}

/// Mapping resolution failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    /// One property could not be resolved.
    #[error(transparent)]
    NotFound(#[from] MappingNotFoundError),

    /// A batch resolution left one or more properties unresolved.
    #[error("{} unresolved mapping(s) for device {device_id} (category {category:?}): {}", .missing.len(), names(.missing))]
    Unresolved {
        device_id: String,
        category: String,
        missing: Vec<MappingNotFoundError>,
    },
}

impl MappingError {
    /// Device whose mapping was looked up.
    #[must_use]
    pub fn device_id(&self) -> &str {
        match self {
            Self::NotFound(err) => &err.device_id,
            Self::Unresolved { device_id, .. } => device_id,
        }
    }

    /// Every logical property name this error reports as unresolved.
    #[must_use]
    pub fn logical_names(&self) -> Vec<&str> {
        match self {
            Self::NotFound(err) => vec![err.logical_name.as_str()],
            Self::Unresolved { missing, .. } => {
                missing.iter().map(|m| m.logical_name.as_str()).collect()
            }
        }
    }
}

fn names(missing: &[MappingNotFoundError]) -> String {
    missing
        .iter()
        .map(|m| m.logical_name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failures reported by the cloud port once retries are exhausted.
///
/// `operation` is the `METHOD /path` of the failing call, so it names the
/// device or rule identifier embedded in the path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CloudError {
    /// Bad credentials, or a second 401 after a token refresh.
    #[error("authentication failed for {operation} (status {status:?}, attempt {attempts}): {message}")]
    Auth {
        operation: String,
        status: Option<u16>,
        attempts: u32,
        message: String,
    },

    /// HTTP 429 persisted through the whole backoff budget.
    #[error("{operation} still rate limited after {attempts} attempts")]
    RateLimitExceeded { operation: String, attempts: u32 },

    /// Transient connectivity failures persisted through the backoff budget.
    #[error("{operation} failed after {attempts} attempts: {message}")]
    Network {
        operation: String,
        attempts: u32,
        message: String,
    },

    /// A non-retryable HTTP status or a vendor-level rejection.
    #[error("{operation} rejected with status {status} after {attempts} attempt(s): {message}")]
    Api {
        operation: String,
        status: u16,
        vendor_code: Option<i64>,
        attempts: u32,
        message: String,
    },

    /// The response could not be decoded into the expected shape.
    #[error("unexpected response for {operation}: {message}")]
    Decode { operation: String, message: String },

    /// Cancellation was requested while the call was waiting to retry.
    #[error("{operation} cancelled after {attempts} attempt(s)")]
    Cancelled { operation: String, attempts: u32 },
}

impl CloudError {
    /// The `METHOD /path` of the failing call.
    #[must_use]
    pub fn operation(&self) -> &str {
        match self {
            Self::Auth { operation, .. }
            | Self::RateLimitExceeded { operation, .. }
            | Self::Network { operation, .. }
            | Self::Api { operation, .. }
            | Self::Decode { operation, .. }
            | Self::Cancelled { operation, .. } => operation,
        }
    }
}

/// The idempotency check found an unexpected duplicate state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("idempotency key {key:?} matches {} live rules: {}", .rule_ids.len(), .rule_ids.join(", "))]
pub struct SceneConflictError {
    pub key: String,
    pub rule_ids: Vec<String>,
}
