//! Batch reports — per-item outcomes of a coordinator stage.

use std::fmt;

use scenehub_domain::error::SceneHubError;
use scenehub_domain::id::RuleId;
use scenehub_domain::scene::IdempotencyKey;

/// A single item that failed within a batch.
#[derive(Debug)]
pub struct ItemFailure {
    /// Human-readable label of the item (device id, heuristic instance, scene name).
    pub item: String,
    pub error: SceneHubError,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.item, self.error)
    }
}

/// Successes and failures of a batch stage, in input order.
///
/// A failing item never aborts its siblings; it is recorded here instead.
#[derive(Debug)]
pub struct BatchReport<T> {
    pub succeeded: Vec<T>,
    pub failed: Vec<ItemFailure>,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<T> BatchReport<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, item: impl Into<String>, outcome: Result<T, SceneHubError>) {
        match outcome {
            Ok(value) => self.succeeded.push(value),
            Err(error) => self.fail(item, error),
        }
    }

    pub fn fail(&mut self, item: impl Into<String>, error: SceneHubError) {
        let item = item.into();
        tracing::warn!(item = %item, error = %error, "batch item failed");
        self.failed.push(ItemFailure { item, error });
    }

    /// Whether every item succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of items processed, successful or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How a proposal reached the cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitAction {
    Created,
    Updated,
}

/// Result of submitting one proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub rule_id: RuleId,
    pub name: String,
    pub idempotency_key: Option<IdempotencyKey>,
    pub action: SubmitAction,
    /// Whether the rule is enabled: set right after creation, or carried
    /// over from the rule an update matched.
    pub enabled: bool,
}
