//! Commands — confirmation-gated cloud mutations.
//!
//! Every mutation goes through a [`Command`], which starts unconfirmed.
//! [`WorkflowCoordinator::execute`](crate::coordinator::WorkflowCoordinator::execute)
//! refuses a command until [`Command::confirm`] has been called.

use scenehub_domain::id::RuleId;
use scenehub_domain::scene::ScenePayload;

use crate::report::{BatchReport, SubmitOutcome};

/// A cloud mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Create or update rules for the given proposals.
    Submit { proposals: Vec<ScenePayload> },
    /// Enable or disable rules.
    SetState { rule_ids: Vec<RuleId>, enabled: bool },
    /// Run a rule's actions immediately.
    Trigger { rule_id: RuleId },
    /// Delete rules.
    Delete { rule_ids: Vec<RuleId> },
}

impl Mutation {
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Submit { .. } => "submit",
            Self::SetState { .. } => "set_state",
            Self::Trigger { .. } => "trigger",
            Self::Delete { .. } => "delete",
        }
    }
}

/// A mutation plus the caller's explicit confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    mutation: Mutation,
    confirmed: bool,
}

impl Command {
    /// Wrap a mutation; it is not confirmed yet.
    #[must_use]
    pub fn new(mutation: Mutation) -> Self {
        Self {
            mutation,
            confirmed: false,
        }
    }

    #[must_use]
    pub fn submit(proposals: Vec<ScenePayload>) -> Self {
        Self::new(Mutation::Submit { proposals })
    }

    #[must_use]
    pub fn set_state(rule_ids: Vec<RuleId>, enabled: bool) -> Self {
        Self::new(Mutation::SetState { rule_ids, enabled })
    }

    #[must_use]
    pub fn trigger(rule_id: RuleId) -> Self {
        Self::new(Mutation::Trigger { rule_id })
    }

    #[must_use]
    pub fn delete(rule_ids: Vec<RuleId>) -> Self {
        Self::new(Mutation::Delete { rule_ids })
    }

    /// Affirm that the mutation should run.
    #[must_use]
    pub fn confirm(mut self) -> Self {
        self.confirmed = true;
        self
    }

    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    #[must_use]
    pub fn mutation(&self) -> &Mutation {
        &self.mutation
    }

    #[must_use]
    pub fn operation(&self) -> &'static str {
        self.mutation.operation()
    }

    pub(crate) fn into_mutation(self) -> Mutation {
        self.mutation
    }
}

/// What an executed command did.
#[derive(Debug)]
pub enum CommandOutcome {
    Submitted(BatchReport<SubmitOutcome>),
    StateSet { rule_ids: Vec<RuleId>, enabled: bool },
    Triggered(RuleId),
    Deleted(Vec<RuleId>),
}
