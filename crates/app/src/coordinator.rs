//! Workflow coordinator — sequences discovery, inspection, proposal and
//! cloud mutations.
//!
//! Read-only stages (`discover`, `inspect`, `propose`) are public methods.
//! Mutations only run through [`WorkflowCoordinator::execute`], which
//! requires a confirmed [`Command`]. Batch stages isolate per-item failures
//! in a [`BatchReport`], run at most `concurrency` cloud calls at a time,
//! and stop starting new items once the cancellation token fires.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use scenehub_domain::device::Device;
use scenehub_domain::error::{SceneConflictError, SceneHubError, ValidationError};
use scenehub_domain::heuristic::{HeuristicSpec, Inventory};
use scenehub_domain::id::{DeviceId, RuleId, SpaceId};
use scenehub_domain::mapping::MappingRegistry;
use scenehub_domain::scene::{IdempotencyKey, ScenePayload, SceneRule};
use scenehub_domain::shadow::DeviceShadow;

use crate::command::{Command, CommandOutcome, Mutation};
use crate::ports::SceneCloud;
use crate::report::{BatchReport, SubmitAction, SubmitOutcome};

/// Default number of concurrent cloud calls per batch.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Knobs of the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowSettings {
    /// Space scoping discovery, rule listing and deletion.
    pub space_id: SpaceId,
    /// Maximum in-flight cloud calls within one batch.
    pub concurrency: usize,
    /// Enable rules right after creating them.
    pub enable_after_create: bool,
}

impl WorkflowSettings {
    #[must_use]
    pub fn new(space_id: SpaceId) -> Self {
        Self {
            space_id,
            concurrency: DEFAULT_CONCURRENCY,
            enable_after_create: false,
        }
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    #[must_use]
    pub fn with_enable_after_create(mut self, enable: bool) -> Self {
        self.enable_after_create = enable;
        self
    }
}

/// Output of a dry run: nothing in it has been sent to the cloud.
#[derive(Debug)]
pub struct PipelineReport {
    pub devices: Vec<Device>,
    pub shadows: BatchReport<DeviceShadow>,
    pub proposals: BatchReport<ScenePayload>,
}

/// Orchestrates the pipeline against a [`SceneCloud`].
pub struct WorkflowCoordinator<C> {
    cloud: C,
    registry: Arc<MappingRegistry>,
    settings: WorkflowSettings,
    cancel: CancellationToken,
}

impl<C: SceneCloud> WorkflowCoordinator<C> {
    /// Create a coordinator with a fresh cancellation token.
    pub fn new(cloud: C, registry: Arc<MappingRegistry>, settings: WorkflowSettings) -> Self {
        Self {
            cloud,
            registry,
            settings,
            cancel: CancellationToken::new(),
        }
    }

    /// Share `cancel` with the cloud adapter so one signal stops both new
    /// batch items and in-flight retries.
    #[must_use]
    pub fn with_cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that, once cancelled, prevents new batch items from starting.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn cloud(&self) -> &C {
        &self.cloud
    }

    #[must_use]
    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    fn concurrency(&self) -> usize {
        self.settings.concurrency.max(1)
    }

    /// List the devices of the configured space.
    ///
    /// # Errors
    ///
    /// Returns the cloud error once its retries are exhausted.
    #[tracing::instrument(skip(self), fields(space_id = %self.settings.space_id))]
    pub async fn discover(&self) -> Result<Vec<Device>, SceneHubError> {
        let devices = self.cloud.list_devices(&self.settings.space_id).await?;
        tracing::info!(count = devices.len(), "devices discovered");
        Ok(devices)
    }

    /// Fetch the shadow of each device, isolating failures per device.
    #[tracing::instrument(skip_all, fields(count = device_ids.len()))]
    pub async fn inspect(&self, device_ids: &[DeviceId]) -> BatchReport<DeviceShadow> {
        let outcomes: Vec<_> = stream::iter(device_ids)
            .map(|device_id| async move {
                if self.cancel.is_cancelled() {
                    return (device_id, Err(SceneHubError::Cancelled { operation: "inspect" }));
                }
                (device_id, self.cloud.device_shadow(device_id).await)
            })
            .buffered(self.concurrency())
            .collect()
            .await;

        let mut report = BatchReport::new();
        for (device_id, outcome) in outcomes {
            report.record(device_id.to_string(), outcome);
        }
        tracing::info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "shadows inspected"
        );
        report
    }

    /// Run every heuristic instance against the inventory.
    ///
    /// Mapping misses and validation errors are recorded per instance; no
    /// cloud call is made.
    #[tracing::instrument(skip_all, fields(count = specs.len()))]
    pub fn propose(&self, inventory: &Inventory, specs: &[HeuristicSpec]) -> BatchReport<ScenePayload> {
        let mut report = BatchReport::new();
        for spec in specs {
            match spec.evaluate(inventory, &self.registry) {
                Ok(payloads) => {
                    if payloads.is_empty() {
                        tracing::debug!(heuristic = %spec, "no proposal for current readings");
                    }
                    report.succeeded.extend(payloads);
                }
                Err(error) => report.fail(spec.to_string(), error),
            }
        }
        tracing::info!(
            proposals = report.succeeded.len(),
            failed = report.failed.len(),
            "proposals built"
        );
        report
    }

    /// Discover, inspect the devices the heuristics read, and propose.
    ///
    /// # Errors
    ///
    /// Returns an error only if discovery itself fails; per-device and
    /// per-heuristic failures are reported in the [`PipelineReport`].
    pub async fn plan(&self, specs: &[HeuristicSpec]) -> Result<PipelineReport, SceneHubError> {
        let devices = self.discover().await?;
        let wanted: BTreeSet<&DeviceId> = specs
            .iter()
            .flat_map(HeuristicSpec::telemetry_devices)
            .collect();
        let targets: Vec<DeviceId> = devices
            .iter()
            .filter(|device| wanted.contains(&device.id))
            .map(|device| device.id.clone())
            .collect();
        let shadows = self.inspect(&targets).await;

        let mut inventory = Inventory::new();
        for device in &devices {
            inventory.add_device(device.clone());
        }
        for shadow in &shadows.succeeded {
            inventory.add_shadow(shadow.clone());
        }
        let proposals = self.propose(&inventory, specs);
        Ok(PipelineReport {
            devices,
            shadows,
            proposals,
        })
    }

    /// Existing rules of the configured space.
    ///
    /// # Errors
    ///
    /// Returns the cloud error once its retries are exhausted.
    pub async fn rules(&self) -> Result<Vec<SceneRule>, SceneHubError> {
        self.cloud.list_rules(&self.settings.space_id).await
    }

    /// Details of one rule.
    ///
    /// # Errors
    ///
    /// Returns the cloud error once its retries are exhausted.
    pub async fn rule(&self, rule_id: &RuleId) -> Result<SceneRule, SceneHubError> {
        self.cloud.get_rule(rule_id).await
    }

    /// Run a confirmed mutation.
    ///
    /// # Errors
    ///
    /// Returns [`SceneHubError::ConfirmationRequired`] for an unconfirmed
    /// command, [`SceneHubError::Cancelled`] once cancellation was
    /// requested, or the cloud error of a single-call mutation. Per-proposal
    /// submit failures are reported in the returned batch instead.
    #[tracing::instrument(skip_all, fields(operation = command.operation()))]
    pub async fn execute(&self, command: Command) -> Result<CommandOutcome, SceneHubError> {
        let operation = command.operation();
        if !command.is_confirmed() {
            tracing::warn!("refusing unconfirmed command");
            return Err(SceneHubError::ConfirmationRequired { operation });
        }
        if self.cancel.is_cancelled() {
            return Err(SceneHubError::Cancelled { operation });
        }

        match command.into_mutation() {
            Mutation::Submit { proposals } => {
                self.submit(proposals).await.map(CommandOutcome::Submitted)
            }
            Mutation::SetState { rule_ids, enabled } => {
                if !rule_ids.is_empty() {
                    self.cloud.set_rules_state(&rule_ids, enabled).await?;
                }
                tracing::info!(count = rule_ids.len(), enabled, "rule state updated");
                Ok(CommandOutcome::StateSet { rule_ids, enabled })
            }
            Mutation::Trigger { rule_id } => {
                self.cloud.trigger_rule(&rule_id).await?;
                tracing::info!(rule_id = %rule_id, "rule triggered");
                Ok(CommandOutcome::Triggered(rule_id))
            }
            Mutation::Delete { rule_ids } => {
                if !rule_ids.is_empty() {
                    self.cloud
                        .delete_rules(&self.settings.space_id, &rule_ids)
                        .await?;
                }
                tracing::info!(count = rule_ids.len(), "rules deleted");
                Ok(CommandOutcome::Deleted(rule_ids))
            }
        }
    }

    /// Create or update one rule per proposal, keyed by idempotency key.
    async fn submit(
        &self,
        proposals: Vec<ScenePayload>,
    ) -> Result<BatchReport<SubmitOutcome>, SceneHubError> {
        let mut report = BatchReport::new();
        let mut seen = HashSet::new();
        let mut ready = Vec::with_capacity(proposals.len());
        for payload in proposals {
            if let Err(error) = payload.validate() {
                report.fail(payload.name.clone(), error.into());
                continue;
            }
            if let Some(key) = &payload.idempotency_key
                && !seen.insert(key.clone())
            {
                let error = ValidationError::DuplicateKey {
                    key: key.to_string(),
                };
                report.fail(payload.name.clone(), error.into());
                continue;
            }
            ready.push(payload);
        }
        if ready.is_empty() {
            return Ok(report);
        }
        if self.cancel.is_cancelled() {
            return Err(SceneHubError::Cancelled { operation: "submit" });
        }

        let existing = self.rules_by_key().await?;
        let outcomes: Vec<_> = stream::iter(ready)
            .map(|payload| {
                let matches = payload
                    .idempotency_key
                    .as_ref()
                    .and_then(|key| existing.get(key))
                    .cloned()
                    .unwrap_or_default();
                async move {
                    let outcome = if self.cancel.is_cancelled() {
                        Err(SceneHubError::Cancelled { operation: "submit" })
                    } else {
                        self.submit_one(&payload, &matches).await
                    };
                    (payload.name, outcome)
                }
            })
            .buffered(self.concurrency())
            .collect()
            .await;

        for (name, outcome) in outcomes {
            report.record(name, outcome);
        }
        Ok(report)
    }

    /// Existing rules by idempotency key, with their enabled flag.
    async fn rules_by_key(
        &self,
    ) -> Result<HashMap<IdempotencyKey, Vec<(RuleId, bool)>>, SceneHubError> {
        let mut index: HashMap<IdempotencyKey, Vec<(RuleId, bool)>> = HashMap::new();
        for rule in self.rules().await? {
            if let Some(key) = rule.idempotency_key {
                index.entry(key).or_default().push((rule.id, rule.enabled));
            }
        }
        Ok(index)
    }

    #[tracing::instrument(skip_all, fields(name = %payload.name))]
    async fn submit_one(
        &self,
        payload: &ScenePayload,
        matches: &[(RuleId, bool)],
    ) -> Result<SubmitOutcome, SceneHubError> {
        let space_id = &self.settings.space_id;
        match matches {
            [] => {
                let rule_id = self.cloud.create_rule(space_id, payload).await?;
                let enabled = if self.settings.enable_after_create {
                    self.cloud
                        .set_rules_state(std::slice::from_ref(&rule_id), true)
                        .await?;
                    true
                } else {
                    false
                };
                tracing::info!(rule_id = %rule_id, enabled, "rule created");
                Ok(SubmitOutcome {
                    rule_id,
                    name: payload.name.clone(),
                    idempotency_key: payload.idempotency_key.clone(),
                    action: SubmitAction::Created,
                    enabled,
                })
            }
            [(rule_id, enabled)] => {
                self.cloud.update_rule(space_id, rule_id, payload).await?;
                tracing::info!(rule_id = %rule_id, enabled, "rule updated");
                Ok(SubmitOutcome {
                    rule_id: rule_id.clone(),
                    name: payload.name.clone(),
                    idempotency_key: payload.idempotency_key.clone(),
                    action: SubmitAction::Updated,
                    enabled: *enabled,
                })
            }
            _ => Err(SceneConflictError {
                key: payload
                    .idempotency_key
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
                rule_ids: matches.iter().map(|(id, _)| id.to_string()).collect(),
            }
            .into()),
        }
    }
}
