//! Dry-run pipeline — discover, inspect and propose without mutating the cloud.

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use scenehub_adapter_tuya::{TuyaCloud, TuyaError};
use scenehub_app::coordinator::{PipelineReport, WorkflowCoordinator};
use scenehub_app::report::ItemFailure;
use scenehub_domain::error::SceneHubError;
use scenehub_domain::scene::ScenePayload;

use crate::config::{Config, ConfigError};

/// Errors that stop the pipeline as a whole.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Tuya(#[from] TuyaError),
    #[error(transparent)]
    Pipeline(#[from] SceneHubError),
}

/// A failed item, rendered for output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureLine {
    pub stage: &'static str,
    pub item: String,
    pub error: String,
}

impl FailureLine {
    fn new(stage: &'static str, failure: &ItemFailure) -> Self {
        Self {
            stage,
            item: failure.item.clone(),
            error: failure.error.to_string(),
        }
    }
}

/// What a dry run found and would submit.
#[derive(Debug, Serialize)]
pub struct DryRunReport {
    pub space_id: String,
    pub devices: usize,
    pub inspected: usize,
    pub proposals: Vec<ScenePayload>,
    pub failures: Vec<FailureLine>,
}

impl DryRunReport {
    #[must_use]
    pub fn new(space_id: String, report: PipelineReport) -> Self {
        let failures = report
            .shadows
            .failed
            .iter()
            .map(|failure| FailureLine::new("inspect", failure))
            .chain(
                report
                    .proposals
                    .failed
                    .iter()
                    .map(|failure| FailureLine::new("propose", failure)),
            )
            .collect();
        Self {
            space_id,
            devices: report.devices.len(),
            inspected: report.shadows.succeeded.len(),
            proposals: report.proposals.succeeded,
            failures,
        }
    }
}

/// Build the coordinator over the Tuya adapter. Both share `cancel`, so
/// firing it stops new batch items and in-flight retries alike.
///
/// # Errors
///
/// Returns a [`RunError`] if the configuration is incomplete.
pub fn coordinator(
    config: &Config,
    cancel: CancellationToken,
) -> Result<WorkflowCoordinator<TuyaCloud>, RunError> {
    let settings = config.workflow_settings()?;
    let cloud = TuyaCloud::new(&config.tuya)?.with_cancellation(cancel.clone());
    Ok(WorkflowCoordinator::new(cloud, Arc::new(config.registry()), settings)
        .with_cancellation_token(cancel))
}

/// Run discovery, inspection and proposal against the configured space.
///
/// # Errors
///
/// Returns a [`RunError`] if the configuration is incomplete or discovery
/// fails. Per-device and per-heuristic failures end up in the report.
pub async fn dry_run(config: &Config, cancel: CancellationToken) -> Result<DryRunReport, RunError> {
    let coordinator = coordinator(config, cancel)?;
    let space_id = coordinator.settings().space_id.to_string();

    tracing::info!(
        space_id = %space_id,
        heuristics = config.heuristics.len(),
        "starting dry run"
    );
    let report = coordinator.plan(&config.heuristics).await?;
    let report = DryRunReport::new(space_id, report);
    tracing::info!(
        devices = report.devices,
        proposals = report.proposals.len(),
        failures = report.failures.len(),
        "dry run finished"
    );
    Ok(report)
}
