//! Scene cloud port — the vendor API the coordinator drives.
//!
//! Implementations own authentication, signing and retries; callers only
//! see the final outcome of each operation as a [`SceneHubError`].

use std::future::Future;

use scenehub_domain::device::Device;
use scenehub_domain::error::SceneHubError;
use scenehub_domain::id::{DeviceId, RuleId, SpaceId};
use scenehub_domain::scene::{ScenePayload, SceneRule};
use scenehub_domain::shadow::DeviceShadow;

/// Devices, shadows and scene rules of one cloud project.
pub trait SceneCloud: Send + Sync {
    /// List every device in a space, following pagination to the end.
    fn list_devices(
        &self,
        space_id: &SpaceId,
    ) -> impl Future<Output = Result<Vec<Device>, SceneHubError>> + Send;

    /// Fetch the latest reported datapoints of a device.
    fn device_shadow(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<DeviceShadow, SceneHubError>> + Send;

    /// List the scene rules of a space.
    fn list_rules(
        &self,
        space_id: &SpaceId,
    ) -> impl Future<Output = Result<Vec<SceneRule>, SceneHubError>> + Send;

    /// Fetch one rule by id.
    fn get_rule(
        &self,
        rule_id: &RuleId,
    ) -> impl Future<Output = Result<SceneRule, SceneHubError>> + Send;

    /// Create a rule and return its new identifier.
    fn create_rule(
        &self,
        space_id: &SpaceId,
        payload: &ScenePayload,
    ) -> impl Future<Output = Result<RuleId, SceneHubError>> + Send;

    /// Replace the definition of an existing rule.
    fn update_rule(
        &self,
        space_id: &SpaceId,
        rule_id: &RuleId,
        payload: &ScenePayload,
    ) -> impl Future<Output = Result<(), SceneHubError>> + Send;

    /// Enable or disable rules in one call.
    fn set_rules_state(
        &self,
        rule_ids: &[RuleId],
        enabled: bool,
    ) -> impl Future<Output = Result<(), SceneHubError>> + Send;

    /// Run a rule's actions now without changing its enabled state.
    fn trigger_rule(
        &self,
        rule_id: &RuleId,
    ) -> impl Future<Output = Result<(), SceneHubError>> + Send;

    /// Delete rules in one call.
    fn delete_rules(
        &self,
        space_id: &SpaceId,
        rule_ids: &[RuleId],
    ) -> impl Future<Output = Result<(), SceneHubError>> + Send;
}
