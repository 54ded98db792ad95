//! [`SceneCloud`] implementation on top of the signed request client.

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use scenehub_app::ports::SceneCloud;
use scenehub_domain::device::Device;
use scenehub_domain::error::SceneHubError;
use scenehub_domain::id::{DeviceId, RuleId, SpaceId};
use scenehub_domain::scene::{ScenePayload, SceneRule};
use scenehub_domain::shadow::DeviceShadow;

use crate::client::{ApiRequest, SignedRequestClient};
use crate::config::TuyaConfig;
use crate::error::TuyaError;
use crate::wire::{
    CreatedRule, DevicePage, RuleBody, RuleList, RuleRecord, RuleStateBody, ShadowRecord,
    join_ids,
};

const DEVICES_PATH: &str = "/v2.0/cloud/thing/space/device";
const RULES_PATH: &str = "/v2.0/cloud/scene/rule";
const RULES_STATE_PATH: &str = "/v2.0/cloud/scene/rule/state";

/// Tuya cloud project exposed through the [`SceneCloud`] port.
pub struct TuyaCloud {
    client: SignedRequestClient,
    page_size: u32,
}

impl TuyaCloud {
    /// # Errors
    ///
    /// Returns a [`TuyaError`] if the configuration is invalid.
    pub fn new(config: &TuyaConfig) -> Result<Self, TuyaError> {
        Ok(Self {
            client: SignedRequestClient::new(config)?,
            page_size: config.page_size,
        })
    }

    /// Share `cancel` with the request client so in-flight retries stop
    /// when it fires.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.client = self.client.with_cancellation(cancel);
        self
    }

    /// Shadow of a device, restricted to `codes` when not empty.
    ///
    /// # Errors
    ///
    /// Returns a [`TuyaError`] once the call's retries are exhausted.
    pub async fn shadow(
        &self,
        device_id: &DeviceId,
        codes: &[String],
    ) -> Result<DeviceShadow, TuyaError> {
        let request = ApiRequest::get(format!(
            "/v2.0/cloud/thing/{device_id}/shadow/properties"
        ))
        .query_opt("codes", (!codes.is_empty()).then(|| codes.join(",")));
        let record: ShadowRecord = self.client.call(&request).await?;
        Ok(record.into_shadow(device_id.clone()))
    }

    async fn devices(&self, space_id: &SpaceId) -> Result<Vec<Device>, SceneHubError> {
        let mut devices = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let request = ApiRequest::get(DEVICES_PATH)
                .query("space_ids", space_id.as_str())
                .query("is_recursion", "false")
                .query("page_size", self.page_size.to_string())
                .query_opt("last_id", cursor.clone());
            let page: DevicePage = self.client.call(&request).await?;
            let (records, next) = match page {
                // Without an explicit cursor, resume after the last device.
                DevicePage::Paged {
                    list,
                    has_more: true,
                    last_id,
                } => {
                    let next = last_id
                        .filter(|id| !id.is_empty())
                        .or_else(|| list.last().map(|record| record.id.clone()));
                    (list, next)
                }
                DevicePage::Paged { list, .. } | DevicePage::Plain(list) => (list, None),
            };
            for record in records {
                devices.push(record.into_device(space_id)?);
            }
            match next {
                Some(next) if cursor.as_ref() != Some(&next) => cursor = Some(next),
                Some(next) => {
                    tracing::warn!(%space_id, cursor = %next, "device listing repeated its cursor, stopping");
                    break;
                }
                None => break,
            }
        }
        tracing::debug!(%space_id, count = devices.len(), "devices listed");
        Ok(devices)
    }
}

impl SceneCloud for TuyaCloud {
    async fn list_devices(&self, space_id: &SpaceId) -> Result<Vec<Device>, SceneHubError> {
        self.devices(space_id).await
    }

    async fn device_shadow(&self, device_id: &DeviceId) -> Result<DeviceShadow, SceneHubError> {
        Ok(self.shadow(device_id, &[]).await?)
    }

    async fn list_rules(&self, space_id: &SpaceId) -> Result<Vec<SceneRule>, SceneHubError> {
        let request = ApiRequest::get(RULES_PATH).query("space_id", space_id.as_str());
        let list: RuleList = self.client.call(&request).await?;
        let rules = list
            .into_records()
            .into_iter()
            .map(RuleRecord::into_rule)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rules)
    }

    async fn get_rule(&self, rule_id: &RuleId) -> Result<SceneRule, SceneHubError> {
        let request = ApiRequest::get(format!("{RULES_PATH}/{rule_id}"));
        let mut record: RuleRecord = self.client.call(&request).await?;
        if record.id.trim().is_empty() {
            record.id = rule_id.to_string();
        }
        Ok(record.into_rule()?)
    }

    async fn create_rule(
        &self,
        space_id: &SpaceId,
        payload: &ScenePayload,
    ) -> Result<RuleId, SceneHubError> {
        payload.validate()?;
        let body = rule_body(space_id, payload)?;
        let request = ApiRequest::post(RULES_PATH).json(body);
        let created: CreatedRule = self.client.call(&request).await?;
        let rule_id = RuleId::new(created.into_id())?;
        tracing::info!(%rule_id, name = %payload.name, "rule created");
        Ok(rule_id)
    }

    async fn update_rule(
        &self,
        space_id: &SpaceId,
        rule_id: &RuleId,
        payload: &ScenePayload,
    ) -> Result<(), SceneHubError> {
        payload.validate()?;
        let body = rule_body(space_id, payload)?;
        let request = ApiRequest::put(format!("{RULES_PATH}/{rule_id}")).json(body);
        let _: Value = self.client.call(&request).await?;
        tracing::info!(%rule_id, name = %payload.name, "rule updated");
        Ok(())
    }

    async fn set_rules_state(&self, rule_ids: &[RuleId], enabled: bool) -> Result<(), SceneHubError> {
        if rule_ids.is_empty() {
            return Ok(());
        }
        let ids = join_ids(rule_ids);
        let body = serde_json::to_value(RuleStateBody {
            ids: ids.clone(),
            is_enable: enabled,
        })
        .map_err(|err| TuyaError::decode(RULES_STATE_PATH, err))?;
        let request = ApiRequest::put(RULES_STATE_PATH).json(body);
        let _: Value = self.client.call(&request).await?;
        tracing::info!(%ids, enabled, "rule state changed");
        Ok(())
    }

    async fn trigger_rule(&self, rule_id: &RuleId) -> Result<(), SceneHubError> {
        let request = ApiRequest::post(format!("{RULES_PATH}/{rule_id}/actions/trigger"));
        let _: Value = self.client.call(&request).await?;
        tracing::info!(%rule_id, "rule triggered");
        Ok(())
    }

    async fn delete_rules(&self, space_id: &SpaceId, rule_ids: &[RuleId]) -> Result<(), SceneHubError> {
        if rule_ids.is_empty() {
            return Ok(());
        }
        let ids = join_ids(rule_ids);
        let request = ApiRequest::delete(RULES_PATH)
            .query("ids", ids.clone())
            .query("space_id", space_id.as_str());
        let _: Value = self.client.call(&request).await?;
        tracing::info!(%ids, %space_id, "rules deleted");
        Ok(())
    }
}

fn rule_body(space_id: &SpaceId, payload: &ScenePayload) -> Result<Value, TuyaError> {
    serde_json::to_value(RuleBody::from_payload(space_id, payload))
        .map_err(|err| TuyaError::decode(RULES_PATH, err))
}
