//! JSON shapes exchanged with the Tuya OpenAPI, and their conversion to
//! and from domain types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use scenehub_domain::device::Device;
use scenehub_domain::error::ValidationError;
use scenehub_domain::id::{DeviceId, RuleId, SpaceId};
use scenehub_domain::scene::{
    ConditionExpr, MatchType, SceneAction, SceneCondition, ScenePayload, SceneRule, numeric_value,
};
use scenehub_domain::shadow::{DeviceShadow, ShadowProperty, ShadowValue, ValueType};

/// Vendor code meaning the access token is invalid or expired.
pub const TOKEN_INVALID_CODE: i64 = 1010;

/// Outer wrapper of every response.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub msg: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TokenResult {
    pub access_token: String,
    /// Lifetime in seconds.
    pub expire_time: u64,
}

#[derive(Debug, Deserialize)]
pub struct DeviceRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "customName")]
    pub custom_name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, alias = "productId")]
    pub product_id: Option<String>,
    #[serde(default, alias = "isOnline")]
    pub is_online: Option<bool>,
}

impl DeviceRecord {
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyIdentifier`] for a blank device id.
    pub fn into_device(self, space_id: &SpaceId) -> Result<Device, ValidationError> {
        let id = DeviceId::new(&self.id)?;
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .or(self.custom_name.filter(|n| !n.trim().is_empty()))
            .unwrap_or_else(|| self.id.clone());
        let mut device = Device::new(id, name, self.category.unwrap_or_default())
            .with_space(space_id.clone());
        if let Some(product_id) = self.product_id {
            device = device.with_product(product_id);
        }
        device.online = self.is_online;
        Ok(device)
    }
}

/// One page of the device listing; older endpoints return a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DevicePage {
    Paged {
        #[serde(default)]
        list: Vec<DeviceRecord>,
        #[serde(default)]
        has_more: bool,
        #[serde(default)]
        last_id: Option<String>,
    },
    Plain(Vec<DeviceRecord>),
}

#[derive(Debug, Deserialize)]
pub struct ShadowRecord {
    #[serde(default)]
    pub properties: Vec<PropertyRecord>,
}

#[derive(Debug, Deserialize)]
pub struct PropertyRecord {
    pub code: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default, rename = "type")]
    pub value_type: Option<ValueType>,
    #[serde(default)]
    pub time: Option<i64>,
}

impl ShadowRecord {
    #[must_use]
    pub fn into_shadow(self, device_id: DeviceId) -> DeviceShadow {
        let mut shadow = DeviceShadow::new(device_id);
        for property in self.properties {
            shadow.properties.insert(
                property.code,
                ShadowProperty {
                    value: ShadowValue::from(property.value),
                    value_type: property.value_type.unwrap_or(ValueType::Unknown),
                    reported_at: property.time,
                },
            );
        }
        shadow
    }
}

#[derive(Debug, Deserialize)]
pub struct RuleRecord {
    #[serde(default, alias = "rule_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

impl RuleRecord {
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyIdentifier`] for a blank rule id.
    pub fn into_rule(self) -> Result<SceneRule, ValidationError> {
        let enabled = self
            .enabled
            .unwrap_or_else(|| self.status.as_deref() == Some("enable"));
        Ok(SceneRule::new(RuleId::new(&self.id)?, self.name, enabled))
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RuleList {
    Paged {
        #[serde(default)]
        list: Vec<RuleRecord>,
    },
    Plain(Vec<RuleRecord>),
}

impl RuleList {
    #[must_use]
    pub fn into_records(self) -> Vec<RuleRecord> {
        match self {
            Self::Paged { list } | Self::Plain(list) => list,
        }
    }
}

/// Result of a rule creation: either the bare id or an object holding it.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CreatedRule {
    Id(String),
    Object {
        #[serde(alias = "id")]
        rule_id: String,
    },
}

impl CreatedRule {
    #[must_use]
    pub fn into_id(self) -> String {
        match self {
            Self::Id(id) | Self::Object { rule_id: id } => id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RuleBody {
    pub space_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub rule_type: &'static str,
    pub decision_expr: &'static str,
    pub conditions: Vec<ConditionBody>,
    pub actions: Vec<ActionBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_time: Option<EffectiveTimeBody>,
}

#[derive(Debug, Serialize)]
pub struct ConditionBody {
    pub code: u32,
    pub entity_id: String,
    pub entity_type: &'static str,
    pub expr: ExprBody,
}

#[derive(Debug, Default, Serialize)]
pub struct ExprBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparator: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loops: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ActionBody {
    pub entity_id: String,
    pub action_executor: &'static str,
    pub executor_property: ExecutorProperty,
}

#[derive(Debug, Serialize)]
pub struct ExecutorProperty {
    pub function_code: String,
    pub function_value: Value,
}

#[derive(Debug, Serialize)]
pub struct EffectiveTimeBody {
    pub start: String,
    pub end: String,
    pub loops: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RuleStateBody {
    pub ids: String,
    pub is_enable: bool,
}

impl RuleBody {
    /// Lower a payload into the automation schema.
    ///
    /// A surplus condition is pinned to `baseline_value + margin`, since the
    /// cloud can only compare a datapoint against a constant.
    #[must_use]
    pub fn from_payload(space_id: &SpaceId, payload: &ScenePayload) -> Self {
        let time_zone_id = payload
            .effective_time
            .as_ref()
            .and_then(|window| window.time_zone_id.clone());
        Self {
            space_id: space_id.to_string(),
            name: payload.rule_name(),
            rule_type: "automation",
            decision_expr: match payload.match_type {
                MatchType::All => "and",
                MatchType::Any => "or",
            },
            conditions: payload
                .conditions
                .iter()
                .map(|condition| ConditionBody::from_condition(condition, time_zone_id.as_deref()))
                .collect(),
            actions: payload.actions.iter().map(ActionBody::from_action).collect(),
            effective_time: payload.effective_time.as_ref().map(|window| EffectiveTimeBody {
                start: window.start.to_string(),
                end: window.end.to_string(),
                loops: window.loops.to_string(),
                time_zone_id: window.time_zone_id.clone(),
            }),
        }
    }
}

impl ConditionBody {
    fn from_condition(condition: &SceneCondition, time_zone_id: Option<&str>) -> Self {
        match &condition.expr {
            ConditionExpr::Status {
                code,
                comparator,
                value,
            } => Self {
                code: condition.order,
                entity_id: condition.entity_id.to_string(),
                entity_type: "device_report",
                expr: ExprBody {
                    status_code: Some(code.clone()),
                    comparator: Some(comparator.as_str()),
                    status_value: Some(value.clone()),
                    ..ExprBody::default()
                },
            },
            ConditionExpr::Surplus {
                code,
                baseline_value,
                comparator,
                margin,
                ..
            } => Self {
                code: condition.order,
                entity_id: condition.entity_id.to_string(),
                entity_type: "device_report",
                expr: ExprBody {
                    status_code: Some(code.clone()),
                    comparator: Some(comparator.as_str()),
                    status_value: Some(numeric_value(baseline_value + margin)),
                    ..ExprBody::default()
                },
            },
            ConditionExpr::Timer { time, loops, .. } => Self {
                code: condition.order,
                entity_id: "timer".to_string(),
                entity_type: "timer",
                expr: ExprBody {
                    time: Some(time.to_string()),
                    loops: Some(loops.to_string()),
                    time_zone_id: time_zone_id.map(str::to_string),
                    ..ExprBody::default()
                },
            },
        }
    }
}

impl ActionBody {
    fn from_action(action: &SceneAction) -> Self {
        Self {
            entity_id: action.entity_id.to_string(),
            action_executor: "device_issue",
            executor_property: ExecutorProperty {
                function_code: action.code.clone(),
                function_value: action.value.clone(),
            },
        }
    }
}

/// Comma-joined, sorted and deduplicated rule ids.
#[must_use]
pub fn join_ids(ids: &[RuleId]) -> String {
    let mut ids: Vec<&str> = ids.iter().map(RuleId::as_str).collect();
    ids.sort_unstable();
    ids.dedup();
    ids.join(",")
}
