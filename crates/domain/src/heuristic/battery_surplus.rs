//! Battery Surplus — run a load once the battery is charged past a threshold.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::DeviceId;
use crate::scene::{
    Comparator, ConditionExpr, IdempotencyKey, SceneAction, SceneCondition, ScenePayload,
    numeric_value,
};
use crate::shadow::DeviceShadow;

use super::InstanceOptions;

pub const HEURISTIC: &str = "battery_surplus";

/// Threshold and targets of a Battery Surplus instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatterySurplusParams {
    /// Device reporting the battery level.
    pub source: DeviceId,
    /// Device run from the surplus.
    pub load: DeviceId,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_comparator")]
    pub comparator: Comparator,
    /// Value written to the load's switch.
    #[serde(default = "default_switch_value")]
    pub switch_value: serde_json::Value,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(flatten)]
    pub options: InstanceOptions,
}

fn default_threshold() -> f64 {
    90.0
}

fn default_comparator() -> Comparator {
    Comparator::Gt
}

fn default_switch_value() -> serde_json::Value {
    serde_json::Value::Bool(true)
}

fn default_name() -> String {
    "Battery Surplus".to_string()
}

impl BatterySurplusParams {
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidThresholds`] unless the threshold
    /// is a percentage.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.threshold.is_finite() || !(0.0..=100.0).contains(&self.threshold) {
            return Err(ValidationError::InvalidThresholds {
                heuristic: HEURISTIC,
                reason: "threshold must be a percentage between 0 and 100",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatterySurplusCodes {
    pub battery: String,
    pub load_switch: String,
}

/// Propose the rule running the load while `battery <comparator> threshold`.
///
/// The rule does not depend on the current level, but the shadow must
/// report a numeric battery reading so the code is known to be live.
///
/// # Errors
///
/// Returns a [`ValidationError`] for an invalid threshold or a missing
/// battery reading.
pub fn battery_surplus(
    shadow: &DeviceShadow,
    codes: &BatterySurplusCodes,
    params: &BatterySurplusParams,
) -> Result<Vec<ScenePayload>, ValidationError> {
    params.validate()?;
    shadow.numeric(&codes.battery)?;

    let payload = ScenePayload::builder()
        .name(params.name.clone())
        .condition(SceneCondition::new(
            shadow.device_id.clone(),
            ConditionExpr::Status {
                code: codes.battery.clone(),
                comparator: params.comparator,
                value: numeric_value(params.threshold),
            },
        ))
        .action(SceneAction::new(
            params.load.clone(),
            codes.load_switch.clone(),
            params.switch_value.clone(),
        ))
        .idempotency_key(IdempotencyKey::new(HEURISTIC, "charged", &shadow.device_id))
        .build()?;
    Ok(vec![payload])
}
