//! Battery Protect — shed a load when the battery runs low, restore it once
//! the battery has recovered.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::DeviceId;
use crate::scene::{
    Comparator, ConditionExpr, IdempotencyKey, SceneAction, SceneCondition, ScenePayload,
    numeric_value,
};
use crate::shadow::DeviceShadow;

use super::InstanceOptions;

pub const HEURISTIC: &str = "battery_protect";

/// Thresholds and targets of a Battery Protect instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryProtectParams {
    /// Device reporting the battery level.
    pub source: DeviceId,
    /// Device switched off when the battery is low.
    pub load: DeviceId,
    /// Level at or below which the load is shed.
    pub low: f64,
    /// Level at or above which the load is restored.
    pub recovery: f64,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(flatten)]
    pub options: InstanceOptions,
}

fn default_name() -> String {
    "Battery Protect".to_string()
}

impl BatteryProtectParams {
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidThresholds`] unless `low < recovery`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.low.is_finite() || !self.recovery.is_finite() {
            return Err(ValidationError::InvalidThresholds {
                heuristic: HEURISTIC,
                reason: "thresholds must be finite numbers",
            });
        }
        if self.low >= self.recovery {
            return Err(ValidationError::InvalidThresholds {
                heuristic: HEURISTIC,
                reason: "low must be strictly below recovery",
            });
        }
        Ok(())
    }
}

/// Datapoint codes resolved for the source and load devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatteryProtectCodes {
    pub battery: String,
    pub load_switch: String,
}

/// Propose the low or the recovery rule for the current battery level.
///
/// Between the two thresholds nothing is proposed, so the load does not
/// flap around a single set point.
///
/// # Errors
///
/// Returns a [`ValidationError`] if the thresholds are inconsistent or the
/// shadow lacks a numeric battery reading.
pub fn battery_protect(
    shadow: &DeviceShadow,
    codes: &BatteryProtectCodes,
    params: &BatteryProtectParams,
) -> Result<Vec<ScenePayload>, ValidationError> {
    params.validate()?;
    let level = shadow.numeric(&codes.battery)?;

    let (variant, name, comparator, threshold, load_on) = if level <= params.low {
        ("low", params.name.clone(), Comparator::Le, params.low, false)
    } else if level >= params.recovery {
        (
            "recovery",
            format!("{} Recovery", params.name),
            Comparator::Ge,
            params.recovery,
            true,
        )
    } else {
        return Ok(Vec::new());
    };

    let payload = ScenePayload::builder()
        .name(name)
        .condition(SceneCondition::new(
            shadow.device_id.clone(),
            ConditionExpr::Status {
                code: codes.battery.clone(),
                comparator,
                value: numeric_value(threshold),
            },
        ))
        .action(SceneAction::new(
            params.load.clone(),
            codes.load_switch.clone(),
            load_on,
        ))
        .idempotency_key(IdempotencyKey::new(HEURISTIC, variant, &shadow.device_id))
        .build()?;
    Ok(vec![payload])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shadow::ValueType;

    fn params() -> BatteryProtectParams {
        BatteryProtectParams {
            source: DeviceId::new("inv-1").unwrap(),
            load: DeviceId::new("plug-1").unwrap(),
            low: 20.0,
            recovery: 80.0,
            name: default_name(),
            options: InstanceOptions::default(),
        }
    }

    fn codes() -> BatteryProtectCodes {
        BatteryProtectCodes {
            battery: "Bateria".to_string(),
            load_switch: "switch_1".to_string(),
        }
    }

    fn shadow(level: i64) -> DeviceShadow {
        DeviceShadow::new(DeviceId::new("inv-1").unwrap()).with("Bateria", level, ValueType::Value)
    }

    #[test]
    fn should_shed_load_when_battery_is_low() {
        let proposals = battery_protect(&shadow(15), &codes(), &params()).unwrap();
        assert_eq!(proposals.len(), 1);
        let payload = &proposals[0];
        assert_eq!(payload.conditions.len(), 1);
        assert_eq!(payload.actions.len(), 1);
        assert_eq!(
            payload.conditions[0].expr,
            ConditionExpr::Status {
                code: "Bateria".to_string(),
                comparator: Comparator::Le,
                value: serde_json::json!(20),
            }
        );
        assert_eq!(payload.actions[0].code, "switch_1");
        assert_eq!(payload.actions[0].value, serde_json::json!(false));
        assert_eq!(payload.actions[0].entity_id.as_str(), "plug-1");
        assert_eq!(
            payload.idempotency_key.as_ref().unwrap().as_str(),
            "battery_protect.low:inv-1"
        );
    }

    #[test]
    fn should_restore_load_when_battery_recovers() {
        let proposals = battery_protect(&shadow(85), &codes(), &params()).unwrap();
        let payload = &proposals[0];
        assert!(matches!(
            payload.conditions[0].expr,
            ConditionExpr::Status { comparator: Comparator::Ge, .. }
        ));
        assert_eq!(payload.actions[0].value, serde_json::json!(true));
        assert_eq!(payload.name, "Battery Protect Recovery");
    }

    #[test]
    fn should_propose_nothing_between_thresholds() {
        let proposals = battery_protect(&shadow(50), &codes(), &params()).unwrap();
        assert!(proposals.is_empty());
    }

    #[test]
    fn should_treat_threshold_boundaries_as_inclusive() {
        assert_eq!(battery_protect(&shadow(20), &codes(), &params()).unwrap().len(), 1);
        assert_eq!(battery_protect(&shadow(80), &codes(), &params()).unwrap().len(), 1);
    }

    #[test]
    fn should_reject_inverted_thresholds() {
        let mut inverted = params();
        inverted.low = 80.0;
        inverted.recovery = 20.0;
        let err = battery_protect(&shadow(15), &codes(), &inverted).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidThresholds { .. }));
    }

    #[test]
    fn should_fail_when_battery_reading_is_missing() {
        let empty = DeviceShadow::new(DeviceId::new("inv-1").unwrap());
        let err = battery_protect(&empty, &codes(), &params()).unwrap_err();
        assert!(matches!(err, ValidationError::MissingTelemetry { code, .. } if code == "Bateria"));
    }

    #[test]
    fn should_produce_identical_payloads_for_identical_inputs() {
        let first = battery_protect(&shadow(15), &codes(), &params()).unwrap();
        let second = battery_protect(&shadow(15), &codes(), &params()).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
