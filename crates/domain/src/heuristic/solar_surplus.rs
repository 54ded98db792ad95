//! Solar Surplus — run a load while production exceeds consumption by a
//! margin, and stop it once the surplus disappears.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::DeviceId;
use crate::scene::{Comparator, ConditionExpr, IdempotencyKey, SceneAction, SceneCondition, ScenePayload};
use crate::shadow::DeviceShadow;

use super::InstanceOptions;

pub const HEURISTIC: &str = "solar_surplus";

/// Margin and targets of a Solar Surplus instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolarSurplusParams {
    /// Device reporting production and consumption.
    pub source: DeviceId,
    /// Device consuming the surplus.
    pub load: DeviceId,
    /// Surplus, in the source's power unit, required to run the load.
    pub margin: f64,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(flatten)]
    pub options: InstanceOptions,
}

fn default_name() -> String {
    "Solar Surplus".to_string()
}

impl SolarSurplusParams {
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidThresholds`] for a negative or
    /// non-finite margin.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.margin.is_finite() || self.margin < 0.0 {
            return Err(ValidationError::InvalidThresholds {
                heuristic: HEURISTIC,
                reason: "margin must be a non-negative number",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolarSurplusCodes {
    pub production: String,
    pub consumption: String,
    pub load_switch: String,
}

/// Propose the enable rule when `production - consumption > margin`,
/// the disable rule otherwise.
///
/// # Errors
///
/// Returns a [`ValidationError`] if the margin is invalid or either reading
/// is missing or non-numeric.
pub fn solar_surplus(
    shadow: &DeviceShadow,
    codes: &SolarSurplusCodes,
    params: &SolarSurplusParams,
) -> Result<Vec<ScenePayload>, ValidationError> {
    params.validate()?;
    let production = shadow.numeric(&codes.production)?;
    let consumption = shadow.numeric(&codes.consumption)?;
    let surplus = production - consumption;

    let (variant, name, comparator, load_on) = if surplus > params.margin {
        ("enable", params.name.clone(), Comparator::Gt, true)
    } else {
        ("disable", format!("{} Off", params.name), Comparator::Le, false)
    };

    let payload = ScenePayload::builder()
        .name(name)
        .condition(SceneCondition::new(
            shadow.device_id.clone(),
            ConditionExpr::Surplus {
                code: codes.production.clone(),
                baseline_code: codes.consumption.clone(),
                baseline_value: consumption,
                comparator,
                margin: params.margin,
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

    fn params() -> SolarSurplusParams {
        SolarSurplusParams {
            source: DeviceId::new("inv-1").unwrap(),
            load: DeviceId::new("heater").unwrap(),
            margin: 1000.0,
            name: default_name(),
            options: InstanceOptions::default(),
        }
    }

    fn codes() -> SolarSurplusCodes {
        SolarSurplusCodes {
            production: "pv_power".to_string(),
            consumption: "cur_power".to_string(),
            load_switch: "switch_1".to_string(),
        }
    }

    fn shadow(production: i64, consumption: i64) -> DeviceShadow {
        DeviceShadow::new(DeviceId::new("inv-1").unwrap())
            .with("pv_power", production, ValueType::Value)
            .with("cur_power", consumption, ValueType::Value)
    }

    #[test]
    fn should_enable_load_when_surplus_exceeds_margin() {
        let proposals = solar_surplus(&shadow(3000, 1200), &codes(), &params()).unwrap();
        assert_eq!(proposals.len(), 1);
        let payload = &proposals[0];
        assert_eq!(
            payload.conditions[0].expr,
            ConditionExpr::Surplus {
                code: "pv_power".to_string(),
                baseline_code: "cur_power".to_string(),
                baseline_value: 1200.0,
                comparator: Comparator::Gt,
                margin: 1000.0,
            }
        );
        assert_eq!(payload.actions[0].value, serde_json::json!(true));
        assert_eq!(
            payload.idempotency_key.as_ref().unwrap().as_str(),
            "solar_surplus.enable:inv-1"
        );
    }

    #[test]
    fn should_disable_load_when_surplus_disappears() {
        let proposals = solar_surplus(&shadow(1300, 1200), &codes(), &params()).unwrap();
        let payload = &proposals[0];
        assert!(matches!(
            payload.conditions[0].expr,
            ConditionExpr::Surplus { comparator: Comparator::Le, .. }
        ));
        assert_eq!(payload.actions[0].value, serde_json::json!(false));
        assert_eq!(
            payload.idempotency_key.as_ref().unwrap().as_str(),
            "solar_surplus.disable:inv-1"
        );
    }

    #[test]
    fn should_not_enable_when_surplus_equals_margin() {
        let proposals = solar_surplus(&shadow(2200, 1200), &codes(), &params()).unwrap();
        assert_eq!(proposals[0].actions[0].value, serde_json::json!(false));
    }

    #[test]
    fn should_reject_negative_margin() {
        let mut invalid = params();
        invalid.margin = -1.0;
        assert!(solar_surplus(&shadow(3000, 1200), &codes(), &invalid).is_err());
    }

    #[test]
    fn should_fail_when_consumption_is_missing() {
        let partial = DeviceShadow::new(DeviceId::new("inv-1").unwrap())
            .with("pv_power", 3000_i64, ValueType::Value);
        let err = solar_surplus(&partial, &codes(), &params()).unwrap_err();
        assert!(matches!(err, ValidationError::MissingTelemetry { code, .. } if code == "cur_power"));
    }

    #[test]
    fn should_produce_identical_payloads_for_identical_inputs() {
        let first = solar_surplus(&shadow(3000, 1200), &codes(), &params()).unwrap();
        let second = solar_surplus(&shadow(3000, 1200), &codes(), &params()).unwrap();
        assert_eq!(first, second);
    }
}
