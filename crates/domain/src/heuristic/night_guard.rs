//! Night Guard — arm a security device on a schedule.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::DeviceId;
use crate::scene::{ConditionExpr, EffectiveTime, IdempotencyKey, SceneAction, SceneCondition, ScenePayload};
use crate::time::{ClockTime, Weekdays};

use super::InstanceOptions;

pub const HEURISTIC: &str = "night_guard";

/// Datapoint code of timer conditions.
pub const TIMER_CODE: &str = "timer";

/// Schedule and target of a Night Guard instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NightGuardParams {
    /// Security device to arm.
    pub target: DeviceId,
    pub start: ClockTime,
    pub end: ClockTime,
    #[serde(default)]
    pub loops: Weekdays,
    #[serde(default)]
    pub time_zone_id: Option<String>,
    /// Value written to the arm code.
    #[serde(default = "default_arm_value")]
    pub arm_value: serde_json::Value,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(flatten)]
    pub options: InstanceOptions,
}

fn default_arm_value() -> serde_json::Value {
    serde_json::Value::from("arm")
}

fn default_name() -> String {
    "Night Guard".to_string()
}

impl NightGuardParams {
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for an empty window or a mask with no
    /// weekday selected.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.start == self.end {
            return Err(ValidationError::InvalidThresholds {
                heuristic: HEURISTIC,
                reason: "start and end must differ",
            });
        }
        if !self.loops.any() {
            return Err(ValidationError::InvalidWeekdays(self.loops.to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NightGuardCodes {
    pub arm: String,
}

/// Propose the scheduled arming rule. The window may wrap past midnight.
///
/// # Errors
///
/// Returns a [`ValidationError`] if the schedule is invalid.
pub fn night_guard(
    codes: &NightGuardCodes,
    params: &NightGuardParams,
) -> Result<Vec<ScenePayload>, ValidationError> {
    params.validate()?;
    let payload = ScenePayload::builder()
        .name(params.name.clone())
        .condition(SceneCondition::new(
            params.target.clone(),
            ConditionExpr::Timer {
                code: TIMER_CODE.to_string(),
                time: params.start,
                loops: params.loops,
            },
        ))
        .action(SceneAction::new(
            params.target.clone(),
            codes.arm.clone(),
            params.arm_value.clone(),
        ))
        .effective_time(EffectiveTime {
            start: params.start,
            end: params.end,
            loops: params.loops,
            time_zone_id: params.time_zone_id.clone(),
        })
        .idempotency_key(IdempotencyKey::new(HEURISTIC, "arm", &params.target))
        .build()?;
    Ok(vec![payload])
}
