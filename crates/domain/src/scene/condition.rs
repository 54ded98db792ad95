//! Condition — a predicate the cloud evaluates before running a scene.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::DeviceId;
use crate::time::{ClockTime, Weekdays};

/// Comparison operator accepted by device-report conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "!=")]
    Ne,
}

impl Comparator {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ge => ">=",
            Self::Gt => ">",
            Self::Ne => "!=",
        }
    }

    /// Evaluate `left <op> right`.
    #[must_use]
    pub fn holds(self, left: f64, right: f64) -> bool {
        match self {
            Self::Lt => left < right,
            Self::Le => left <= right,
            Self::Eq => (left - right).abs() < f64::EPSILON,
            Self::Ge => left >= right,
            Self::Gt => left > right,
            Self::Ne => (left - right).abs() >= f64::EPSILON,
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a condition tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConditionExpr {
    /// A reported datapoint compared against a fixed value.
    Status {
        code: String,
        comparator: Comparator,
        value: serde_json::Value,
    },
    /// The difference `code - baseline_code` compared against `margin`.
    ///
    /// The cloud cannot compare two datapoints, so `baseline_value` pins
    /// the baseline reading the proposal was computed from.
    Surplus {
        code: String,
        baseline_code: String,
        baseline_value: f64,
        comparator: Comparator,
        margin: f64,
    },
    /// Fires at a wall-clock time on the selected weekdays.
    Timer {
        code: String,
        time: ClockTime,
        loops: Weekdays,
    },
}

impl ConditionExpr {
    /// Datapoint code the condition is keyed on.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Status { code, .. } | Self::Surplus { code, .. } | Self::Timer { code, .. } => {
                code
            }
        }
    }
}

/// A condition attached to a scene, numbered by its position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneCondition {
    /// 1-based position inside the payload; assigned by the builder.
    pub order: u32,
    pub entity_id: DeviceId,
    pub expr: ConditionExpr,
}

impl SceneCondition {
    /// Build an unnumbered condition; the payload builder assigns `order`.
    #[must_use]
    pub fn new(entity_id: DeviceId, expr: ConditionExpr) -> Self {
        Self {
            order: 0,
            entity_id,
            expr,
        }
    }

    #[must_use]
    pub fn code(&self) -> &str {
        self.expr.code()
    }
}

impl fmt::Display for SceneCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.expr {
            ConditionExpr::Status {
                code,
                comparator,
                value,
            } => write!(f, "{}.{code} {comparator} {value}", self.entity_id),
            ConditionExpr::Surplus {
                code,
                baseline_code,
                comparator,
                margin,
                ..
            } => write!(
                f,
                "{id}.{code} - {id}.{baseline_code} {comparator} {margin}",
                id = self.entity_id
            ),
            ConditionExpr::Timer { time, loops, .. } => write!(f, "at {time} on {loops}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> DeviceId {
        DeviceId::new("inv-1").unwrap()
    }

    #[test]
    fn should_serialize_comparator_as_symbol() {
        let json = serde_json::to_string(&Comparator::Le).unwrap();
        assert_eq!(json, "\"<=\"");
        let parsed: Comparator = serde_json::from_str("\"!=\"").unwrap();
        assert_eq!(parsed, Comparator::Ne);
    }

    #[test]
    fn should_evaluate_comparators() {
        assert!(Comparator::Le.holds(20.0, 20.0));
        assert!(!Comparator::Lt.holds(20.0, 20.0));
        assert!(Comparator::Gt.holds(1800.0, 1000.0));
        assert!(Comparator::Ne.holds(1.0, 2.0));
    }

    #[test]
    fn should_expose_code_for_every_expression() {
        let status = ConditionExpr::Status {
            code: "Bateria".to_string(),
            comparator: Comparator::Le,
            value: serde_json::json!(20),
        };
        let timer = ConditionExpr::Timer {
            code: "timer".to_string(),
            time: ClockTime::from_hm(22, 0).unwrap(),
            loops: Weekdays::EVERY_DAY,
        };
        assert_eq!(status.code(), "Bateria");
        assert_eq!(timer.code(), "timer");
    }

    #[test]
    fn should_display_surplus_condition() {
        let condition = SceneCondition::new(
            device(),
            ConditionExpr::Surplus {
                code: "pv_power".to_string(),
                baseline_code: "cur_power".to_string(),
                baseline_value: 1200.0,
                comparator: Comparator::Gt,
                margin: 1000.0,
            },
        );
        assert_eq!(
            condition.to_string(),
            "inv-1.pv_power - inv-1.cur_power > 1000"
        );
    }

    #[test]
    fn should_deserialize_tagged_status_expression() {
        let json = serde_json::json!({
            "kind": "status",
            "code": "switch_1",
            "comparator": "==",
            "value": true
        });
        let expr: ConditionExpr = serde_json::from_value(json).unwrap();
        assert!(matches!(expr, ConditionExpr::Status { comparator: Comparator::Eq, .. }));
    }
}
