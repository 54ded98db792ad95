//! Scene — a vendor automation rule made of conditions and actions.
//!
//! A [`ScenePayload`] is what heuristics propose and what the cloud port
//! submits. Once the cloud accepts it, the rule is tracked as a
//! [`SceneRule`]. Payloads built by the same heuristic for the same device
//! carry the same [`IdempotencyKey`], which is embedded in the rule name so
//! it can be read back from listed rules.

mod action;
mod condition;

pub use action::SceneAction;
pub use condition::{Comparator, ConditionExpr, SceneCondition};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Fragment, ValidationError};
use crate::id::RuleId;
use crate::time::{ClockTime, Weekdays};

const KEY_TAG_OPEN: &str = "[sh:";
const KEY_TAG_CLOSE: char = ']';

/// Render a number as an integer when it has no fractional part, since
/// most datapoints are integer-typed.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn numeric_value(value: f64) -> serde_json::Value {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        serde_json::Value::from(value as i64)
    } else {
        serde_json::Value::from(value)
    }
}

/// How the conditions of a scene combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Every condition must hold.
    #[default]
    #[serde(alias = "and")]
    All,
    /// At least one condition must hold.
    #[serde(alias = "or")]
    Any,
}

/// Window during which an automation is allowed to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveTime {
    pub start: ClockTime,
    pub end: ClockTime,
    #[serde(default)]
    pub loops: Weekdays,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone_id: Option<String>,
}

/// Caller-chosen identifier detecting that a proposal already has a live rule.
///
/// Formatted as `{heuristic}.{variant}:{device}`, e.g.
/// `battery_protect.low:inv-1`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    #[must_use]
    pub fn new(heuristic: &str, variant: &str, device: impl fmt::Display) -> Self {
        Self(format!("{heuristic}.{variant}:{device}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Append the key to a display name as a trailing `[sh:<key>]` tag.
    #[must_use]
    pub fn tag(&self, name: &str) -> String {
        format!("{} {KEY_TAG_OPEN}{}{KEY_TAG_CLOSE}", name.trim_end(), self.0)
    }

    /// Extract a key previously appended with [`IdempotencyKey::tag`].
    #[must_use]
    pub fn parse_tag(name: &str) -> Option<Self> {
        let trimmed = name.trim_end();
        let body = trimmed.strip_suffix(KEY_TAG_CLOSE)?;
        let start = body.rfind(KEY_TAG_OPEN)?;
        let key = &body[start + KEY_TAG_OPEN.len()..];
        if key.is_empty() {
            return None;
        }
        Some(Self(key.to_string()))
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named bundle of conditions and actions ready for submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenePayload {
    pub name: String,
    pub match_type: MatchType,
    pub conditions: Vec<SceneCondition>,
    pub actions: Vec<SceneAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_time: Option<EffectiveTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<IdempotencyKey>,
}

impl ScenePayload {
    /// Create a builder for constructing a [`ScenePayload`].
    #[must_use]
    pub fn builder() -> ScenePayloadBuilder {
        ScenePayloadBuilder::default()
    }

    /// Name sent to the cloud, carrying the idempotency tag when present.
    #[must_use]
    pub fn rule_name(&self) -> String {
        match &self.idempotency_key {
            Some(key) => key.tag(&self.name),
            None => self.name.clone(),
        }
    }

    /// Append actions after the existing ones, continuing the numbering.
    pub fn append_actions(&mut self, actions: impl IntoIterator<Item = SceneAction>) {
        for mut action in actions {
            action.order = next_order(self.actions.len());
            self.actions.push(action);
        }
    }

    /// Check the invariants the cloud schema relies on.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when:
    /// - `name` is blank ([`ValidationError::EmptyName`])
    /// - there are no conditions or no actions
    /// - a condition or action has an empty code ([`ValidationError::MissingCode`])
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.conditions.is_empty() {
            return Err(ValidationError::NoConditions {
                scene: self.name.clone(),
            });
        }
        if self.actions.is_empty() {
            return Err(ValidationError::NoActions {
                scene: self.name.clone(),
            });
        }
        if let Some(condition) = self.conditions.iter().find(|c| c.code().trim().is_empty()) {
            return Err(ValidationError::MissingCode {
                scene: self.name.clone(),
                fragment: Fragment::Condition,
                order: condition.order,
            });
        }
        if let Some(action) = self.actions.iter().find(|a| a.code.trim().is_empty()) {
            return Err(ValidationError::MissingCode {
                scene: self.name.clone(),
                fragment: Fragment::Action,
                order: action.order,
            });
        }
        Ok(())
    }
}

fn next_order(len: usize) -> u32 {
    u32::try_from(len).map_or(u32::MAX, |len| len.saturating_add(1))
}

/// Step-by-step builder for [`ScenePayload`].
#[derive(Debug, Default)]
pub struct ScenePayloadBuilder {
    name: Option<String>,
    match_type: MatchType,
    conditions: Vec<SceneCondition>,
    actions: Vec<SceneAction>,
    effective_time: Option<EffectiveTime>,
    idempotency_key: Option<IdempotencyKey>,
}

impl ScenePayloadBuilder {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn match_type(mut self, match_type: MatchType) -> Self {
        self.match_type = match_type;
        self
    }

    #[must_use]
    pub fn condition(mut self, condition: SceneCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    #[must_use]
    pub fn action(mut self, action: SceneAction) -> Self {
        self.actions.push(action);
        self
    }

    #[must_use]
    pub fn effective_time(mut self, effective_time: EffectiveTime) -> Self {
        self.effective_time = Some(effective_time);
        self
    }

    #[must_use]
    pub fn idempotency_key(mut self, key: IdempotencyKey) -> Self {
        self.idempotency_key = Some(key);
        self
    }

    /// Number fragments from 1 in insertion order, validate, and return
    /// the payload.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the payload breaks an invariant
    /// checked by [`ScenePayload::validate`].
    pub fn build(self) -> Result<ScenePayload, ValidationError> {
        let mut payload = ScenePayload {
            name: self.name.unwrap_or_default(),
            match_type: self.match_type,
            conditions: self.conditions,
            actions: self.actions,
            effective_time: self.effective_time,
            idempotency_key: self.idempotency_key,
        };
        for (order, condition) in (1..).zip(payload.conditions.iter_mut()) {
            condition.order = order;
        }
        for (order, action) in (1..).zip(payload.actions.iter_mut()) {
            action.order = order;
        }
        payload.validate()?;
        Ok(payload)
    }
}

/// A rule as the cloud reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneRule {
    pub id: RuleId,
    pub name: String,
    pub enabled: bool,
    pub idempotency_key: Option<IdempotencyKey>,
}

impl SceneRule {
    /// Build a rule, reading the idempotency key back from its name.
    #[must_use]
    pub fn new(id: RuleId, name: impl Into<String>, enabled: bool) -> Self {
        let name = name.into();
        let idempotency_key = IdempotencyKey::parse_tag(&name);
        Self {
            id,
            name,
            enabled,
            idempotency_key,
        }
    }
}
