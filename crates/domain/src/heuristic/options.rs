//! Options shared by every heuristic instance.

use serde::{Deserialize, Serialize};

use crate::error::{MappingError, SceneHubError, ValidationError};
use crate::id::DeviceId;
use crate::mapping::{CodeTable, MappingRegistry};
use crate::scene::{MatchType, SceneAction, ScenePayload};

use super::Inventory;

/// A command appended to every proposal of an instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraAction {
    pub entity_id: DeviceId,
    /// Logical function resolved through the registry, e.g. `"switch"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    /// Explicit function code; takes precedence over `function`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default = "default_value")]
    pub value: serde_json::Value,
}

fn default_value() -> serde_json::Value {
    serde_json::Value::Bool(true)
}

/// Per-instance overrides layered over the registry and the heuristic's
/// own defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceOptions {
    /// Datapoint codes by logical name, consulted before the registry.
    #[serde(default, skip_serializing_if = "CodeTable::is_empty")]
    pub property_codes: CodeTable,
    /// Function codes by logical name, consulted before the registry.
    #[serde(default, skip_serializing_if = "CodeTable::is_empty")]
    pub function_codes: CodeTable,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_actions: Vec<ExtraAction>,
    /// How the conditions of each proposal combine.
    #[serde(default, alias = "decision_expr", skip_serializing_if = "Option::is_none")]
    pub match_type: Option<MatchType>,
}

impl InstanceOptions {
    /// Resolve the extra actions against the inventory.
    ///
    /// # Errors
    ///
    /// Returns an error for an undiscovered device, an action without a code
    /// or function, or a function with no mapping.
    pub fn extra_actions(
        &self,
        inventory: &Inventory,
        registry: &MappingRegistry,
    ) -> Result<Vec<SceneAction>, SceneHubError> {
        self.extra_actions
            .iter()
            .map(|extra| {
                let device = inventory.device(&extra.entity_id)?;
                let code = match (&extra.code, &extra.function) {
                    (Some(code), _) => code.clone(),
                    (None, Some(function)) => registry
                        .resolve_with(function, device, &self.function_codes)
                        .map_err(MappingError::from)?
                        .to_string(),
                    (None, None) => {
                        return Err(ValidationError::IncompleteAction {
                            device_id: extra.entity_id.to_string(),
                        }
                        .into());
                    }
                };
                Ok(SceneAction::new(extra.entity_id.clone(), code, extra.value.clone()))
            })
            .collect()
    }

    /// Apply the match type and append `extra` to a proposal.
    pub fn apply(&self, payload: &mut ScenePayload, extra: &[SceneAction]) {
        if let Some(match_type) = self.match_type {
            payload.match_type = match_type;
        }
        payload.append_actions(extra.iter().cloned());
    }
}
