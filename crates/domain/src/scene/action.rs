//! Action — a device command issued when a scene runs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::DeviceId;

/// Issue `code = value` to a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneAction {
    /// 1-based position inside the payload; assigned by the builder.
    pub order: u32,
    pub entity_id: DeviceId,
    /// Function code of the command, e.g. `"switch_1"`.
    pub code: String,
    pub value: serde_json::Value,
}

impl SceneAction {
    /// Build an unnumbered action; the payload builder assigns `order`.
    #[must_use]
    pub fn new(
        entity_id: DeviceId,
        code: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            order: 0,
            entity_id,
            code: code.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for SceneAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} := {}", self.entity_id, self.code, self.value)
    }
}
