//! Device shadow — the latest reported datapoint values of a device.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::DeviceId;

/// A single reported datapoint value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShadowValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Json(serde_json::Value),
}

impl ShadowValue {
    /// Numeric view of the value, if it has one.
    ///
    /// Numeric strings are accepted because some products report
    /// `"value"`-typed datapoints as text.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::String(v) => v.trim().parse().ok(),
            Self::Bool(_) | Self::Json(_) => None,
        }
    }
}

impl From<serde_json::Value> for ShadowValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => n.as_f64().map_or(Self::Json(serde_json::Value::Number(n)), Self::Float),
            },
            serde_json::Value::String(s) => Self::String(s),
            other => Self::Json(other),
        }
    }
}

/// Declared type of a datapoint, as reported by the cloud.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Value,
    Bool,
    Enum,
    String,
    Raw,
    Bitmap,
    #[serde(other)]
    Unknown,
}

/// One entry in a [`DeviceShadow`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowProperty {
    pub value: ShadowValue,
    pub value_type: ValueType,
    /// Report time in epoch milliseconds, when the cloud provides it.
    pub reported_at: Option<i64>,
}

/// Point-in-time snapshot of a device's datapoints.
///
/// A new fetch supersedes the previous snapshot entirely; snapshots are
/// never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceShadow {
    pub device_id: DeviceId,
    pub properties: BTreeMap<String, ShadowProperty>,
}

impl DeviceShadow {
    #[must_use]
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            properties: BTreeMap::new(),
        }
    }

    /// Add a datapoint, builder style.
    #[must_use]
    pub fn with(
        mut self,
        code: impl Into<String>,
        value: impl Into<ShadowValue>,
        value_type: ValueType,
    ) -> Self {
        self.properties.insert(
            code.into(),
            ShadowProperty {
                value: value.into(),
                value_type,
                reported_at: None,
            },
        );
        self
    }

    #[must_use]
    pub fn get(&self, code: &str) -> Option<&ShadowProperty> {
        self.properties.get(code)
    }

    /// Read a datapoint as a number.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingTelemetry`] if the code is absent and
    /// [`ValidationError::NonNumericTelemetry`] if its value is not numeric.
    pub fn numeric(&self, code: &str) -> Result<f64, ValidationError> {
        let property = self
            .get(code)
            .ok_or_else(|| ValidationError::MissingTelemetry {
                device_id: self.device_id.to_string(),
                code: code.to_string(),
            })?;
        property
            .value
            .as_f64()
            .ok_or_else(|| ValidationError::NonNumericTelemetry {
                device_id: self.device_id.to_string(),
                code: code.to_string(),
            })
    }
}

impl From<i64> for ShadowValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for ShadowValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for ShadowValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for ShadowValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}
