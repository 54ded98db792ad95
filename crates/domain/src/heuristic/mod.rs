//! Heuristics — pure translation from telemetry to scene proposals.
//!
//! Each heuristic is a free function taking a shadow snapshot, the codes
//! resolved for it and its thresholds, and returning zero or more
//! [`ScenePayload`]s. None of them performs IO. [`HeuristicSpec`] is the
//! configured form of a heuristic instance; [`HeuristicSpec::evaluate`]
//! resolves its codes through the [`MappingRegistry`] and runs it against
//! an [`Inventory`], then layers the instance's [`InstanceOptions`] on
//! every proposal.

pub mod battery_protect;
pub mod battery_surplus;
pub mod night_guard;
pub mod options;
pub mod solar_surplus;

pub use battery_protect::{BatteryProtectCodes, BatteryProtectParams, battery_protect};
pub use battery_surplus::{BatterySurplusCodes, BatterySurplusParams, battery_surplus};
pub use night_guard::{NightGuardCodes, NightGuardParams, night_guard};
pub use options::{ExtraAction, InstanceOptions};
pub use solar_surplus::{SolarSurplusCodes, SolarSurplusParams, solar_surplus};

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::device::Device;
use crate::error::{MappingError, SceneHubError, ValidationError};
use crate::id::DeviceId;
use crate::mapping::{MappingRegistry, logical};
use crate::scene::ScenePayload;
use crate::shadow::DeviceShadow;

/// Devices and shadow snapshots a batch of heuristics runs against.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    devices: BTreeMap<DeviceId, Device>,
    shadows: BTreeMap<DeviceId, DeviceShadow>,
}

impl Inventory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_device(&mut self, device: Device) {
        self.devices.insert(device.id.clone(), device);
    }

    /// Store a snapshot, replacing any previous one for the same device.
    pub fn add_shadow(&mut self, shadow: DeviceShadow) {
        self.shadows.insert(shadow.device_id.clone(), shadow);
    }

    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownDevice`] if the device was not discovered.
    pub fn device(&self, id: &DeviceId) -> Result<&Device, ValidationError> {
        self.devices
            .get(id)
            .ok_or_else(|| ValidationError::UnknownDevice {
                device_id: id.to_string(),
            })
    }

    /// # Errors
    ///
    /// Returns [`ValidationError::MissingShadow`] if the device was not inspected.
    pub fn shadow(&self, id: &DeviceId) -> Result<&DeviceShadow, ValidationError> {
        self.shadows
            .get(id)
            .ok_or_else(|| ValidationError::MissingShadow {
                device_id: id.to_string(),
            })
    }

    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }
}

/// A configured heuristic instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "heuristic", rename_all = "snake_case")]
pub enum HeuristicSpec {
    BatteryProtect(BatteryProtectParams),
    SolarSurplus(SolarSurplusParams),
    BatterySurplus(BatterySurplusParams),
    NightGuard(NightGuardParams),
}

impl HeuristicSpec {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BatteryProtect(_) => battery_protect::HEURISTIC,
            Self::SolarSurplus(_) => solar_surplus::HEURISTIC,
            Self::BatterySurplus(_) => battery_surplus::HEURISTIC,
            Self::NightGuard(_) => night_guard::HEURISTIC,
        }
    }

    #[must_use]
    pub fn options(&self) -> &InstanceOptions {
        match self {
            Self::BatteryProtect(params) => &params.options,
            Self::SolarSurplus(params) => &params.options,
            Self::BatterySurplus(params) => &params.options,
            Self::NightGuard(params) => &params.options,
        }
    }

    /// Device whose identifier keys the proposals of this instance.
    #[must_use]
    pub fn primary_device(&self) -> &DeviceId {
        match self {
            Self::BatteryProtect(params) => &params.source,
            Self::SolarSurplus(params) => &params.source,
            Self::BatterySurplus(params) => &params.source,
            Self::NightGuard(params) => &params.target,
        }
    }

    /// Devices whose shadows the heuristic reads.
    #[must_use]
    pub fn telemetry_devices(&self) -> Vec<&DeviceId> {
        match self {
            Self::BatteryProtect(params) => vec![&params.source],
            Self::SolarSurplus(params) => vec![&params.source],
            Self::BatterySurplus(params) => vec![&params.source],
            Self::NightGuard(_) => Vec::new(),
        }
    }

    /// Resolve codes for the involved devices and run the heuristic.
    ///
    /// Codes come from the instance overrides first, then the registry
    /// tiers of each device. Extra actions are resolved before any
    /// telemetry is read and appended to every proposal.
    ///
    /// # Errors
    ///
    /// Returns [`SceneHubError::Mapping`] when a property has no code for a
    /// device, and [`SceneHubError::Validation`] for unknown devices,
    /// missing telemetry or invalid thresholds.
    pub fn evaluate(
        &self,
        inventory: &Inventory,
        registry: &MappingRegistry,
    ) -> Result<Vec<ScenePayload>, SceneHubError> {
        let options = self.options();
        let extra = options.extra_actions(inventory, registry)?;
        let property = |name: &str, device: &Device| -> Result<String, MappingError> {
            Ok(registry
                .resolve_with(name, device, &options.property_codes)?
                .to_string())
        };
        let function = |name: &str, device: &Device| -> Result<String, MappingError> {
            Ok(registry
                .resolve_with(name, device, &options.function_codes)?
                .to_string())
        };

        let mut proposals = match self {
            Self::BatteryProtect(params) => {
                let source = inventory.device(&params.source)?;
                let load = inventory.device(&params.load)?;
                let codes = BatteryProtectCodes {
                    battery: property(logical::BATTERY_LEVEL, source)?,
                    load_switch: function(logical::SWITCH, load)?,
                };
                let shadow = inventory.shadow(&params.source)?;
                battery_protect(shadow, &codes, params)?
            }
            Self::SolarSurplus(params) => {
                let source = inventory.device(&params.source)?;
                let load = inventory.device(&params.load)?;
                let readings = registry.resolve_all(
                    &[logical::PV_POWER, logical::LOAD_POWER],
                    source,
                    &options.property_codes,
                )?;
                let codes = SolarSurplusCodes {
                    production: readings[0].clone(),
                    consumption: readings[1].clone(),
                    load_switch: function(logical::SWITCH, load)?,
                };
                let shadow = inventory.shadow(&params.source)?;
                solar_surplus(shadow, &codes, params)?
            }
            Self::BatterySurplus(params) => {
                let source = inventory.device(&params.source)?;
                let load = inventory.device(&params.load)?;
                let codes = BatterySurplusCodes {
                    battery: property(logical::BATTERY_LEVEL, source)?,
                    load_switch: function(logical::SWITCH, load)?,
                };
                let shadow = inventory.shadow(&params.source)?;
                battery_surplus(shadow, &codes, params)?
            }
            Self::NightGuard(params) => {
                let target = inventory.device(&params.target)?;
                let codes = NightGuardCodes {
                    arm: function(logical::ARM, target)?,
                };
                night_guard(&codes, params)?
            }
        };
        for payload in &mut proposals {
            options.apply(payload, &extra);
        }
        Ok(proposals)
    }
}

impl fmt::Display for HeuristicSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.primary_device())
    }
}
