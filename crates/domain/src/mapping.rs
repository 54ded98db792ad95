//! Mapping registry — logical property names to vendor datapoint codes.
//!
//! Lookup walks from the most to the least specific tier: per-instance
//! overrides, the device id, the product id, the device category, then
//! the generic table keyed by logical name alone (category `"*"`). A miss
//! in every tier is an error naming the device; no code is ever guessed.
//! The registry is built once and is read-only afterwards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::device::Device;
use crate::error::{MappingError, MappingNotFoundError};

/// Category marker for generic fallback entries.
pub const GENERIC_CATEGORY: &str = "*";

/// Logical property names understood by the built-in table.
pub mod logical {
    pub const BATTERY_LEVEL: &str = "battery_level";
    pub const PV_POWER: &str = "pv_power";
    pub const LOAD_POWER: &str = "load_power";
    pub const SWITCH: &str = "switch";
    pub const ARM: &str = "arm";
}

/// Logical name → code, as used for per-instance overrides.
pub type CodeTable = BTreeMap<String, String>;

const BUILTIN: &[(&str, &str, &str)] = &[
    (logical::BATTERY_LEVEL, GENERIC_CATEGORY, "battery_percentage"),
    (logical::PV_POWER, GENERIC_CATEGORY, "pv_power"),
    (logical::LOAD_POWER, GENERIC_CATEGORY, "cur_power"),
    (logical::SWITCH, GENERIC_CATEGORY, "switch_1"),
    (logical::ARM, GENERIC_CATEGORY, "master_mode"),
    // hybrid inverters
    (logical::BATTERY_LEVEL, "qt", "Bateria"),
    (logical::PV_POWER, "qt", "Producao_Solar_Atual"),
    // plugs and switches
    (logical::SWITCH, "cz", "switch_1"),
    (logical::LOAD_POWER, "cz", "cur_power"),
    (logical::SWITCH, "kg", "switch_1"),
    // lights
    (logical::SWITCH, "dj", "switch_led"),
];

const BUILTIN_PRODUCTS: &[(&str, &str, &str)] = &[
    // GoodWe hybrid inverter
    (logical::BATTERY_LEVEL, "xxgnqyeyrzawwwtt", "Bateria"),
    (logical::PV_POWER, "xxgnqyeyrzawwwtt", "Producao_Solar_Atual"),
    // LED-switched smart plug
    (logical::SWITCH, "k43w32veclxmc9lb", "switch_led"),
];

/// Which devices a mapping entry applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingScope {
    Device(String),
    Product(String),
    Category(String),
    Generic,
}

/// One row of the mapping table, as loaded from configuration.
///
/// The most specific scope set wins: `device_id`, then `product_id`, then
/// `category`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub logical_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    /// Device category code, or `"*"` for a generic fallback.
    #[serde(default = "generic_category")]
    pub category: String,
    pub code: String,
}

fn generic_category() -> String {
    GENERIC_CATEGORY.to_string()
}

impl MappingEntry {
    #[must_use]
    pub fn scope(&self) -> MappingScope {
        if let Some(device_id) = &self.device_id {
            MappingScope::Device(device_id.clone())
        } else if let Some(product_id) = &self.product_id {
            MappingScope::Product(product_id.clone())
        } else if self.category == GENERIC_CATEGORY {
            MappingScope::Generic
        } else {
            MappingScope::Category(self.category.clone())
        }
    }
}

/// Read-only lookup from a logical name and a device to a datapoint code.
#[derive(Debug, Clone, Default)]
pub struct MappingRegistry {
    by_device: BTreeMap<String, CodeTable>,
    by_product: BTreeMap<String, CodeTable>,
    by_category: BTreeMap<String, CodeTable>,
    generic: CodeTable,
}

impl MappingRegistry {
    /// Create a builder starting from an empty table.
    #[must_use]
    pub fn builder() -> MappingRegistryBuilder {
        MappingRegistryBuilder::default()
    }

    /// The built-in table with no extra entries.
    #[must_use]
    pub fn builtin() -> Self {
        Self::builder().with_builtin().build()
    }

    /// Resolve one logical property for a device.
    ///
    /// # Errors
    ///
    /// Returns [`MappingNotFoundError`] naming the property, the device and
    /// its category when no tier has an entry.
    pub fn resolve(&self, logical_name: &str, device: &Device) -> Result<&str, MappingNotFoundError> {
        lookup(&self.by_device, Some(device.id.as_str()), logical_name)
            .or_else(|| lookup(&self.by_product, device.product_id.as_deref(), logical_name))
            .or_else(|| lookup(&self.by_category, Some(device.category.as_str()), logical_name))
            .or_else(|| self.generic.get(logical_name))
            .map(String::as_str)
            .ok_or_else(|| MappingNotFoundError {
                logical_name: logical_name.to_string(),
                device_id: device.id.to_string(),
                category: device.category.clone(),
            })
    }

    /// Like [`MappingRegistry::resolve`], consulting `overrides` first.
    ///
    /// # Errors
    ///
    /// Returns [`MappingNotFoundError`] when neither the overrides nor the
    /// registry know the property.
    pub fn resolve_with<'a>(
        &'a self,
        logical_name: &str,
        device: &Device,
        overrides: &'a CodeTable,
    ) -> Result<&'a str, MappingNotFoundError> {
        match overrides.get(logical_name) {
            Some(code) => Ok(code.as_str()),
            None => self.resolve(logical_name, device),
        }
    }

    /// Resolve a batch of logical properties for one device, in order.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::Unresolved`] listing every missing property,
    /// not only the first one.
    pub fn resolve_all(
        &self,
        logical_names: &[&str],
        device: &Device,
        overrides: &CodeTable,
    ) -> Result<Vec<String>, MappingError> {
        let mut codes = Vec::with_capacity(logical_names.len());
        let mut missing = Vec::new();
        for name in logical_names {
            match self.resolve_with(name, device, overrides) {
                Ok(code) => codes.push(code.to_string()),
                Err(err) => missing.push(err),
            }
        }
        if missing.is_empty() {
            Ok(codes)
        } else {
            Err(MappingError::Unresolved {
                device_id: device.id.to_string(),
                category: device.category.clone(),
                missing,
            })
        }
    }

    /// Number of entries across every tier.
    #[must_use]
    pub fn len(&self) -> usize {
        let scoped = |tiers: &BTreeMap<String, CodeTable>| tiers.values().map(BTreeMap::len).sum::<usize>();
        scoped(&self.by_device) + scoped(&self.by_product) + scoped(&self.by_category) + self.generic.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lookup<'a>(
    tiers: &'a BTreeMap<String, CodeTable>,
    key: Option<&str>,
    logical_name: &str,
) -> Option<&'a String> {
    key.and_then(|key| tiers.get(key))
        .and_then(|codes| codes.get(logical_name))
}

/// Accumulates entries; later entries replace earlier ones for the same key.
#[derive(Debug, Default)]
pub struct MappingRegistryBuilder {
    registry: MappingRegistry,
}

impl MappingRegistryBuilder {
    /// Add the built-in category and product tables.
    #[must_use]
    pub fn with_builtin(self) -> Self {
        let builder = BUILTIN
            .iter()
            .fold(self, |builder, (logical_name, category, code)| {
                builder.entry(*logical_name, *category, *code)
            });
        BUILTIN_PRODUCTS
            .iter()
            .fold(builder, |builder, (logical_name, product_id, code)| {
                builder.scoped(MappingScope::Product((*product_id).to_string()), *logical_name, *code)
            })
    }

    /// Add a category entry, or a generic one for category `"*"`.
    #[must_use]
    pub fn entry(
        self,
        logical_name: impl Into<String>,
        category: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        let category = category.into();
        let scope = if category == GENERIC_CATEGORY {
            MappingScope::Generic
        } else {
            MappingScope::Category(category)
        };
        self.scoped(scope, logical_name, code)
    }

    #[must_use]
    pub fn scoped(
        mut self,
        scope: MappingScope,
        logical_name: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        let table = match scope {
            MappingScope::Device(id) => self.registry.by_device.entry(id).or_default(),
            MappingScope::Product(id) => self.registry.by_product.entry(id).or_default(),
            MappingScope::Category(category) => {
                self.registry.by_category.entry(category).or_default()
            }
            MappingScope::Generic => &mut self.registry.generic,
        };
        table.insert(logical_name.into(), code.into());
        self
    }

    #[must_use]
    pub fn extend<I>(self, entries: I) -> Self
    where
        I: IntoIterator<Item = MappingEntry>,
    {
        entries.into_iter().fold(self, |builder, entry| {
            let scope = entry.scope();
            builder.scoped(scope, entry.logical_name, entry.code)
        })
    }

    #[must_use]
    pub fn build(self) -> MappingRegistry {
        self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::DeviceId;

    fn device(id: &str, category: &str) -> Device {
        Device::new(DeviceId::new(id).unwrap(), id, category)
    }

    #[test]
    fn should_prefer_category_entry_over_generic() {
        let registry = MappingRegistry::builtin();
        assert_eq!(
            registry.resolve(logical::BATTERY_LEVEL, &device("inv-1", "qt")).unwrap(),
            "Bateria"
        );
        assert_eq!(
            registry.resolve(logical::BATTERY_LEVEL, &device("th-1", "wk")).unwrap(),
            "battery_percentage"
        );
    }

    #[test]
    fn should_prefer_product_entry_over_category() {
        let registry = MappingRegistry::builtin();
        let plug = device("plug-1", "cz").with_product("k43w32veclxmc9lb");
        assert_eq!(registry.resolve(logical::SWITCH, &plug).unwrap(), "switch_led");
        assert_eq!(
            registry.resolve(logical::SWITCH, &device("plug-2", "cz")).unwrap(),
            "switch_1"
        );
    }

    #[test]
    fn should_prefer_device_entry_over_product() {
        let registry = MappingRegistry::builder()
            .with_builtin()
            .extend([MappingEntry {
                logical_name: "switch".to_string(),
                device_id: Some("plug-1".to_string()),
                product_id: None,
                category: GENERIC_CATEGORY.to_string(),
                code: "switch_2".to_string(),
            }])
            .build();
        let plug = device("plug-1", "cz").with_product("k43w32veclxmc9lb");
        assert_eq!(registry.resolve(logical::SWITCH, &plug).unwrap(), "switch_2");
    }

    #[test]
    fn should_prefer_overrides_over_every_tier() {
        let registry = MappingRegistry::builtin();
        let overrides = CodeTable::from([("battery_level".to_string(), "soc".to_string())]);
        let inverter = device("inv-1", "qt").with_product("xxgnqyeyrzawwwtt");
        assert_eq!(
            registry
                .resolve_with(logical::BATTERY_LEVEL, &inverter, &overrides)
                .unwrap(),
            "soc"
        );
        assert_eq!(
            registry
                .resolve_with(logical::PV_POWER, &inverter, &overrides)
                .unwrap(),
            "Producao_Solar_Atual"
        );
    }

    #[test]
    fn should_name_unresolved_property_device_and_category() {
        let registry = MappingRegistry::builder()
            .entry(logical::SWITCH, "cz", "switch_1")
            .build();
        let err = registry.resolve(logical::SWITCH, &device("lamp-1", "dj")).unwrap_err();
        assert_eq!(err.logical_name, "switch");
        assert_eq!(err.device_id, "lamp-1");
        assert_eq!(err.category, "dj");
    }

    #[test]
    fn should_aggregate_every_miss_in_resolve_all() {
        let registry = MappingRegistry::builder()
            .entry(logical::PV_POWER, GENERIC_CATEGORY, "pv_power")
            .build();
        let err = registry
            .resolve_all(
                &[logical::BATTERY_LEVEL, logical::PV_POWER, logical::SWITCH],
                &device("inv-1", "qt"),
                &CodeTable::new(),
            )
            .unwrap_err();
        assert_eq!(err.logical_names(), vec!["battery_level", "switch"]);
        assert_eq!(err.device_id(), "inv-1");
    }

    #[test]
    fn should_resolve_batch_in_request_order() {
        let registry = MappingRegistry::builtin();
        let codes = registry
            .resolve_all(
                &[logical::PV_POWER, logical::LOAD_POWER],
                &device("inv-1", "qt"),
                &CodeTable::new(),
            )
            .unwrap();
        assert_eq!(codes, vec!["Producao_Solar_Atual", "cur_power"]);
    }

    #[test]
    fn should_let_configured_entries_replace_builtin_ones() {
        let registry = MappingRegistry::builder()
            .with_builtin()
            .extend([MappingEntry {
                logical_name: "switch".to_string(),
                device_id: None,
                product_id: None,
                category: "cz".to_string(),
                code: "switch_led".to_string(),
            }])
            .build();
        assert_eq!(
            registry.resolve(logical::SWITCH, &device("plug-1", "cz")).unwrap(),
            "switch_led"
        );
    }

    #[test]
    fn should_pick_most_specific_scope_of_config_entry() {
        let entry: MappingEntry = serde_json::from_str(
            r#"{"logical_name": "switch", "product_id": "abc", "category": "cz", "code": "switch_2"}"#,
        )
        .unwrap();
        assert_eq!(entry.scope(), MappingScope::Product("abc".to_string()));

        let entry: MappingEntry =
            serde_json::from_str(r#"{"logical_name": "arm", "code": "alarm_switch"}"#).unwrap();
        assert_eq!(entry.category, GENERIC_CATEGORY);
        assert_eq!(entry.scope(), MappingScope::Generic);
    }

    #[test]
    fn should_be_empty_when_built_without_entries() {
        assert!(MappingRegistry::builder().build().is_empty());
        assert_eq!(
            MappingRegistry::builtin().len(),
            BUILTIN.len() + BUILTIN_PRODUCTS.len()
        );
    }
}
