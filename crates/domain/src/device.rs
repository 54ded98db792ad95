//! Device — a cloud-registered thing discovered inside a space.

use serde::{Deserialize, Serialize};

use crate::id::{DeviceId, SpaceId};

/// Snapshot of one discovered device.
///
/// Devices are re-fetched on every discovery cycle and never cached
/// long-term, so this type is immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    /// Vendor category code (e.g. `"cz"` for plugs, `"qt"` for inverters).
    pub category: String,
    pub space_id: Option<SpaceId>,
    pub product_id: Option<String>,
    pub online: Option<bool>,
}

impl Device {
    /// Create a device with the mandatory fields.
    #[must_use]
    pub fn new(id: DeviceId, name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            category: category.into(),
            space_id: None,
            product_id: None,
            online: None,
        }
    }

    #[must_use]
    pub fn with_space(mut self, space_id: SpaceId) -> Self {
        self.space_id = Some(space_id);
        self
    }

    #[must_use]
    pub fn with_product(mut self, product_id: impl Into<String>) -> Self {
        self.product_id = Some(product_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_build_device_with_optional_fields() {
        let device = Device::new(DeviceId::new("inv-1").unwrap(), "Inverter", "qt")
            .with_space(SpaceId::new("home").unwrap())
            .with_product("xxgnqyeyrzawwwtt");
        assert_eq!(device.category, "qt");
        assert_eq!(device.space_id.unwrap().as_str(), "home");
        assert_eq!(device.product_id.as_deref(), Some("xxgnqyeyrzawwwtt"));
        assert!(device.online.is_none());
    }
}
