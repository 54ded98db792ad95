//! Typed identifier newtypes for vendor-issued string identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident, $kind:literal) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a vendor identifier, trimming surrounding whitespace.
            ///
            /// # Errors
            ///
            /// Returns [`ValidationError::EmptyIdentifier`] if the trimmed value is empty.
            pub fn new(value: impl AsRef<str>) -> Result<Self, ValidationError> {
                let trimmed = value.as_ref().trim();
                if trimmed.is_empty() {
                    return Err(ValidationError::EmptyIdentifier { kind: $kind });
                }
                Ok(Self(trimmed.to_string()))
            }

            /// Borrow the raw identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(
    /// Identifier of a cloud [`Device`](crate::device::Device).
    DeviceId,
    "device"
);

define_id!(
    /// Identifier of a cloud scene rule.
    RuleId,
    "rule"
);

define_id!(
    /// Identifier of a space (site or home) that scopes discovery.
    SpaceId,
    "space"
);
