//! Value objects: equality by value, not identity.
//!
//! The warehouse identifiers (material, location, checker) are modelled as
//! validated string newtypes. Construction goes through `TryFrom<String>`, so a
//! value of one of these types is always trimmed, non-empty and within the
//! column width used by the store.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**: two codes with
/// the same text are the same code.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// Maximum length (in characters) of any warehouse code.
pub const MAX_CODE_LEN: usize = 100;

macro_rules! impl_code_newtype {
    ($(#[$meta:meta])* $t:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $t(String);

        impl $t {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ValueObject for $t {}

        impl TryFrom<String> for $t {
            type Error = DomainError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(DomainError::validation($field, "is required"));
                }
                if trimmed.chars().count() > MAX_CODE_LEN {
                    return Err(DomainError::validation(
                        $field,
                        format!("must be at most {MAX_CODE_LEN} characters"),
                    ));
                }
                if trimmed.len() == value.len() {
                    Ok(Self(value))
                } else {
                    Ok(Self(trimmed.to_string()))
                }
            }
        }

        impl TryFrom<&str> for $t {
            type Error = DomainError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::try_from(value.to_string())
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

impl_code_newtype!(
    /// Stable identifier of a material (SKU-like).
    MaterialCode,
    "material_code"
);
impl_code_newtype!(
    /// Identifier of a storage location (bin, shelf, zone).
    LocationCode,
    "location_code"
);
impl_code_newtype!(
    /// Identifier of the operator who performed a count.
    CheckerId,
    "checker_id"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_code_is_rejected_with_field_name() {
        let err = MaterialCode::try_from("").unwrap_err();
        assert_eq!(err, DomainError::validation("material_code", "is required"));

        let err = LocationCode::try_from("   ").unwrap_err();
        assert_eq!(err.field(), Some("location_code"));
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        let code = CheckerId::try_from("  u1 ").unwrap();
        assert_eq!(code.as_str(), "u1");
    }

    #[test]
    fn overlong_code_is_rejected() {
        let long = "x".repeat(MAX_CODE_LEN + 1);
        let err = MaterialCode::try_from(long).unwrap_err();
        assert_eq!(err.field(), Some("material_code"));

        let exact = "x".repeat(MAX_CODE_LEN);
        assert!(MaterialCode::try_from(exact).is_ok());
    }

    #[test]
    fn serde_goes_through_validation() {
        let ok: LocationCode = serde_json::from_str("\"L1\"").unwrap();
        assert_eq!(ok.as_str(), "L1");
        assert!(serde_json::from_str::<LocationCode>("\"\"").is_err());
        assert_eq!(serde_json::to_string(&ok).unwrap(), "\"L1\"");
    }
}
