//! Opaque identifiers
//!
//! Ids are assigned by the server and only compared for equality, so they are
//! kept as strings behind newtypes to stop a blip id from being passed where a
//! wave id is expected.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from any string-like value
            #[inline]
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the raw id
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the id is blank
            #[inline]
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a wave (topic)
    WaveId
);

string_id!(
    /// Identifier of a blip, unique within its wave
    BlipId
);

string_id!(
    /// Identifier of a user
    UserId
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_compare_by_value() {
        assert_eq!(BlipId::from("b1"), BlipId::new("b1".to_string()));
        assert_ne!(BlipId::from("b1"), BlipId::from("b2"));
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&WaveId::from("w-1")).unwrap();
        assert_eq!(json, "\"w-1\"");
        let back: WaveId = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_str(), "w-1");
    }

    #[test]
    fn ids_lookup_by_str() {
        let set: HashSet<BlipId> = [BlipId::from("a")].into_iter().collect();
        assert!(set.contains("a"));
    }

    #[test]
    fn blank_ids_are_empty() {
        assert!(UserId::from("  ").is_empty());
        assert!(!UserId::from("u").is_empty());
    }

    #[test]
    fn default_ids_are_blank() {
        assert!(WaveId::default().is_empty());
        assert_eq!(BlipId::default().as_str(), "");
    }
}
