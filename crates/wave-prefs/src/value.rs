//! Preference value types and their persisted shape
//!
//! An entry is persisted as `{ "<field>": <value>, "updatedAt": <ms> }`.
//! Reading is lenient: a bare value is accepted with `updatedAt = 0`, and
//! older field names are still understood.

use serde_json::Value;
use std::fmt;

/// A value that can be stored per blip
pub trait PreferenceValue: Copy + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Field holding the value in a persisted entry
    const FIELD: &'static str;

    /// Older field names accepted when reading
    const LEGACY_FIELDS: &'static [&'static str];

    /// Value reported for blips without an entry
    fn default_value() -> Self;

    /// Decode a bare JSON value
    fn from_json(value: &Value) -> Option<Self>;

    /// Encode as a bare JSON value
    fn to_json(self) -> Value;
}

/// Whether a blip's replies are folded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Collapsed(pub bool);

impl PreferenceValue for Collapsed {
    const FIELD: &'static str = "isCollapsed";
    const LEGACY_FIELDS: &'static [&'static str] = &["value"];

    fn default_value() -> Self {
        Self(false)
    }

    fn from_json(value: &Value) -> Option<Self> {
        value.as_bool().map(Self)
    }

    fn to_json(self) -> Value {
        Value::Bool(self.0)
    }
}

/// Whether a blip's inline comments are shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Visibility(pub bool);

impl Default for Visibility {
    fn default() -> Self {
        Self(true)
    }
}

impl PreferenceValue for Visibility {
    const FIELD: &'static str = "value";
    const LEGACY_FIELDS: &'static [&'static str] = &[];

    fn default_value() -> Self {
        Self(true)
    }

    fn from_json(value: &Value) -> Option<Self> {
        value.as_bool().map(Self)
    }

    fn to_json(self) -> Value {
        Value::Bool(self.0)
    }
}

/// A stored value with its modification time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry<V> {
    /// Stored value
    pub value: V,
    /// Milliseconds since the Unix epoch, 0 if unknown
    pub updated_at: u64,
}

impl<V: PreferenceValue> Entry<V> {
    /// Decode one persisted entry; `None` if it is malformed
    #[must_use]
    pub fn coerce(raw: &Value) -> Option<Self> {
        if let Some(value) = V::from_json(raw) {
            return Some(Self { value, updated_at: 0 });
        }
        let obj = raw.as_object()?;
        let value = std::iter::once(V::FIELD)
            .chain(V::LEGACY_FIELDS.iter().copied())
            .find_map(|field| obj.get(field).and_then(V::from_json))?;
        let updated_at = obj
            .get("updatedAt")
            .and_then(|t| t.as_u64().or_else(|| t.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)))
            .unwrap_or(0);
        Some(Self { value, updated_at })
    }

    /// Encode for persistence
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut obj = serde_json::Map::new();
        obj.insert(V::FIELD.to_string(), self.value.to_json());
        obj.insert("updatedAt".to_string(), Value::from(self.updated_at));
        Value::Object(obj)
    }
}
