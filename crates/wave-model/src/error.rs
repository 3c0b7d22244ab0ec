//! Error types for the model crate
//!
//! Provides error handling for:
//! - Blip tree validation
//! - Push-event decoding
//! - Configuration loading

use crate::ids::{BlipId, WaveId};
use std::path::PathBuf;

/// Model validation and decoding errors
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Two blips share an id
    #[error("duplicate blip id: {0}")]
    DuplicateBlip(BlipId),

    /// A blip belongs to another wave
    #[error("blip {blip} belongs to wave {actual}, expected {expected}")]
    ForeignBlip {
        blip: BlipId,
        expected: WaveId,
        actual: WaveId,
    },

    /// Parent reference does not resolve
    #[error("blip {blip} references unknown parent {parent}")]
    UnknownParent { blip: BlipId, parent: BlipId },

    /// Parent chain loops back on itself
    #[error("parent cycle through blip {0}")]
    Cycle(BlipId),

    /// Push event name is not part of the contract
    #[error("unknown push event: {0}")]
    UnknownEvent(String),

    /// Push event payload could not be decoded
    #[error("malformed {event} payload: {source}")]
    MalformedEvent {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ModelError {
    /// Check if the error came from a push event rather than tree validation
    #[inline]
    #[must_use]
    pub fn is_event_error(&self) -> bool {
        matches!(self, Self::UnknownEvent(_) | Self::MalformedEvent { .. })
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`crate::ClientConfig`]
    #[error("invalid config in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A value is out of range
    #[error("invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_error_display() {
        let err = ModelError::UnknownParent {
            blip: "b2".into(),
            parent: "missing".into(),
        };
        assert_eq!(err.to_string(), "blip b2 references unknown parent missing");
    }

    #[test]
    fn event_errors_are_classified() {
        assert!(ModelError::UnknownEvent("topic:created".into()).is_event_error());
        assert!(!ModelError::Cycle("b1".into()).is_event_error());
    }
}
