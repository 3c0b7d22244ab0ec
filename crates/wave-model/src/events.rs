//! Push-event contract
//!
//! The socket transport is external; this module only decodes the events it
//! delivers on a wave channel:
//! - `blip:created`, `blip:updated`, `blip:deleted`, `blip:read`
//! - `wave:unread`

use crate::error::ModelError;
use crate::ids::{BlipId, UserId, WaveId};
use serde::{Deserialize, Serialize};

/// What happened to a blip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlipAction {
    /// Blip created
    Created,
    /// Blip content or placement changed
    Updated,
    /// Blip soft-deleted
    Deleted,
    /// Blip marked read by some user
    Read,
}

impl BlipAction {
    /// Wire name of the event
    #[inline]
    #[must_use]
    pub fn event_name(self) -> &'static str {
        match self {
            Self::Created => "blip:created",
            Self::Updated => "blip:updated",
            Self::Deleted => "blip:deleted",
            Self::Read => "blip:read",
        }
    }
}

/// Blip-level push event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlipEvent {
    /// Wave the blip belongs to
    pub wave_id: WaveId,
    /// Affected blip
    pub blip_id: BlipId,
    /// User whose action caused the event, when known
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// What happened
    #[serde(skip, default = "default_action")]
    pub action: BlipAction,
}

fn default_action() -> BlipAction {
    BlipAction::Updated
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WaveSignalPayload {
    wave_id: WaveId,
    #[serde(default)]
    user_id: Option<UserId>,
}

/// Event delivered on a wave channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaveEvent {
    /// A blip changed
    Blip(BlipEvent),
    /// Unread state of the wave changed for some user
    UnreadChanged {
        /// Affected wave
        wave_id: WaveId,
        /// User whose read state changed
        user_id: Option<UserId>,
    },
}

impl WaveEvent {
    /// Build a blip event
    #[must_use]
    pub fn blip(
        action: BlipAction,
        wave_id: impl Into<WaveId>,
        blip_id: impl Into<BlipId>,
        user_id: Option<UserId>,
    ) -> Self {
        Self::Blip(BlipEvent {
            wave_id: wave_id.into(),
            blip_id: blip_id.into(),
            user_id,
            action,
        })
    }

    /// Decode an event from its wire name and JSON payload
    ///
    /// # Errors
    /// - `ModelError::UnknownEvent` for names outside the contract
    /// - `ModelError::MalformedEvent` if the payload does not decode
    pub fn from_wire(name: &str, payload: serde_json::Value) -> Result<Self, ModelError> {
        let malformed = |source| ModelError::MalformedEvent {
            event: name.to_string(),
            source,
        };
        let action = match name {
            "blip:created" => BlipAction::Created,
            "blip:updated" => BlipAction::Updated,
            "blip:deleted" => BlipAction::Deleted,
            "blip:read" => BlipAction::Read,
            "wave:unread" => {
                let payload: WaveSignalPayload = serde_json::from_value(payload).map_err(malformed)?;
                return Ok(Self::UnreadChanged {
                    wave_id: payload.wave_id,
                    user_id: payload.user_id,
                });
            }
            other => return Err(ModelError::UnknownEvent(other.to_string())),
        };
        let mut event: BlipEvent = serde_json::from_value(payload).map_err(malformed)?;
        event.action = action;
        Ok(Self::Blip(event))
    }

    /// Wave the event belongs to
    #[inline]
    #[must_use]
    pub fn wave_id(&self) -> &WaveId {
        match self {
            Self::Blip(e) => &e.wave_id,
            Self::UnreadChanged { wave_id, .. } => wave_id,
        }
    }

    /// User that caused the event, when known
    #[inline]
    #[must_use]
    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::Blip(e) => e.user_id.as_ref(),
            Self::UnreadChanged { user_id, .. } => user_id.as_ref(),
        }
    }

    /// Whether this is a blip deletion
    #[inline]
    #[must_use]
    pub fn is_deletion(&self) -> bool {
        matches!(self, Self::Blip(BlipEvent { action: BlipAction::Deleted, .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_blip_events() {
        let ev = WaveEvent::from_wire(
            "blip:deleted",
            json!({"waveId": "w1", "blipId": "b1", "userId": "u2"}),
        )
        .unwrap();
        assert!(ev.is_deletion());
        assert_eq!(ev.wave_id().as_str(), "w1");
        assert_eq!(ev.user_id().map(UserId::as_str), Some("u2"));
    }

    #[test]
    fn user_is_optional() {
        let ev = WaveEvent::from_wire("blip:created", json!({"waveId": "w1", "blipId": "b9"})).unwrap();
        match ev {
            WaveEvent::Blip(e) => {
                assert_eq!(e.action, BlipAction::Created);
                assert!(e.user_id.is_none());
            }
            WaveEvent::UnreadChanged { .. } => panic!("expected blip event"),
        }
    }

    #[test]
    fn decodes_wave_signal() {
        let ev = WaveEvent::from_wire("wave:unread", json!({"waveId": "w1", "userId": "u1"})).unwrap();
        assert!(matches!(ev, WaveEvent::UnreadChanged { .. }));
        assert!(!ev.is_deletion());
    }

    #[test]
    fn rejects_unknown_and_malformed() {
        assert!(matches!(
            WaveEvent::from_wire("topic:created", json!({})),
            Err(ModelError::UnknownEvent(_))
        ));
        assert!(matches!(
            WaveEvent::from_wire("blip:updated", json!({"waveId": "w1"})),
            Err(ModelError::MalformedEvent { .. })
        ));
    }

    #[test]
    fn action_names_round_trip_through_decoder() {
        for action in [BlipAction::Created, BlipAction::Updated, BlipAction::Deleted, BlipAction::Read] {
            let ev = WaveEvent::from_wire(action.event_name(), json!({"waveId": "w", "blipId": "b"})).unwrap();
            assert_eq!(ev, WaveEvent::blip(action, "w", "b", None));
        }
    }
}
