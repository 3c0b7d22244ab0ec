//! Signals exchanged between the navigator, the rendering layer and other views

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use wave_model::{BlipId, WaveId};

/// Identity of one open view of a wave
///
/// Used to tell a view's own `WaveUnreadChanged` apart from those published
/// by other views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewId(Uuid);

impl ViewId {
    /// Fresh random view id
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying uuid
    #[inline]
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ViewId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A UI signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Signal {
    /// Flip an inline child between collapsed and expanded
    ToggleInlineBlip {
        /// Inline child
        blip_id: BlipId,
    },
    /// Expand and highlight a blip
    ActivateBlip {
        /// Target blip
        blip_id: BlipId,
    },
    /// Remove the highlight from a blip
    DeactivateBlip {
        /// Target blip
        blip_id: BlipId,
    },
    /// Collapse a list child's body
    CollapseBlip {
        /// Target blip
        blip_id: BlipId,
    },
    /// Collapse an expanded inline child
    CollapseInlineBlip {
        /// Inline child
        blip_id: BlipId,
    },
    /// Fold every blip's replies
    FoldAll,
    /// Unfold every blip's replies
    UnfoldAll,
    /// Unread state of a wave changed in some view
    WaveUnreadChanged {
        /// Affected wave
        wave_id: WaveId,
        /// View that caused the change
        origin: ViewId,
    },
}

impl Signal {
    /// Topic the signal is published on
    #[inline]
    #[must_use]
    pub fn topic(&self) -> Topic {
        match self {
            Self::ToggleInlineBlip { .. } => Topic::ToggleInlineBlip,
            Self::ActivateBlip { .. } => Topic::ActivateBlip,
            Self::DeactivateBlip { .. } => Topic::DeactivateBlip,
            Self::CollapseBlip { .. } => Topic::CollapseBlip,
            Self::CollapseInlineBlip { .. } => Topic::CollapseInlineBlip,
            Self::FoldAll => Topic::FoldAll,
            Self::UnfoldAll => Topic::UnfoldAll,
            Self::WaveUnreadChanged { .. } => Topic::WaveUnreadChanged,
        }
    }

    /// Blip the signal targets, if any
    #[must_use]
    pub fn blip_id(&self) -> Option<&BlipId> {
        match self {
            Self::ToggleInlineBlip { blip_id }
            | Self::ActivateBlip { blip_id }
            | Self::DeactivateBlip { blip_id }
            | Self::CollapseBlip { blip_id }
            | Self::CollapseInlineBlip { blip_id } => Some(blip_id),
            Self::FoldAll | Self::UnfoldAll | Self::WaveUnreadChanged { .. } => None,
        }
    }
}

/// Signal kinds, for filtered subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topic {
    /// [`Signal::ToggleInlineBlip`]
    ToggleInlineBlip,
    /// [`Signal::ActivateBlip`]
    ActivateBlip,
    /// [`Signal::DeactivateBlip`]
    DeactivateBlip,
    /// [`Signal::CollapseBlip`]
    CollapseBlip,
    /// [`Signal::CollapseInlineBlip`]
    CollapseInlineBlip,
    /// [`Signal::FoldAll`]
    FoldAll,
    /// [`Signal::UnfoldAll`]
    UnfoldAll,
    /// [`Signal::WaveUnreadChanged`]
    WaveUnreadChanged,
}

impl Topic {
    /// Topics that change what the rendering layer shows
    pub const RENDERING: [Topic; 7] = [
        Topic::ToggleInlineBlip,
        Topic::ActivateBlip,
        Topic::DeactivateBlip,
        Topic::CollapseBlip,
        Topic::CollapseInlineBlip,
        Topic::FoldAll,
        Topic::UnfoldAll,
    ];
}
