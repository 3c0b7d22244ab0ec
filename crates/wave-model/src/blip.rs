//! Blip records
//!
//! A blip is one node of a wave's discussion tree. Blips with an
//! `anchor_position` are inline-anchored children: they render as a marker
//! inside the parent's text instead of as a list child.

use crate::ids::{BlipId, UserId, WaveId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A node in a wave's discussion tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blip {
    /// Blip id, unique within the wave
    pub id: BlipId,
    /// Owning wave
    pub wave_id: WaveId,
    /// Parent blip, `None` for roots
    #[serde(default)]
    pub parent_id: Option<BlipId>,
    /// Offset into the parent's visible text, in UTF-16 code units
    #[serde(default)]
    pub anchor_position: Option<u32>,
    /// Serialized rich-text markup
    #[serde(default)]
    pub content: String,
    /// Author's persisted collapse preference
    #[serde(default)]
    pub is_folded_by_default: bool,
    /// Soft-delete flag
    #[serde(default)]
    pub deleted: bool,
    /// When the blip was soft-deleted
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    /// Author, when known
    #[serde(default)]
    pub author_id: Option<UserId>,
}

impl Blip {
    /// Create a root blip
    #[must_use]
    pub fn new(id: impl Into<BlipId>, wave_id: impl Into<WaveId>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            wave_id: wave_id.into(),
            parent_id: None,
            anchor_position: None,
            content: content.into(),
            is_folded_by_default: false,
            deleted: false,
            deleted_at: None,
            author_id: None,
        }
    }

    /// With parent
    #[inline]
    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<BlipId>) -> Self {
        self.parent_id = Some(parent.into());
        self
    }

    /// Anchor inline at a text offset of the parent
    #[inline]
    #[must_use]
    pub fn anchored_at(mut self, offset: u32) -> Self {
        self.anchor_position = Some(offset);
        self
    }

    /// With author
    #[inline]
    #[must_use]
    pub fn with_author(mut self, author: impl Into<UserId>) -> Self {
        self.author_id = Some(author.into());
        self
    }

    /// Folded by default
    #[inline]
    #[must_use]
    pub fn folded(mut self) -> Self {
        self.is_folded_by_default = true;
        self
    }

    /// Mark soft-deleted now
    #[inline]
    #[must_use]
    pub fn soft_deleted(mut self) -> Self {
        self.deleted = true;
        self.deleted_at = Some(Utc::now());
        self
    }

    /// Whether this blip renders as a marker inside its parent
    #[inline]
    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.parent_id.is_some() && self.anchor_position.is_some()
    }

    /// Whether this is a root blip of the wave
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Inline child as seen by the marker injector
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineChild {
    /// Child blip id
    pub id: BlipId,
    /// Offset into the parent's visible text, in UTF-16 code units
    pub anchor_position: u32,
    /// Whether the requesting user has read the child
    #[serde(default = "default_read")]
    pub is_read: bool,
}

fn default_read() -> bool {
    true
}

impl InlineChild {
    /// Create inline child
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<BlipId>, anchor_position: u32, is_read: bool) -> Self {
        Self {
            id: id.into(),
            anchor_position,
            is_read,
        }
    }
}
