//! Observable unread state of one wave

use std::collections::HashSet;
use wave_model::{BlipId, UnreadSnapshot, WaveId};

/// State with a monotonic version, as restored by [`crate::Transaction`]
pub trait Versioned {
    /// Current version
    fn version(&self) -> u64;

    /// Overwrite the version
    fn set_version(&mut self, version: u64);

    /// Advance the version by one
    fn bump(&mut self) {
        self.set_version(self.version() + 1);
    }
}

/// What observers of an unread store see
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UnreadState {
    /// Wave this state belongs to
    pub wave_id: WaveId,
    /// Ids, total and read count
    pub snapshot: UnreadSnapshot,
    /// A refresh is in flight
    pub loading: bool,
    /// Message of the last failed refresh, cleared by the next success
    pub error: Option<String>,
    /// Bumped on every content transition, never reset
    pub version: u64,
}

impl UnreadState {
    /// Empty state for a wave
    #[must_use]
    pub fn new(wave_id: impl Into<WaveId>) -> Self {
        Self {
            wave_id: wave_id.into(),
            ..Self::default()
        }
    }

    /// Unread ids in traversal order
    #[must_use]
    pub fn unread_ids(&self) -> Vec<BlipId> {
        self.snapshot.unread_ids.iter().cloned().collect()
    }

    /// Unread ids for membership tests
    #[must_use]
    pub fn unread_set(&self) -> HashSet<BlipId> {
        self.snapshot.unread_ids.iter().cloned().collect()
    }

    /// Whether a blip is unread
    #[inline]
    #[must_use]
    pub fn is_unread(&self, blip_id: &BlipId) -> bool {
        self.snapshot.is_unread(blip_id)
    }

    /// Live blips in the wave
    #[inline]
    #[must_use]
    pub fn total(&self) -> u64 {
        self.snapshot.total
    }

    /// Blips the user has read
    #[inline]
    #[must_use]
    pub fn read_count(&self) -> u64 {
        self.snapshot.read_count
    }

    /// Unread blips
    #[inline]
    #[must_use]
    pub fn unread_count(&self) -> usize {
        self.snapshot.unread_count()
    }

    /// Equal in everything but the version
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.wave_id == other.wave_id
            && self.snapshot == other.snapshot
            && self.loading == other.loading
            && self.error == other.error
    }
}

impl Versioned for UnreadState {
    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}
