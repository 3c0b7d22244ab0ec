//! Collapse preferences
//!
//! Remembers, per blip, whether its replies are folded. Blips without an
//! entry are expanded.

use crate::storage::Storage;
use crate::store::{PreferenceChange, PreferenceStore};
use crate::value::{Collapsed, Entry};
use std::sync::Arc;
use tokio::sync::broadcast;
use wave_model::BlipId;

/// Storage key of the collapse document
pub const COLLAPSE_KEY: &str = "blipCollapsePreferences";

/// Typed facade over the collapse preference store
#[derive(Debug, Clone)]
pub struct CollapsePreferences {
    store: Arc<PreferenceStore<Collapsed>>,
}

impl CollapsePreferences {
    /// Open collapse preferences on `storage`
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            store: PreferenceStore::new(COLLAPSE_KEY, storage),
        }
    }

    /// Whether the blip's replies are folded
    #[inline]
    #[must_use]
    pub fn is_collapsed(&self, blip_id: &BlipId) -> bool {
        self.store.get(blip_id).0
    }

    /// Stored preference with its modification time
    #[must_use]
    pub fn metadata(&self, blip_id: &BlipId) -> Option<Entry<Collapsed>> {
        self.store.metadata(blip_id)
    }

    /// Fold or unfold; returns the modification time
    pub fn set_collapsed(&self, blip_id: impl Into<BlipId>, collapsed: bool) -> u64 {
        self.store.set(blip_id, Collapsed(collapsed))
    }

    /// Subscribe to changes from this tab and others
    pub fn subscribe(&self) -> broadcast::Receiver<PreferenceChange<Collapsed>> {
        self.store.subscribe()
    }

    /// Underlying store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<PreferenceStore<Collapsed>> {
        &self.store
    }
}
