//! Inline comment visibility
//!
//! Per blip, whether inline comments render at all. Visible unless stored
//! otherwise.

use crate::storage::Storage;
use crate::store::{PreferenceChange, PreferenceStore};
use crate::value::{Entry, Visibility};
use std::sync::Arc;
use tokio::sync::broadcast;
use wave_model::BlipId;

/// Storage key of the visibility document
pub const VISIBILITY_KEY: &str = "inlineCommentsVisibility";

/// Typed facade over the visibility preference store
#[derive(Debug, Clone)]
pub struct InlineCommentsVisibility {
    store: Arc<PreferenceStore<Visibility>>,
}

impl InlineCommentsVisibility {
    /// Open visibility preferences on `storage`
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            store: PreferenceStore::new(VISIBILITY_KEY, storage),
        }
    }

    /// Whether inline comments of the blip are shown
    #[inline]
    #[must_use]
    pub fn is_visible(&self, blip_id: &BlipId) -> bool {
        self.store.get(blip_id).0
    }

    /// Stored visibility, `None` when the user never chose
    #[must_use]
    pub fn stored(&self, blip_id: &BlipId) -> Option<bool> {
        self.store.stored(blip_id).map(|v| v.0)
    }

    /// Stored visibility with its modification time
    #[must_use]
    pub fn metadata(&self, blip_id: &BlipId) -> Option<Entry<Visibility>> {
        self.store.metadata(blip_id)
    }

    /// Show or hide; returns the modification time
    pub fn set_visible(&self, blip_id: impl Into<BlipId>, visible: bool) -> u64 {
        self.store.set(blip_id, Visibility(visible))
    }

    /// Subscribe to changes from this tab and others
    pub fn subscribe(&self) -> broadcast::Receiver<PreferenceChange<Visibility>> {
        self.store.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn visible_by_default() {
        let prefs = InlineCommentsVisibility::new(Arc::new(MemoryStorage::new()));
        assert!(prefs.is_visible(&"b1".into()));
        assert_eq!(prefs.stored(&"b1".into()), None);
        prefs.set_visible("b1", false);
        assert_eq!(prefs.stored(&"b1".into()), Some(false));
        assert!(!prefs.is_visible(&"b1".into()));
    }
}
