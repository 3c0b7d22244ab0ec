//! greenwave Preferences
//!
//! Per-blip UI preferences persisted in a key/value medium:
//! - Generic [`PreferenceStore`] with `get` / `set` / `subscribe`
//! - Swappable [`Storage`] adapters (memory, cross-tab, file)
//! - [`CollapsePreferences`] and [`InlineCommentsVisibility`] facades
//!
//! Writes made in one tab reach the stores of every other tab on the same
//! [`SharedStorage`] as [`ChangeSource::Storage`] notifications.

#![warn(unreachable_pub)]

pub mod collapse;
pub mod error;
pub mod storage;
pub mod store;
pub mod value;
pub mod visibility;

pub use collapse::{CollapsePreferences, COLLAPSE_KEY};
pub use error::PrefsError;
pub use storage::{
    storage_from_config, FileStorage, MemoryStorage, SharedStorage, Storage, StorageEvent, StorageWatch, TabStorage,
};
pub use store::{ChangeSource, PreferenceChange, PreferenceStore};
pub use value::{Collapsed, Entry, PreferenceValue, Visibility};
pub use visibility::{InlineCommentsVisibility, VISIBILITY_KEY};
