//! greenwave Unread
//!
//! Per-wave, per-user unread tracking:
//! - [`UnreadStore`] with optimistic single and batch marks
//! - [`Transaction`] snapshot / apply / commit / revert
//! - Debounced refresh on push events and cross-view signals
//! - [`ReadModel`] seam with an HTTP implementation
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wave_unread::{HttpReadModel, UnreadStore};
//!
//! let model = Arc::new(HttpReadModel::new("http://localhost:8000")?);
//! let store = UnreadStore::builder("w1", model).with_user("u1").build();
//! store.refresh().await?;
//! if let Some(first) = store.first_unread() {
//!     store.mark_blip_read(&first).await?;
//! }
//! ```

#![warn(unreachable_pub)]

pub mod client;
pub mod debounce;
pub mod error;
pub mod notify;
pub mod registry;
pub mod state;
pub mod store;
pub mod transaction;

pub use client::{count_request_ids, HttpReadModel, ReadModel, MAX_COUNT_WAVES};
pub use debounce::{Debouncer, DEFAULT_WINDOW};
pub use error::UnreadError;
pub use notify::{NoticeLevel, Notifier, RecordingNotifier, TracingNotifier};
pub use registry::UnreadRegistry;
pub use state::{UnreadState, Versioned};
pub use store::{EventEffect, MarkOutcome, Refreshed, UnreadStore, UnreadStoreBuilder};
pub use transaction::{Revert, Transaction};
