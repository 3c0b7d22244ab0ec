//! greenwave Navigator
//!
//! Follow-the-Green and the surface it drives:
//! - [`FollowTheGreen`] moves the reader to the next unread blip
//! - [`RenderSurface`] seam with [`WaveView`] as the rendering implementation
//! - [`TopicIndex`] offers the next topic once a wave is read
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wave_bus::SignalBus;
//! use wave_navigator::{FollowOutcome, FollowTheGreen, WaveView};
//!
//! let bus = SignalBus::new();
//! let view = Arc::new(WaveView::new(tree, store.clone(), folds, &bus));
//! let navigator = FollowTheGreen::new(store, view, bus);
//! match navigator.follow().await? {
//!     FollowOutcome::Navigated { blip_id, .. } => println!("now reading {blip_id}"),
//!     other => println!("{other:?}"),
//! }
//! ```

#![warn(unreachable_pub)]

pub mod error;
pub mod navigator;
pub mod state;
pub mod surface;
pub mod topics;
pub mod view;

pub use error::NavigatorError;
pub use navigator::{AbortReason, FollowOutcome, FollowTheGreen, DEFAULT_MAX_FRAMES};
pub use state::{allowed_transitions, validate_transition, NavState};
pub use surface::{RenderSurface, ScrollBehavior, ScrollBlock, ScrollOptions, ScrollTarget};
pub use topics::{NextTopicSource, TopicIndex};
pub use view::{Rendered, WaveView, BLIP_ATTR, FRAME};
