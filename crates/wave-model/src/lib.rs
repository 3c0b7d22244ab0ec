//! greenwave Model
//!
//! Shared vocabulary for the unread tracker and Follow-the-Green:
//! - Identifiers for waves, blips and users
//! - The blip tree with inline anchoring
//! - The per-user unread snapshot
//! - The push-event contract and HTTP wire types
//! - Client configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use wave_model::{Blip, WaveTree};
//!
//! let tree = WaveTree::new("w1".into(), vec![
//!     Blip::new("root", "w1", "<p>Hello world</p>"),
//!     Blip::new("c1", "w1", "").with_parent("root").anchored_at(5),
//! ])?;
//! assert_eq!(tree.inline_children(&"root".into(), |_| true).len(), 1);
//! ```

#![warn(unreachable_pub)]

pub mod blip;
pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod tree;
pub mod unread;

pub use blip::{Blip, InlineChild};
pub use config::ClientConfig;
pub use error::{ConfigError, ModelError};
pub use events::{BlipAction, BlipEvent, WaveEvent};
pub use ids::{BlipId, UserId, WaveId};
pub use tree::WaveTree;
pub use unread::{
    MarkManyRequest, UnreadCountsResponse, UnreadResponse, UnreadSnapshot, WaveUnreadCount,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
