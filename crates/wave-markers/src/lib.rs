//! greenwave Inline Markers
//!
//! Places inline-thread markers inside serialized blip content:
//! - [`html`]: lenient fragment parser with canonical serialization
//! - [`text_index`]: visible-text offsets (UTF-16) to text nodes
//! - [`inject`]: marker and placeholder injection
//! - [`render`]: mounting rendered children into placeholders
//! - [`MarkerInjector`]: injection behind a bounded cache
//!
//! # Example
//!
//! ```rust,ignore
//! use std::collections::HashSet;
//! use wave_markers::inject;
//! use wave_model::InlineChild;
//!
//! let html = inject("<p>Hello world</p>", &[InlineChild::new("c1", 5, false)], &HashSet::new());
//! assert!(html.contains("data-blip-thread=\"c1\""));
//! ```

#![warn(unreachable_pub)]

pub mod html;
pub mod inject;
pub mod injector;
pub mod marker;
pub mod render;
pub mod text_index;

pub use inject::inject;
pub use injector::{InjectorStats, MarkerInjector};
pub use render::{mount, placeholder_ids, Mounted};
