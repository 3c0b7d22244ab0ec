//! Rendering surface seam
//!
//! What the navigator needs from whatever displays the wave: element and
//! marker lookup, ancestry, scrolling, and a frame clock to poll on.

use async_trait::async_trait;
use wave_model::BlipId;

/// What to scroll to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScrollTarget {
    /// The rendered blip
    Blip(BlipId),
    /// The inline marker standing in for a collapsed child
    Marker(BlipId),
}

/// Scroll animation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScrollBehavior {
    /// Animated
    #[default]
    Smooth,
    /// Jump
    Instant,
}

/// Vertical alignment after scrolling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScrollBlock {
    /// Centered in the viewport
    #[default]
    Center,
    /// Aligned to the top
    Start,
    /// Minimal movement
    Nearest,
}

/// How to scroll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScrollOptions {
    /// Animation
    pub behavior: ScrollBehavior,
    /// Alignment
    pub block: ScrollBlock,
}

impl ScrollOptions {
    /// Smooth, centered
    pub const CENTERED: Self = Self {
        behavior: ScrollBehavior::Smooth,
        block: ScrollBlock::Center,
    };

    /// Smooth, minimal movement
    pub const NEAREST: Self = Self {
        behavior: ScrollBehavior::Smooth,
        block: ScrollBlock::Nearest,
    };
}

/// Something that displays a wave
#[async_trait]
pub trait RenderSurface: Send + Sync {
    /// Whether the blip currently has a rendered element
    fn find_blip(&self, blip_id: &BlipId) -> bool;

    /// Whether an inline marker for the blip is rendered
    fn find_marker(&self, blip_id: &BlipId) -> bool;

    /// Whether the blip is anchored inline in its parent
    fn is_inline(&self, blip_id: &BlipId) -> bool;

    /// Whether `ancestor` encloses `blip_id` in the rendered tree
    ///
    /// Surfaces without a hierarchy report `false`.
    fn is_ancestor(&self, _ancestor: &BlipId, _blip_id: &BlipId) -> bool {
        false
    }

    /// Bring a target into view
    fn scroll_into_view(&self, target: &ScrollTarget, options: ScrollOptions);

    /// Wait for the next frame; signals published so far are applied by then
    async fn next_frame(&self);
}
