//! Wave view
//!
//! The concrete rendering layer behind [`RenderSurface`]:
//! - Renders a [`WaveTree`] to markup, injecting inline markers through a
//!   [`MarkerInjector`] and mounting expanded inline children
//! - Hides replies of folded blips, per stored preference or author default
//! - Applies rendering signals from the bus at frame boundaries
//! - Counts every mutation it performs
//!
//! Rendering is derived on demand from the tree, the unread set, the fold
//! preferences and the view's own UI state, so it is never stale with
//! respect to any of them.

use crate::surface::{RenderSurface, ScrollOptions, ScrollTarget};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wave_bus::{BusError, Signal, SignalBus, Subscription, Topic};
use wave_markers::html::{Element, Fragment, Node};
use wave_markers::{mount, InjectorStats, MarkerInjector};
use wave_model::{Blip, BlipId, WaveTree};
use wave_prefs::CollapsePreferences;
use wave_unread::UnreadStore;

/// Interval between frames
pub const FRAME: Duration = Duration::from_millis(16);

/// Attribute carrying a blip's id on its rendered element
pub const BLIP_ATTR: &str = "data-blip-id";

#[derive(Debug, Default)]
struct UiState {
    expanded_inline: HashSet<BlipId>,
    expanded_bodies: HashSet<BlipId>,
    active: Option<BlipId>,
}

/// One rendering of the wave
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    /// Markup of every root blip, document order
    pub html: String,
    /// Blips with a rendered element
    pub visible: HashSet<BlipId>,
    /// Inline children with a rendered marker
    pub markers: HashSet<BlipId>,
}

struct RenderContext<'a> {
    tree: &'a WaveTree,
    ui: &'a UiState,
    unread: &'a HashSet<BlipId>,
}

/// Renders one wave and reacts to rendering signals
pub struct WaveView {
    tree: RwLock<WaveTree>,
    store: Arc<UnreadStore>,
    folds: CollapsePreferences,
    injector: MarkerInjector,
    subscription: Mutex<Subscription>,
    ui: Mutex<UiState>,
    scrolls: Mutex<Vec<(ScrollTarget, ScrollOptions)>>,
    mutations: AtomicU64,
    frame: Duration,
}

impl std::fmt::Debug for WaveView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaveView")
            .field("wave_id", self.tree.read().wave_id())
            .field("mutations", &self.mutations())
            .finish_non_exhaustive()
    }
}

impl WaveView {
    /// Create a view of `tree`, listening for rendering signals on `bus`
    #[must_use]
    pub fn new(tree: WaveTree, store: Arc<UnreadStore>, folds: CollapsePreferences, bus: &SignalBus) -> Self {
        Self {
            tree: RwLock::new(tree),
            store,
            folds,
            injector: MarkerInjector::new(wave_markers::injector::DEFAULT_CAPACITY),
            subscription: Mutex::new(bus.subscribe_to(Topic::RENDERING)),
            ui: Mutex::new(UiState::default()),
            scrolls: Mutex::new(Vec::new()),
            mutations: AtomicU64::new(0),
            frame: FRAME,
        }
    }

    /// Frame interval used by [`RenderSurface::next_frame`]
    #[inline]
    #[must_use]
    pub fn with_frame(mut self, frame: Duration) -> Self {
        self.frame = frame;
        self
    }

    /// Injection cache to use instead of a private one
    #[inline]
    #[must_use]
    pub fn with_injector(mut self, injector: MarkerInjector) -> Self {
        self.injector = injector;
        self
    }

    /// Unread store the view highlights from
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<UnreadStore> {
        &self.store
    }

    /// Copy of the rendered tree
    #[must_use]
    pub fn tree(&self) -> WaveTree {
        self.tree.read().clone()
    }

    /// Change the tree, e.g. after a push event
    pub fn update_tree<F, R>(&self, change: F) -> R
    where
        F: FnOnce(&mut WaveTree) -> R,
    {
        let result = change(&mut self.tree.write());
        self.mutations.fetch_add(1, Ordering::Relaxed);
        result
    }

    /// Surface mutations performed so far
    #[must_use]
    pub fn mutations(&self) -> u64 {
        self.mutations.load(Ordering::Relaxed)
    }

    /// Scrolls performed so far, oldest first
    #[must_use]
    pub fn scrolls(&self) -> Vec<(ScrollTarget, ScrollOptions)> {
        self.scrolls.lock().clone()
    }

    /// Active blip
    #[must_use]
    pub fn active(&self) -> Option<BlipId> {
        self.ui.lock().active.clone()
    }

    /// Whether an inline child is expanded in place
    #[must_use]
    pub fn is_expanded_inline(&self, blip_id: &BlipId) -> bool {
        self.ui.lock().expanded_inline.contains(blip_id)
    }

    /// Whether a blip's body is expanded
    #[must_use]
    pub fn is_body_expanded(&self, blip_id: &BlipId) -> bool {
        self.ui.lock().expanded_bodies.contains(blip_id)
    }

    /// Whether a blip's replies are hidden
    #[must_use]
    pub fn is_folded(&self, blip: &Blip) -> bool {
        self.folds
            .metadata(&blip.id)
            .map_or(blip.is_folded_by_default, |entry| entry.value.0)
    }

    /// Injection cache statistics
    #[must_use]
    pub fn injector_stats(&self) -> InjectorStats {
        self.injector.stats()
    }

    /// Apply every queued rendering signal; returns how many changed the view
    pub fn pump(&self) -> usize {
        let mut applied = 0;
        loop {
            let next = self.subscription.lock().try_recv();
            match next {
                Ok(Some(signal)) => {
                    if self.apply(&signal) {
                        applied += 1;
                    }
                }
                Ok(None) | Err(BusError::Closed) => break,
                Err(BusError::Lagged(n)) => {
                    tracing::warn!("View dropped {} rendering signals", n);
                }
            }
        }
        applied
    }

    /// Apply one signal; returns whether the view changed
    pub fn apply(&self, signal: &Signal) -> bool {
        if let Some(id) = signal.blip_id() {
            if self.tree.read().get(id).is_none() {
                return false;
            }
        }
        let changed = match signal {
            Signal::ToggleInlineBlip { blip_id } => {
                if !self.tree.read().get(blip_id).is_some_and(Blip::is_inline) {
                    return false;
                }
                let mut ui = self.ui.lock();
                if !ui.expanded_inline.remove(blip_id) {
                    ui.expanded_inline.insert(blip_id.clone());
                }
                true
            }
            Signal::ActivateBlip { blip_id } => {
                let mut ui = self.ui.lock();
                let expanded = ui.expanded_bodies.insert(blip_id.clone());
                let previous = ui.active.replace(blip_id.clone());
                expanded || previous.as_ref() != Some(blip_id)
            }
            Signal::DeactivateBlip { blip_id } => {
                let mut ui = self.ui.lock();
                if ui.active.as_ref() == Some(blip_id) {
                    ui.active = None;
                    true
                } else {
                    false
                }
            }
            Signal::CollapseBlip { blip_id } => self.ui.lock().expanded_bodies.remove(blip_id),
            Signal::CollapseInlineBlip { blip_id } => self.ui.lock().expanded_inline.remove(blip_id),
            Signal::FoldAll => self.fold_all(true) > 0,
            Signal::UnfoldAll => self.fold_all(false) > 0,
            Signal::WaveUnreadChanged { .. } => false,
        };
        if changed {
            self.mutations.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("View applied {:?}", signal);
        }
        changed
    }

    fn fold_all(&self, folded: bool) -> usize {
        let tree = self.tree.read();
        let targets: Vec<BlipId> = tree
            .live_ids()
            .filter(|id| tree.has_list_children(id))
            .filter(|id| tree.get(id).is_some_and(|b| self.is_folded(b) != folded))
            .cloned()
            .collect();
        for id in &targets {
            self.folds.set_collapsed(id.clone(), folded);
        }
        targets.len()
    }

    /// Render the whole wave
    #[must_use]
    pub fn render(&self) -> Rendered {
        let tree = self.tree.read();
        let ui = self.ui.lock();
        let unread = self.store.unread_set();
        let ctx = RenderContext {
            tree: &tree,
            ui: &ui,
            unread: &unread,
        };

        let mut out = Rendered::default();
        let roots: Vec<Node> = tree
            .roots()
            .map(|root| Node::Element(self.render_blip(&ctx, root, &mut out)))
            .collect();
        out.html = Fragment { nodes: roots }.to_html();
        out
    }

    fn render_blip(&self, ctx: &RenderContext<'_>, blip: &Blip, out: &mut Rendered) -> Element {
        out.visible.insert(blip.id.clone());

        let inline = ctx.tree.inline_children(&blip.id, |id| !ctx.unread.contains(id));
        let mut children_html = HashMap::new();
        let mut children_out = HashMap::new();
        for child in &inline {
            out.markers.insert(child.id.clone());
            if !ctx.ui.expanded_inline.contains(&child.id) {
                continue;
            }
            if let Some(child_blip) = ctx.tree.get(&child.id) {
                let mut child_out = Rendered::default();
                let element = self.render_blip(ctx, child_blip, &mut child_out);
                children_html.insert(child.id.clone(), Fragment { nodes: vec![Node::Element(element)] }.to_html());
                children_out.insert(child.id.clone(), child_out);
            }
        }

        let injected = self.injector.inject(&blip.content, &inline, &ctx.ui.expanded_inline);
        let mounted = mount(&injected, &children_html);
        for id in &mounted.mounted {
            if let Some(child_out) = children_out.remove(id) {
                out.visible.extend(child_out.visible);
                out.markers.extend(child_out.markers);
            }
        }

        let mut classes = vec!["blip"];
        if ctx.unread.contains(&blip.id) {
            classes.push("unread");
        }
        if ctx.ui.active.as_ref() == Some(&blip.id) {
            classes.push("active");
        }
        if ctx.ui.expanded_bodies.contains(&blip.id) {
            classes.push("expanded");
        }
        if blip.is_inline() {
            classes.push("inline");
        }

        let mut content = Element::new("div").with_attr("class", "blip-content");
        content.children = Fragment::parse(&mounted.html).nodes;
        let mut element = Element::new("div")
            .with_attr("class", classes.join(" "))
            .with_attr(BLIP_ATTR, blip.id.as_str())
            .with_child(Node::Element(content));

        let replies: Vec<&Blip> = ctx.tree.list_children(&blip.id).collect();
        if !replies.is_empty() {
            if self.is_folded(blip) {
                element = element.with_child(Node::Element(
                    Element::new("div")
                        .with_attr("class", "blip-replies folded")
                        .with_attr("data-hidden-replies", replies.len().to_string()),
                ));
            } else {
                let mut list = Element::new("div").with_attr("class", "blip-replies");
                for reply in replies {
                    list.children.push(Node::Element(self.render_blip(ctx, reply, out)));
                }
                element = element.with_child(Node::Element(list));
            }
        }
        element
    }
}

#[async_trait]
impl RenderSurface for WaveView {
    fn find_blip(&self, blip_id: &BlipId) -> bool {
        self.render().visible.contains(blip_id)
    }

    fn find_marker(&self, blip_id: &BlipId) -> bool {
        self.render().markers.contains(blip_id)
    }

    fn is_inline(&self, blip_id: &BlipId) -> bool {
        self.tree.read().get(blip_id).is_some_and(Blip::is_inline)
    }

    fn is_ancestor(&self, ancestor: &BlipId, blip_id: &BlipId) -> bool {
        let tree = self.tree.read();
        let mut current = tree.parent(blip_id);
        while let Some(blip) = current {
            if &blip.id == ancestor {
                return true;
            }
            current = tree.parent(&blip.id);
        }
        false
    }

    fn scroll_into_view(&self, target: &ScrollTarget, options: ScrollOptions) {
        tracing::debug!("Scrolling to {:?}", target);
        self.scrolls.lock().push((target.clone(), options));
        self.mutations.fetch_add(1, Ordering::Relaxed);
    }

    async fn next_frame(&self) {
        tokio::time::sleep(self.frame).await;
        self.pump();
    }
}
