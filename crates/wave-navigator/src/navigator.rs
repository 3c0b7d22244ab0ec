//! Follow-the-Green
//!
//! Moves the reader to the next unread blip of the wave:
//! 1. Nothing unread: offer the next topic, or stay idle
//! 2. Restore previously visited blips, keeping inline ancestors of the
//!    target expanded
//! 3. Find the target, expanding its inline marker if it is collapsed
//! 4. Scroll to it, activate it and mark it read
//!
//! The navigator never retries; failures come back in the outcome and the
//! user invokes it again.

use crate::error::NavigatorError;
use crate::state::{validate_transition, NavState};
use crate::surface::{RenderSurface, ScrollOptions, ScrollTarget};
use crate::topics::NextTopicSource;
use parking_lot::Mutex;
use std::sync::Arc;
use wave_bus::{Signal, SignalBus};
use wave_model::{BlipId, ClientConfig, WaveId};
use wave_unread::{MarkOutcome, UnreadError, UnreadStore};

/// Default bound on frames to wait for an expanded child to mount
pub const DEFAULT_MAX_FRAMES: u32 = 30;

/// Why a navigation stopped before reaching its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbortReason {
    /// Target is neither rendered nor behind an inline marker
    MarkerMissing,
    /// Expanded child did not mount within the frame bound
    MountTimeout,
}

/// Result of one invocation
#[derive(Debug)]
pub enum FollowOutcome {
    /// Nothing unread here and no other topic to offer
    Idle,
    /// Nothing unread here; this topic has unread blips
    NextTopic(WaveId),
    /// Another navigation is in progress
    Busy,
    /// Target could not be reached
    Aborted {
        /// Target blip
        blip_id: BlipId,
        /// What went wrong
        reason: AbortReason,
    },
    /// Target shown and activated
    Navigated {
        /// Target blip
        blip_id: BlipId,
        /// Whether it is anchored inline in its parent
        was_inline: bool,
        /// Result of marking it read
        mark: Result<MarkOutcome, UnreadError>,
    },
}

impl FollowOutcome {
    /// Target of the invocation, if one was chosen
    #[must_use]
    pub fn target(&self) -> Option<&BlipId> {
        match self {
            Self::Aborted { blip_id, .. } | Self::Navigated { blip_id, .. } => Some(blip_id),
            Self::Idle | Self::NextTopic(_) | Self::Busy => None,
        }
    }

    /// Whether the target was reached and marked read
    #[must_use]
    pub fn is_marked(&self) -> bool {
        matches!(
            self,
            Self::Navigated {
                mark: Ok(MarkOutcome::Marked),
                ..
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Visited {
    blip_id: BlipId,
    was_inline: bool,
}

/// Returns the navigator to `Idle` when dropped, on every exit path
struct NavigationGuard<'a> {
    state: &'a Mutex<NavState>,
}

impl Drop for NavigationGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if validate_transition(*state, NavState::Idle).is_ok() {
            *state = NavState::Idle;
        }
    }
}

enum Start<'a> {
    Busy,
    NothingUnread,
    Target(BlipId, NavigationGuard<'a>),
}

/// Follow-the-Green navigator for one wave view
pub struct FollowTheGreen {
    store: Arc<UnreadStore>,
    surface: Arc<dyn RenderSurface>,
    bus: SignalBus,
    topics: Option<Arc<dyn NextTopicSource>>,
    max_frames: u32,
    state: Mutex<NavState>,
    // visited blips still expanded, oldest first
    trail: Mutex<Vec<Visited>>,
}

impl std::fmt::Debug for FollowTheGreen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FollowTheGreen")
            .field("wave_id", self.store.wave_id())
            .field("state", &self.state())
            .field("max_frames", &self.max_frames)
            .finish_non_exhaustive()
    }
}

impl FollowTheGreen {
    /// Navigator over `store`, driving `surface` through `bus`
    #[must_use]
    pub fn new(store: Arc<UnreadStore>, surface: Arc<dyn RenderSurface>, bus: SignalBus) -> Self {
        Self {
            store,
            surface,
            bus,
            topics: None,
            max_frames: DEFAULT_MAX_FRAMES,
            state: Mutex::new(NavState::Idle),
            trail: Mutex::new(Vec::new()),
        }
    }

    /// Offer the next topic with unread blips when this wave is read
    #[inline]
    #[must_use]
    pub fn with_topics(mut self, topics: Arc<dyn NextTopicSource>) -> Self {
        self.topics = Some(topics);
        self
    }

    /// Frames to wait for an expanded inline child to mount
    #[inline]
    #[must_use]
    pub fn with_max_frames(mut self, frames: u32) -> Self {
        self.max_frames = frames.max(1);
        self
    }

    /// Take the frame bound from configuration
    #[inline]
    #[must_use]
    pub fn with_config(self, config: &ClientConfig) -> Self {
        self.with_max_frames(config.max_expand_frames)
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> NavState {
        *self.state.lock()
    }

    /// Blip visited by the last successful navigation
    #[must_use]
    pub fn previous(&self) -> Option<(BlipId, bool)> {
        self.trail
            .lock()
            .last()
            .map(|v| (v.blip_id.clone(), v.was_inline))
    }

    /// Navigate to the next unread blip
    ///
    /// # Errors
    /// - `NavigatorError::Unread` if looking up the next topic failed
    /// - `NavigatorError::IllegalTransition` if the state machine is corrupt
    pub async fn follow(&self) -> Result<FollowOutcome, NavigatorError> {
        let (target, _guard) = match self.begin()? {
            Start::Busy => {
                tracing::debug!("Follow-the-Green already running for {}", self.store.wave_id());
                return Ok(FollowOutcome::Busy);
            }
            Start::NothingUnread => return self.nothing_unread().await,
            Start::Target(target, guard) => (target, guard),
        };
        tracing::debug!("Following the green to {}", target);

        self.restore_previous(&target);

        let mut was_inline = self.surface.is_inline(&target);
        if !self.surface.find_blip(&target) {
            if let Err(reason) = self.expand(&target).await {
                tracing::info!("Follow-the-Green aborted at {}: {:?}", target, reason);
                return Ok(FollowOutcome::Aborted {
                    blip_id: target,
                    reason,
                });
            }
            was_inline = true;
        }

        self.trail.lock().push(Visited {
            blip_id: target.clone(),
            was_inline,
        });
        self.surface
            .scroll_into_view(&ScrollTarget::Blip(target.clone()), ScrollOptions::CENTERED);
        self.bus.publish(Signal::ActivateBlip {
            blip_id: target.clone(),
        });

        let mark = self.store.mark_blip_read(&target).await;
        match &mark {
            Ok(MarkOutcome::Marked) => {
                self.announce().await;
                tracing::info!("Follow-the-Green reached {} in {}", target, self.store.wave_id());
            }
            Ok(MarkOutcome::NotUnread) => {
                tracing::info!("Follow-the-Green reached {}, already read", target);
            }
            Err(e) => {
                tracing::warn!("Follow-the-Green reached {} but marking failed: {}", target, e);
            }
        }
        Ok(FollowOutcome::Navigated {
            blip_id: target,
            was_inline,
            mark,
        })
    }

    fn begin(&self) -> Result<Start<'_>, NavigatorError> {
        let mut state = self.state.lock();
        if *state == NavState::Navigating {
            return Ok(Start::Busy);
        }
        let Some(target) = self.store.first_unread() else {
            return Ok(Start::NothingUnread);
        };
        validate_transition(*state, NavState::Navigating)?;
        *state = NavState::Navigating;
        Ok(Start::Target(target, NavigationGuard { state: &self.state }))
    }

    async fn nothing_unread(&self) -> Result<FollowOutcome, NavigatorError> {
        let Some(topics) = &self.topics else {
            return Ok(FollowOutcome::Idle);
        };
        match topics.next_with_unread(self.store.wave_id()).await? {
            Some(next) => {
                tracing::info!("No unread in {}, next topic {}", self.store.wave_id(), next);
                Ok(FollowOutcome::NextTopic(next))
            }
            None => Ok(FollowOutcome::Idle),
        }
    }

    /// Deactivate the last visited blip and collapse the visited blips
    ///
    /// An inline blip enclosing `target` stays expanded and on the trail:
    /// collapsing it would hide the target's own marker.
    fn restore_previous(&self, target: &BlipId) {
        let visited = std::mem::take(&mut *self.trail.lock());
        if let Some(last) = visited.last() {
            self.bus.publish(Signal::DeactivateBlip {
                blip_id: last.blip_id.clone(),
            });
        }
        let mut kept = Vec::new();
        for entry in visited.into_iter().rev() {
            if entry.was_inline && self.surface.is_ancestor(&entry.blip_id, target) {
                kept.push(entry);
                continue;
            }
            let collapse = if entry.was_inline {
                Signal::CollapseInlineBlip {
                    blip_id: entry.blip_id,
                }
            } else {
                Signal::CollapseBlip {
                    blip_id: entry.blip_id,
                }
            };
            self.bus.publish(collapse);
        }
        kept.reverse();
        *self.trail.lock() = kept;
    }

    /// Expand the target's inline marker and wait for the child to mount
    async fn expand(&self, target: &BlipId) -> Result<(), AbortReason> {
        if !self.surface.find_marker(target) {
            return Err(AbortReason::MarkerMissing);
        }
        self.surface
            .scroll_into_view(&ScrollTarget::Marker(target.clone()), ScrollOptions::NEAREST);
        self.bus.publish(Signal::ToggleInlineBlip {
            blip_id: target.clone(),
        });
        for frame in 1..=self.max_frames {
            self.surface.next_frame().await;
            if self.surface.find_blip(target) {
                tracing::debug!("Inline child {} mounted after {} frames", target, frame);
                return Ok(());
            }
        }
        Err(AbortReason::MountTimeout)
    }

    async fn announce(&self) {
        if let Some(topics) = &self.topics {
            if let Err(e) = topics.wave_changed(self.store.wave_id()).await {
                tracing::warn!("Failed to refresh topic counts: {}", e);
            }
        }
        self.bus.publish(Signal::WaveUnreadChanged {
            wave_id: self.store.wave_id().clone(),
            origin: self.store.view_id(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use tokio::sync::Notify;
    use wave_test_utils::{create_flat_tree, setup_model, setup_store};

    /// Surface with fixed content that counts every call
    #[derive(Default)]
    struct ScriptedSurface {
        rendered: Mutex<HashSet<BlipId>>,
        markers: HashSet<BlipId>,
        inline: HashSet<BlipId>,
        mount_after: Option<u32>,
        frames: AtomicU64,
        calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedSurface {
        fn rendering(ids: &[&str]) -> Self {
            Self {
                rendered: Mutex::new(ids.iter().map(|s| BlipId::from(*s)).collect()),
                ..Self::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RenderSurface for ScriptedSurface {
        fn find_blip(&self, blip_id: &BlipId) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.rendered.lock().contains(blip_id)
        }

        fn find_marker(&self, blip_id: &BlipId) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.markers.contains(blip_id)
        }

        fn is_inline(&self, blip_id: &BlipId) -> bool {
            self.inline.contains(blip_id)
        }

        fn scroll_into_view(&self, _target: &ScrollTarget, _options: ScrollOptions) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }

        async fn next_frame(&self) {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let frame = self.frames.fetch_add(1, Ordering::SeqCst) + 1;
            if self.mount_after.is_some_and(|n| frame >= u64::from(n)) {
                let mut rendered = self.rendered.lock();
                rendered.extend(self.markers.iter().cloned());
            }
        }
    }

    async fn loaded_store(replies: usize) -> (Arc<wave_test_utils::InMemoryReadModel>, Arc<UnreadStore>) {
        let model = setup_model(create_flat_tree("w1", replies));
        let store = Arc::new(setup_store(&model, "w1"));
        store.refresh().await.unwrap();
        (model, store)
    }

    #[tokio::test]
    async fn idle_touches_nothing() {
        let (model, store) = loaded_store(0).await;
        store.force_clear();
        let calls_before = model.network_calls();
        let surface = Arc::new(ScriptedSurface::default());
        let bus = SignalBus::new();
        let navigator = FollowTheGreen::new(store, surface.clone(), bus.clone());

        assert!(matches!(navigator.follow().await.unwrap(), FollowOutcome::Idle));
        assert_eq!(surface.calls(), 0);
        assert_eq!(model.network_calls(), calls_before);
        assert_eq!(bus.published(), 0);
        assert_eq!(navigator.state(), NavState::Idle);
    }

    #[tokio::test]
    async fn navigates_to_rendered_target() {
        let (model, store) = loaded_store(1).await;
        let surface = Arc::new(ScriptedSurface::rendering(&["root", "r0"]));
        let bus = SignalBus::new();
        let mut signals = bus.subscribe();
        let navigator = FollowTheGreen::new(store.clone(), surface, bus);

        let outcome = navigator.follow().await.unwrap();
        assert!(outcome.is_marked());
        assert_eq!(outcome.target().map(BlipId::as_str), Some("root"));
        assert_eq!(store.unread_ids(), vec![BlipId::from("r0")]);
        assert_eq!(model.marks(), 1);

        assert_eq!(
            signals.try_recv().unwrap(),
            Some(Signal::ActivateBlip { blip_id: "root".into() })
        );
        assert!(matches!(signals.try_recv().unwrap(), Some(Signal::WaveUnreadChanged { .. })));
        assert_eq!(navigator.previous(), Some(("root".into(), false)));
    }

    #[tokio::test]
    async fn second_run_restores_previous() {
        let (_model, store) = loaded_store(1).await;
        let surface = Arc::new(ScriptedSurface::rendering(&["root", "r0"]));
        let bus = SignalBus::new();
        let navigator = FollowTheGreen::new(store, surface, bus.clone());

        navigator.follow().await.unwrap();
        let mut signals = bus.subscribe();
        navigator.follow().await.unwrap();

        let seen: Vec<Signal> = std::iter::from_fn(|| signals.try_recv().unwrap()).collect();
        assert_eq!(seen[0], Signal::DeactivateBlip { blip_id: "root".into() });
        assert_eq!(seen[1], Signal::CollapseBlip { blip_id: "root".into() });
        assert_eq!(seen[2], Signal::ActivateBlip { blip_id: "r0".into() });
    }

    #[tokio::test]
    async fn missing_marker_aborts_silently() {
        let (model, store) = loaded_store(0).await;
        let surface = Arc::new(ScriptedSurface::default());
        let navigator = FollowTheGreen::new(store.clone(), surface, SignalBus::new());

        let outcome = navigator.follow().await.unwrap();
        assert!(matches!(
            outcome,
            FollowOutcome::Aborted {
                reason: AbortReason::MarkerMissing,
                ..
            }
        ));
        assert_eq!(model.marks(), 0);
        assert_eq!(store.unread_ids().len(), 1);
        assert_eq!(navigator.state(), NavState::Idle);
        assert_eq!(navigator.previous(), None);
    }

    #[tokio::test]
    async fn collapsed_child_is_expanded_and_polled() {
        let (_model, store) = loaded_store(0).await;
        let surface = Arc::new(ScriptedSurface {
            markers: ["root".into()].into_iter().collect(),
            mount_after: Some(3),
            ..ScriptedSurface::default()
        });
        let bus = SignalBus::new();
        let mut signals = bus.subscribe();
        let navigator = FollowTheGreen::new(store, surface.clone(), bus);

        let outcome = navigator.follow().await.unwrap();
        assert!(matches!(outcome, FollowOutcome::Navigated { was_inline: true, .. }));
        assert_eq!(surface.frames.load(Ordering::SeqCst), 3);
        assert_eq!(
            signals.try_recv().unwrap(),
            Some(Signal::ToggleInlineBlip { blip_id: "root".into() })
        );
    }

    #[tokio::test]
    async fn frame_bound_is_respected() {
        let (_model, store) = loaded_store(0).await;
        let surface = Arc::new(ScriptedSurface {
            markers: ["root".into()].into_iter().collect(),
            ..ScriptedSurface::default()
        });
        let navigator = FollowTheGreen::new(store, surface.clone(), SignalBus::new()).with_max_frames(5);

        let outcome = navigator.follow().await.unwrap();
        assert!(matches!(
            outcome,
            FollowOutcome::Aborted {
                reason: AbortReason::MountTimeout,
                ..
            }
        ));
        assert_eq!(surface.frames.load(Ordering::SeqCst), 5);
        assert_eq!(navigator.state(), NavState::Idle);
    }

    #[tokio::test]
    async fn concurrent_invocation_is_busy() {
        let (model, store) = loaded_store(0).await;
        let gate = Arc::new(Notify::new());
        let surface = Arc::new(ScriptedSurface {
            markers: ["root".into()].into_iter().collect(),
            mount_after: Some(1),
            gate: Some(gate.clone()),
            ..ScriptedSurface::default()
        });
        let navigator = Arc::new(FollowTheGreen::new(store, surface, SignalBus::new()));

        let first = tokio::spawn({
            let navigator = Arc::clone(&navigator);
            async move { navigator.follow().await }
        });
        while navigator.state() != NavState::Navigating {
            tokio::task::yield_now().await;
        }
        let marks_before = model.marks();
        assert!(matches!(navigator.follow().await.unwrap(), FollowOutcome::Busy));
        assert_eq!(model.marks(), marks_before);

        gate.notify_one();
        assert!(first.await.unwrap().unwrap().is_marked());
        assert_eq!(navigator.state(), NavState::Idle);
    }

    #[tokio::test]
    async fn failed_mark_is_reported_not_retried() {
        let (model, store) = loaded_store(0).await;
        model.fail_marks(true);
        let surface = Arc::new(ScriptedSurface::rendering(&["root"]));
        let navigator = FollowTheGreen::new(store.clone(), surface, SignalBus::new());

        let outcome = navigator.follow().await.unwrap();
        assert!(matches!(outcome, FollowOutcome::Navigated { mark: Err(_), .. }));
        assert_eq!(model.marks(), 1);
        assert!(store.is_unread(&"root".into()));
    }
}
