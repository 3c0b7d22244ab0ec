//! Unread state store
//!
//! One store per (wave, user). Local marks are applied optimistically and
//! reconciled with the server:
//! - Single reads roll back exactly on failure and notify the user
//! - Batch reads resync with a full refresh on failure
//! - Push events from other users schedule one debounced refresh per burst
//! - Deletions are applied locally without a network round trip
//!
//! Every content transition bumps `version`. A refresh whose response
//! arrives after a local transition, or after a newer refresh was applied,
//! is discarded.

use crate::client::ReadModel;
use crate::debounce::{Debouncer, DEFAULT_WINDOW};
use crate::error::UnreadError;
use crate::notify::{Notifier, NoticeLevel, TracingNotifier, BATCH_PERSIST_FAILED, LOAD_FAILED, READ_SYNC_FAILED};
use crate::state::{UnreadState, Versioned};
use crate::transaction::{Revert, Transaction};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use wave_bus::{BusError, Signal, SignalBus, Topic, ViewId};
use wave_model::{BlipEvent, BlipId, ClientConfig, UserId, WaveEvent, WaveId};

/// Result of a single mark
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// Blip was unread and the server accepted the mark
    Marked,
    /// Blip was not unread; nothing was sent
    NotUnread,
}

/// Result of a refresh that reached the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refreshed {
    /// Response replaced the state
    Applied,
    /// Response was overtaken by a newer transition and dropped
    Stale,
}

/// What a push event did to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventEffect {
    /// Not relevant to this store
    Ignored,
    /// A deleted unread blip was removed locally
    Removed,
    /// A debounced refresh was (re)scheduled
    RefreshScheduled,
}

/// Configures and builds an [`UnreadStore`]
pub struct UnreadStoreBuilder {
    wave_id: WaveId,
    model: Arc<dyn ReadModel>,
    user_id: Option<UserId>,
    view_id: ViewId,
    notifier: Arc<dyn Notifier>,
    debounce: Duration,
}

impl UnreadStoreBuilder {
    /// Events caused by this user are not refetched
    #[inline]
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<UserId>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Identity of the view owning the store
    #[inline]
    #[must_use]
    pub fn with_view_id(mut self, view_id: ViewId) -> Self {
        self.view_id = view_id;
        self
    }

    /// Sink for rollback and resync notices
    #[inline]
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Debounce window for push-driven refreshes
    #[inline]
    #[must_use]
    pub fn with_debounce(mut self, window: Duration) -> Self {
        self.debounce = window;
        self
    }

    /// Take user and debounce window from configuration
    #[must_use]
    pub fn with_config(mut self, config: &ClientConfig) -> Self {
        if let Some(user) = &config.user_id {
            self.user_id = Some(user.clone());
        }
        self.debounce = config.debounce();
        self
    }

    /// Build the store with empty state
    #[must_use]
    pub fn build(self) -> UnreadStore {
        let state = UnreadState::new(self.wave_id.clone());
        let (tx, _) = watch::channel(state.clone());
        UnreadStore {
            inner: Arc::new(Inner {
                wave_id: self.wave_id,
                user_id: self.user_id,
                view_id: self.view_id,
                model: self.model,
                notifier: self.notifier,
                cell: Mutex::new(Cell {
                    state,
                    in_flight: 0,
                    next_seq: 0,
                    applied_seq: 0,
                    local_epoch: 0,
                    cleared_at: None,
                }),
                tx,
                debouncer: Debouncer::new(self.debounce),
                shut_down: AtomicBool::new(false),
            }),
            listeners: Mutex::new(Vec::new()),
        }
    }
}

struct Cell {
    state: UnreadState,
    in_flight: u32,
    next_seq: u64,
    applied_seq: u64,
    // bumped by every local transition; refreshes issued before it are stale
    local_epoch: u64,
    cleared_at: Option<Instant>,
}

struct Inner {
    wave_id: WaveId,
    user_id: Option<UserId>,
    view_id: ViewId,
    model: Arc<dyn ReadModel>,
    notifier: Arc<dyn Notifier>,
    cell: Mutex<Cell>,
    tx: watch::Sender<UnreadState>,
    debouncer: Debouncer,
    shut_down: AtomicBool,
}

impl Inner {
    /// Run `f` under the lock and publish the resulting state if it changed
    fn transition<R>(&self, f: impl FnOnce(&mut Cell) -> R) -> R {
        let mut cell = self.cell.lock();
        let result = f(&mut cell);
        self.tx.send_if_modified(|current| {
            if *current == cell.state {
                false
            } else {
                current.clone_from(&cell.state);
                true
            }
        });
        result
    }

    fn ensure_running(&self) -> Result<(), UnreadError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(UnreadError::ShutDown(self.wave_id.clone()));
        }
        Ok(())
    }

    fn is_self(&self, user_id: Option<&UserId>) -> bool {
        matches!((user_id, &self.user_id), (Some(a), Some(b)) if a == b)
    }

    async fn refresh(&self) -> Result<Refreshed, UnreadError> {
        self.ensure_running()?;
        let (seq, epoch) = self.transition(|cell| {
            cell.in_flight += 1;
            cell.next_seq += 1;
            cell.state.loading = true;
            (cell.next_seq, cell.local_epoch)
        });
        tracing::debug!("Refreshing unread state of {} (request {})", self.wave_id, seq);

        let result = self.model.fetch_unread(&self.wave_id).await;

        let outcome = self.transition(|cell| {
            cell.in_flight = cell.in_flight.saturating_sub(1);
            cell.state.loading = cell.in_flight > 0;
            if cell.local_epoch != epoch || seq < cell.applied_seq {
                return Refreshed::Stale;
            }
            cell.applied_seq = seq;
            match &result {
                Ok(response) => {
                    cell.state.snapshot = response.clone().into();
                    cell.state.error = None;
                }
                Err(_) => cell.state.error = Some(LOAD_FAILED.to_string()),
            }
            cell.state.bump();
            Refreshed::Applied
        });

        match result {
            Ok(_) => {
                if outcome == Refreshed::Stale {
                    tracing::debug!("Discarding stale unread response {} for {}", seq, self.wave_id);
                }
                Ok(outcome)
            }
            Err(e) => {
                tracing::warn!("Failed to load unread state of {}: {}", self.wave_id, e);
                Err(e)
            }
        }
    }

    async fn mark_blip_read(&self, blip_id: &BlipId) -> Result<MarkOutcome, UnreadError> {
        self.ensure_running()?;
        let pending = self.transition(|cell| {
            if !cell.state.is_unread(blip_id) {
                return None;
            }
            let mut tx = Transaction::snapshot(&cell.state);
            tx.apply(&mut cell.state, |s| {
                s.snapshot.remove(blip_id);
                s.snapshot.read_count = s.snapshot.total.min(s.snapshot.read_count + 1);
            });
            cell.local_epoch += 1;
            Some(tx)
        });
        let Some(tx) = pending else {
            tracing::debug!("Blip {} already read, skipping", blip_id);
            return Ok(MarkOutcome::NotUnread);
        };

        match self.model.mark_read(&self.wave_id, blip_id).await {
            Ok(()) => {
                tx.commit();
                tracing::debug!("Marked {} read in {}", blip_id, self.wave_id);
                Ok(MarkOutcome::Marked)
            }
            Err(e) => {
                let revert = self.transition(|cell| {
                    let revert = tx.revert(&mut cell.state);
                    if revert == Revert::Restored {
                        cell.local_epoch += 1;
                        cell.state.loading = cell.in_flight > 0;
                    }
                    revert
                });
                tracing::warn!("Failed to mark {} read, rolled back ({:?}): {}", blip_id, revert, e);
                self.notifier.notify(NoticeLevel::Error, READ_SYNC_FAILED);
                if revert == Revert::Superseded {
                    if let Err(refresh_err) = self.refresh().await {
                        tracing::warn!("Resync after failed mark also failed: {}", refresh_err);
                    }
                }
                Err(e)
            }
        }
    }

    async fn mark_blips_read(&self, blip_ids: &[BlipId]) -> Result<usize, UnreadError> {
        self.ensure_running()?;
        let mut seen = HashSet::new();
        let requested: Vec<BlipId> = blip_ids.iter().filter(|id| seen.insert(*id)).cloned().collect();

        let removed = self.transition(|cell| {
            let matching: Vec<&BlipId> = requested.iter().filter(|id| cell.state.is_unread(id)).collect();
            if matching.is_empty() {
                return 0;
            }
            let snapshot = &mut cell.state.snapshot;
            for id in &matching {
                snapshot.remove(id);
            }
            snapshot.read_count = snapshot.total.min(snapshot.read_count + matching.len() as u64);
            cell.state.bump();
            cell.local_epoch += 1;
            matching.len()
        });
        if removed == 0 {
            return Ok(0);
        }

        match self.model.mark_many_read(&self.wave_id, &requested).await {
            Ok(()) => {
                tracing::debug!("Marked {} blips read in {}", removed, self.wave_id);
                Ok(removed)
            }
            Err(e) => {
                tracing::warn!("Failed to persist {} reads in {}: {}", removed, self.wave_id, e);
                self.notifier.notify(NoticeLevel::Error, BATCH_PERSIST_FAILED);
                if let Err(refresh_err) = self.refresh().await {
                    tracing::warn!("Resync after failed batch also failed: {}", refresh_err);
                }
                Err(e)
            }
        }
    }

    fn force_clear(&self) {
        self.transition(|cell| {
            let snapshot = &mut cell.state.snapshot;
            snapshot.unread_ids.clear();
            snapshot.read_count = snapshot.total;
            cell.state.bump();
            cell.local_epoch += 1;
            cell.cleared_at = Some(Instant::now());
        });
        tracing::debug!("Cleared unread state of {}", self.wave_id);
    }

    fn cleared_within(&self, window: Duration) -> bool {
        self.cell.lock().cleared_at.is_some_and(|at| at.elapsed() < window)
    }

    fn remove_deleted(&self, blip_id: &BlipId) -> bool {
        self.transition(|cell| {
            if !cell.state.snapshot.remove(blip_id) {
                return false;
            }
            cell.state.snapshot.total = cell.state.snapshot.total.saturating_sub(1);
            cell.state.bump();
            cell.local_epoch += 1;
            true
        })
    }
}

fn schedule_refresh(inner: &Arc<Inner>) {
    let weak = Arc::downgrade(inner);
    inner.debouncer.schedule(move || async move {
        if let Some(inner) = weak.upgrade() {
            // failures already land in `error`
            let _ = inner.refresh().await;
        }
    });
}

fn handle_event(inner: &Arc<Inner>, event: &WaveEvent) -> EventEffect {
    if event.wave_id() != &inner.wave_id || inner.shut_down.load(Ordering::SeqCst) {
        return EventEffect::Ignored;
    }
    match event {
        WaveEvent::Blip(BlipEvent { blip_id, .. }) if event.is_deletion() => {
            if inner.remove_deleted(blip_id) {
                tracing::debug!("Deleted blip {} dropped from unread", blip_id);
                EventEffect::Removed
            } else {
                EventEffect::Ignored
            }
        }
        // our own session already applied it optimistically
        _ if inner.is_self(event.user_id()) => EventEffect::Ignored,
        _ => {
            schedule_refresh(inner);
            EventEffect::RefreshScheduled
        }
    }
}

fn handle_signal(inner: &Arc<Inner>, signal: &Signal) -> EventEffect {
    match signal {
        Signal::WaveUnreadChanged { wave_id, origin }
            if wave_id == &inner.wave_id && *origin != inner.view_id && !inner.shut_down.load(Ordering::SeqCst) =>
        {
            schedule_refresh(inner);
            EventEffect::RefreshScheduled
        }
        _ => EventEffect::Ignored,
    }
}

/// Per-wave unread state with optimistic marks
pub struct UnreadStore {
    inner: Arc<Inner>,
    listeners: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for UnreadStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnreadStore")
            .field("wave_id", &self.inner.wave_id)
            .field("view_id", &self.inner.view_id)
            .field("version", &self.version())
            .finish_non_exhaustive()
    }
}

impl UnreadStore {
    /// Start building a store for `wave_id` backed by `model`
    #[must_use]
    pub fn builder(wave_id: impl Into<WaveId>, model: Arc<dyn ReadModel>) -> UnreadStoreBuilder {
        UnreadStoreBuilder {
            wave_id: wave_id.into(),
            model,
            user_id: None,
            view_id: ViewId::new(),
            notifier: Arc::new(TracingNotifier),
            debounce: DEFAULT_WINDOW,
        }
    }

    /// Wave this store tracks
    #[inline]
    #[must_use]
    pub fn wave_id(&self) -> &WaveId {
        &self.inner.wave_id
    }

    /// View owning this store
    #[inline]
    #[must_use]
    pub fn view_id(&self) -> ViewId {
        self.inner.view_id
    }

    /// Copy of the current state
    #[must_use]
    pub fn state(&self) -> UnreadState {
        self.inner.cell.lock().state.clone()
    }

    /// Unread ids in traversal order
    #[must_use]
    pub fn unread_ids(&self) -> Vec<BlipId> {
        self.inner.cell.lock().state.unread_ids()
    }

    /// Unread ids for membership tests
    #[must_use]
    pub fn unread_set(&self) -> HashSet<BlipId> {
        self.inner.cell.lock().state.unread_set()
    }

    /// First unread blip in traversal order
    #[must_use]
    pub fn first_unread(&self) -> Option<BlipId> {
        self.inner.cell.lock().state.snapshot.first().cloned()
    }

    /// Whether a blip is unread
    #[must_use]
    pub fn is_unread(&self, blip_id: &BlipId) -> bool {
        self.inner.cell.lock().state.is_unread(blip_id)
    }

    /// Live blips in the wave
    #[must_use]
    pub fn total(&self) -> u64 {
        self.inner.cell.lock().state.total()
    }

    /// Blips the user has read
    #[must_use]
    pub fn read_count(&self) -> u64 {
        self.inner.cell.lock().state.read_count()
    }

    /// Whether a refresh is in flight
    #[must_use]
    pub fn loading(&self) -> bool {
        self.inner.cell.lock().state.loading
    }

    /// Message of the last failed refresh
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.inner.cell.lock().state.error.clone()
    }

    /// Monotonic transition counter
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.cell.lock().state.version
    }

    /// Observe every published state
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<UnreadState> {
        self.inner.tx.subscribe()
    }

    /// Fetch the state from the server
    ///
    /// On failure the previous ids are kept and `error` is set.
    ///
    /// # Errors
    /// - Any read-model error
    /// - `UnreadError::ShutDown` after [`UnreadStore::shutdown`]
    pub async fn refresh(&self) -> Result<Refreshed, UnreadError> {
        self.inner.refresh().await
    }

    /// Mark one blip read, optimistically
    ///
    /// A blip that is not unread is a no-op with no network call. On failure
    /// the state before the mark is restored and the user is notified.
    ///
    /// # Errors
    /// The read-model error that caused the rollback.
    pub async fn mark_blip_read(&self, blip_id: &BlipId) -> Result<MarkOutcome, UnreadError> {
        self.inner.mark_blip_read(blip_id).await
    }

    /// Mark several blips read in one optimistic transition
    ///
    /// Returns how many unread blips were cleared. Nothing unread among
    /// `blip_ids` means no network call. On failure the state is resynced with
    /// a full refresh instead of rolled back.
    ///
    /// # Errors
    /// The read-model error of the batch write.
    pub async fn mark_blips_read(&self, blip_ids: &[BlipId]) -> Result<usize, UnreadError> {
        self.inner.mark_blips_read(blip_ids).await
    }

    /// Clear every unread blip locally and remember when
    pub fn force_clear(&self) {
        self.inner.force_clear();
    }

    /// Refresh unless [`UnreadStore::force_clear`] ran within `window`
    ///
    /// Returns `None` when the refresh was skipped.
    ///
    /// # Errors
    /// Same as [`UnreadStore::refresh`].
    pub async fn refresh_unless_cleared_within(&self, window: Duration) -> Result<Option<Refreshed>, UnreadError> {
        if self.inner.cleared_within(window) {
            tracing::debug!("Skipping refresh of {}, cleared recently", self.inner.wave_id);
            return Ok(None);
        }
        self.inner.refresh().await.map(Some)
    }

    /// Apply one push event
    ///
    /// Must be called inside a tokio runtime; refreshes run on a timer.
    pub fn handle_event(&self, event: &WaveEvent) -> EventEffect {
        handle_event(&self.inner, event)
    }

    /// Apply one bus signal
    pub fn handle_signal(&self, signal: &Signal) -> EventEffect {
        handle_signal(&self.inner, signal)
    }

    /// Whether a debounced refresh is waiting
    #[must_use]
    pub fn refresh_pending(&self) -> bool {
        self.inner.debouncer.is_pending()
    }

    /// Consume push events until the channel closes or the store shuts down
    pub fn attach_events(&self, mut events: broadcast::Receiver<WaveEvent>) {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            loop {
                let received = events.recv().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                match received {
                    Ok(event) => {
                        handle_event(&inner, &event);
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("Missed {} events for {}, resyncing", n, inner.wave_id);
                        schedule_refresh(&inner);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        self.listeners.lock().push(handle);
    }

    /// Reconcile with other views of the same wave through `bus`
    pub fn attach_bus(&self, bus: &SignalBus) {
        let mut subscription = bus.subscribe_to([Topic::WaveUnreadChanged]);
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            loop {
                let received = subscription.recv().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                match received {
                    Ok(signal) => {
                        handle_signal(&inner, &signal);
                    }
                    Err(BusError::Lagged(n)) => {
                        tracing::warn!("Missed {} signals for {}, resyncing", n, inner.wave_id);
                        schedule_refresh(&inner);
                    }
                    Err(BusError::Closed) => break,
                }
            }
        });
        self.listeners.lock().push(handle);
    }

    /// Stop listeners and timers; later operations fail with `ShutDown`
    pub fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.debouncer.cancel();
        for handle in self.listeners.lock().drain(..) {
            handle.abort();
        }
        tracing::debug!("Unread store for {} shut down", self.inner.wave_id);
    }

    /// Whether [`UnreadStore::shutdown`] ran
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }
}

impl Drop for UnreadStore {
    fn drop(&mut self) {
        self.shutdown();
    }
}
