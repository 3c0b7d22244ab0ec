//! Testing utilities for the greenwave workspace
//!
//! Shared fixtures and an in-memory read model with server semantics.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use wave_model::{Blip, BlipId, UnreadResponse, WaveId, WaveTree, WaveUnreadCount};
use wave_unread::{count_request_ids, ReadModel, UnreadError, UnreadStore};

#[derive(Default)]
struct ServerState {
    clock: u64,
    waves: HashMap<WaveId, WaveTree>,
    updated_at: HashMap<(WaveId, BlipId), u64>,
    read_at: HashMap<(WaveId, BlipId), u64>,
}

impl ServerState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn is_unread(&self, wave_id: &WaveId, blip_id: &BlipId) -> bool {
        let key = (wave_id.clone(), blip_id.clone());
        match (self.updated_at.get(&key), self.read_at.get(&key)) {
            (Some(updated), Some(read)) => updated > read,
            (_, None) => true,
            (None, Some(_)) => false,
        }
    }

    fn counts(&self, wave_id: &WaveId) -> Option<(Vec<BlipId>, u64)> {
        let tree = self.waves.get(wave_id)?;
        let order = tree.document_order();
        let total = order.len() as u64;
        let unread = order.into_iter().filter(|id| self.is_unread(wave_id, id)).collect();
        Some((unread, total))
    }
}

/// Read model for one user, answering like the server does
///
/// A blip is unread until read, and again after every edit made later than
/// the read.
#[derive(Default)]
pub struct InMemoryReadModel {
    state: Mutex<ServerState>,
    fetches: AtomicUsize,
    marks: AtomicUsize,
    batch_marks: AtomicUsize,
    count_calls: AtomicUsize,
    fail_fetches: AtomicBool,
    fail_marks: AtomicBool,
}

impl InMemoryReadModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_wave(self, tree: WaveTree) -> Self {
        self.add_wave(tree);
        self
    }

    /// Register a wave; every live blip starts unread
    pub fn add_wave(&self, tree: WaveTree) {
        let mut state = self.state.lock();
        let at = state.tick();
        let wave_id = tree.wave_id().clone();
        for id in tree.live_ids() {
            state.updated_at.insert((wave_id.clone(), id.clone()), at);
        }
        state.waves.insert(wave_id, tree);
    }

    /// Edit a blip, making it unread again
    pub fn touch(&self, wave_id: &WaveId, blip_id: &BlipId) {
        let mut state = self.state.lock();
        let at = state.tick();
        state.updated_at.insert((wave_id.clone(), blip_id.clone()), at);
    }

    /// Add or replace a blip; it is unread
    pub fn upsert_blip(&self, blip: Blip) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let at = state.tick();
        let key = (blip.wave_id.clone(), blip.id.clone());
        if let Some(tree) = state.waves.get_mut(&blip.wave_id) {
            tree.upsert(blip).unwrap();
            state.updated_at.insert(key, at);
        }
    }

    pub fn delete_blip(&self, wave_id: &WaveId, blip_id: &BlipId) -> bool {
        self.state
            .lock()
            .waves
            .get_mut(wave_id)
            .is_some_and(|tree| tree.soft_delete(blip_id))
    }

    /// Mark read without counting a network call
    pub fn mark_read_directly(&self, wave_id: &WaveId, blip_id: &BlipId) {
        let mut state = self.state.lock();
        let at = state.tick();
        state.read_at.insert((wave_id.clone(), blip_id.clone()), at);
    }

    pub fn tree(&self, wave_id: &WaveId) -> Option<WaveTree> {
        self.state.lock().waves.get(wave_id).cloned()
    }

    pub fn unread_in(&self, wave_id: &WaveId) -> Vec<BlipId> {
        self.state.lock().counts(wave_id).map(|(ids, _)| ids).unwrap_or_default()
    }

    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    pub fn fail_marks(&self, fail: bool) {
        self.fail_marks.store(fail, Ordering::SeqCst);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn marks(&self) -> usize {
        self.marks.load(Ordering::SeqCst)
    }

    pub fn batch_marks(&self) -> usize {
        self.batch_marks.load(Ordering::SeqCst)
    }

    pub fn count_calls(&self) -> usize {
        self.count_calls.load(Ordering::SeqCst)
    }

    /// Every call that would have hit the network
    pub fn network_calls(&self) -> usize {
        self.fetches() + self.marks() + self.batch_marks() + self.count_calls()
    }

    fn mark(&self, wave_id: &WaveId, blip_id: &BlipId) -> Result<(), UnreadError> {
        let mut state = self.state.lock();
        let known = state
            .waves
            .get(wave_id)
            .is_some_and(|tree| tree.get(blip_id).is_some());
        if !known {
            return Err(not_found());
        }
        let at = state.tick();
        state.read_at.insert((wave_id.clone(), blip_id.clone()), at);
        Ok(())
    }
}

fn not_found() -> UnreadError {
    UnreadError::Status {
        status: 404,
        body: "Not found".into(),
    }
}

fn offline() -> UnreadError {
    UnreadError::Transport("connection refused".into())
}

#[async_trait]
impl ReadModel for InMemoryReadModel {
    async fn fetch_unread(&self, wave_id: &WaveId) -> Result<UnreadResponse, UnreadError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(offline());
        }
        let (unread, total) = self.state.lock().counts(wave_id).ok_or_else(not_found)?;
        let read = total - unread.len() as u64;
        Ok(UnreadResponse { unread, total, read })
    }

    async fn mark_read(&self, wave_id: &WaveId, blip_id: &BlipId) -> Result<(), UnreadError> {
        self.marks.fetch_add(1, Ordering::SeqCst);
        if self.fail_marks.load(Ordering::SeqCst) {
            return Err(offline());
        }
        self.mark(wave_id, blip_id)
    }

    async fn mark_many_read(&self, wave_id: &WaveId, blip_ids: &[BlipId]) -> Result<(), UnreadError> {
        self.batch_marks.fetch_add(1, Ordering::SeqCst);
        if self.fail_marks.load(Ordering::SeqCst) {
            return Err(offline());
        }
        for id in blip_ids {
            // unknown ids in a batch are skipped, as the server does
            let _ = self.mark(wave_id, id);
        }
        Ok(())
    }

    async fn unread_counts(&self, wave_ids: &[WaveId]) -> Result<Vec<WaveUnreadCount>, UnreadError> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(offline());
        }
        let state = self.state.lock();
        Ok(count_request_ids(wave_ids)
            .into_iter()
            .map(|wave_id| {
                let (unread, total) = state
                    .counts(&wave_id)
                    .map_or((0, 0), |(ids, total)| (ids.len() as u64, total));
                WaveUnreadCount {
                    wave_id,
                    total,
                    unread,
                    read: total - unread,
                }
            })
            .collect())
    }
}

/// Root with two inline children and two list replies
///
/// ```text
/// root  "Hello brave new world"
///   c1  inline at 5
///   c2  inline at 11
///   r1  list reply
///   r2  list reply
/// ```
pub fn create_scenario_tree(wave_id: &str) -> WaveTree {
    WaveTree::new(
        wave_id.into(),
        vec![
            Blip::new("root", wave_id, "<p>Hello brave new world</p>"),
            Blip::new("c1", wave_id, "<p>first inline</p>").with_parent("root").anchored_at(5),
            Blip::new("c2", wave_id, "<p>second inline</p>").with_parent("root").anchored_at(11),
            Blip::new("r1", wave_id, "<p>first reply</p>").with_parent("root"),
            Blip::new("r2", wave_id, "<p>second reply</p>").with_parent("root"),
        ],
    )
    .unwrap()
}

/// Flat wave of list replies under one root
pub fn create_flat_tree(wave_id: &str, replies: usize) -> WaveTree {
    let mut blips = vec![Blip::new("root", wave_id, "<p>topic</p>")];
    blips.extend((0..replies).map(|i| Blip::new(format!("r{i}"), wave_id, format!("<p>reply {i}</p>")).with_parent("root")));
    WaveTree::new(wave_id.into(), blips).unwrap()
}

pub fn setup_model(tree: WaveTree) -> Arc<InMemoryReadModel> {
    Arc::new(InMemoryReadModel::new().with_wave(tree))
}

/// Store for `wave_id` over `model`, for user "me"
pub fn setup_store(model: &Arc<InMemoryReadModel>, wave_id: &str) -> UnreadStore {
    UnreadStore::builder(wave_id, Arc::clone(model) as Arc<dyn ReadModel>)
        .with_user("me")
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn edits_make_blips_unread_again() {
        let model = setup_model(create_scenario_tree("w1"));
        let wave: WaveId = "w1".into();
        assert_eq!(model.unread_in(&wave).len(), 5);

        model.mark_read(&wave, &"c1".into()).await.unwrap();
        assert!(!model.unread_in(&wave).contains(&"c1".into()));

        model.touch(&wave, &"c1".into());
        assert!(model.unread_in(&wave).contains(&"c1".into()));
    }

    #[tokio::test]
    async fn unread_follows_document_order() {
        let model = setup_model(create_scenario_tree("w1"));
        let resp = model.fetch_unread(&"w1".into()).await.unwrap();
        let ids: Vec<&str> = resp.unread.iter().map(BlipId::as_str).collect();
        assert_eq!(ids, vec!["root", "c1", "c2", "r1", "r2"]);
        assert_eq!((resp.total, resp.read), (5, 0));
    }

    #[tokio::test]
    async fn counts_default_to_zero() {
        let model = setup_model(create_flat_tree("w1", 3));
        model.mark_read_directly(&"w1".into(), &"root".into());
        let counts = model.unread_counts(&["nope".into(), "w1".into()]).await.unwrap();
        assert_eq!((counts[0].total, counts[0].unread), (0, 0));
        assert_eq!((counts[1].total, counts[1].unread, counts[1].read), (4, 3, 1));
        assert_eq!(model.network_calls(), 1);
    }

    #[tokio::test]
    async fn deleted_blips_leave_the_counts() {
        let model = setup_model(create_flat_tree("w1", 2));
        assert!(model.delete_blip(&"w1".into(), &"r0".into()));
        let resp = model.fetch_unread(&"w1".into()).await.unwrap();
        assert_eq!(resp.total, 2);
    }
}
