//! Per-wave store registry
//!
//! Hosts with several open waves keep one [`UnreadStore`] per wave here and
//! route the shared push-event stream through [`UnreadRegistry::route`].

use crate::client::ReadModel;
use crate::error::UnreadError;
use crate::notify::{Notifier, TracingNotifier};
use crate::store::{EventEffect, Refreshed, UnreadStore};
use dashmap::DashMap;
use std::sync::Arc;
use wave_model::{ClientConfig, WaveEvent, WaveId};

/// Lazily opened unread stores, keyed by wave
pub struct UnreadRegistry {
    model: Arc<dyn ReadModel>,
    config: ClientConfig,
    notifier: Arc<dyn Notifier>,
    stores: DashMap<WaveId, Arc<UnreadStore>>,
}

impl std::fmt::Debug for UnreadRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnreadRegistry")
            .field("waves", &self.stores.len())
            .finish_non_exhaustive()
    }
}

impl UnreadRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new(model: Arc<dyn ReadModel>, config: ClientConfig) -> Self {
        Self {
            model,
            config,
            notifier: Arc::new(TracingNotifier),
            stores: DashMap::new(),
        }
    }

    /// Notifier handed to every store opened afterwards
    #[inline]
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Store for `wave_id`, opening it on first use
    pub fn open(&self, wave_id: &WaveId) -> Arc<UnreadStore> {
        self.stores
            .entry(wave_id.clone())
            .or_insert_with(|| {
                tracing::debug!("Opening unread store for {}", wave_id);
                Arc::new(
                    UnreadStore::builder(wave_id.clone(), Arc::clone(&self.model))
                        .with_config(&self.config)
                        .with_notifier(Arc::clone(&self.notifier))
                        .build(),
                )
            })
            .clone()
    }

    /// Store for `wave_id` if open
    #[must_use]
    pub fn get(&self, wave_id: &WaveId) -> Option<Arc<UnreadStore>> {
        self.stores.get(wave_id).map(|s| Arc::clone(s.value()))
    }

    /// Shut down and forget the store for `wave_id`
    pub fn close(&self, wave_id: &WaveId) -> bool {
        match self.stores.remove(wave_id) {
            Some((_, store)) => {
                store.shutdown();
                true
            }
            None => false,
        }
    }

    /// Open waves
    #[must_use]
    pub fn len(&self) -> usize {
        self.stores.len()
    }

    /// Whether no wave is open
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Hand a push event to the store of its wave, if open
    pub fn route(&self, event: &WaveEvent) -> EventEffect {
        self.get(event.wave_id())
            .map_or(EventEffect::Ignored, |store| store.handle_event(event))
    }

    /// Refresh every open store concurrently
    pub async fn refresh_all(&self) -> Vec<(WaveId, Result<Refreshed, UnreadError>)> {
        let stores: Vec<Arc<UnreadStore>> = self.stores.iter().map(|s| Arc::clone(s.value())).collect();
        futures::future::join_all(stores.into_iter().map(|store| async move {
            let result = store.refresh().await;
            (store.wave_id().clone(), result)
        }))
        .await
    }
}
