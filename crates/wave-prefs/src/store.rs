//! Generic per-blip preference store
//!
//! All entries live in one JSON object under a single storage key. The
//! in-memory cache is authoritative for reads; storage is written through on
//! every `set` and re-read only when the medium reports a change made by
//! another tab.

use crate::storage::Storage;
use crate::value::{Entry, PreferenceValue};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use wave_model::BlipId;

/// Where a change came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeSource {
    /// `set` on this store
    Local,
    /// Another tab writing the shared medium
    Storage,
}

/// Notification sent to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferenceChange<V> {
    /// Affected blip
    pub blip_id: BlipId,
    /// New effective value
    pub value: V,
    /// Modification time of the new value, ms since epoch
    pub updated_at: u64,
    /// Origin of the change
    pub source: ChangeSource,
}

/// Preference store over a swappable storage medium
pub struct PreferenceStore<V: PreferenceValue> {
    key: String,
    storage: Arc<dyn Storage>,
    cache: RwLock<HashMap<BlipId, Entry<V>>>,
    tx: broadcast::Sender<PreferenceChange<V>>,
    listener: Mutex<Option<JoinHandle<()>>>,
    // serializes encode + persist so storage never receives an older document last
    write: Mutex<()>,
}

impl<V: PreferenceValue> std::fmt::Debug for PreferenceStore<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreferenceStore")
            .field("key", &self.key)
            .field("entries", &self.cache.read().len())
            .finish_non_exhaustive()
    }
}

impl<V: PreferenceValue> PreferenceStore<V> {
    /// Open the store, loading the current document from storage
    ///
    /// An unreadable or malformed document loads as empty.
    #[must_use]
    pub fn new(key: impl Into<String>, storage: Arc<dyn Storage>) -> Arc<Self> {
        let key = key.into();
        let raw = storage.get(&key).unwrap_or_else(|e| {
            tracing::warn!("Failed to read preferences {}: {}", key, e);
            None
        });
        let (tx, _) = broadcast::channel(64);
        Arc::new(Self {
            cache: RwLock::new(parse_document(raw.as_deref())),
            key,
            storage,
            tx,
            listener: Mutex::new(None),
            write: Mutex::new(()),
        })
    }

    /// Storage key
    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Effective value: the stored one, or the default
    #[must_use]
    pub fn get(&self, blip_id: &BlipId) -> V {
        self.stored(blip_id).unwrap_or_else(V::default_value)
    }

    /// Stored value, if any
    #[must_use]
    pub fn stored(&self, blip_id: &BlipId) -> Option<V> {
        self.cache.read().get(blip_id).map(|e| e.value)
    }

    /// Stored value with its modification time
    #[must_use]
    pub fn metadata(&self, blip_id: &BlipId) -> Option<Entry<V>> {
        self.cache.read().get(blip_id).copied()
    }

    /// Number of stored entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    /// Whether nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }

    /// Store a value; returns its modification time
    ///
    /// A storage failure is logged; the cache and subscribers still see the
    /// new value.
    pub fn set(&self, blip_id: impl Into<BlipId>, value: V) -> u64 {
        let blip_id = blip_id.into();
        let entry = Entry {
            value,
            updated_at: now_ms(),
        };
        {
            let _ordered = self.write.lock();
            let document = {
                let mut cache = self.cache.write();
                cache.insert(blip_id.clone(), entry);
                encode_document(&cache)
            };
            if let Err(e) = self.storage.set(&self.key, &document) {
                tracing::warn!("Failed to persist preferences {}: {}", self.key, e);
            }
        }
        tracing::debug!("Preference {} set for {}: {:?}", self.key, blip_id, value);
        self.notify(PreferenceChange {
            blip_id,
            value,
            updated_at: entry.updated_at,
            source: ChangeSource::Local,
        });
        entry.updated_at
    }

    /// Subscribe to changes
    ///
    /// The first subscription inside a tokio runtime also starts listening
    /// for changes made by other tabs, if the medium reports them.
    pub fn subscribe(self: &Arc<Self>) -> broadcast::Receiver<PreferenceChange<V>> {
        let rx = self.tx.subscribe();
        self.ensure_listener();
        rx
    }

    fn ensure_listener(self: &Arc<Self>) {
        let mut listener = self.listener.lock();
        if listener.is_some() || tokio::runtime::Handle::try_current().is_err() {
            return;
        }
        let Some(mut watch) = self.storage.watch() else {
            return;
        };
        let weak: Weak<Self> = Arc::downgrade(self);
        let key = self.key.clone();
        *listener = Some(tokio::spawn(async move {
            while let Some(event) = watch.recv().await {
                if event.key != key {
                    continue;
                }
                let Some(store) = weak.upgrade() else {
                    break;
                };
                store.apply_storage_event(event.new_value.as_deref());
            }
        }));
    }

    /// Reconcile with a document written by another tab
    ///
    /// Changed and added entries are announced with their new value; removed
    /// entries are announced with the default value. Unchanged entries are
    /// not announced.
    pub fn apply_storage_event(&self, new_value: Option<&str>) {
        let next = parse_document::<V>(new_value);
        let previous = std::mem::replace(&mut *self.cache.write(), next.clone());

        let keys: BTreeSet<&BlipId> = previous.keys().chain(next.keys()).collect();
        for blip_id in keys {
            let change = match (previous.get(blip_id), next.get(blip_id)) {
                (Some(_), None) => Some((V::default_value(), now_ms())),
                (prev, Some(entry)) if prev != Some(entry) => Some((entry.value, entry.updated_at)),
                _ => None,
            };
            if let Some((value, updated_at)) = change {
                self.notify(PreferenceChange {
                    blip_id: blip_id.clone(),
                    value,
                    updated_at,
                    source: ChangeSource::Storage,
                });
            }
        }
    }

    fn notify(&self, change: PreferenceChange<V>) {
        // no subscribers is fine
        let _ = self.tx.send(change);
    }
}

impl<V: PreferenceValue> Drop for PreferenceStore<V> {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.get_mut().take() {
            handle.abort();
        }
    }
}

/// Parse a stored document, dropping malformed entries
///
/// Missing, unparsable and non-object documents all read as empty.
#[must_use]
pub fn parse_document<V: PreferenceValue>(raw: Option<&str>) -> HashMap<BlipId, Entry<V>> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return HashMap::new();
    };
    let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(raw) else {
        return HashMap::new();
    };
    map.iter()
        .filter_map(|(id, value)| Entry::coerce(value).map(|e| (BlipId::from(id.as_str()), e)))
        .collect()
}

fn encode_document<V: PreferenceValue>(cache: &HashMap<BlipId, Entry<V>>) -> String {
    let map: serde_json::Map<String, serde_json::Value> = cache
        .iter()
        .map(|(id, entry)| (id.to_string(), entry.to_json()))
        .collect();
    serde_json::Value::Object(map).to_string()
}

fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PrefsError;
    use crate::storage::MemoryStorage;
    use crate::value::{Collapsed, Visibility};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingStorage {
        attempts: AtomicUsize,
    }

    impl Storage for FailingStorage {
        fn get(&self, _key: &str) -> Result<Option<String>, PrefsError> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), PrefsError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(PrefsError::Unavailable("quota exceeded".into()))
        }
    }

    fn memory() -> Arc<dyn Storage> {
        Arc::new(MemoryStorage::new())
    }

    #[test]
    fn defaults_apply_without_entries() {
        let store = PreferenceStore::<Collapsed>::new("k", memory());
        assert_eq!(store.get(&"b1".into()), Collapsed(false));
        assert!(store.stored(&"b1".into()).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn loads_lenient_document() {
        let storage = memory();
        storage
            .set(
                "k",
                r#"{"a": true, "b": {"isCollapsed": true, "updatedAt": 9}, "c": {"value": true}, "d": "junk"}"#,
            )
            .unwrap();
        let store = PreferenceStore::<Collapsed>::new("k", storage);
        assert_eq!(store.len(), 3);
        assert_eq!(store.metadata(&"b".into()).map(|e| e.updated_at), Some(9));
        assert_eq!(store.get(&"c".into()), Collapsed(true));
        assert!(store.stored(&"d".into()).is_none());
    }

    #[test]
    fn unparsable_document_reads_empty() {
        assert!(parse_document::<Visibility>(Some("{not json")).is_empty());
        assert!(parse_document::<Visibility>(Some("[true]")).is_empty());
        assert!(parse_document::<Visibility>(None).is_empty());
    }

    #[tokio::test]
    async fn set_persists_and_notifies_locally() {
        let storage = memory();
        let store = PreferenceStore::<Collapsed>::new("k", Arc::clone(&storage));
        let mut rx = store.subscribe();

        let updated_at = store.set("b1", Collapsed(true));
        assert!(updated_at > 0);

        let change = rx.recv().await.unwrap();
        assert_eq!(change.source, ChangeSource::Local);
        assert_eq!(change.value, Collapsed(true));
        assert_eq!(change.updated_at, updated_at);

        let reopened = PreferenceStore::<Collapsed>::new("k", storage);
        assert_eq!(reopened.get(&"b1".into()), Collapsed(true));
    }

    #[tokio::test]
    async fn write_failures_are_swallowed() {
        let failing = Arc::new(FailingStorage {
            attempts: AtomicUsize::new(0),
        });
        let store = PreferenceStore::<Visibility>::new("k", failing.clone());
        let mut rx = store.subscribe();
        store.set("b1", Visibility(false));
        assert_eq!(failing.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(store.get(&"b1".into()), Visibility(false));
        assert_eq!(rx.recv().await.unwrap().value, Visibility(false));
    }

    #[test]
    fn concurrent_sets_all_reach_storage() {
        let storage = memory();
        let store = PreferenceStore::<Collapsed>::new("k", Arc::clone(&storage));
        std::thread::scope(|scope| {
            for t in 0..8 {
                let store = &store;
                scope.spawn(move || {
                    for i in 0..50 {
                        store.set(format!("t{t}-b{i}"), Collapsed(true));
                    }
                });
            }
        });

        let reopened = PreferenceStore::<Collapsed>::new("k", storage);
        assert_eq!(reopened.len(), 400);
    }

    #[tokio::test]
    async fn storage_events_are_diffed() {
        let storage = memory();
        storage
            .set("k", r#"{"keep": {"isCollapsed": true, "updatedAt": 1}, "gone": true, "edit": {"isCollapsed": false, "updatedAt": 1}}"#)
            .unwrap();
        let store = PreferenceStore::<Collapsed>::new("k", storage);
        let mut rx = store.subscribe();

        store.apply_storage_event(Some(
            r#"{"keep": {"isCollapsed": true, "updatedAt": 1}, "edit": {"isCollapsed": true, "updatedAt": 2}, "new": true}"#,
        ));

        let mut changes = Vec::new();
        while let Ok(change) = rx.try_recv() {
            changes.push(change);
        }
        let summary: Vec<(&str, bool)> = changes.iter().map(|c| (c.blip_id.as_str(), c.value.0)).collect();
        assert_eq!(summary, vec![("edit", true), ("gone", false), ("new", true)]);
        assert!(changes.iter().all(|c| c.source == ChangeSource::Storage));
        assert_eq!(store.get(&"gone".into()), Collapsed(false));
    }
}
