//! Storage adapters
//!
//! A [`Storage`] is a string key/value medium. Adapters differ in where the
//! data lives and in whether writes from one handle are observable by
//! others:
//! - [`MemoryStorage`]: process-local, no change events
//! - [`SharedStorage`] / [`TabStorage`]: one shared medium, one handle per
//!   tab; a write through one tab is announced to every other tab
//! - [`FileStorage`]: a JSON document on disk, no change events

use crate::error::PrefsError;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use wave_model::ClientConfig;

/// A change made to storage by someone else
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    /// Key that changed
    pub key: String,
    /// New raw value, `None` if the key was removed
    pub new_value: Option<String>,
}

/// Key/value storage medium
pub trait Storage: Send + Sync {
    /// Read a key
    ///
    /// # Errors
    /// Adapter-specific read failure
    fn get(&self, key: &str) -> Result<Option<String>, PrefsError>;

    /// Write a key
    ///
    /// # Errors
    /// Adapter-specific write failure
    fn set(&self, key: &str, value: &str) -> Result<(), PrefsError>;

    /// Changes made through other handles, if the medium reports them
    fn watch(&self) -> Option<StorageWatch> {
        None
    }
}

/// Process-local storage
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: DashMap<String, String>,
}

impl MemoryStorage {
    /// Create empty storage
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, PrefsError> {
        Ok(self.data.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PrefsError> {
        self.data.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Notice {
    origin: Option<u64>,
    event: StorageEvent,
}

/// Medium shared by several tabs
///
/// Writes through [`SharedStorage`] itself have no tab origin and are
/// announced to every tab, like an edit from outside the application.
#[derive(Debug, Clone)]
pub struct SharedStorage {
    inner: Arc<SharedInner>,
}

#[derive(Debug)]
struct SharedInner {
    data: DashMap<String, String>,
    tx: broadcast::Sender<Notice>,
    next_tab: AtomicU64,
}

impl SharedStorage {
    /// Create empty shared medium
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(SharedInner {
                data: DashMap::new(),
                tx,
                next_tab: AtomicU64::new(1),
            }),
        }
    }

    /// Open a new tab handle
    #[must_use]
    pub fn tab(&self) -> TabStorage {
        TabStorage {
            shared: self.clone(),
            id: self.inner.next_tab.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Write from outside any tab
    pub fn set_external(&self, key: &str, value: &str) {
        self.write(None, key, Some(value));
    }

    /// Remove a key from outside any tab
    pub fn remove(&self, key: &str) {
        self.write(None, key, None);
    }

    /// Read a key
    #[must_use]
    pub fn get_raw(&self, key: &str) -> Option<String> {
        self.inner.data.get(key).map(|v| v.value().clone())
    }

    fn write(&self, origin: Option<u64>, key: &str, value: Option<&str>) {
        match value {
            Some(v) => {
                self.inner.data.insert(key.to_string(), v.to_string());
            }
            None => {
                self.inner.data.remove(key);
            }
        }
        let _ = self.inner.tx.send(Notice {
            origin,
            event: StorageEvent {
                key: key.to_string(),
                new_value: value.map(str::to_string),
            },
        });
    }
}

impl Default for SharedStorage {
    fn default() -> Self {
        Self::new()
    }
}

/// One tab's handle on a [`SharedStorage`]
#[derive(Debug, Clone)]
pub struct TabStorage {
    shared: SharedStorage,
    id: u64,
}

impl TabStorage {
    /// Tab identifier, unique per shared medium
    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Storage for TabStorage {
    fn get(&self, key: &str) -> Result<Option<String>, PrefsError> {
        Ok(self.shared.get_raw(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PrefsError> {
        self.shared.write(Some(self.id), key, Some(value));
        Ok(())
    }

    fn watch(&self) -> Option<StorageWatch> {
        Some(StorageWatch {
            rx: self.shared.inner.tx.subscribe(),
            own: self.id,
        })
    }
}

/// Stream of changes made by other handles
#[derive(Debug)]
pub struct StorageWatch {
    rx: broadcast::Receiver<Notice>,
    own: u64,
}

impl StorageWatch {
    /// Next change not made through the watching handle
    ///
    /// Returns `None` once the medium is gone.
    pub async fn recv(&mut self) -> Option<StorageEvent> {
        loop {
            match self.rx.recv().await {
                Ok(notice) if notice.origin == Some(self.own) => {}
                Ok(notice) => return Some(notice.event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Storage watch lagged, {} changes dropped", n);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// JSON document on disk holding every key
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    /// Use the document at `path`; it is created on first write
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Backing file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<serde_json::Map<String, serde_json::Value>, PrefsError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(serde_json::Map::new()),
            Err(source) => {
                return Err(PrefsError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if raw.trim().is_empty() {
            return Ok(serde_json::Map::new());
        }
        match serde_json::from_str::<serde_json::Value>(&raw)? {
            serde_json::Value::Object(map) => Ok(map),
            _ => Ok(serde_json::Map::new()),
        }
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, PrefsError> {
        let _guard = self.lock.lock();
        Ok(self
            .load()?
            .get(key)
            .and_then(|v| v.as_str().map(str::to_string)))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PrefsError> {
        let _guard = self.lock.lock();
        // A corrupt document is replaced rather than blocking every write
        let mut doc = self.load().unwrap_or_default();
        doc.insert(key.to_string(), serde_json::Value::String(value.to_string()));
        let body = serde_json::to_string_pretty(&doc)?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| PrefsError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&self.path, body).map_err(|source| PrefsError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

/// Storage configured by `config`: a [`FileStorage`] at `preferences_path`,
/// in memory otherwise
#[must_use]
pub fn storage_from_config(config: &ClientConfig) -> Arc<dyn Storage> {
    match &config.preferences_path {
        Some(path) => {
            tracing::debug!("Preferences stored in {}", path.display());
            Arc::new(FileStorage::new(path))
        }
        None => Arc::new(MemoryStorage::new()),
    }
}
