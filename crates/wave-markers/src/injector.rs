//! Cached marker injection
//!
//! Views re-run injection on every unread or expansion change, usually with
//! identical arguments for most blips. Results are cached by a blake3 digest
//! of `(content, inline children, expanded set)`.

use crate::inject::inject;
use moka::sync::Cache;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use wave_model::{BlipId, InlineChild};

/// Default number of cached injections
pub const DEFAULT_CAPACITY: u64 = 1_000;

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InjectorStats {
    /// Lookups served from cache
    pub hits: u64,
    /// Lookups that ran the injector
    pub misses: u64,
    /// Entries currently cached
    pub entry_count: u64,
}

/// Marker injector with a bounded content-addressed cache
#[derive(Debug, Clone)]
pub struct MarkerInjector {
    cache: Cache<[u8; 32], Arc<str>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl MarkerInjector {
    /// Create injector caching up to `capacity` results
    #[inline]
    #[must_use]
    pub fn new(capacity: u64) -> Self {
        Self {
            cache: Cache::new(capacity),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Inject, serving repeated arguments from cache
    #[must_use]
    pub fn inject(
        &self,
        content: &str,
        children: &[InlineChild],
        expanded: &HashSet<BlipId>,
    ) -> Arc<str> {
        let key = cache_key(content, children, expanded);
        if let Some(hit) = self.cache.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return hit;
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let out: Arc<str> = Arc::from(inject(content, children, expanded));
        self.cache.insert(key, Arc::clone(&out));
        out
    }

    /// Drop every cached result
    #[inline]
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    /// Get cache statistics
    #[must_use]
    pub fn stats(&self) -> InjectorStats {
        self.cache.run_pending_tasks();
        InjectorStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.cache.entry_count(),
        }
    }
}

impl Default for MarkerInjector {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Digest of the injection arguments
///
/// Every variable-length field is length-prefixed, and the expanded set is
/// hashed in sorted order.
fn cache_key(content: &str, children: &[InlineChild], expanded: &HashSet<BlipId>) -> [u8; 32] {
    fn field(hasher: &mut blake3::Hasher, bytes: &[u8]) {
        hasher.update(&(bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    }

    let mut hasher = blake3::Hasher::new();
    field(&mut hasher, content.as_bytes());
    hasher.update(&(children.len() as u64).to_le_bytes());
    for child in children {
        field(&mut hasher, child.id.as_str().as_bytes());
        hasher.update(&child.anchor_position.to_le_bytes());
        hasher.update(&[u8::from(child.is_read)]);
    }
    let mut ids: Vec<&str> = expanded.iter().map(BlipId::as_str).collect();
    ids.sort_unstable();
    hasher.update(&(ids.len() as u64).to_le_bytes());
    for id in ids {
        field(&mut hasher, id.as_bytes());
    }
    *hasher.finalize().as_bytes()
}
