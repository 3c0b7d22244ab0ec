//! Preference storage errors

use std::path::PathBuf;

/// Storage adapter errors
///
/// The preference store itself never surfaces these to callers; failed
/// writes are logged and the in-memory cache stays authoritative.
#[derive(Debug, thiserror::Error)]
pub enum PrefsError {
    /// Backing file could not be read or written
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored document is not valid JSON
    #[error("invalid preference document: {0}")]
    Json(#[from] serde_json::Error),

    /// Storage refuses writes (quota, private mode, read-only medium)
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl PrefsError {
    /// Check if retrying the write could succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}
