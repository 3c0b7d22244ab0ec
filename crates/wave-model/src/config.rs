//! Client configuration
//!
//! Loaded from a TOML file, with environment overrides for the values that
//! differ per deployment. Every field has a default so an empty file is a
//! valid configuration.

use crate::error::ConfigError;
use crate::ids::UserId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding [`ClientConfig::base_url`]
pub const ENV_BASE_URL: &str = "GREENWAVE_BASE_URL";

/// Environment variable overriding [`ClientConfig::user_id`]
pub const ENV_USER: &str = "GREENWAVE_USER";

/// greenwave client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Origin of the collaboration server
    pub base_url: String,
    /// Current user; events from this user are treated as self-originated
    pub user_id: Option<UserId>,
    /// Coalescing window for push-event driven refreshes, milliseconds
    pub debounce_ms: u64,
    /// Animation frames to wait for an expanded inline child to mount
    pub max_expand_frames: u32,
    /// Capacity of the marker injection cache
    pub injection_cache_capacity: u64,
    /// File backing local preferences; in-memory when unset
    pub preferences_path: Option<PathBuf>,
    /// Request timeout, seconds
    pub request_timeout_secs: u64,
}

impl ClientConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With base URL
    #[inline]
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// With current user
    #[inline]
    #[must_use]
    pub fn with_user(mut self, user: impl Into<UserId>) -> Self {
        self.user_id = Some(user.into());
        self
    }

    /// With debounce window
    #[inline]
    #[must_use]
    pub fn with_debounce(mut self, window: Duration) -> Self {
        self.debounce_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With expansion poll bound
    #[inline]
    #[must_use]
    pub fn with_max_expand_frames(mut self, frames: u32) -> Self {
        self.max_expand_frames = frames;
        self
    }

    /// Debounce window as a duration
    #[inline]
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Request timeout as a duration
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Load from a TOML file, then apply environment overrides
    ///
    /// # Errors
    /// - `ConfigError::Io` if the file cannot be read
    /// - `ConfigError::Parse` if it is not valid TOML
    /// - `ConfigError::Invalid` if a value is out of range
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let config = config.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `GREENWAVE_BASE_URL` and `GREENWAVE_USER` when set
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(ENV_BASE_URL) {
            if !url.trim().is_empty() {
                self.base_url = url;
            }
        }
        if let Ok(user) = std::env::var(ENV_USER) {
            if !user.trim().is_empty() {
                self.user_id = Some(UserId::new(user));
            }
        }
        self
    }

    /// Check value ranges
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the first offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "base_url",
                message: "must not be empty".to_string(),
            });
        }
        if self.max_expand_frames == 0 {
            return Err(ConfigError::Invalid {
                field: "max_expand_frames",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            user_id: None,
            debounce_ms: 1_500,
            max_expand_frames: 30,
            injection_cache_capacity: 1_000,
            preferences_path: None,
            request_timeout_secs: 15,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = ClientConfig::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_expand_frames, 30);
        assert_eq!(config.debounce(), Duration::from_millis(1_500));
    }

    #[test]
    fn builders_apply() {
        let config = ClientConfig::new()
            .with_base_url("https://waves.example")
            .with_user("u1")
            .with_debounce(Duration::from_secs(2))
            .with_max_expand_frames(10);
        assert_eq!(config.base_url, "https://waves.example");
        assert_eq!(config.user_id, Some(UserId::from("u1")));
        assert_eq!(config.debounce_ms, 2_000);
        assert_eq!(config.max_expand_frames, 10);
    }

    #[test]
    fn loads_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "base_url = \"http://collab.test\"\ndebounce_ms = 250").unwrap();
        let config = ClientConfig::load(file.path()).unwrap();
        assert_eq!(config.debounce_ms, 250);
        assert_eq!(config.max_expand_frames, 30);
    }

    #[test]
    fn rejects_zero_frames() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_expand_frames = 0").unwrap();
        let err = ClientConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "max_expand_frames", .. }));
    }

    #[test]
    fn reports_missing_file() {
        let err = ClientConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
