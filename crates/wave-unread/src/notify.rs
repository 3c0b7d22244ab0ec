//! User-visible notices
//!
//! The store reports rollbacks and failed batch writes through a
//! [`Notifier`]; hosts with a UI show them as toasts, everything else logs.

use parking_lot::Mutex;

/// Notice severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeLevel {
    /// Informational
    Info,
    /// Something the user asked for did not happen
    Error,
}

/// Message shown when a single read could not be saved
pub const READ_SYNC_FAILED: &str = "Read sync failed, retrying\u{2026}";

/// Message shown when a batch of reads could not be saved
pub const BATCH_PERSIST_FAILED: &str = "Failed to persist read state, retrying\u{2026}";

/// Error recorded when a refresh fails
pub const LOAD_FAILED: &str = "Failed to load unread state";

/// Sink for user-visible notices
pub trait Notifier: Send + Sync {
    /// Show a notice
    fn notify(&self, level: NoticeLevel, message: &str);
}

/// Logs notices through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Info => tracing::info!("{}", message),
            NoticeLevel::Error => tracing::warn!("{}", message),
        }
    }
}

/// Keeps notices in memory
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(NoticeLevel, String)>>,
}

impl RecordingNotifier {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notices received so far
    #[must_use]
    pub fn notices(&self) -> Vec<(NoticeLevel, String)> {
        self.notices.lock().clone()
    }

    /// Messages received so far
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.notices.lock().iter().map(|(_, m)| m.clone()).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        self.notices.lock().push((level, message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_keeps_order() {
        let recorder = RecordingNotifier::new();
        recorder.notify(NoticeLevel::Error, READ_SYNC_FAILED);
        recorder.notify(NoticeLevel::Info, "done");
        assert_eq!(recorder.messages(), vec![READ_SYNC_FAILED.to_string(), "done".to_string()]);
        assert_eq!(recorder.notices()[0].0, NoticeLevel::Error);
    }
}
