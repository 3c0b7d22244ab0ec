//! Trailing-edge debouncer
//!
//! Every `schedule` call restarts the window; the action runs once, after the
//! window passes without another call. An action that already started is
//! left to finish when a new one is scheduled.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Default debounce window for push-driven refreshes
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(1500);

struct Pending {
    handle: JoinHandle<()>,
    started: Arc<AtomicBool>,
}

/// Coalesces bursts of triggers into one action
pub struct Debouncer {
    window: Duration,
    pending: Mutex<Option<Pending>>,
    fired: Arc<AtomicU64>,
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("window", &self.window)
            .field("pending", &self.is_pending())
            .field("fired", &self.fired())
            .finish()
    }
}

impl Debouncer {
    /// Create a debouncer with the given window
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Mutex::new(None),
            fired: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Window length
    #[inline]
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Run `action` once the window passes quietly
    ///
    /// Must be called inside a tokio runtime.
    pub fn schedule<F, Fut>(&self, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let started = Arc::new(AtomicBool::new(false));
        let window = self.window;
        let fired = Arc::clone(&self.fired);
        let flag = Arc::clone(&started);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            flag.store(true, Ordering::SeqCst);
            fired.fetch_add(1, Ordering::Relaxed);
            action().await;
        });

        let previous = self.pending.lock().replace(Pending { handle, started });
        if let Some(previous) = previous {
            if !previous.started.load(Ordering::SeqCst) {
                previous.handle.abort();
            }
        }
    }

    /// Whether an action is waiting for its window to pass
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .is_some_and(|p| !p.started.load(Ordering::SeqCst) && !p.handle.is_finished())
    }

    /// Actions started so far
    #[must_use]
    pub fn fired(&self) -> u64 {
        self.fired.load(Ordering::Relaxed)
    }

    /// Abort the pending or running action
    pub fn cancel(&self) {
        if let Some(pending) = self.pending.lock().take() {
            pending.handle.abort();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
