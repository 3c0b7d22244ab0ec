//! Broadcast bus with per-subscriber topic filters

use crate::error::BusError;
use crate::signal::{Signal, Topic};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Default channel capacity
pub const DEFAULT_CAPACITY: usize = 256;

/// In-process signal bus
///
/// Cheap to clone; all clones share one channel.
#[derive(Debug, Clone)]
pub struct SignalBus {
    inner: Arc<BusInner>,
}

#[derive(Debug)]
struct BusInner {
    tx: broadcast::Sender<Signal>,
    published: AtomicU64,
}

impl SignalBus {
    /// Create bus with default capacity
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create bus with given channel capacity
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(BusInner {
                tx,
                published: AtomicU64::new(0),
            }),
        }
    }

    /// Publish a signal; returns the number of subscribers that received it
    ///
    /// Publishing with no subscribers is not an error.
    pub fn publish(&self, signal: Signal) -> usize {
        self.inner.published.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Publishing signal: {:?}", signal);
        self.inner.tx.send(signal).unwrap_or(0)
    }

    /// Subscribe to every topic
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.inner.tx.subscribe(),
            topics: None,
        }
    }

    /// Subscribe to the given topics only
    #[must_use]
    pub fn subscribe_to(&self, topics: impl IntoIterator<Item = Topic>) -> Subscription {
        Subscription {
            rx: self.inner.tx.subscribe(),
            topics: Some(topics.into_iter().collect()),
        }
    }

    /// Signals published since creation
    #[inline]
    #[must_use]
    pub fn published(&self) -> u64 {
        self.inner.published.load(Ordering::Relaxed)
    }

    /// Live subscribers
    #[inline]
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.tx.receiver_count()
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving end of the bus
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<Signal>,
    topics: Option<HashSet<Topic>>,
}

impl Subscription {
    fn accepts(&self, signal: &Signal) -> bool {
        self.topics.as_ref().map_or(true, |t| t.contains(&signal.topic()))
    }

    /// Wait for the next matching signal
    ///
    /// # Errors
    /// - `BusError::Lagged` if signals were dropped; the subscription stays usable
    /// - `BusError::Closed` once every sender is gone
    pub async fn recv(&mut self) -> Result<Signal, BusError> {
        loop {
            match self.rx.recv().await {
                Ok(signal) if self.accepts(&signal) => return Ok(signal),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => return Err(BusError::Lagged(n)),
                Err(broadcast::error::RecvError::Closed) => return Err(BusError::Closed),
            }
        }
    }

    /// Take the next matching signal without waiting
    ///
    /// Returns `Ok(None)` when nothing is queued.
    ///
    /// # Errors
    /// Same as [`Subscription::recv`].
    pub fn try_recv(&mut self) -> Result<Option<Signal>, BusError> {
        loop {
            match self.rx.try_recv() {
                Ok(signal) if self.accepts(&signal) => return Ok(Some(signal)),
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(n)) => return Err(BusError::Lagged(n)),
                Err(broadcast::error::TryRecvError::Closed) => return Err(BusError::Closed),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wave_model::BlipId;

    fn toggle(id: &str) -> Signal {
        Signal::ToggleInlineBlip { blip_id: BlipId::from(id) }
    }

    #[tokio::test]
    async fn delivers_to_every_subscriber() {
        let bus = SignalBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        assert_eq!(bus.publish(toggle("c1")), 2);
        assert_eq!(a.recv().await.unwrap(), toggle("c1"));
        assert_eq!(b.recv().await.unwrap(), toggle("c1"));
        assert_eq!(bus.published(), 1);
    }

    #[tokio::test]
    async fn filters_by_topic() {
        let bus = SignalBus::new();
        let mut folds = bus.subscribe_to([Topic::FoldAll]);
        bus.publish(toggle("c1"));
        bus.publish(Signal::FoldAll);
        assert_eq!(folds.recv().await.unwrap(), Signal::FoldAll);
        assert!(folds.try_recv().unwrap().is_none());
    }

    #[test]
    fn publish_without_subscribers_is_counted() {
        let bus = SignalBus::new();
        assert_eq!(bus.publish(Signal::UnfoldAll), 0);
        assert_eq!(bus.published(), 1);
    }

    #[test]
    fn reports_lag() {
        let bus = SignalBus::with_capacity(2);
        let mut sub = bus.subscribe();
        for i in 0..5 {
            bus.publish(toggle(&format!("c{i}")));
        }
        assert!(matches!(sub.try_recv(), Err(BusError::Lagged(_))));
        assert!(sub.try_recv().unwrap().is_some());
    }
}
