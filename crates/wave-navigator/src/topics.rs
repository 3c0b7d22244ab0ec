//! Topic index
//!
//! Unread counts for the user's topic list, used to offer the next topic
//! with unread blips once the current wave is fully read.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use wave_model::{WaveId, WaveUnreadCount};
use wave_unread::{ReadModel, UnreadError, MAX_COUNT_WAVES};

/// Source of the next topic to read
#[async_trait]
pub trait NextTopicSource: Send + Sync {
    /// Next topic after `current` that has unread blips
    async fn next_with_unread(&self, current: &WaveId) -> Result<Option<WaveId>, UnreadError>;

    /// Counts of `wave_id` changed locally
    async fn wave_changed(&self, wave_id: &WaveId) -> Result<(), UnreadError>;
}

/// Unread counts of an ordered topic list
pub struct TopicIndex {
    model: Arc<dyn ReadModel>,
    topics: RwLock<Vec<WaveId>>,
    counts: DashMap<WaveId, WaveUnreadCount>,
}

impl std::fmt::Debug for TopicIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicIndex")
            .field("topics", &self.topics.read().len())
            .field("counted", &self.counts.len())
            .finish_non_exhaustive()
    }
}

impl TopicIndex {
    /// Index `topics` in list order
    #[must_use]
    pub fn new(model: Arc<dyn ReadModel>, topics: Vec<WaveId>) -> Self {
        Self {
            model,
            topics: RwLock::new(topics),
            counts: DashMap::new(),
        }
    }

    /// Replace the topic list; counts of dropped topics are forgotten
    pub fn set_topics(&self, topics: Vec<WaveId>) {
        self.counts.retain(|id, _| topics.contains(id));
        *self.topics.write() = topics;
    }

    /// Topic list
    #[must_use]
    pub fn topics(&self) -> Vec<WaveId> {
        self.topics.read().clone()
    }

    /// Cached counts of a topic
    #[must_use]
    pub fn count(&self, wave_id: &WaveId) -> Option<WaveUnreadCount> {
        self.counts.get(wave_id).map(|c| c.value().clone())
    }

    /// Fetch counts for every topic, one request per 200 topics
    ///
    /// # Errors
    /// The first failing request's error; counts from other requests are kept.
    pub async fn refresh(&self) -> Result<usize, UnreadError> {
        let topics = self.topics();
        let requests = topics
            .chunks(MAX_COUNT_WAVES)
            .map(|chunk| self.model.unread_counts(chunk));
        let results = futures::future::join_all(requests).await;

        let mut updated = 0;
        let mut first_error = None;
        for result in results {
            match result {
                Ok(counts) => {
                    updated += counts.len();
                    for count in counts {
                        self.counts.insert(count.wave_id.clone(), count);
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to fetch topic counts: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => {
                tracing::debug!("Refreshed unread counts of {} topics", updated);
                Ok(updated)
            }
        }
    }

    /// Refetch the counts of one topic
    ///
    /// # Errors
    /// The read-model error.
    pub async fn refresh_one(&self, wave_id: &WaveId) -> Result<(), UnreadError> {
        let counts = self.model.unread_counts(std::slice::from_ref(wave_id)).await?;
        for count in counts {
            self.counts.insert(count.wave_id.clone(), count);
        }
        Ok(())
    }

    /// First topic after `current` in list order with unread blips, wrapping
    ///
    /// Uses cached counts; `current` itself is never returned.
    #[must_use]
    pub fn next_cached(&self, current: &WaveId) -> Option<WaveId> {
        let topics = self.topics.read();
        let start = topics.iter().position(|t| t == current).map_or(0, |i| i + 1);
        let len = topics.len();
        (0..len)
            .map(|offset| &topics[(start + offset) % len])
            .find(|t| *t != current && self.counts.get(*t).is_some_and(|c| c.unread > 0))
            .cloned()
    }
}

#[async_trait]
impl NextTopicSource for TopicIndex {
    async fn next_with_unread(&self, current: &WaveId) -> Result<Option<WaveId>, UnreadError> {
        self.refresh().await?;
        Ok(self.next_cached(current))
    }

    async fn wave_changed(&self, wave_id: &WaveId) -> Result<(), UnreadError> {
        self.refresh_one(wave_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wave_test_utils::{create_flat_tree, InMemoryReadModel};

    fn index(model: &Arc<InMemoryReadModel>, topics: &[&str]) -> TopicIndex {
        TopicIndex::new(
            Arc::clone(model) as Arc<dyn ReadModel>,
            topics.iter().map(|t| WaveId::from(*t)).collect(),
        )
    }

    #[tokio::test]
    async fn next_topic_wraps_and_skips_read() {
        let model = Arc::new(
            InMemoryReadModel::new()
                .with_wave(create_flat_tree("a", 1))
                .with_wave(create_flat_tree("b", 1))
                .with_wave(create_flat_tree("c", 1)),
        );
        for id in ["root", "r0"] {
            model.mark_read_directly(&"b".into(), &id.into());
        }
        let topics = index(&model, &["a", "b", "c"]);

        let next = topics.next_with_unread(&"a".into()).await.unwrap();
        assert_eq!(next.as_ref().map(WaveId::as_str), Some("c"));
        assert_eq!(topics.next_cached(&"c".into()).as_ref().map(WaveId::as_str), Some("a"));
        assert_eq!(topics.count(&"b".into()).map(|c| c.unread), Some(0));
    }

    #[tokio::test]
    async fn nothing_left_anywhere() {
        let model = Arc::new(InMemoryReadModel::new().with_wave(create_flat_tree("a", 0)));
        model.mark_read_directly(&"a".into(), &"root".into());
        let topics = index(&model, &["a", "missing"]);
        assert_eq!(topics.next_with_unread(&"a".into()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn large_lists_are_chunked() {
        let model = Arc::new(InMemoryReadModel::new());
        let names: Vec<String> = (0..450).map(|i| format!("w{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let topics = index(&model, &refs);
        assert_eq!(topics.refresh().await.unwrap(), 450);
        assert_eq!(model.count_calls(), 3);
    }

    #[tokio::test]
    async fn set_topics_forgets_dropped_counts() {
        let model = Arc::new(InMemoryReadModel::new().with_wave(create_flat_tree("a", 1)));
        let topics = index(&model, &["a", "b"]);
        topics.refresh().await.unwrap();
        topics.set_topics(vec!["b".into()]);
        assert!(topics.count(&"a".into()).is_none());
        assert_eq!(topics.topics(), vec![WaveId::from("b")]);
    }
}
