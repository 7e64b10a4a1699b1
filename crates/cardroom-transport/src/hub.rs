//! Topic fan-out: the publish side of table broadcasts.
//!
//! A topic is a plain string key. Publishers write already-serialized
//! payloads to a topic; every receiver subscribed to that topic at the
//! time of publish gets its own copy. Delivery is at-most-once and never
//! blocks the publisher: a subscriber that falls behind loses the oldest
//! payloads and is told how many it missed.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;

/// Receiving end of a topic subscription.
pub type TopicReceiver = broadcast::Receiver<Arc<[u8]>>;

/// Default number of payloads buffered per topic before slow subscribers
/// start lagging.
const DEFAULT_TOPIC_CAPACITY: usize = 256;

/// Something that delivers a serialized payload to a topic.
///
/// Fire-and-forget: implementations must not block on, retry, or report
/// delivery to individual subscribers.
pub trait Publisher: Send + Sync + 'static {
    fn publish(&self, topic: &str, payload: Vec<u8>);
}

/// In-process [`Publisher`] backed by one broadcast channel per topic.
///
/// Topics are created by the first subscriber and dropped once a publish
/// finds nobody listening.
pub struct TopicHub {
    topics: DashMap<String, broadcast::Sender<Arc<[u8]>>>,
    capacity: usize,
}

impl TopicHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TOPIC_CAPACITY)
    }

    /// Creates a hub buffering up to `capacity` payloads per topic.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Subscribes to `topic`, creating it if needed.
    ///
    /// The receiver only sees payloads published after this call returns.
    pub fn subscribe(&self, topic: &str) -> TopicReceiver {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Number of live receivers on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .get(topic)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Number of topics currently tracked.
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }
}

impl Default for TopicHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Publisher for TopicHub {
    fn publish(&self, topic: &str, payload: Vec<u8>) {
        let delivered = match self.topics.get(topic) {
            Some(tx) => tx.send(Arc::from(payload)).unwrap_or(0),
            None => 0,
        };

        if delivered == 0 {
            // Nobody listening: forget the topic unless a subscriber raced in.
            self.topics.remove_if(topic, |_, tx| tx.receiver_count() == 0);
        }

        tracing::trace!(topic, delivered, "published");
    }
}
