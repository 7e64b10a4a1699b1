//! Broadcast dispatch to a table's channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use cardroom_protocol::{Codec, Envelope, JsonCodec, ProtocolError, TableId, WireMessage, table_topic};
use cardroom_transport::Publisher;

/// Delivers messages to every subscriber of a table's channel.
///
/// Each message is wrapped in an [`Envelope`] stamped with a dispatcher-wide
/// sequence number, encoded, and handed to the [`Publisher`]. Delivery is
/// best-effort and never waited on. Encoding failures are returned, since
/// they mean the message itself is broken.
///
/// Holds no per-table state, so callers need no lock to use it. Ordering
/// within a table comes from the caller: two publishes for one table made
/// one after the other are seen by subscribers in that order.
pub struct BroadcastDispatcher<C: Codec = JsonCodec> {
    publisher: Arc<dyn Publisher>,
    codec: C,
    seq: AtomicU64,
    started: Instant,
}

impl BroadcastDispatcher<JsonCodec> {
    /// A dispatcher encoding with [`JsonCodec`].
    pub fn json(publisher: Arc<dyn Publisher>) -> Self {
        Self::new(publisher, JsonCodec)
    }
}

impl<C: Codec> BroadcastDispatcher<C> {
    pub fn new(publisher: Arc<dyn Publisher>, codec: C) -> Self {
        Self {
            publisher,
            codec,
            seq: AtomicU64::new(1),
            started: Instant::now(),
        }
    }

    /// Publishes `message` on `table_id`'s channel.
    ///
    /// # Errors
    /// [`ProtocolError::Encode`] if the message cannot be serialized. Nothing
    /// is published in that case.
    pub fn publish(&self, table_id: TableId, message: WireMessage) -> Result<(), ProtocolError> {
        let envelope = Envelope::new(self.seq.fetch_add(1, Ordering::Relaxed), self.elapsed_ms(), message);
        let bytes = self.codec.encode(&envelope)?;
        self.publisher.publish(&table_topic(table_id), bytes);

        tracing::debug!(%table_id, seq = envelope.seq, "broadcast published");
        Ok(())
    }

    /// Wraps a reply for a single connection. It is stamped on the
    /// broadcast clock but takes no broadcast sequence number.
    pub fn direct(&self, message: WireMessage) -> Envelope {
        Envelope::new(Envelope::DIRECT_SEQ, self.elapsed_ms(), message)
    }

    /// Milliseconds since the dispatcher was created.
    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }
}

#[cfg(test)]
mod tests {
    use cardroom_protocol::Username;
    use cardroom_transport::TopicHub;
    use serde::{Serialize, de::DeserializeOwned};

    use super::*;

    /// A codec whose encode always fails, to exercise the error path.
    struct BrokenCodec;

    impl Codec for BrokenCodec {
        fn encode<T: Serialize>(&self, _value: &T) -> Result<Vec<u8>, ProtocolError> {
            Err(ProtocolError::Encode(serde::ser::Error::custom("broken")))
        }

        fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
            JsonCodec.decode(data)
        }
    }

    fn left(name: &str) -> WireMessage {
        WireMessage::PlayerDisconnected {
            username: Username::from(name),
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_table_topic_subscribers() {
        let hub = Arc::new(TopicHub::new());
        let dispatcher = BroadcastDispatcher::json(hub.clone());
        let table_id = TableId::new();
        let mut rx = hub.subscribe(&table_topic(table_id));

        dispatcher.publish(table_id, left("alice")).unwrap();

        let envelope: Envelope = JsonCodec.decode(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(envelope.message, left("alice"));
    }

    #[tokio::test]
    async fn test_publish_does_not_leak_to_other_tables() {
        let hub = Arc::new(TopicHub::new());
        let dispatcher = BroadcastDispatcher::json(hub.clone());
        let mut other = hub.subscribe(&table_topic(TableId::new()));

        dispatcher.publish(TableId::new(), left("alice")).unwrap();

        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_sequence_numbers_increase_in_publish_order() {
        let hub = Arc::new(TopicHub::new());
        let dispatcher = BroadcastDispatcher::json(hub.clone());
        let table_id = TableId::new();
        let mut rx = hub.subscribe(&table_topic(table_id));

        for name in ["a", "b", "c"] {
            dispatcher.publish(table_id, left(name)).unwrap();
        }

        let mut last = 0;
        for name in ["a", "b", "c"] {
            let envelope: Envelope = JsonCodec.decode(&rx.recv().await.unwrap()).unwrap();
            assert!(envelope.seq > last);
            assert_eq!(envelope.message, left(name));
            last = envelope.seq;
        }
    }

    #[tokio::test]
    async fn test_direct_envelopes_share_clock_but_not_sequence() {
        let hub = Arc::new(TopicHub::new());
        let dispatcher = BroadcastDispatcher::json(hub.clone());
        let table_id = TableId::new();
        let mut rx = hub.subscribe(&table_topic(table_id));

        dispatcher.publish(table_id, left("alice")).unwrap();
        let reply = dispatcher.direct(left("bob"));
        dispatcher.publish(table_id, left("carol")).unwrap();

        let first: Envelope = JsonCodec.decode(&rx.recv().await.unwrap()).unwrap();
        let second: Envelope = JsonCodec.decode(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(reply.seq, Envelope::DIRECT_SEQ);
        assert_eq!(second.seq, first.seq + 1);
        assert!(first.timestamp <= reply.timestamp && reply.timestamp <= second.timestamp);
    }

    #[test]
    fn test_publish_without_subscribers_succeeds() {
        let dispatcher = BroadcastDispatcher::json(Arc::new(TopicHub::new()));
        assert!(dispatcher.publish(TableId::new(), left("alice")).is_ok());
    }

    #[tokio::test]
    async fn test_encode_failure_is_returned_and_nothing_is_sent() {
        let hub = Arc::new(TopicHub::new());
        let dispatcher = BroadcastDispatcher::new(hub.clone(), BrokenCodec);
        let table_id = TableId::new();
        let mut rx = hub.subscribe(&table_topic(table_id));

        let result = dispatcher.publish(table_id, left("alice"));

        assert!(matches!(result, Err(ProtocolError::Encode(_))));
        assert!(rx.try_recv().is_err());
    }
}
