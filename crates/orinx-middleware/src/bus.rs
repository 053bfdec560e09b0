//! Per-topic fan-out of inbound `publish` messages.
//!
//! The connection's reader task hands every inbound `publish` to
//! [`TopicBus::publish`]; each subscription holds a [`TopicReceiver`] for its
//! topic.  Channels are [`tokio::sync::broadcast`] so a slow consumer never
//! blocks the reader: it lags and skips ahead instead.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{trace, warn};

/// Default per-topic channel capacity (messages buffered for a slow
/// subscriber before the oldest are dropped).
const DEFAULT_CAPACITY: usize = 64;

/// Topic-keyed broadcast channels.  Shared behind an `Arc` by the
/// connection and its subscriptions.
#[derive(Debug)]
pub struct TopicBus {
    capacity: usize,
    channels: RwLock<HashMap<String, broadcast::Sender<Arc<Value>>>>,
}

impl TopicBus {
    /// Create a bus whose topic channels each buffer `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Deliver `msg` to every receiver of `topic`.
    ///
    /// Returns the number of receivers handed the message.  `0` is normal:
    /// the bridge may still be flushing messages for a topic that was just
    /// released.  A topic whose last receiver is gone is dropped here.
    pub fn publish(&self, topic: &str, msg: Value) -> usize {
        let delivered = {
            let channels = self.channels.read();
            let Some(sender) = channels.get(topic) else {
                trace!(topic, "no subscribers, message dropped");
                return 0;
            };
            sender.send(Arc::new(msg)).unwrap_or(0)
        };
        if delivered == 0 {
            let mut channels = self.channels.write();
            if channels.get(topic).is_some_and(|s| s.receiver_count() == 0) {
                channels.remove(topic);
            }
        }
        delivered
    }

    /// Subscribe to `topic`, creating its channel on first use.
    pub fn subscribe(&self, topic: &str) -> TopicReceiver {
        let mut channels = self.channels.write();
        let sender = channels
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        TopicReceiver {
            topic: topic.to_string(),
            receiver: sender.subscribe(),
        }
    }

    /// Close every topic channel; pending receivers observe end-of-stream.
    pub fn close(&self) {
        self.channels.write().clear();
    }

    /// Number of topics with a live channel.
    pub fn topic_count(&self) -> usize {
        self.channels.read().len()
    }
}

impl Default for TopicBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Receiver
// ---------------------------------------------------------------------------

/// An async receiver bound to one topic.
///
/// Obtained via [`TopicBus::subscribe`].
#[derive(Debug)]
pub struct TopicReceiver {
    topic: String,
    receiver: broadcast::Receiver<Arc<Value>>,
}

impl TopicReceiver {
    /// Wait for the next message on this topic.
    ///
    /// Lag is logged and skipped.  Returns `None` once the bus has closed
    /// the topic and no further messages will arrive.
    pub async fn recv(&mut self) -> Option<Arc<Value>> {
        loop {
            match self.receiver.recv().await {
                Ok(msg) => return Some(msg),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(topic = %self.topic, lagged_by = n, "topic receiver lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}
