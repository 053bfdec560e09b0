//! Explicitly owned rosbridge v2 client.
//!
//! A [`ConnectionHandle`] is created with [`ConnectionHandle::connect`] (one
//! attempt, no automatic reconnect), cloned into whatever needs it, and
//! closed by its owner.  There is no process-wide connection.
//!
//! Two background tasks serve each connection:
//!
//! | Task | Job |
//! |---|---|
//! | writer | drains the outbound queue into the socket |
//! | reader | routes `publish` to the [`TopicBus`], resolves `service_response` against pending calls, logs `status` |
//!
//! When either side of the socket goes away every pending call resolves to
//! [`RemoteFault::Transport`] and every topic receiver sees end-of-stream.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use orinx_types::RemoteFault;
use parking_lot::Mutex;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::adapter::{ServiceCaller, TopicPublisher};
use crate::bus::{TopicBus, TopicReceiver};

/// Transport-level failures of the rosbridge client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("could not connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("connection to the bridge is closed")]
    Closed,

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<BridgeError> for RemoteFault {
    fn from(e: BridgeError) -> Self {
        RemoteFault::Transport(e.to_string())
    }
}

type Reply = Result<Value, RemoteFault>;

enum Outbound {
    Frame(String),
    Close,
}

// ---------------------------------------------------------------------------
// State shared with the background tasks
// ---------------------------------------------------------------------------

struct Shared {
    bus: TopicBus,
    pending: Mutex<HashMap<String, oneshot::Sender<Reply>>>,
    closed: AtomicBool,
}

impl Shared {
    fn new() -> Self {
        Self {
            bus: TopicBus::default(),
            pending: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Mark the connection closed and fail everything still waiting on it.
    fn shut_down(&self, reason: &str) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!(reason, "bridge connection closed");
        }
        let pending: Vec<_> = self.pending.lock().drain().collect();
        for (id, tx) in pending {
            debug!(id = %id, "failing pending call");
            let _ = tx.send(Err(RemoteFault::Transport(reason.to_string())));
        }
        self.bus.close();
    }

    /// Route one inbound text frame.
    fn dispatch(&self, text: &str) {
        let mut msg: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "ignoring non-JSON frame from bridge");
                return;
            }
        };

        match msg.get("op").and_then(Value::as_str) {
            Some("publish") => {
                let Some(topic) = msg.get("topic").and_then(Value::as_str).map(str::to_string)
                else {
                    warn!("publish frame without a topic");
                    return;
                };
                let payload = msg.get_mut("msg").map(Value::take).unwrap_or(Value::Null);
                self.bus.publish(&topic, payload);
            }
            Some("service_response") => self.resolve(&msg),
            Some("status") => {
                let level = msg.get("level").and_then(Value::as_str).unwrap_or("info");
                let text = msg.get("msg").and_then(Value::as_str).unwrap_or_default();
                match level {
                    "error" => error!(bridge_status = text, "bridge reported an error"),
                    "warning" => warn!(bridge_status = text, "bridge reported a warning"),
                    _ => info!(bridge_status = text, "bridge status"),
                }
            }
            other => debug!(op = ?other, "ignoring bridge frame"),
        }
    }

    fn resolve(&self, msg: &Value) {
        let Some(id) = msg.get("id").and_then(Value::as_str) else {
            warn!("service_response without an id");
            return;
        };
        let Some(tx) = self.pending.lock().remove(id) else {
            debug!(id, "late or unknown service_response dropped");
            return;
        };

        let service = msg
            .get("service")
            .and_then(Value::as_str)
            .or_else(|| id.split(':').nth(1))
            .unwrap_or_default()
            .to_string();
        let values = msg.get("values").cloned().unwrap_or(Value::Null);

        let reply = if msg.get("result").and_then(Value::as_bool) == Some(false) {
            let message = match values {
                Value::String(s) => s,
                Value::Null => "request failed".to_string(),
                other => other.to_string(),
            };
            Err(RemoteFault::Remote { service, message })
        } else {
            Ok(values)
        };
        let _ = tx.send(reply);
    }
}

// ---------------------------------------------------------------------------
// ConnectionHandle
// ---------------------------------------------------------------------------

struct Inner {
    url: String,
    outbound: mpsc::UnboundedSender<Outbound>,
    shared: Arc<Shared>,
    request_timeout: Duration,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
        self.shared.shut_down("connection dropped");
    }
}

/// Cheaply cloneable handle to one rosbridge connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("url", &self.inner.url)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl ConnectionHandle {
    /// Open a WebSocket to the bridge at `url`.
    ///
    /// `request_timeout` bounds both the handshake and every later service
    /// call made through this handle.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Connect`] if the handshake fails or does not
    /// finish in time.  No retry is attempted.
    pub async fn connect(url: &str, request_timeout: Duration) -> Result<Self, BridgeError> {
        let connect_err = |reason: String| BridgeError::Connect {
            url: url.to_string(),
            reason,
        };
        let (ws, _response) = tokio::time::timeout(request_timeout, connect_async(url))
            .await
            .map_err(|_| connect_err(format!("timed out after {} ms", request_timeout.as_millis())))?
            .map_err(|e| connect_err(e.to_string()))?;
        info!(url, "connected to bridge");

        let (mut ws_tx, mut ws_rx) = ws.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Outbound>();
        let shared = Arc::new(Shared::new());

        let writer_shared = Arc::clone(&shared);
        let writer = tokio::spawn(async move {
            while let Some(out) = outbound_rx.recv().await {
                match out {
                    Outbound::Frame(text) => {
                        if let Err(e) = ws_tx.send(Message::Text(text.into())).await {
                            warn!(error = %e, "bridge write failed");
                            break;
                        }
                    }
                    Outbound::Close => {
                        let _ = ws_tx.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
            writer_shared.shut_down("connection closed");
        });

        let reader_shared = Arc::clone(&shared);
        let reader = tokio::spawn(async move {
            while let Some(frame) = ws_rx.next().await {
                match frame {
                    Ok(Message::Text(text)) => reader_shared.dispatch(text.as_str()),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "bridge read failed");
                        break;
                    }
                }
            }
            reader_shared.shut_down("connection closed by bridge");
        });

        Ok(Self {
            inner: Arc::new(Inner {
                url: url.to_string(),
                outbound,
                shared,
                request_timeout,
                tasks: Mutex::new(vec![writer, reader]),
            }),
        })
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn request_timeout(&self) -> Duration {
        self.inner.request_timeout
    }

    pub fn is_closed(&self) -> bool {
        self.inner.shared.is_closed()
    }

    /// Close the socket.  Pending calls fail with a transport fault; later
    /// calls fail immediately.
    pub fn close(&self) {
        let _ = self.inner.outbound.send(Outbound::Close);
        self.inner.shared.shut_down("connection closed by client");
    }

    /// Run one `call_service` exchange.
    ///
    /// # Errors
    ///
    /// - [`RemoteFault::Transport`] – closed connection, send failure, or no
    ///   response within the request timeout.
    /// - [`RemoteFault::Remote`] – the bridge answered with `result: false`.
    pub async fn call_service(&self, service: &str, args: Value) -> Result<Value, RemoteFault> {
        let shared = &self.inner.shared;
        let id = format!("call_service:{service}:{}", Uuid::new_v4());
        let (tx, rx) = oneshot::channel();
        shared.pending.lock().insert(id.clone(), tx);

        let frame = json!({
            "op": "call_service",
            "id": id,
            "service": service,
            "args": args,
        });
        if let Err(e) = self.send_frame(&frame) {
            shared.pending.lock().remove(&id);
            return Err(e.into());
        }
        debug!(service, id = %id, "service call sent");

        match tokio::time::timeout(self.inner.request_timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(RemoteFault::Transport(
                "connection closed before a response arrived".to_string(),
            )),
            Err(_) => {
                shared.pending.lock().remove(&id);
                warn!(service, id = %id, "service call timed out");
                Err(RemoteFault::Transport(format!(
                    "{service} did not respond within {} ms",
                    self.inner.request_timeout.as_millis()
                )))
            }
        }
    }

    /// Subscribe to `topic` on the bridge.
    ///
    /// The bridge is asked to throttle to `throttle_rate_ms` with a queue of
    /// one, so it drops stale messages on its side too.  Dropping the
    /// returned subscription's guard sends the matching `unsubscribe`.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Closed`] if the connection is already closed.
    pub fn subscribe(
        &self,
        topic: &str,
        msg_type: &str,
        throttle_rate_ms: u32,
    ) -> Result<TopicSubscription, BridgeError> {
        let receiver = self.inner.shared.bus.subscribe(topic);
        let id = format!("subscribe:{topic}:{}", Uuid::new_v4());
        self.send_frame(&json!({
            "op": "subscribe",
            "id": id,
            "topic": topic,
            "type": msg_type,
            "throttle_rate": throttle_rate_ms,
            "queue_length": 1,
        }))?;
        info!(topic, msg_type, throttle_rate_ms, "subscribed");

        Ok(TopicSubscription {
            receiver,
            guard: SubscriptionGuard {
                id,
                topic: topic.to_string(),
                outbound: self.inner.outbound.clone(),
            },
        })
    }

    fn send_frame(&self, frame: &Value) -> Result<(), BridgeError> {
        if self.is_closed() {
            return Err(BridgeError::Closed);
        }
        let text = serde_json::to_string(frame).map_err(|e| BridgeError::Serialization(e.to_string()))?;
        self.inner
            .outbound
            .send(Outbound::Frame(text))
            .map_err(|_| BridgeError::Closed)
    }
}

#[async_trait]
impl ServiceCaller for ConnectionHandle {
    async fn call_service(&self, service: &str, args: Value) -> Result<Value, RemoteFault> {
        ConnectionHandle::call_service(self, service, args).await
    }
}

impl TopicPublisher for ConnectionHandle {
    fn advertise(&self, topic: &str, msg_type: &str) -> Result<(), BridgeError> {
        self.send_frame(&json!({ "op": "advertise", "topic": topic, "type": msg_type }))?;
        debug!(topic, msg_type, "advertised");
        Ok(())
    }

    fn publish(&self, topic: &str, msg: Value) -> Result<(), BridgeError> {
        self.send_frame(&json!({ "op": "publish", "topic": topic, "msg": msg }))
    }
}

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

/// A live topic subscription: the message receiver plus the guard that
/// releases it on the bridge.
#[derive(Debug)]
pub struct TopicSubscription {
    receiver: TopicReceiver,
    guard: SubscriptionGuard,
}

impl TopicSubscription {
    /// Wait for the next message; `None` once the connection is gone.
    pub async fn recv(&mut self) -> Option<Arc<Value>> {
        self.receiver.recv().await
    }

    /// Split so the receiver can move into a task while the guard stays with
    /// the owner.
    pub fn into_parts(self) -> (TopicReceiver, SubscriptionGuard) {
        (self.receiver, self.guard)
    }
}

/// Sends the rosbridge `unsubscribe` for its subscription when dropped.
pub struct SubscriptionGuard {
    id: String,
    topic: String,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl SubscriptionGuard {
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl std::fmt::Debug for SubscriptionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionGuard")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .finish()
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        let frame = json!({ "op": "unsubscribe", "id": self.id, "topic": self.topic });
        if let Ok(text) = serde_json::to_string(&frame)
            && self.outbound.send(Outbound::Frame(text)).is_ok()
        {
            info!(topic = %self.topic, "unsubscribed");
        }
    }
}

// ---------------------------------------------------------------------------
// In-process loopback for unit tests
// ---------------------------------------------------------------------------

/// The far end of a socket-less connection: reads what the handle sent.
#[cfg(test)]
pub(crate) struct Loopback {
    outbound: mpsc::UnboundedReceiver<Outbound>,
}

#[cfg(test)]
impl Loopback {
    /// Next outbound frame already queued, if any.
    pub(crate) fn try_next(&mut self) -> Option<Value> {
        loop {
            match self.outbound.try_recv().ok()? {
                Outbound::Frame(text) => return serde_json::from_str(&text).ok(),
                Outbound::Close => continue,
            }
        }
    }

    /// Every outbound frame queued so far.
    pub(crate) fn drain(&mut self) -> Vec<Value> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}

#[cfg(test)]
impl ConnectionHandle {
    /// A handle with no socket behind it.
    pub(crate) fn loopback(request_timeout: Duration) -> (Self, Loopback) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let handle = Self {
            inner: Arc::new(Inner {
                url: "loopback".to_string(),
                outbound,
                shared: Arc::new(Shared::new()),
                request_timeout,
                tasks: Mutex::new(Vec::new()),
            }),
        };
        (handle, Loopback { outbound: rx })
    }

    /// Feed `frame` through the inbound dispatcher as if the bridge sent it.
    pub(crate) fn inject(&self, frame: &Value) {
        self.inner.shared.dispatch(&frame.to_string());
    }
}
