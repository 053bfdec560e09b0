//! Trait seams between the rosbridge connection and its consumers.
//!
//! The gateway and the teleop channel never talk to a socket directly; they
//! are written against these traits so any transport (or a test double) can
//! stand behind them.
//!
//! - [`ServiceCaller`] – one request/response exchange.
//! - [`TopicPublisher`] – fire-and-forget outbound topic traffic.
//!
//! [`ConnectionHandle`][crate::connection::ConnectionHandle] implements both.

use async_trait::async_trait;
use orinx_types::RemoteFault;
use serde_json::Value;

use crate::connection::BridgeError;

/// Something that can run a rosbridge `call_service` exchange.
///
/// # Contract
///
/// * Exactly one attempt per call; no retries.
/// * `Ok(values)` carries the response's `values` object when the bridge
///   reported `result: true`.
/// * A closed socket, send failure or timeout is [`RemoteFault::Transport`];
///   a `result: false` response is [`RemoteFault::Remote`].
#[async_trait]
pub trait ServiceCaller: Send + Sync {
    async fn call_service(&self, service: &str, args: Value) -> Result<Value, RemoteFault>;
}

/// Something that can advertise and publish on outbound topics.
pub trait TopicPublisher: Send + Sync {
    /// Announce that this client will publish `msg_type` messages on `topic`.
    fn advertise(&self, topic: &str, msg_type: &str) -> Result<(), BridgeError>;

    /// Queue `msg` for publication on `topic`.
    fn publish(&self, topic: &str, msg: Value) -> Result<(), BridgeError>;
}
