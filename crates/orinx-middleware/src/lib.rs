//! `orinx-middleware` – rosbridge plumbing between the robot and the session.
//!
//! Routes JSON messages between a rosbridge v2 endpoint and the rest of the
//! workspace without owning any session state.
//!
//! # Modules
//!
//! - [`connection`] – explicitly owned WebSocket client: request/response
//!   correlation for service calls, topic subscriptions with RAII release.
//! - [`bus`] – per-topic broadcast fan-out of inbound `publish` messages.
//! - [`adapter`] – the trait seams ([`ServiceCaller`], [`TopicPublisher`])
//!   everything above the connection is written against.
//! - [`gateway`] – [`CommandGateway`], the robot's remote operations.
//! - [`frame_stream`] – throttled, latest-wins camera frame delivery.
//! - [`teleop`] – discrete drive commands on `/cmd_vel`.

pub mod adapter;
pub mod bus;
pub mod connection;
pub mod frame_stream;
pub mod gateway;
pub mod teleop;

pub use adapter::{ServiceCaller, TopicPublisher};
pub use bus::{TopicBus, TopicReceiver};
pub use connection::{BridgeError, ConnectionHandle, SubscriptionGuard, TopicSubscription};
pub use frame_stream::{FrameHandle, FrameStats, FrameStatus, FrameStream, FrameThrottle, StreamError};
pub use gateway::{CommandGateway, ParameterBatch, ServiceNames};
pub use teleop::Teleop;
