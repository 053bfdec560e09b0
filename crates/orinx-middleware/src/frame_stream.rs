//! Throttled, latest-wins camera frame delivery.
//!
//! [`FrameStream::subscribe`] opens a `sensor_msgs/msg/Image` subscription
//! and spawns a pump task that owns everything between the socket and the
//! display:
//!
//! ```text
//!  bridge ──publish──▶ TopicBus ──▶ pump ──decode──▶ watch slot ──▶ UI
//!                                    │
//!                              FrameThrottle
//! ```
//!
//! * At most one frame is delivered per `1 / max_rate_hz`.  Messages that
//!   arrive between deliveries replace each other; only the newest is
//!   decoded.  Nothing queues.
//! * Every message is checked on arrival.  One that is malformed or cannot
//!   be decoded is reported through [`FrameStatus`] and [`FrameStats`] and
//!   never displaces the newest usable message waiting for its slot.
//! * Pixel conversion runs on the blocking pool, not on a runtime worker.
//! * Readers only ever see complete frames: the pump publishes a finished
//!   `Arc<DecodedFrame>` with `watch::Sender::send_replace`.
//! * Dropping the [`FrameHandle`] aborts the pump, sends the rosbridge
//!   `unsubscribe` and frees the channel for a new subscription.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use orinx_vision::{DecodeError, DecodedFrame, ImageEncoding, decode, validate};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::bus::TopicReceiver;
use crate::connection::{BridgeError, ConnectionHandle, SubscriptionGuard};

/// ROS message type of camera topics.
pub const IMAGE_TYPE: &str = "sensor_msgs/msg/Image";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StreamError {
    #[error("channel '{0}' already has an active subscription")]
    AlreadySubscribed(String),

    #[error("frame rate must be a positive, finite number of frames per second (got {0})")]
    InvalidRate(f64),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// Health of a frame subscription, as of the most recent message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameStatus {
    /// Subscribed, nothing delivered yet.
    Idle,
    /// The last message decoded successfully.
    Live,
    /// The last message was well-formed but cannot be decoded.
    DecodeFailed(DecodeError),
    /// The last message was not a usable image message.
    Malformed(String),
}

/// Counters for one subscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub delivered: u64,
    /// Messages replaced by a newer one before their delivery slot.
    pub superseded: u64,
    pub decode_failed: u64,
    pub malformed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    delivered: AtomicU64,
    superseded: AtomicU64,
    decode_failed: AtomicU64,
    malformed: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> FrameStats {
        FrameStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            decode_failed: self.decode_failed.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
        }
    }
}

// ---------------------------------------------------------------------------
// Throttle
// ---------------------------------------------------------------------------

/// Minimum spacing between deliveries.
#[derive(Debug, Clone)]
pub struct FrameThrottle {
    period: Duration,
    last_delivery: Option<Instant>,
}

impl FrameThrottle {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last_delivery: None,
        }
    }

    /// Throttle for at most `max_rate_hz` deliveries per second, or `None`
    /// if the rate is not a positive finite number.
    pub fn from_rate(max_rate_hz: f64) -> Option<Self> {
        if !max_rate_hz.is_finite() || max_rate_hz <= 0.0 {
            return None;
        }
        Duration::try_from_secs_f64(1.0 / max_rate_hz).ok().map(Self::new)
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Earliest instant the next delivery may happen; `None` before the
    /// first delivery.
    pub fn ready_at(&self) -> Option<Instant> {
        self.last_delivery.map(|t| t + self.period)
    }

    pub fn is_open(&self, now: Instant) -> bool {
        self.ready_at().is_none_or(|at| now >= at)
    }

    pub fn record(&mut self, now: Instant) {
        self.last_delivery = Some(now);
    }
}

// ---------------------------------------------------------------------------
// FrameStream
// ---------------------------------------------------------------------------

/// Opens frame subscriptions on one connection, at most one per channel.
#[derive(Debug, Clone)]
pub struct FrameStream {
    conn: ConnectionHandle,
    active: Arc<Mutex<HashSet<String>>>,
}

impl FrameStream {
    pub fn new(conn: ConnectionHandle) -> Self {
        Self {
            conn,
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Subscribe to the image topic `channel`, delivering at most
    /// `max_rate_hz` frames per second.
    ///
    /// Must be called from within a Tokio runtime; the pump task is spawned
    /// onto it.
    ///
    /// # Errors
    ///
    /// - [`StreamError::InvalidRate`] – `max_rate_hz` is not positive and
    ///   finite.
    /// - [`StreamError::AlreadySubscribed`] – `channel` already has a live
    ///   [`FrameHandle`] from this stream.
    /// - [`StreamError::Bridge`] – the subscribe could not be sent.
    pub fn subscribe(&self, channel: &str, max_rate_hz: f64) -> Result<FrameHandle, StreamError> {
        let throttle = FrameThrottle::from_rate(max_rate_hz).ok_or(StreamError::InvalidRate(max_rate_hz))?;
        if !self.active.lock().insert(channel.to_string()) {
            return Err(StreamError::AlreadySubscribed(channel.to_string()));
        }

        let throttle_ms = u32::try_from(throttle.period().as_millis()).unwrap_or(u32::MAX);
        let subscription = match self.conn.subscribe(channel, IMAGE_TYPE, throttle_ms) {
            Ok(s) => s,
            Err(e) => {
                self.active.lock().remove(channel);
                return Err(e.into());
            }
        };
        let (receiver, guard) = subscription.into_parts();

        let (frame_tx, frame_rx) = watch::channel(None);
        let (status_tx, status_rx) = watch::channel(FrameStatus::Idle);
        let counters = Arc::new(Counters::default());
        let pump = Pump {
            channel: channel.to_string(),
            throttle,
            frames: frame_tx,
            status: status_tx,
            counters: Arc::clone(&counters),
        };
        let task = tokio::spawn(pump.run(receiver));
        info!(channel, max_rate_hz, "frame stream started");

        Ok(FrameHandle {
            channel: channel.to_string(),
            frames: frame_rx,
            status: status_rx,
            counters,
            task,
            active: Arc::clone(&self.active),
            _guard: guard,
        })
    }

    /// Release `handle`.  Equivalent to dropping it.
    pub fn unsubscribe(&self, handle: FrameHandle) {
        drop(handle);
    }

    /// `true` while `channel` has a live [`FrameHandle`].
    pub fn is_active(&self, channel: &str) -> bool {
        self.active.lock().contains(channel)
    }
}

/// Owner of one frame subscription.
///
/// Dropping it stops delivery and releases the channel.
#[derive(Debug)]
pub struct FrameHandle {
    channel: String,
    frames: watch::Receiver<Option<Arc<DecodedFrame>>>,
    status: watch::Receiver<FrameStatus>,
    counters: Arc<Counters>,
    task: JoinHandle<()>,
    active: Arc<Mutex<HashSet<String>>>,
    _guard: SubscriptionGuard,
}

impl FrameHandle {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// The most recently delivered frame, if any.
    pub fn latest(&self) -> Option<Arc<DecodedFrame>> {
        self.frames.borrow().clone()
    }

    /// A receiver that wakes on every delivered frame.
    pub fn frames(&self) -> watch::Receiver<Option<Arc<DecodedFrame>>> {
        self.frames.clone()
    }

    /// A receiver that wakes whenever the status changes.
    pub fn status(&self) -> watch::Receiver<FrameStatus> {
        self.status.clone()
    }

    pub fn current_status(&self) -> FrameStatus {
        self.status.borrow().clone()
    }

    pub fn stats(&self) -> FrameStats {
        self.counters.snapshot()
    }
}

impl Drop for FrameHandle {
    fn drop(&mut self) {
        self.task.abort();
        self.active.lock().remove(&self.channel);
        debug!(channel = %self.channel, "frame stream released");
    }
}

// ---------------------------------------------------------------------------
// Pump
// ---------------------------------------------------------------------------

struct Pump {
    channel: String,
    throttle: FrameThrottle,
    frames: watch::Sender<Option<Arc<DecodedFrame>>>,
    status: watch::Sender<FrameStatus>,
    counters: Arc<Counters>,
}

impl Pump {
    async fn run(mut self, mut receiver: TopicReceiver) {
        let mut pending: Option<ImageMessage> = None;
        loop {
            let deadline = self.throttle.ready_at().unwrap_or_else(Instant::now);
            tokio::select! {
                biased;
                _ = sleep_until(deadline), if pending.is_some() => {
                    if let Some(image) = pending.take() {
                        self.throttle.record(Instant::now());
                        self.deliver(image).await;
                    }
                }
                next = receiver.recv() => match next {
                    Some(msg) => match ImageMessage::parse(&msg) {
                        Ok(image) => {
                            if pending.replace(image).is_some() {
                                Counters::bump(&self.counters.superseded);
                            }
                        }
                        Err(rejection) => self.reject(rejection),
                    },
                    None => {
                        debug!(channel = %self.channel, "image stream ended");
                        break;
                    }
                },
            }
        }
    }

    async fn deliver(&self, image: ImageMessage) {
        match tokio::task::spawn_blocking(move || image.to_frame()).await {
            Ok(Ok(frame)) => {
                Counters::bump(&self.counters.delivered);
                self.frames.send_replace(Some(Arc::new(frame)));
                self.status.send_if_modified(|status| {
                    let changed = *status != FrameStatus::Live;
                    *status = FrameStatus::Live;
                    changed
                });
            }
            Ok(Err(e)) => self.reject(Rejection::Undecodable(e)),
            Err(e) => warn!(channel = %self.channel, error = %e, "decode task did not finish"),
        }
    }

    fn reject(&self, rejection: Rejection) {
        match rejection {
            Rejection::Malformed(reason) => {
                Counters::bump(&self.counters.malformed);
                warn!(channel = %self.channel, reason = %reason, "malformed image message");
                self.status.send_replace(FrameStatus::Malformed(reason));
            }
            Rejection::Undecodable(e) => {
                Counters::bump(&self.counters.decode_failed);
                warn!(channel = %self.channel, error = %e, "undecodable image message");
                self.status.send_replace(FrameStatus::DecodeFailed(e));
            }
        }
    }
}

/// Why an inbound message was not kept for delivery.
enum Rejection {
    Malformed(String),
    Undecodable(DecodeError),
}

/// A `sensor_msgs/msg/Image` payload that has passed every check short of
/// pixel conversion.
struct ImageMessage {
    encoding: ImageEncoding,
    data: Vec<u8>,
    width: u32,
    height: u32,
    stride: Option<usize>,
}

#[derive(Deserialize)]
struct RawImage<'a> {
    encoding: &'a str,
    data: &'a str,
    width: u32,
    height: u32,
    #[serde(default)]
    step: u32,
}

impl ImageMessage {
    /// Unsupported encodings are rejected before the pixel data is touched.
    fn parse(msg: &Value) -> Result<Self, Rejection> {
        let raw = RawImage::deserialize(msg).map_err(|e| Rejection::Malformed(e.to_string()))?;
        let encoding = ImageEncoding::from_tag(raw.encoding);
        if let ImageEncoding::Unknown(tag) = &encoding {
            return Err(Rejection::Undecodable(DecodeError::UnsupportedEncoding(tag.clone())));
        }
        let data = BASE64
            .decode(raw.data)
            .map_err(|e| Rejection::Malformed(format!("invalid base64 pixel data: {e}")))?;
        let stride = (raw.step > 0).then_some(raw.step as usize);
        validate(&encoding, data.len(), raw.width, raw.height, stride).map_err(Rejection::Undecodable)?;
        Ok(Self {
            encoding,
            data,
            width: raw.width,
            height: raw.height,
            stride,
        })
    }

    fn to_frame(&self) -> Result<DecodedFrame, DecodeError> {
        decode(&self.encoding, &self.data, self.width, self.height, self.stride)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Loopback;
    use serde_json::json;

    const COLOR: &str = "/camera/color/image_raw";

    fn stream() -> (FrameStream, ConnectionHandle, Loopback) {
        let (conn, far) = ConnectionHandle::loopback(Duration::from_secs(1));
        (FrameStream::new(conn.clone()), conn, far)
    }

    /// A 1×1 `rgb8` image whose pixel is `(level, level, level)`.
    fn rgb_pixel(topic: &str, level: u8) -> Value {
        json!({
            "op": "publish",
            "topic": topic,
            "msg": {
                "encoding": "rgb8",
                "width": 1,
                "height": 1,
                "step": 3,
                "data": BASE64.encode([level, level, level]),
            },
        })
    }

    async fn next_change<T>(rx: &mut watch::Receiver<T>) {
        tokio::time::timeout(Duration::from_secs(1), rx.changed())
            .await
            .expect("no change within a second")
            .expect("sender dropped");
    }

    #[test]
    fn throttle_rejects_non_positive_rates() {
        for rate in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            assert!(FrameThrottle::from_rate(rate).is_none(), "rate {rate}");
        }
        assert_eq!(
            FrameThrottle::from_rate(10.0).unwrap().period(),
            Duration::from_millis(100)
        );
    }

    #[test]
    fn throttle_opens_after_one_period() {
        let start = Instant::now();
        let mut throttle = FrameThrottle::new(Duration::from_millis(100));
        assert!(throttle.is_open(start));
        throttle.record(start);
        assert!(!throttle.is_open(start + Duration::from_millis(99)));
        assert!(throttle.is_open(start + Duration::from_millis(100)));
    }

    #[tokio::test]
    async fn invalid_rate_is_rejected_before_subscribing() {
        let (frames, _conn, mut far) = stream();
        assert!(matches!(frames.subscribe(COLOR, 0.0), Err(StreamError::InvalidRate(_))));
        assert!(matches!(frames.subscribe(COLOR, f64::NAN), Err(StreamError::InvalidRate(_))));
        assert!(far.drain().is_empty());
        assert!(!frames.is_active(COLOR));
    }

    #[tokio::test]
    async fn one_subscription_per_channel_until_released() {
        let (frames, _conn, mut far) = stream();
        let handle = frames.subscribe(COLOR, 10.0).unwrap();
        assert_eq!(
            frames.subscribe(COLOR, 5.0).unwrap_err(),
            StreamError::AlreadySubscribed(COLOR.into())
        );
        let depth = frames.subscribe("/camera/depth/image_raw", 5.0).unwrap();

        frames.unsubscribe(handle);
        assert!(!frames.is_active(COLOR));
        assert!(frames.is_active(depth.channel()));

        let sent = far.drain();
        let ops: Vec<&str> = sent.iter().filter_map(|f| f["op"].as_str()).collect();
        assert_eq!(ops, vec!["subscribe", "subscribe", "unsubscribe"]);
        assert_eq!(sent[0]["throttle_rate"], 100);
        assert_eq!(sent[2]["id"], sent[0]["id"]);

        let again = frames.subscribe(COLOR, 10.0);
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn decoded_frames_reach_the_slot() {
        let (frames, conn, _far) = stream();
        let handle = frames.subscribe(COLOR, 100.0).unwrap();
        let mut rx = handle.frames();

        conn.inject(&rgb_pixel(COLOR, 42));
        next_change(&mut rx).await;

        let frame = handle.latest().unwrap();
        assert_eq!(frame.pixel(0, 0), Some([42, 42, 42, 255]));
        assert_eq!(handle.current_status(), FrameStatus::Live);
        assert_eq!(handle.stats().delivered, 1);
    }

    #[tokio::test]
    async fn bad_messages_keep_the_previous_frame() {
        let (frames, conn, _far) = stream();
        let handle = frames.subscribe(COLOR, 1000.0).unwrap();
        let mut frame_rx = handle.frames();
        let mut status_rx = handle.status();

        conn.inject(&rgb_pixel(COLOR, 7));
        next_change(&mut frame_rx).await;
        status_rx.borrow_and_update();

        conn.inject(&json!({ "op": "publish", "topic": COLOR, "msg": { "encoding": "rgb8" } }));
        next_change(&mut status_rx).await;
        assert!(matches!(*status_rx.borrow_and_update(), FrameStatus::Malformed(_)));

        conn.inject(&json!({
            "op": "publish",
            "topic": COLOR,
            "msg": { "encoding": "bgr8", "width": 1, "height": 1, "data": BASE64.encode([1u8, 2, 3]) },
        }));
        next_change(&mut status_rx).await;
        assert_eq!(
            *status_rx.borrow_and_update(),
            FrameStatus::DecodeFailed(DecodeError::UnsupportedEncoding("bgr8".into()))
        );

        conn.inject(&json!({
            "op": "publish",
            "topic": COLOR,
            "msg": { "encoding": "rgb8", "width": 2, "height": 2, "data": BASE64.encode([0u8; 5]) },
        }));
        next_change(&mut status_rx).await;
        assert!(matches!(
            *status_rx.borrow_and_update(),
            FrameStatus::DecodeFailed(DecodeError::Truncated { needed: 12, available: 5 })
        ));

        assert_eq!(handle.latest().unwrap().pixel(0, 0), Some([7, 7, 7, 255]));
        let stats = handle.stats();
        assert_eq!((stats.delivered, stats.malformed, stats.decode_failed), (1, 1, 2));
    }

    #[tokio::test(start_paused = true)]
    async fn ten_hertz_limit_holds_under_a_hundred_messages_per_second() {
        let (frames, conn, _far) = stream();
        let handle = frames.subscribe(COLOR, 10.0).unwrap();

        for level in 0..100u8 {
            if level > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            conn.inject(&rgb_pixel(COLOR, level));
        }
        // 990 ms have elapsed since the first message.
        let stats = handle.stats();
        assert!(stats.delivered <= 10, "delivered {} frames", stats.delivered);
        assert!(stats.superseded >= 80, "superseded {}", stats.superseded);

        // The last message is delivered at the next slot, not lost.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.latest().unwrap().pixel(0, 0), Some([99, 99, 99, 255]));
    }

    #[tokio::test]
    async fn stride_from_step_is_honoured() {
        let (frames, conn, _far) = stream();
        let handle = frames.subscribe(COLOR, 100.0).unwrap();
        let mut rx = handle.frames();

        conn.inject(&json!({
            "op": "publish",
            "topic": COLOR,
            "msg": {
                "encoding": "16UC1",
                "width": 1,
                "height": 2,
                "step": 4,
                "data": BASE64.encode([0x80u8, 0x00, 0xEE, 0xEE, 0x10, 0x00, 0xEE, 0xEE]),
            },
        }));
        next_change(&mut rx).await;

        let frame = handle.latest().unwrap();
        assert_eq!(frame.pixel(0, 0), Some([0x80, 0x80, 0x80, 255]));
        assert_eq!(frame.pixel(0, 1), Some([0x10, 0x10, 0x10, 255]));
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_arrivals_do_not_displace_the_waiting_frame() {
        let (frames, conn, _far) = stream();
        let handle = frames.subscribe(COLOR, 10.0).unwrap();

        conn.inject(&rgb_pixel(COLOR, 5));
        tokio::time::sleep(Duration::from_millis(10)).await;
        conn.inject(&rgb_pixel(COLOR, 9));
        tokio::time::sleep(Duration::from_millis(10)).await;
        conn.inject(&json!({ "op": "publish", "topic": COLOR, "msg": { "encoding": "rgb8" } }));
        conn.inject(&json!({
            "op": "publish",
            "topic": COLOR,
            "msg": { "encoding": "rgb8", "width": 4, "height": 4, "data": BASE64.encode([1u8; 3]) },
        }));
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(handle.latest().unwrap().pixel(0, 0), Some([9, 9, 9, 255]));
        let stats = handle.stats();
        assert_eq!(
            (stats.delivered, stats.superseded, stats.malformed, stats.decode_failed),
            (2, 0, 1, 1)
        );
        assert_eq!(handle.current_status(), FrameStatus::Live);
    }

    #[tokio::test]
    async fn unsupported_encoding_is_reported_before_the_payload_is_read() {
        let (frames, conn, _far) = stream();
        let handle = frames.subscribe(COLOR, 100.0).unwrap();
        let mut status_rx = handle.status();

        conn.inject(&json!({
            "op": "publish",
            "topic": COLOR,
            "msg": { "encoding": "yuv422", "width": 1, "height": 1, "data": "not base64!" },
        }));
        next_change(&mut status_rx).await;
        assert_eq!(
            *status_rx.borrow_and_update(),
            FrameStatus::DecodeFailed(DecodeError::UnsupportedEncoding("yuv422".into()))
        );
        let stats = handle.stats();
        assert_eq!((stats.decode_failed, stats.malformed), (1, 0));
        assert!(handle.latest().is_none());
    }
}
