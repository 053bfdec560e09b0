//! Discrete drive commands on the velocity topic.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use orinx_types::{DriveCommand, Twist};
use tracing::debug;

use crate::adapter::TopicPublisher;
use crate::connection::BridgeError;

/// ROS message type of the velocity topic.
pub const TWIST_TYPE: &str = "geometry_msgs/msg/Twist";

/// Publishes [`DriveCommand`]s as `geometry_msgs/msg/Twist` messages.
///
/// The topic is advertised on first use.
pub struct Teleop {
    publisher: Arc<dyn TopicPublisher>,
    topic: String,
    advertised: AtomicBool,
}

impl Teleop {
    pub fn new(publisher: Arc<dyn TopicPublisher>, topic: impl Into<String>) -> Self {
        Self {
            publisher,
            topic: topic.into(),
            advertised: AtomicBool::new(false),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish the velocity for `cmd` and return it.
    ///
    /// # Errors
    ///
    /// [`BridgeError`] if the advertise or publish could not be queued.
    pub fn send(&self, cmd: DriveCommand) -> Result<Twist, BridgeError> {
        if !self.advertised.swap(true, Ordering::AcqRel)
            && let Err(e) = self.publisher.advertise(&self.topic, TWIST_TYPE)
        {
            self.advertised.store(false, Ordering::Release);
            return Err(e);
        }

        let twist = Twist::from(cmd);
        let msg = serde_json::to_value(twist).map_err(|e| BridgeError::Serialization(e.to_string()))?;
        self.publisher.publish(&self.topic, msg)?;
        debug!(topic = %self.topic, command = %cmd, "drive command published");
        Ok(twist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::{Value, json};

    #[derive(Default)]
    struct RecordingPublisher {
        frames: Mutex<Vec<(String, String, Value)>>,
        fail: AtomicBool,
    }

    impl TopicPublisher for RecordingPublisher {
        fn advertise(&self, topic: &str, msg_type: &str) -> Result<(), BridgeError> {
            if self.fail.load(Ordering::Acquire) {
                return Err(BridgeError::Closed);
            }
            self.frames
                .lock()
                .push(("advertise".to_string(), topic.to_string(), json!(msg_type)));
            Ok(())
        }

        fn publish(&self, topic: &str, msg: Value) -> Result<(), BridgeError> {
            if self.fail.load(Ordering::Acquire) {
                return Err(BridgeError::Closed);
            }
            self.frames.lock().push(("publish".to_string(), topic.to_string(), msg));
            Ok(())
        }
    }

    #[test]
    fn advertises_once_then_publishes_twists() {
        let publisher = Arc::new(RecordingPublisher::default());
        let teleop = Teleop::new(publisher.clone(), "/cmd_vel");
        teleop.send(DriveCommand::Forward).unwrap();
        teleop.send(DriveCommand::TurnLeft).unwrap();

        let frames = publisher.frames.lock();
        assert_eq!(frames.len(), 3);
        assert_eq!(
            frames[0],
            ("advertise".to_string(), "/cmd_vel".to_string(), json!(TWIST_TYPE))
        );
        assert_eq!(frames[1].2["linear"]["x"], 0.5);
        assert_eq!(frames[2].2["angular"]["z"], 1.0);
    }

    #[test]
    fn failed_advertise_is_retried_on_next_send() {
        let publisher = Arc::new(RecordingPublisher::default());
        publisher.fail.store(true, Ordering::Release);
        let teleop = Teleop::new(publisher.clone(), "/cmd_vel");
        assert_eq!(teleop.send(DriveCommand::Stop), Err(BridgeError::Closed));

        publisher.fail.store(false, Ordering::Release);
        assert_eq!(teleop.send(DriveCommand::Stop), Ok(Twist::default()));
        assert_eq!(publisher.frames.lock()[0].0, "advertise");
    }

    #[test]
    fn works_over_a_loopback_connection() {
        let (conn, mut far) = crate::connection::ConnectionHandle::loopback(std::time::Duration::from_secs(1));
        let teleop = Teleop::new(Arc::new(conn), "/cmd_vel");
        teleop.send(DriveCommand::Right).unwrap();

        let frames = far.drain();
        assert_eq!(frames[0]["op"], "advertise");
        assert_eq!(frames[0]["type"], TWIST_TYPE);
        assert_eq!(frames[1]["op"], "publish");
        assert_eq!(frames[1]["msg"]["linear"]["y"], -0.5);
    }
}
