//! Discrete drive commands and the `geometry_msgs/msg/Twist` they map to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Linear speed used by every translating command (m/s).
pub const LINEAR_SPEED: f64 = 0.5;

/// Angular speed used by both turn commands (rad/s).
pub const ANGULAR_SPEED: f64 = 1.0;

/// One press of a control-panel button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveCommand {
    Forward,
    Backward,
    Left,
    Right,
    TurnLeft,
    TurnRight,
    Stop,
}

impl DriveCommand {
    pub fn is_stop(self) -> bool {
        matches!(self, Self::Stop)
    }
}

impl fmt::Display for DriveCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
            Self::Left => "left",
            Self::Right => "right",
            Self::TurnLeft => "turn_left",
            Self::TurnRight => "turn_right",
            Self::Stop => "stop",
        };
        f.write_str(s)
    }
}

impl FromStr for DriveCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "forward" | "fwd" => Ok(Self::Forward),
            "backward" | "back" => Ok(Self::Backward),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "turn_left" => Ok(Self::TurnLeft),
            "turn_right" => Ok(Self::TurnRight),
            "stop" => Ok(Self::Stop),
            other => Err(format!("unknown drive command '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Velocity command published on `/cmd_vel`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Twist {
    pub linear: Vector3,
    pub angular: Vector3,
}

impl From<DriveCommand> for Twist {
    fn from(cmd: DriveCommand) -> Self {
        let mut twist = Twist::default();
        match cmd {
            DriveCommand::Forward => twist.linear.x = LINEAR_SPEED,
            DriveCommand::Backward => twist.linear.x = -LINEAR_SPEED,
            DriveCommand::Left => twist.linear.y = LINEAR_SPEED,
            DriveCommand::Right => twist.linear.y = -LINEAR_SPEED,
            DriveCommand::TurnLeft => twist.angular.z = ANGULAR_SPEED,
            DriveCommand::TurnRight => twist.angular.z = -ANGULAR_SPEED,
            DriveCommand::Stop => {}
        }
        twist
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_zeroes_both_vectors() {
        assert_eq!(Twist::from(DriveCommand::Stop), Twist::default());
    }

    #[test]
    fn directional_commands_use_fixed_speeds() {
        let t = Twist::from(DriveCommand::Backward);
        assert!((t.linear.x + LINEAR_SPEED).abs() < f64::EPSILON);
        assert_eq!(t.angular, Vector3::default());

        let t = Twist::from(DriveCommand::Left);
        assert!((t.linear.y - LINEAR_SPEED).abs() < f64::EPSILON);

        let t = Twist::from(DriveCommand::TurnRight);
        assert!((t.angular.z + ANGULAR_SPEED).abs() < f64::EPSILON);
        assert_eq!(t.linear, Vector3::default());
    }

    #[test]
    fn twist_serializes_as_geometry_msg() {
        let json = serde_json::to_value(Twist::from(DriveCommand::Forward)).unwrap();
        assert_eq!(json["linear"]["x"], 0.5);
        assert_eq!(json["angular"]["z"], 0.0);
    }

    #[test]
    fn display_and_parse_agree() {
        for cmd in [
            DriveCommand::Forward,
            DriveCommand::Backward,
            DriveCommand::Left,
            DriveCommand::Right,
            DriveCommand::TurnLeft,
            DriveCommand::TurnRight,
            DriveCommand::Stop,
        ] {
            assert_eq!(cmd.to_string().parse::<DriveCommand>(), Ok(cmd));
        }
    }
}
