//! Robot operation mode and run status.
//!
//! Both enums carry the integer codes the bridge expects in `/set_mode` and
//! `/set_status` requests.  The two axes are orthogonal: any mode can be
//! combined with any status.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the robot is being driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    /// Operator drives the robot directly.
    #[default]
    Manual,
    /// Robot follows its own plan.
    Autonomous,
    /// Diagnostic mode.
    Debugging,
}

impl OperationMode {
    /// Every mode, in wire-code order.
    pub const ALL: [OperationMode; 3] = [Self::Manual, Self::Autonomous, Self::Debugging];

    /// Integer code sent in the `mode` field of a `/set_mode` request.
    pub fn code(self) -> i64 {
        match self {
            Self::Manual => 0,
            Self::Autonomous => 1,
            Self::Debugging => 2,
        }
    }

    /// Inverse of [`code`][Self::code].
    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.code() == code)
    }
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::Autonomous => write!(f, "autonomous"),
            Self::Debugging => write!(f, "debugging"),
        }
    }
}

impl FromStr for OperationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "manual" | "0" => Ok(Self::Manual),
            "auto" | "autonomous" | "1" => Ok(Self::Autonomous),
            "debug" | "debugging" | "2" => Ok(Self::Debugging),
            other => Err(format!("unknown operation mode '{other}'")),
        }
    }
}

/// Run state of the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RobotStatus {
    #[default]
    Stopped,
    Running,
    Paused,
}

impl RobotStatus {
    /// Every status, in wire-code order.
    pub const ALL: [RobotStatus; 3] = [Self::Stopped, Self::Running, Self::Paused];

    /// Integer code sent in the `status` field of a `/set_status` request.
    pub fn code(self) -> i64 {
        match self {
            Self::Stopped => 0,
            Self::Running => 1,
            Self::Paused => 2,
        }
    }

    /// Inverse of [`code`][Self::code].
    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }
}

impl fmt::Display for RobotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
        }
    }
}

impl FromStr for RobotStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stop" | "stopped" | "0" => Ok(Self::Stopped),
            "run" | "running" | "start" | "1" => Ok(Self::Running),
            "pause" | "paused" | "2" => Ok(Self::Paused),
            other => Err(format!("unknown robot status '{other}'")),
        }
    }
}

/// The last state confirmed by the bridge.
///
/// Nothing in the workspace writes to this optimistically; it only changes
/// after a successful acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RobotSession {
    pub mode: OperationMode,
    pub status: RobotStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_session_is_stopped_manual() {
        let s = RobotSession::default();
        assert_eq!(s.mode, OperationMode::Manual);
        assert_eq!(s.status, RobotStatus::Stopped);
    }

    #[test]
    fn wire_codes_match_bridge_contract() {
        assert_eq!(OperationMode::Manual.code(), 0);
        assert_eq!(OperationMode::Autonomous.code(), 1);
        assert_eq!(OperationMode::Debugging.code(), 2);
        assert_eq!(RobotStatus::Stopped.code(), 0);
        assert_eq!(RobotStatus::Running.code(), 1);
        assert_eq!(RobotStatus::Paused.code(), 2);
        assert_eq!(RobotStatus::from_code(2), Some(RobotStatus::Paused));
        assert_eq!(OperationMode::from_code(7), None);
    }

    #[test]
    fn parse_accepts_short_aliases() {
        assert_eq!("auto".parse::<OperationMode>(), Ok(OperationMode::Autonomous));
        assert_eq!("DEBUG".parse::<OperationMode>(), Ok(OperationMode::Debugging));
        assert_eq!("start".parse::<RobotStatus>(), Ok(RobotStatus::Running));
        assert!("sideways".parse::<RobotStatus>().is_err());
    }
}
