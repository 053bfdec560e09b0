//! Error taxonomy shared across the workspace.
//!
//! | Error | Raised by | Surfaced as |
//! |---|---|---|
//! | [`RemoteFault`] | command gateway, connection | notification + `Err` |
//! | [`PreconditionFailure`] | session controller, before any remote call | notification + `Err` |
//! | [`ConfigError`] | snapshot ingestion, parameter edits | notification + `Err` |
//! | [`SessionError`] | session controller (union of the above) | notification + `Err` |
//!
//! Frame decoding errors live next to the codec in `orinx-vision`.

use thiserror::Error;

use crate::session::RobotStatus;

/// Failure of a single request/response exchange with the bridge.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteFault {
    /// The request never got an answer: socket closed, send failed, or the
    /// response did not arrive in time.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The bridge answered and reported an error.
    #[error("{service} reported an error: {message}")]
    Remote { service: String, message: String },
}

/// An operation was refused locally, before any network round-trip.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreconditionFailure {
    #[error("no sensor is selected")]
    NoSensorSelected,

    #[error("unknown sensor id '{0}'")]
    UnknownSensorId(String),

    /// The same workflow is already waiting for the bridge.
    #[error("{0} is already in progress")]
    OperationInFlight(String),

    /// Drive commands other than `stop` need a running robot.
    #[error("robot is {0}; drive commands require it to be running")]
    NotRunning(RobotStatus),

    #[error("no reboot is pending")]
    NoRebootPending,
}

/// A configuration snapshot or parameter value failed validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("malformed configuration snapshot: {0}")]
    MalformedSnapshot(String),

    #[error("sensor '{sensor}': {details}")]
    InvalidSensor { sensor: String, details: String },

    #[error("parameter '{param}' has unknown type '{tag}'")]
    UnknownKind { param: String, tag: String },

    #[error("parameter '{param}': expected {expected} value, found {found}")]
    KindMismatch {
        param: String,
        expected: &'static str,
        found: String,
    },

    #[error("parameter '{param}': {value} is outside [{min}, {max}]")]
    OutOfRange {
        param: String,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("parameter '{param}': invalid range [{min}, {max}]")]
    InvalidRange { param: String, min: i64, max: i64 },

    #[error("parameter '{param}': '{value}' is not one of {options:?}")]
    NotAnOption {
        param: String,
        value: String,
        options: Vec<String>,
    },

    #[error("parameter '{param}': cannot read '{input}' as {expected}")]
    Unparseable {
        param: String,
        input: String,
        expected: &'static str,
    },

    #[error("unknown parameter '{param}'")]
    UnknownParameter { param: String },
}

/// Everything the session controller can report back to the operator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Precondition(#[from] PreconditionFailure),

    #[error(transparent)]
    Remote(#[from] RemoteFault),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Boot parameters were accepted by the bridge, but the follow-up reboot
    /// failed.  Retrying must only re-issue the reboot.
    #[error("parameters were applied but the reboot failed: {0}")]
    RebootFailed(RemoteFault),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reboot_failure_is_distinct_from_update_failure() {
        let fault = RemoteFault::Transport("connection closed".into());
        let update: SessionError = fault.clone().into();
        let reboot = SessionError::RebootFailed(fault);
        assert_ne!(update, reboot);
        assert!(reboot.to_string().contains("parameters were applied"));
    }

    #[test]
    fn precondition_display_names_the_problem() {
        let err = SessionError::from(PreconditionFailure::UnknownSensorId("lidar9".into()));
        assert!(err.to_string().contains("lidar9"));
        let err = PreconditionFailure::NotRunning(RobotStatus::Paused);
        assert!(err.to_string().contains("paused"));
    }

    #[test]
    fn remote_fault_names_the_service() {
        let fault = RemoteFault::Remote {
            service: "/reboot".into(),
            message: "busy".into(),
        };
        assert_eq!(fault.to_string(), "/reboot reported an error: busy");
    }
}
