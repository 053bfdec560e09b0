//! `orinx-types` – shared vocabulary of the Orinx robot-session core.
//!
//! Every other crate in the workspace speaks in terms of these types:
//!
//! - [`session`] – [`OperationMode`], [`RobotStatus`] and the confirmed
//!   [`RobotSession`] snapshot.
//! - [`sensor`] – the tagged-union parameter model ([`ParamKind`],
//!   [`ParamValue`], [`SensorParameter`]) and [`Sensor`] records.
//! - [`waypoint`] – route points placed by the operator.
//! - [`teleop`] – discrete drive commands and their `Twist` payloads.
//! - [`notification`] – operator-facing, dismissable alerts.
//! - [`error`] – the error taxonomy shared across the stack.

pub mod error;
pub mod notification;
pub mod sensor;
pub mod session;
pub mod teleop;
pub mod waypoint;

pub use error::{ConfigError, PreconditionFailure, RemoteFault, SessionError};
pub use notification::{Notification, NotificationLevel};
pub use sensor::{ParamKind, ParamScope, ParamSet, ParamValue, Sensor, SensorParameter};
pub use session::{OperationMode, RobotSession, RobotStatus};
pub use teleop::{DriveCommand, Twist, Vector3, ANGULAR_SPEED, LINEAR_SPEED};
pub use waypoint::{LatLng, Waypoint, WaypointRole};
