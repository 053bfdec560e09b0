//! `orinx-session` – session state for one robot.
//!
//! Everything here reflects state the robot has acknowledged.  Operator
//! actions go out through the [`CommandGateway`][orinx_middleware::CommandGateway]
//! and only become visible once the bridge confirms them.
//!
//! # Modules
//!
//! - [`snapshot`] – validates the bridge's JSON configuration snapshot into
//!   typed [`Sensor`][orinx_types::Sensor] records.
//! - [`config_store`] – [`SensorConfigStore`]: sensors, selection, and the
//!   pending edit buffer.
//! - [`controller`] – [`SessionController`]: mode/status state machine and
//!   the two-phase save / save-and-reboot workflow.
//! - [`notifications`] – [`NotificationCenter`]: dismissable operator alerts.
//! - [`waypoints`] – [`WaypointEditor`]: ordered route with role cycling.

pub mod config_store;
pub mod controller;
pub mod notifications;
pub mod snapshot;
pub mod waypoints;

pub use config_store::{PendingUpdate, SensorConfigStore};
pub use controller::{Busy, SessionController};
pub use notifications::NotificationCenter;
pub use snapshot::parse_snapshot;
pub use waypoints::WaypointEditor;
