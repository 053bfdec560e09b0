//! [`SessionController`] – the operator's view of one robot.
//!
//! State lives behind a `parking_lot::Mutex` that is only ever locked inside
//! synchronous code; no guard is held across an `.await`.  Every completion
//! handler re-checks what it depends on once its call returns:
//!
//! | Workflow | Re-checked after the await |
//! |---|---|
//! | mode / status change | request sequence number of that field |
//! | save, save-and-reboot | snapshot generation and sensor presence |
//!
//! Every public operation reports its outcome through the
//! [`NotificationCenter`] as well as its return value.

use std::fmt;
use std::sync::Arc;

use orinx_middleware::{CommandGateway, Teleop};
use orinx_types::{
    DriveCommand, OperationMode, ParamScope, ParamValue, PreconditionFailure, RemoteFault,
    RobotSession, RobotStatus, SessionError, Twist,
};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config_store::{PendingUpdate, SensorConfigStore};
use crate::notifications::NotificationCenter;

// ----------------------------------------------------------------------------
// Internal state
// ----------------------------------------------------------------------------

/// Orders acknowledgments of one field.  An acknowledgment for a request
/// older than the newest one already applied is dropped.
#[derive(Debug, Default)]
struct Sequencer {
    issued: u64,
    applied: u64,
}

impl Sequencer {
    fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    fn accept(&mut self, seq: u64) -> bool {
        if seq <= self.applied {
            return false;
        }
        self.applied = seq;
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Save,
    Reboot,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Save => write!(f, "save"),
            Self::Reboot => write!(f, "save-and-reboot"),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    session: RobotSession,
    store: SensorConfigStore,
    mode_seq: Sequencer,
    status_seq: Sequencer,
    saving: bool,
    rebooting: bool,
    /// Boot parameters were applied but the reboot has not been confirmed.
    reboot_pending: bool,
}

impl State {
    fn flag_mut(&mut self, phase: Phase) -> &mut bool {
        match phase {
            Phase::Save => &mut self.saving,
            Phase::Reboot => &mut self.rebooting,
        }
    }
}

/// Marks a workflow as in flight for as long as it is alive.
struct InFlight {
    state: Arc<Mutex<State>>,
    phase: Phase,
}

impl InFlight {
    fn begin(state: &Arc<Mutex<State>>, phase: Phase) -> Result<Self, PreconditionFailure> {
        {
            let mut guard = state.lock();
            let flag = guard.flag_mut(phase);
            if *flag {
                return Err(PreconditionFailure::OperationInFlight(phase.to_string()));
            }
            *flag = true;
        }
        Ok(Self {
            state: Arc::clone(state),
            phase,
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        *self.state.lock().flag_mut(self.phase) = false;
    }
}

/// Which workflows are currently waiting for the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Busy {
    pub saving: bool,
    pub rebooting: bool,
}

// ----------------------------------------------------------------------------
// SessionController
// ----------------------------------------------------------------------------

/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct SessionController {
    gateway: CommandGateway,
    teleop: Arc<Teleop>,
    state: Arc<Mutex<State>>,
    notifications: NotificationCenter,
}

impl SessionController {
    /// A controller in the initial `stopped` / `manual` state with no
    /// sensors loaded.
    pub fn new(gateway: CommandGateway, teleop: Arc<Teleop>, notifications: NotificationCenter) -> Self {
        Self {
            gateway,
            teleop,
            state: Arc::new(Mutex::new(State::default())),
            notifications,
        }
    }

    // ── Observers ──────────────────────────────────────────────────────────

    /// Last mode and status confirmed by the bridge.
    pub fn session(&self) -> RobotSession {
        self.state.lock().session
    }

    pub fn busy(&self) -> Busy {
        let state = self.state.lock();
        Busy {
            saving: state.saving,
            rebooting: state.rebooting,
        }
    }

    /// `true` after a save-and-reboot whose reboot failed, until a reboot
    /// succeeds.
    pub fn reboot_pending(&self) -> bool {
        self.state.lock().reboot_pending
    }

    /// Run `f` against the sensor store.  Keep `f` short; the session lock
    /// is held while it runs.
    pub fn with_store<R>(&self, f: impl FnOnce(&SensorConfigStore) -> R) -> R {
        f(&self.state.lock().store)
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    // ── Configuration ──────────────────────────────────────────────────────

    /// Fetch, validate and load the sensor configuration.  The first sensor
    /// is selected.  Returns the number of sensors.
    ///
    /// # Errors
    ///
    /// [`SessionError::Remote`] if the fetch fails, [`SessionError::Config`]
    /// if the snapshot is invalid; the previous configuration is kept in both
    /// cases.
    pub async fn establish(&self) -> Result<usize, SessionError> {
        let outcome = self.load_config().await;
        self.report("establish", outcome, |n| {
            Some(format!("connected: configuration loaded with {n} sensors"))
        })
    }

    async fn load_config(&self) -> Result<usize, SessionError> {
        let json = self.gateway.fetch_config().await?;
        let mut state = self.state.lock();
        state.store.ingest_snapshot(&json)?;
        Ok(state.store.sensors().len())
    }

    pub fn select_sensor(&self, id: &str) -> Result<(), SessionError> {
        let outcome = self.state.lock().store.select(id).map_err(SessionError::from);
        self.report("select_sensor", outcome, |_| None)
    }

    /// Stage a new value for a parameter of the selected sensor.
    pub fn edit_parameter(&self, name: &str, value: ParamValue) -> Result<(), SessionError> {
        let outcome = self.state.lock().store.edit(name, value);
        self.report("edit_parameter", outcome, |_| None)
    }

    /// Stage operator-typed text, parsed according to the parameter's kind.
    pub fn edit_parameter_text(&self, name: &str, input: &str) -> Result<ParamValue, SessionError> {
        let outcome = self.state.lock().store.edit_text(name, input);
        self.report("edit_parameter", outcome, |_| None)
    }

    // ── Mode and status ────────────────────────────────────────────────────

    /// Ask the robot to switch mode.  The confirmed mode changes only once
    /// the bridge acknowledges, and only if no newer mode request has been
    /// acknowledged in the meantime.
    pub async fn change_mode(&self, mode: OperationMode) -> Result<(), SessionError> {
        let seq = self.state.lock().mode_seq.issue();
        let outcome = self.gateway.change_mode(mode).await.map_err(SessionError::from).map(|()| {
            let mut state = self.state.lock();
            let applied = state.mode_seq.accept(seq);
            if applied {
                state.session.mode = mode;
            }
            applied
        });
        if let Ok(false) = outcome {
            debug!(%mode, seq, "superseded mode acknowledgment ignored");
        }
        self.report("change_mode", outcome, |&applied| {
            applied.then(|| format!("mode set to {mode}"))
        })
        .map(drop)
    }

    /// Status counterpart of [`change_mode`][Self::change_mode].
    pub async fn change_status(&self, status: RobotStatus) -> Result<(), SessionError> {
        let seq = self.state.lock().status_seq.issue();
        let outcome = self.gateway.change_status(status).await.map_err(SessionError::from).map(|()| {
            let mut state = self.state.lock();
            let applied = state.status_seq.accept(seq);
            if applied {
                state.session.status = status;
            }
            applied
        });
        if let Ok(false) = outcome {
            debug!(%status, seq, "superseded status acknowledgment ignored");
        }
        self.report("change_status", outcome, |&applied| {
            applied.then(|| format!("status set to {status}"))
        })
        .map(drop)
    }

    // ── Saving ─────────────────────────────────────────────────────────────

    /// Send the selected sensor's live parameters and commit them once the
    /// bridge accepts.  Returns how many values were sent; with no live
    /// parameters nothing is sent and `0` is returned.
    ///
    /// # Errors
    ///
    /// - [`PreconditionFailure::NoSensorSelected`] – nothing is sent.
    /// - [`PreconditionFailure::OperationInFlight`] – a save is already
    ///   waiting for the bridge.
    /// - [`SessionError::Remote`] – the pending buffer is left as it was.
    pub async fn save_live_parameters(&self) -> Result<usize, SessionError> {
        let outcome = self.save_live().await;
        self.report("save", outcome, |&n| {
            Some(if n == 0 {
                "no live parameters to save".to_string()
            } else {
                format!("saved {n} parameters")
            })
        })
    }

    async fn save_live(&self) -> Result<usize, SessionError> {
        let update = self.state.lock().store.pending_update(ParamScope::Live)?;
        let _busy = InFlight::begin(&self.state, Phase::Save)?;
        if update.is_empty() {
            return Ok(0);
        }
        self.push_update(&update).await?;
        Ok(update.entries.len())
    }

    /// Send the selected sensor's boot parameters, then reboot the robot.
    ///
    /// The reboot is only requested after the bridge accepted the
    /// parameters.  With no boot parameters the update is skipped and the
    /// reboot is still requested.  Returns how many values were sent.
    ///
    /// # Errors
    ///
    /// - the preconditions of
    ///   [`save_live_parameters`][Self::save_live_parameters].
    /// - [`SessionError::Remote`] – the update failed; no reboot was sent.
    /// - [`SessionError::RebootFailed`] – the parameters are applied but the
    ///   reboot failed.  Use [`retry_reboot`][Self::retry_reboot].
    pub async fn save_and_reboot(&self) -> Result<usize, SessionError> {
        let outcome = self.save_boot_then_reboot().await;
        self.report("save_and_reboot", outcome, |&n| {
            Some(format!("saved {n} boot parameters and rebooted"))
        })
    }

    async fn save_boot_then_reboot(&self) -> Result<usize, SessionError> {
        let update = self.state.lock().store.pending_update(ParamScope::Boot)?;
        let _busy = InFlight::begin(&self.state, Phase::Reboot)?;
        if !update.is_empty() {
            self.push_update(&update).await?;
        }
        self.state.lock().reboot_pending = true;
        self.reboot_now().await?;
        Ok(update.entries.len())
    }

    /// Re-issue only the reboot after a [`SessionError::RebootFailed`].
    ///
    /// # Errors
    ///
    /// [`PreconditionFailure::NoRebootPending`] when no reboot is owed, or
    /// [`SessionError::RebootFailed`] again.
    pub async fn retry_reboot(&self) -> Result<(), SessionError> {
        let outcome = self.reboot_again().await;
        self.report("retry_reboot", outcome, |_| Some("robot rebooted".to_string()))
    }

    async fn reboot_again(&self) -> Result<(), SessionError> {
        if !self.state.lock().reboot_pending {
            return Err(PreconditionFailure::NoRebootPending.into());
        }
        let _busy = InFlight::begin(&self.state, Phase::Reboot)?;
        self.reboot_now().await
    }

    async fn reboot_now(&self) -> Result<(), SessionError> {
        self.gateway.reboot().await.map_err(SessionError::RebootFailed)?;
        self.state.lock().reboot_pending = false;
        Ok(())
    }

    async fn push_update(&self, update: &PendingUpdate) -> Result<(), RemoteFault> {
        self.gateway.update_parameters(&update.to_batch()).await?;
        if !self.state.lock().store.commit(update) {
            warn!(
                sensor = %update.sensor_id,
                scope = %update.scope,
                "configuration was reloaded while saving; acknowledged values not committed"
            );
        }
        Ok(())
    }

    // ── Teleop ─────────────────────────────────────────────────────────────

    /// Publish a drive command.  Anything but `stop` needs a running robot.
    pub fn drive(&self, cmd: DriveCommand) -> Result<Twist, SessionError> {
        let outcome = self.try_drive(cmd);
        self.report("drive", outcome, |_| Some(format!("drive command sent: {cmd}")))
    }

    fn try_drive(&self, cmd: DriveCommand) -> Result<Twist, SessionError> {
        let status = self.state.lock().session.status;
        if !cmd.is_stop() && status != RobotStatus::Running {
            return Err(PreconditionFailure::NotRunning(status).into());
        }
        self.teleop
            .send(cmd)
            .map_err(|e| SessionError::Remote(RemoteFault::from(e)))
    }

    // ── Reporting ──────────────────────────────────────────────────────────

    fn report<T>(
        &self,
        operation: &'static str,
        outcome: Result<T, SessionError>,
        success: impl FnOnce(&T) -> Option<String>,
    ) -> Result<T, SessionError> {
        match &outcome {
            Ok(value) => {
                if let Some(message) = success(value) {
                    info!(operation, %message, "operation succeeded");
                    self.notifications.success(message);
                }
            }
            Err(e) => {
                warn!(operation, error = %e, "operation failed");
                self.notifications.error(e.to_string());
            }
        }
        outcome
    }
}
