//! REPL – the operator console.
//!
//! Supported slash-commands:
//!   /help                    – show this list
//!   /connect                 – open the bridge connection and load sensors
//!   /status                  – confirmed mode/status and in-flight work
//!   /mode <manual|auto|debug>
//!   /start | /pause | /stop  – change run status
//!   /sensors, /select <id>, /params, /set <name> <value>
//!   /save, /save-reboot, /retry-reboot
//!   /drive <forward|backward|left|right|turn_left|turn_right|stop>
//!   /role <start|checkpoint|end>, /wp <lat> <lng>, /wp-rm <id>, /route
//!   /camera <color|depth> <on|off>, /frame
//!   /alerts, /dismiss <id|all>
//!   /quit | /exit

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use orinx_middleware::{
    CommandGateway, ConnectionHandle, FrameHandle, FrameStatus, FrameStream, Teleop,
};
use orinx_session::{NotificationCenter, SessionController, WaypointEditor};
use orinx_types::{
    DriveCommand, LatLng, NotificationLevel, OperationMode, ParamKind, RobotStatus, SessionError,
    WaypointRole,
};
use parking_lot::Mutex;
use tokio::runtime::Runtime;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;

/// Controller of the live connection, shared with the Ctrl-C handler.
pub type ControllerSlot = Arc<Mutex<Option<SessionController>>>;

// ─────────────────────────────────────────────────────────────────────────────
// Command parsing
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Camera {
    Color,
    Depth,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Connect,
    Status,
    Mode(OperationMode),
    SetStatus(RobotStatus),
    Sensors,
    Select(String),
    Params,
    Set { name: String, value: String },
    Save,
    SaveReboot,
    RetryReboot,
    Drive(DriveCommand),
    Role(WaypointRole),
    Waypoint(LatLng),
    RemoveWaypoint(Uuid),
    Route,
    Camera { camera: Camera, on: bool },
    Frame,
    Alerts,
    /// `None` dismisses everything.
    Dismiss(Option<Uuid>),
    Quit,
}

/// Parse one console line.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Err("empty command".to_string());
    };
    let args: Vec<&str> = words.collect();

    let cmd = match head {
        "/help" => Command::Help,
        "/connect" => Command::Connect,
        "/status" => Command::Status,
        "/mode" => Command::Mode(single(head, &args, "manual|auto|debug")?.parse()?),
        "/start" => Command::SetStatus(RobotStatus::Running),
        "/pause" => Command::SetStatus(RobotStatus::Paused),
        "/stop" => Command::SetStatus(RobotStatus::Stopped),
        "/sensors" => Command::Sensors,
        "/select" => Command::Select(single(head, &args, "sensor id")?.to_string()),
        "/params" => Command::Params,
        "/set" => match args.split_first() {
            Some((name, rest)) if !rest.is_empty() => Command::Set {
                name: name.to_string(),
                value: rest.join(" "),
            },
            _ => return Err(format!("usage: {head} <name> <value>")),
        },
        "/save" => Command::Save,
        "/save-reboot" => Command::SaveReboot,
        "/retry-reboot" => Command::RetryReboot,
        "/drive" => Command::Drive(single(head, &args, "direction")?.parse()?),
        "/role" => Command::Role(single(head, &args, "start|checkpoint|end")?.parse()?),
        "/wp" => match args.as_slice() {
            [lat, lng] => Command::Waypoint(parse_lat_lng(lat, lng)?),
            _ => return Err(format!("usage: {head} <lat> <lng>")),
        },
        "/wp-rm" => Command::RemoveWaypoint(parse_id(single(head, &args, "waypoint id")?)?),
        "/route" => Command::Route,
        "/camera" => match args.as_slice() {
            [camera, state] => Command::Camera {
                camera: match *camera {
                    "color" | "colour" => Camera::Color,
                    "depth" => Camera::Depth,
                    other => return Err(format!("unknown camera '{other}'")),
                },
                on: match *state {
                    "on" => true,
                    "off" => false,
                    other => return Err(format!("expected on or off, found '{other}'")),
                },
            },
            _ => return Err(format!("usage: {head} <color|depth> <on|off>")),
        },
        "/frame" => Command::Frame,
        "/alerts" => Command::Alerts,
        "/dismiss" => match single(head, &args, "id|all")? {
            "all" => Command::Dismiss(None),
            id => Command::Dismiss(Some(parse_id(id)?)),
        },
        "/quit" | "/exit" => Command::Quit,
        other => return Err(format!("Unknown command '{other}'")),
    };
    Ok(cmd)
}

fn single<'a>(head: &str, args: &[&'a str], what: &str) -> Result<&'a str, String> {
    match args {
        [arg] => Ok(arg),
        _ => Err(format!("usage: {head} <{what}>")),
    }
}

fn parse_id(raw: &str) -> Result<Uuid, String> {
    Uuid::parse_str(raw).map_err(|e| format!("invalid id '{raw}': {e}"))
}

fn parse_lat_lng(lat: &str, lng: &str) -> Result<LatLng, String> {
    let lat: f64 = lat.parse().map_err(|_| format!("invalid latitude '{lat}'"))?;
    let lng: f64 = lng.parse().map_err(|_| format!("invalid longitude '{lng}'"))?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(format!("coordinates out of range: {lat}, {lng}"));
    }
    Ok(LatLng::new(lat, lng))
}

// ─────────────────────────────────────────────────────────────────────────────
// Console state
// ─────────────────────────────────────────────────────────────────────────────

/// Everything owned by one bridge connection.
struct Link {
    conn: ConnectionHandle,
    controller: SessionController,
    frames: FrameStream,
    color: Option<FrameHandle>,
    depth: Option<FrameHandle>,
}

impl Link {
    fn disconnect(self) {
        drop(self.color);
        drop(self.depth);
        self.conn.close();
    }
}

struct Console {
    cfg: Config,
    runtime: Runtime,
    notifications: NotificationCenter,
    waypoints: WaypointEditor,
    link: Option<Link>,
    slot: ControllerSlot,
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(shutdown: Arc<AtomicBool>, cfg: Config, slot: ControllerSlot) {
    let mut console = match Console::new(cfg, slot) {
        Ok(console) => console,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start async runtime".red(), e);
            return;
        }
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        console.expire_alerts(Utc::now());

        print!("{} ", "orinx>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_command(line) {
            Ok(Command::Quit) => {
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            Ok(cmd) => console.execute(cmd),
            Err(e) => println!("{} {}. Type {} for available commands.", "✗".red(), e, "/help".bold()),
        }
    }

    if let Some(link) = console.link.take() {
        console.slot.lock().take();
        link.disconnect();
    }
}

impl Console {
    fn new(cfg: Config, slot: ControllerSlot) -> io::Result<Self> {
        Ok(Self {
            cfg,
            runtime: Runtime::new()?,
            notifications: NotificationCenter::new(),
            waypoints: WaypointEditor::new(),
            link: None,
            slot,
        })
    }

    /// Drop alerts that have outlived their display time.
    fn expire_alerts(&self, now: chrono::DateTime<Utc>) -> usize {
        self.notifications.prune(now)
    }

    fn execute(&mut self, cmd: Command) {
        match cmd {
            Command::Help => cmd_help(),
            Command::Connect => self.cmd_connect(),
            Command::Status => self.cmd_status(),
            Command::Mode(mode) => {
                if let Some(ctl) = self.controller() {
                    show(self.runtime.block_on(ctl.change_mode(mode)), |()| format!("mode is now {}", mode.to_string().bold()));
                }
            }
            Command::SetStatus(status) => {
                if let Some(ctl) = self.controller() {
                    show(self.runtime.block_on(ctl.change_status(status)), |()| {
                        format!("status is now {}", status.to_string().bold())
                    });
                }
            }
            Command::Sensors => self.cmd_sensors(),
            Command::Select(id) => {
                if let Some(ctl) = self.controller() {
                    show(ctl.select_sensor(&id), |()| format!("selected {}", id.bold()));
                }
            }
            Command::Params => self.cmd_params(),
            Command::Set { name, value } => {
                if let Some(ctl) = self.controller() {
                    show(ctl.edit_parameter_text(&name, &value), |v| format!("{name} = {v} (pending)"));
                }
            }
            Command::Save => {
                if let Some(ctl) = self.controller() {
                    show(self.runtime.block_on(ctl.save_live_parameters()), |n| format!("{n} live parameters saved"));
                }
            }
            Command::SaveReboot => {
                if let Some(ctl) = self.controller() {
                    show(self.runtime.block_on(ctl.save_and_reboot()), |n| {
                        format!("{n} boot parameters saved, robot rebooting")
                    });
                }
            }
            Command::RetryReboot => {
                if let Some(ctl) = self.controller() {
                    show(self.runtime.block_on(ctl.retry_reboot()), |()| "robot rebooting".to_string());
                }
            }
            Command::Drive(direction) => {
                if let Some(ctl) = self.controller() {
                    show(ctl.drive(direction), |t| {
                        format!(
                            "{direction}: linear ({:.1}, {:.1}) angular {:.1}",
                            t.linear.x, t.linear.y, t.angular.z
                        )
                    });
                }
            }
            Command::Role(role) => {
                self.waypoints.select_role(role);
                println!("  Next waypoint: {}", role.to_string().bold());
            }
            Command::Waypoint(at) => {
                let wp = self.waypoints.place_point(at);
                println!("  {} {} at {}  {}", "✓".green(), wp.label.bold(), at, wp.id.to_string().dimmed());
                println!("  Next waypoint: {}", self.waypoints.target_role().to_string().bold());
            }
            Command::RemoveWaypoint(id) => match self.waypoints.remove_waypoint(id) {
                Some(wp) => println!("  {} removed {}", "✓".green(), wp.label.bold()),
                None => println!("  {} no waypoint {}", "✗".red(), id),
            },
            Command::Route => self.cmd_route(),
            Command::Camera { camera, on } => self.cmd_camera(camera, on),
            Command::Frame => self.cmd_frame(),
            Command::Alerts => self.cmd_alerts(),
            Command::Dismiss(None) => {
                println!("  Dismissed {} alert(s).", self.notifications.dismiss_all());
            }
            Command::Dismiss(Some(id)) => {
                if !self.notifications.dismiss(id) {
                    println!("  {} no alert {}", "✗".red(), id);
                }
            }
            Command::Quit => {}
        }
    }

    fn controller(&self) -> Option<&SessionController> {
        let ctl = self.link.as_ref().map(|l| &l.controller);
        if ctl.is_none() {
            println!("  {} Not connected. Run {} first.", "✗".red(), "/connect".bold());
        }
        ctl
    }

    fn cmd_connect(&mut self) {
        if let Some(old) = self.link.take() {
            self.slot.lock().take();
            old.disconnect();
        }

        print!("  Connecting to {} … ", self.cfg.bridge_url.dimmed());
        io::stdout().flush().ok();
        let timeout = Duration::from_millis(self.cfg.request_timeout_ms);
        let conn = match self.runtime.block_on(ConnectionHandle::connect(&self.cfg.bridge_url, timeout)) {
            Ok(conn) => conn,
            Err(e) => {
                println!("{}", "FAILED".red());
                println!("  {}", e.to_string().dimmed());
                self.notifications.error(e.to_string());
                return;
            }
        };
        println!("{}", "OK".green());

        let gateway = CommandGateway::new(Arc::new(conn.clone()), self.cfg.services.clone());
        let teleop = Arc::new(Teleop::new(Arc::new(conn.clone()), self.cfg.cmd_vel_topic.clone()));
        let controller = SessionController::new(gateway, teleop, self.notifications.clone());
        *self.slot.lock() = Some(controller.clone());

        print!("  Loading sensor configuration … ");
        io::stdout().flush().ok();
        match self.runtime.block_on(controller.establish()) {
            Ok(n) => println!("{} ({n} sensors)", "OK".green()),
            Err(e) => println!("{}: {}", "FAILED".red(), e),
        }
        info!(url = %self.cfg.bridge_url, "console connected");

        self.link = Some(Link {
            frames: FrameStream::new(conn.clone()),
            conn,
            controller,
            color: None,
            depth: None,
        });
    }

    fn cmd_status(&self) {
        println!("{}", "Session".bold().underline());
        match &self.link {
            Some(link) => {
                let session = link.controller.session();
                let busy = link.controller.busy();
                println!("  Bridge         : {}", link.conn.url().bold());
                println!("  Mode           : {}", session.mode.to_string().yellow());
                println!("  Status         : {}", session.status.to_string().yellow());
                if busy.saving {
                    println!("  {}", "Saving parameters …".dimmed());
                }
                if busy.rebooting {
                    println!("  {}", "Rebooting …".dimmed());
                }
                if link.controller.reboot_pending() {
                    println!("  {} reboot still owed; run {}", "!".yellow().bold(), "/retry-reboot".bold());
                }
            }
            None => println!("  Bridge         : {}", "not connected".dimmed()),
        }
        println!("  Next waypoint  : {}", self.waypoints.target_role());
    }

    fn cmd_sensors(&self) {
        let Some(ctl) = self.controller() else { return };
        ctl.with_store(|store| {
            if store.sensors().is_empty() {
                println!("  No sensors reported.");
                return;
            }
            println!("{}", "Sensors".bold().underline());
            for sensor in store.sensors() {
                let marker = if store.selected_id() == Some(sensor.id.as_str()) { "▶" } else { " " };
                let enabled = if sensor.enabled { "enabled".green() } else { "disabled".dimmed() };
                println!(
                    "  {} {}  {}  {}/{}  {}",
                    marker.green(),
                    sensor.display_name.bold(),
                    sensor.type_tag,
                    sensor.owner_package.dimmed(),
                    sensor.owner_node.dimmed(),
                    enabled
                );
            }
        });
    }

    fn cmd_params(&self) {
        let Some(ctl) = self.controller() else { return };
        ctl.with_store(|store| {
            let Some(sensor) = store.selected() else {
                println!("  No sensor selected.");
                return;
            };
            println!("{} {}", "Parameters of".bold().underline(), sensor.display_name.bold());
            for (name, param) in sensor.params.iter() {
                let pending = store.pending_value(name).unwrap_or(param.value());
                let value = if pending != param.value() {
                    format!("{} → {}", param.value(), pending.to_string().yellow())
                } else {
                    param.value().to_string()
                };
                let reboot = if param.requires_reboot() { " [reboot]".magenta().to_string() } else { String::new() };
                println!("  {:<20} {:<24} {}{}", name.bold(), describe_kind(param.kind()).dimmed(), value, reboot);
                if let Some(description) = param.description() {
                    println!("  {:<20} {}", "", description.dimmed());
                }
            }
        });
    }

    fn cmd_route(&self) {
        let route = self.waypoints.route();
        if route.is_empty() {
            println!("  No waypoints placed.");
            return;
        }
        println!("{}", "Route".bold().underline());
        for (i, wp) in route.iter().enumerate() {
            println!("  {:>2}. {:<14} {}  {}", i + 1, wp.label.bold(), wp.coordinates, wp.id.to_string().dimmed());
        }
    }

    fn cmd_camera(&mut self, camera: Camera, on: bool) {
        let Some(link) = self.link.as_mut() else {
            println!("  {} Not connected. Run {} first.", "✗".red(), "/connect".bold());
            return;
        };
        let (topic, slot) = match camera {
            Camera::Color => (&self.cfg.color_topic, &mut link.color),
            Camera::Depth => (&self.cfg.depth_topic, &mut link.depth),
        };

        if !on {
            match slot.take() {
                Some(handle) => {
                    link.frames.unsubscribe(handle);
                    println!("  {} {} off", "✓".green(), topic.bold());
                }
                None => println!("  {} is already off", topic.bold()),
            }
            return;
        }
        if slot.is_some() {
            println!("  {} is already on", topic.bold());
            return;
        }

        let frames = &link.frames;
        let rate = self.cfg.max_frame_rate_hz;
        match self.runtime.block_on(async { frames.subscribe(topic, rate) }) {
            Ok(handle) => {
                *slot = Some(handle);
                println!("  {} {} on (≤ {rate} fps)", "✓".green(), topic.bold());
            }
            Err(e) => println!("  {} {}", "✗".red(), e),
        }
    }

    fn cmd_frame(&self) {
        let Some(link) = &self.link else {
            println!("  {} Not connected. Run {} first.", "✗".red(), "/connect".bold());
            return;
        };
        let mut any = false;
        for handle in [&link.color, &link.depth].into_iter().flatten() {
            any = true;
            let stats = handle.stats();
            println!("{}", handle.channel().bold().underline());
            println!("  Status   : {}", describe_status(&handle.current_status()));
            println!(
                "  Frames   : {} delivered, {} superseded, {} undecodable, {} malformed",
                stats.delivered, stats.superseded, stats.decode_failed, stats.malformed
            );
            if let Some(frame) = handle.latest() {
                let center = frame.pixel(frame.width / 2, frame.height / 2);
                println!(
                    "  Latest   : {}x{} ({}), centre pixel {:?}",
                    frame.width, frame.height, frame.source_encoding, center
                );
            }
        }
        if !any {
            println!("  No camera is on. Try {}.", "/camera color on".bold());
        }
    }

    fn cmd_alerts(&self) {
        let now = Utc::now();
        self.expire_alerts(now);
        let alerts = self.notifications.list();
        if alerts.is_empty() {
            println!("  No alerts.");
            return;
        }
        for alert in alerts {
            let badge = match alert.level {
                NotificationLevel::Success => "✓".green().bold(),
                NotificationLevel::Error => "✗".red().bold(),
            };
            let age = (now - alert.raised_at).num_milliseconds() as f64 / 1000.0;
            println!("  {} {}  {}", badge, alert.message, format!("{age:.1}s ago  {}", alert.id).dimmed());
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "Orinx Commands".bold().underline());
    let rows = [
        ("/connect", "connect to the bridge and load sensors"),
        ("/status", "confirmed mode and status"),
        ("/mode <manual|auto|debug>", "change operation mode"),
        ("/start  /pause  /stop", "change run status"),
        ("/sensors", "list sensors"),
        ("/select <id>", "select a sensor"),
        ("/params", "show the selected sensor's parameters"),
        ("/set <name> <value>", "stage a parameter value"),
        ("/save", "send live parameters"),
        ("/save-reboot", "send boot parameters and reboot"),
        ("/retry-reboot", "reboot again after a failed reboot"),
        ("/drive <direction>", "forward backward left right turn_left turn_right stop"),
        ("/role <start|checkpoint|end>", "role of the next waypoint"),
        ("/wp <lat> <lng>", "place a waypoint"),
        ("/wp-rm <id>", "remove a waypoint"),
        ("/route", "show the route"),
        ("/camera <color|depth> <on|off>", "toggle a camera stream"),
        ("/frame", "latest frame of each camera"),
        ("/alerts", "show alerts"),
        ("/dismiss <id|all>", "dismiss alerts"),
        ("/quit  /exit", "exit the console"),
    ];
    for (cmd, what) in rows {
        println!("  {:<32} – {}", cmd.bold().cyan(), what);
    }
    println!();
}

fn show<T>(outcome: Result<T, SessionError>, ok: impl FnOnce(T) -> String) {
    match outcome {
        Ok(value) => println!("  {} {}", "✓".green().bold(), ok(value)),
        Err(e) => {
            println!("  {} {}", "✗".red().bold(), e);
            if matches!(e, SessionError::RebootFailed(_)) {
                println!(
                    "    Parameters are applied. Run {} to reboot without re-sending them.",
                    "/retry-reboot".bold()
                );
            }
        }
    }
}

fn describe_kind(kind: &ParamKind) -> String {
    match kind {
        ParamKind::Int { range: Some((min, max)) } => format!("int [{min}, {max}]"),
        ParamKind::Int { range: None } => "int".to_string(),
        ParamKind::Bool => "boolean".to_string(),
        ParamKind::Text { options: Some(options) } => format!("string {{{}}}", options.join("|")),
        ParamKind::Text { options: None } => "string".to_string(),
    }
}

fn describe_status(status: &FrameStatus) -> String {
    match status {
        FrameStatus::Idle => "waiting for the first frame".dimmed().to_string(),
        FrameStatus::Live => "live".green().to_string(),
        FrameStatus::DecodeFailed(e) => format!("{}: {}", "undecodable".red(), e),
        FrameStatus::Malformed(e) => format!("{}: {}", "malformed".red(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_status_and_mode_commands() {
        assert_eq!(parse_command("/mode auto"), Ok(Command::Mode(OperationMode::Autonomous)));
        assert_eq!(parse_command("/pause"), Ok(Command::SetStatus(RobotStatus::Paused)));
        assert!(parse_command("/mode").is_err());
        assert!(parse_command("/mode sideways").is_err());
    }

    #[test]
    fn set_keeps_spaces_in_the_value() {
        assert_eq!(
            parse_command("/set label front left camera"),
            Ok(Command::Set {
                name: "label".into(),
                value: "front left camera".into(),
            })
        );
        assert!(parse_command("/set label").is_err());
    }

    #[test]
    fn parses_waypoint_commands() {
        assert_eq!(parse_command("/wp 40.4 -3.7"), Ok(Command::Waypoint(LatLng::new(40.4, -3.7))));
        assert!(parse_command("/wp 95 0").is_err());
        assert!(parse_command("/wp north 0").is_err());
        assert_eq!(parse_command("/role cp"), Ok(Command::Role(WaypointRole::Checkpoint)));

        let id = Uuid::new_v4();
        assert_eq!(parse_command(&format!("/wp-rm {id}")), Ok(Command::RemoveWaypoint(id)));
        assert!(parse_command("/wp-rm 42").is_err());
    }

    #[test]
    fn parses_camera_drive_and_dismiss() {
        assert_eq!(
            parse_command("/camera depth on"),
            Ok(Command::Camera {
                camera: Camera::Depth,
                on: true,
            })
        );
        assert!(parse_command("/camera thermal on").is_err());
        assert_eq!(parse_command("/drive turn_left"), Ok(Command::Drive(DriveCommand::TurnLeft)));
        assert_eq!(parse_command("/dismiss all"), Ok(Command::Dismiss(None)));
    }

    #[test]
    fn unknown_commands_are_reported() {
        let err = parse_command("/fly").unwrap_err();
        assert!(err.contains("/fly"));
        assert_eq!(parse_command("/exit"), Ok(Command::Quit));
    }

    #[test]
    fn kinds_describe_their_constraints() {
        assert_eq!(describe_kind(&ParamKind::Int { range: Some((1, 10)) }), "int [1, 10]");
        assert_eq!(
            describe_kind(&ParamKind::Text {
                options: Some(vec!["hd".into(), "4k".into()])
            }),
            "string {hd|4k}"
        );
    }

    #[test]
    fn expired_alerts_are_cleared_between_commands() {
        let console = Console::new(Config::default(), ControllerSlot::default()).unwrap();
        console.notifications.success("parameters saved");
        console.notifications.error("reboot failed");

        let now = Utc::now();
        assert_eq!(console.expire_alerts(now), 0);
        assert_eq!(console.expire_alerts(now + chrono::Duration::seconds(4)), 1);
        assert_eq!(console.notifications.list()[0].message, "reboot failed");
        assert_eq!(console.expire_alerts(now + chrono::Duration::seconds(6)), 1);
        assert!(console.notifications.is_empty());
    }
}
