//! `orinx-cli` – Orinx operator console
//!
//! This binary is the operator-facing layer of the Orinx stack.  It:
//!
//! 1. Checks for `~/.orinx/config.toml`; runs a **First-Run Wizard** when the
//!    file is absent.
//! 2. Initialises structured logging (and OTLP export when configured).
//! 3. Drops the operator into an **interactive REPL** with slash-commands
//!    (`/connect`, `/mode`, `/params`, `/save`, `/drive`, `/wp`, …).
//! 4. Intercepts **Ctrl-C** to publish a `stop` velocity command and exit.

mod config;
mod repl;
mod telemetry;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::warn;

use orinx_types::DriveCommand;

fn main() {
    let (cfg, first_run) = match config::load() {
        Ok(Some(cfg)) => (cfg, false),
        Ok(None) => (default_config(), true),
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            (default_config(), false)
        }
    };

    // Held until exit; dropping it flushes exported spans.
    let _telemetry = telemetry::init_tracing("orinx", &cfg);

    print_banner();

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    let slot: repl::ControllerSlot = Arc::default();
    let slot_ctrlc = slot.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping the robot …".yellow().bold());

        let controller = slot_ctrlc.lock().clone();
        match controller {
            Some(ctl) => match ctl.drive(DriveCommand::Stop) {
                Ok(_) => println!("{}", "  ✓ Stop command published.".green()),
                Err(e) => println!("  {} {}", "✗ Stop command failed:".red(), e),
            },
            None => println!("{}", "  ✓ Not connected; nothing to stop.".green()),
        }
        println!("{}", "  ✓ Exiting Orinx.".green());

        shutdown_clone.store(true, Ordering::SeqCst);
        // Give the writer task a moment to flush the stop frame.
        std::thread::sleep(Duration::from_millis(200));
        std::process::exit(130);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the robot will not be stopped on Ctrl-C");
    }

    // ── First-Run Wizard ──────────────────────────────────────────────────
    let cfg = if first_run {
        run_first_run_wizard(cfg)
    } else {
        println!("  Config loaded from {}", config::config_path().display().to_string().bold());
        cfg
    };

    println!("  Bridge: {}", cfg.bridge_url.dimmed());
    println!();
    println!("  Type {} to reach the robot, {} for all commands.\n", "/connect".bold().cyan(), "/help".bold().cyan());

    // ── Interactive REPL ──────────────────────────────────────────────────
    repl::run(shutdown, cfg, slot);
}

fn default_config() -> config::Config {
    let mut cfg = config::Config::default();
    config::apply_env_overrides(&mut cfg);
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard(mut cfg: config::Config) -> config::Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║        Orinx First-Run Wizard        ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's set up Orinx.\n");

    cfg.bridge_url = prompt_line(&format!("  rosbridge URL [{}]: ", cfg.bridge_url), &cfg.bridge_url);

    let rate = prompt_line(
        &format!("  Max camera frame rate, fps [{}]: ", cfg.max_frame_rate_hz),
        &cfg.max_frame_rate_hz.to_string(),
    );
    match rate.trim().parse::<f64>() {
        Ok(r) if r.is_finite() && r > 0.0 => cfg.max_frame_rate_hz = r,
        _ => println!(
            "  {} '{}' is not a valid frame rate, keeping {}",
            "Warning:".yellow(),
            rate,
            cfg.max_frame_rate_hz
        ),
    }

    cfg.cmd_vel_topic = prompt_line(&format!("  Velocity topic [{}]: ", cfg.cmd_vel_topic), &cfg.cmd_vel_topic);

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ____       _            "#.bold().cyan());
    println!("{}", r#"  / __ \_____(_)___  _  __ "#.bold().cyan());
    println!("{}", r#" / / / / ___/ / __ \| |/_/ "#.bold().cyan());
    println!("{}", r#"/ /_/ / /  / / / / />  <   "#.bold().cyan());
    println!("{}", r#"\____/_/  /_/_/ /_/_/|_|   "#.bold().cyan());
    println!();
    println!("  {} {}", "Orinx".bold(), format!("v{}", env!("CARGO_PKG_VERSION")).dimmed());
    println!("  Robot Operator Console");
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn prompt_line(msg: &str, default: &str) -> String {
    use std::io::{BufRead, Write};
    print!("{}", msg);
    std::io::stdout().flush().ok();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let t = line.trim().to_string();
            if t.is_empty() { default.to_string() } else { t }
        }
        Err(_) => default.to_string(),
    }
}
