//! Console configuration – reads/writes `~/.orinx/config.toml`.

use orinx_middleware::ServiceNames;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted operator configuration stored in `~/.orinx/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// rosbridge WebSocket endpoint.
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,

    /// How long a service call may wait for its response.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Upper bound on delivered camera frames per second, per channel.
    #[serde(default = "default_max_frame_rate_hz")]
    pub max_frame_rate_hz: f64,

    #[serde(default = "default_color_topic")]
    pub color_topic: String,

    #[serde(default = "default_depth_topic")]
    pub depth_topic: String,

    #[serde(default = "default_cmd_vel_topic")]
    pub cmd_vel_topic: String,

    /// `"json"` for newline-delimited JSON logs; anything else is compact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_format: Option<String>,

    /// OTLP/HTTP collector base URL, e.g. `http://localhost:4318`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otlp_endpoint: Option<String>,

    /// Service names on the bridge.  Kept last: TOML tables must follow
    /// plain values.
    #[serde(default)]
    pub services: ServiceNames,
}

fn default_bridge_url() -> String {
    "ws://localhost:9090".to_string()
}
fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_max_frame_rate_hz() -> f64 {
    10.0
}
fn default_color_topic() -> String {
    "/camera/color/image_raw".to_string()
}
fn default_depth_topic() -> String {
    "/camera/depth/image_raw".to_string()
}
fn default_cmd_vel_topic() -> String {
    "/cmd_vel".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bridge_url: default_bridge_url(),
            request_timeout_ms: default_request_timeout_ms(),
            max_frame_rate_hz: default_max_frame_rate_hz(),
            color_topic: default_color_topic(),
            depth_topic: default_depth_topic(),
            cmd_vel_topic: default_cmd_vel_topic(),
            log_format: None,
            otlp_endpoint: None,
            services: ServiceNames::default(),
        }
    }
}

/// Return the path to `~/.orinx/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".orinx").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config = toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `ORINX_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ORINX_BRIDGE_URL` | `bridge_url` |
/// | `ORINX_FRAME_RATE_HZ` | `max_frame_rate_hz` |
/// | `ORINX_REQUEST_TIMEOUT_MS` | `request_timeout_ms` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("ORINX_BRIDGE_URL") {
        cfg.bridge_url = v;
    }
    if let Ok(v) = std::env::var("ORINX_FRAME_RATE_HZ")
        && let Ok(rate) = v.parse::<f64>()
        && rate.is_finite()
        && rate > 0.0
    {
        cfg.max_frame_rate_hz = rate;
    }
    if let Ok(v) = std::env::var("ORINX_REQUEST_TIMEOUT_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.request_timeout_ms = ms;
    }
}

/// Save the config to disk, creating `~/.orinx/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
