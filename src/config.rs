//! Appliance configuration
//!
//! The configuration file is owned by the appliance's setup screens; this
//! crate only ever reads it. Every field has a default so a partial or
//! missing file still yields a usable [`Config`].

use anyhow::{Context, Result};
use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::schedule::Schedule;

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "FILMBOTCTL_CONFIG";

/// Installed location of the appliance configuration.
pub const SYSTEM_CONFIG_PATH: &str = "/opt/filmbot-appliance/config.toml";

/// Read-only view of the configuration the control plane consumes.
pub trait ConfigSource {
    fn schedules(&self) -> &[Schedule];

    fn alert_config(&self) -> &AlertConfig;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_device_name")]
    pub device_name: String,

    #[serde(default)]
    pub devices: DevicesConfig,

    /// Entries that cannot be read are kept as malformed schedules
    #[serde(default, deserialize_with = "crate::schedule::model::deserialize_entries")]
    pub schedules: Vec<Schedule>,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub health: HealthConfig,

    #[serde(default)]
    pub alerts: AlertConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            devices: DevicesConfig::default(),
            schedules: Vec::new(),
            scheduler: SchedulerConfig::default(),
            health: HealthConfig::default(),
            alerts: AlertConfig::default(),
        }
    }
}

impl ConfigSource for Config {
    fn schedules(&self) -> &[Schedule] {
        &self.schedules
    }

    fn alert_config(&self) -> &AlertConfig {
        &self.alerts
    }
}

fn default_device_name() -> String {
    "Filmbot".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevicesConfig {
    /// Capture device node. Empty means no capture device is expected.
    #[serde(default = "default_video_device")]
    pub video_device: String,
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            video_device: default_video_device(),
        }
    }
}

fn default_video_device() -> String {
    "/dev/video5".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_unit_dir")]
    pub unit_dir: PathBuf,

    #[serde(default = "default_record_command")]
    pub record_command: String,

    #[serde(default = "default_run_as")]
    pub run_as: String,

    /// Prefix `systemctl` invocations with `sudo`
    #[serde(default)]
    pub use_sudo: bool,

    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            unit_dir: default_unit_dir(),
            record_command: default_record_command(),
            run_as: default_run_as(),
            use_sudo: false,
            command_timeout_secs: default_command_timeout(),
        }
    }
}

fn default_unit_dir() -> PathBuf {
    PathBuf::from("/etc/systemd/system")
}

fn default_record_command() -> String {
    "/opt/filmbot-appliance/record-atem.sh".to_string()
}

fn default_run_as() -> String {
    "filmbot".to_string()
}

fn default_command_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Mount point of the recordings drive
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,

    /// ATEM switcher address. Empty disables the check.
    #[serde(default = "default_switcher_address")]
    pub switcher_address: String,

    /// Host pinged to decide whether the appliance is online. Empty disables the check.
    #[serde(default = "default_network_probe_host")]
    pub network_probe_host: String,

    #[serde(default = "default_thermal_zone")]
    pub thermal_zone: PathBuf,

    #[serde(default = "default_check_timeout")]
    pub check_timeout_secs: u64,

    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            switcher_address: default_switcher_address(),
            network_probe_host: default_network_probe_host(),
            thermal_zone: default_thermal_zone(),
            check_timeout_secs: default_check_timeout(),
            state_file: default_state_file(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("/mnt/nvme")
}

fn default_switcher_address() -> String {
    "192.168.100.2".to_string()
}

fn default_network_probe_host() -> String {
    "8.8.8.8".to_string()
}

fn default_thermal_zone() -> PathBuf {
    PathBuf::from("/sys/class/thermal/thermal_zone0/temp")
}

fn default_check_timeout() -> u64 {
    10
}

fn default_state_file() -> PathBuf {
    PathBuf::from("/var/tmp/filmbot-health-state.json")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default)]
    pub email_from: String,

    #[serde(default)]
    pub email_to: Vec<String>,

    /// App password for the sending account
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub smtp_password: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiet_hours: Option<QuietHours>,

    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: u32,

    #[serde(default = "default_digest_time", with = "clock_time")]
    pub digest_time: NaiveTime,

    #[serde(default = "default_true")]
    pub send_resolved: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            email_from: String::new(),
            email_to: Vec::new(),
            smtp_password: String::new(),
            quiet_hours: None,
            cooldown_minutes: default_cooldown_minutes(),
            digest_time: default_digest_time(),
            send_resolved: true,
        }
    }
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_cooldown_minutes() -> u32 {
    60
}

fn default_digest_time() -> NaiveTime {
    NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default()
}

/// Daily window during which warnings are held back for the digest.
///
/// `start == end` is an empty window. A window whose end is earlier than its
/// start wraps midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    #[serde(with = "clock_time")]
    pub start: NaiveTime,

    #[serde(with = "clock_time")]
    pub end: NaiveTime,
}

impl QuietHours {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start <= self.end {
            time >= self.start && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }
}

/// `HH:MM` (or `HH:MM:SS`) wall-clock times in the config file.
mod clock_time {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        let text = if time.second() == 0 {
            time.format("%H:%M").to_string()
        } else {
            time.format("%H:%M:%S").to_string()
        };
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::parse_clock_time(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid time of day '{}'", text)))
    }
}

/// Parse a 24-hour `HH:MM` or `HH:MM:SS` time, rejecting leap seconds.
pub fn parse_clock_time(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    NaiveTime::parse_from_str(text, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M:%S"))
        .ok()
        .filter(|t| t.nanosecond() < 1_000_000_000)
}

/// Resolve which config file to read.
///
/// Order: explicit path, `FILMBOTCTL_CONFIG`, the installed appliance path,
/// then `~/.filmbot/config.toml` for development machines.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    let system = PathBuf::from(SYSTEM_CONFIG_PATH);
    if system.parent().is_some_and(Path::exists) {
        return system;
    }

    dirs::home_dir()
        .map(|home| home.join(".filmbot").join("config.toml"))
        .unwrap_or(system)
}

impl Config {
    /// Load the config, falling back to defaults when the file does not exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = config_path(explicit);
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }
}
