//! Raw measurements of the host
//!
//! [`SystemProbe`] is the seam between the sampler and the machine. The
//! sampler only classifies numbers; everything that touches `/proc`, `/sys`,
//! the filesystem or external tools lives behind this trait.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::error::{CheckUnavailable, Result};

const PROC_STAT: &str = "/proc/stat";
const PROC_MEMINFO: &str = "/proc/meminfo";
const PROC_UPTIME: &str = "/proc/uptime";
const CPU_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);
const PING_WAIT_SECS: &str = "2";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageUsage {
    pub total_bytes: u64,
    pub free_bytes: u64,
}

impl StorageUsage {
    pub fn free_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.free_bytes as f64 / self.total_bytes as f64 * 100.0
    }
}

#[async_trait]
pub trait SystemProbe: Send + Sync {
    /// Capacity of the filesystem holding `path`. `None` when the path does not exist.
    async fn storage(&self, path: &Path) -> Result<Option<StorageUsage>>;

    async fn path_exists(&self, path: &Path) -> bool;

    /// One ICMP echo. `Ok(false)` means the host did not answer.
    async fn ping(&self, host: &str) -> Result<bool>;

    async fn cpu_percent(&self) -> Result<f64>;

    async fn memory_percent(&self) -> Result<f64>;

    /// `None` when the machine exposes no thermal sensor.
    async fn temperature_c(&self) -> Result<Option<f64>>;

    async fn uptime_secs(&self) -> Result<u64>;
}

/// Reads the live Linux host
#[derive(Debug, Clone)]
pub struct LinuxProbe {
    thermal_zone: PathBuf,
}

impl LinuxProbe {
    pub fn new(thermal_zone: impl Into<PathBuf>) -> Self {
        Self {
            thermal_zone: thermal_zone.into(),
        }
    }
}

#[async_trait]
impl SystemProbe for LinuxProbe {
    async fn storage(&self, path: &Path) -> Result<Option<StorageUsage>> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Ok(None);
        }
        let owned = path.to_path_buf();
        let stats = tokio::task::spawn_blocking(move || nix::sys::statvfs::statvfs(&owned))
            .await
            .map_err(|e| CheckUnavailable::ToolMissing {
                tool: "statvfs".to_string(),
                reason: e.to_string(),
            })?
            .map_err(|errno| {
                CheckUnavailable::read(path.display().to_string(), std::io::Error::from(errno))
            })?;

        #[allow(clippy::unnecessary_cast)]
        let fragment = stats.fragment_size() as u64;
        #[allow(clippy::unnecessary_cast)]
        let usage = StorageUsage {
            total_bytes: stats.blocks() as u64 * fragment,
            free_bytes: stats.blocks_available() as u64 * fragment,
        };
        Ok(Some(usage))
    }

    async fn path_exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn ping(&self, host: &str) -> Result<bool> {
        let status = Command::new("ping")
            .args(["-c", "1", "-W", PING_WAIT_SECS, host])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| {
                let reason = if e.kind() == ErrorKind::NotFound {
                    "command not found".to_string()
                } else {
                    e.to_string()
                };
                CheckUnavailable::ToolMissing {
                    tool: "ping".to_string(),
                    reason,
                }
            })?;
        debug!(host, code = ?status.code(), "ping finished");
        Ok(status.success())
    }

    async fn cpu_percent(&self) -> Result<f64> {
        let first = read_cpu_times().await?;
        tokio::time::sleep(CPU_SAMPLE_INTERVAL).await;
        let second = read_cpu_times().await?;
        Ok(cpu_busy_percent(first, second))
    }

    async fn memory_percent(&self) -> Result<f64> {
        let text = read_text(Path::new(PROC_MEMINFO)).await?;
        parse_meminfo(&text)
    }

    async fn temperature_c(&self) -> Result<Option<f64>> {
        let text = match tokio::fs::read_to_string(&self.thermal_zone).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CheckUnavailable::read(self.thermal_zone.display().to_string(), e)),
        };
        parse_millidegrees(&text).map(Some)
    }

    async fn uptime_secs(&self) -> Result<u64> {
        let text = read_text(Path::new(PROC_UPTIME)).await?;
        parse_uptime(&text)
    }
}

async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CheckUnavailable::read(path.display().to_string(), e))
}

/// Busy and total jiffies from the aggregate `cpu` line of `/proc/stat`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    pub busy: u64,
    pub total: u64,
}

async fn read_cpu_times() -> Result<CpuTimes> {
    let text = read_text(Path::new(PROC_STAT)).await?;
    parse_proc_stat(&text)
}

pub fn parse_proc_stat(text: &str) -> Result<CpuTimes> {
    let line = text
        .lines()
        .find(|l| l.starts_with("cpu "))
        .ok_or_else(|| CheckUnavailable::parse("/proc/stat", text.lines().next().unwrap_or("")))?;

    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .map(|f| f.parse::<u64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| CheckUnavailable::parse("/proc/stat", line))?;
    if fields.len() < 4 {
        return Err(CheckUnavailable::parse("/proc/stat", line));
    }

    let total: u64 = fields.iter().sum();
    // idle + iowait
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    Ok(CpuTimes {
        busy: total.saturating_sub(idle),
        total,
    })
}

pub fn cpu_busy_percent(first: CpuTimes, second: CpuTimes) -> f64 {
    let total = second.total.saturating_sub(first.total);
    if total == 0 {
        return 0.0;
    }
    let busy = second.busy.saturating_sub(first.busy);
    busy as f64 / total as f64 * 100.0
}

/// Used memory as a percentage of `MemTotal`, counting `MemAvailable` as free
pub fn parse_meminfo(text: &str) -> Result<f64> {
    let field = |name: &str| -> Option<u64> {
        text.lines()
            .find_map(|l| l.strip_prefix(name))
            .and_then(|rest| rest.trim_start_matches(':').split_whitespace().next())
            .and_then(|v| v.parse().ok())
    };
    let total = field("MemTotal").filter(|t| *t > 0);
    let available = field("MemAvailable");
    match (total, available) {
        (Some(total), Some(available)) => {
            let used = total.saturating_sub(available);
            Ok(used as f64 / total as f64 * 100.0)
        }
        _ => Err(CheckUnavailable::parse("/proc/meminfo", "MemTotal/MemAvailable")),
    }
}

pub fn parse_millidegrees(text: &str) -> Result<f64> {
    let trimmed = text.trim();
    trimmed
        .parse::<i64>()
        .map(|milli| milli as f64 / 1000.0)
        .map_err(|_| CheckUnavailable::parse("thermal zone", trimmed))
}

pub fn parse_uptime(text: &str) -> Result<u64> {
    let first = text.split_whitespace().next().unwrap_or("");
    first
        .parse::<f64>()
        .map(|secs| secs.max(0.0) as u64)
        .map_err(|_| CheckUnavailable::parse("/proc/uptime", first))
}
