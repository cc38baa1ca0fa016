//! Fixed health thresholds
//!
//! Every comparison is strict: a value sitting exactly on a threshold is
//! classified as the milder status.

use std::path::Path;
use std::time::Duration;

use super::error::CheckUnavailable;
use super::probe::StorageUsage;
use super::{CheckResult, Status};

pub const STORAGE: &str = "storage";
pub const CAPTURE_DEVICE: &str = "capture_device";
pub const SWITCHER: &str = "switcher";
pub const NETWORK: &str = "network";
pub const CPU: &str = "cpu";
pub const MEMORY: &str = "memory";
pub const TEMPERATURE: &str = "temperature";
pub const UPTIME: &str = "uptime";

/// Free space below this percentage is critical
pub const STORAGE_CRITICAL_FREE_PERCENT: f64 = 10.0;
/// Free space below this percentage is a warning
pub const STORAGE_WARNING_FREE_PERCENT: f64 = 20.0;
pub const CPU_WARNING_PERCENT: f64 = 80.0;
pub const MEMORY_WARNING_PERCENT: f64 = 85.0;
pub const TEMP_WARNING_CELSIUS: f64 = 70.0;
pub const TEMP_CRITICAL_CELSIUS: f64 = 80.0;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

pub fn storage_status(free_percent: f64) -> Status {
    if free_percent < STORAGE_CRITICAL_FREE_PERCENT {
        Status::Critical
    } else if free_percent < STORAGE_WARNING_FREE_PERCENT {
        Status::Warning
    } else {
        Status::Ok
    }
}

pub fn storage(usage: &StorageUsage) -> CheckResult {
    let percent = usage.free_percent();
    let free_gb = usage.free_bytes as f64 / GIB;
    let total_gb = usage.total_bytes as f64 / GIB;
    let status = storage_status(percent);
    let message = match status {
        Status::Critical => format!(
            "Disk space critically low: {:.1} GB free ({:.1}%) of {:.1} GB. Delete old recordings or expand storage",
            free_gb, percent, total_gb
        ),
        Status::Warning => format!(
            "Disk space running low: {:.1} GB free ({:.1}%) of {:.1} GB",
            free_gb, percent, total_gb
        ),
        Status::Ok => format!("{:.1} GB free ({:.1}%)", free_gb, percent),
    };
    CheckResult::new(STORAGE, status, message).with_value(percent)
}

pub fn storage_not_mounted(path: &Path) -> CheckResult {
    CheckResult::new(
        STORAGE,
        Status::Critical,
        format!(
            "Recording drive not mounted at {}. Check that the drive is connected and mounted",
            path.display()
        ),
    )
}

pub fn capture_device(path: &Path, present: bool) -> CheckResult {
    if present {
        CheckResult::ok(CAPTURE_DEVICE, format!("{} present", path.display()))
    } else {
        CheckResult::new(
            CAPTURE_DEVICE,
            Status::Critical,
            format!(
                "Video device {} not found. Check USB connections and switcher power",
                path.display()
            ),
        )
    }
}

/// Reachability problems never exceed WARNING; recording continues without a network.
pub fn reachability(name: &str, target: &str, reachable: bool) -> CheckResult {
    if reachable {
        CheckResult::ok(name, format!("{} reachable", target))
    } else {
        CheckResult::new(name, Status::Warning, format!("{} not responding", target))
    }
}

pub fn cpu_status(percent: f64) -> Status {
    if percent > CPU_WARNING_PERCENT {
        Status::Warning
    } else {
        Status::Ok
    }
}

pub fn cpu(percent: f64) -> CheckResult {
    let status = cpu_status(percent);
    let suffix = if status == Status::Ok { "" } else { " (HIGH)" };
    CheckResult::new(CPU, status, format!("CPU usage {:.1}%{}", percent, suffix)).with_value(percent)
}

pub fn memory_status(percent: f64) -> Status {
    if percent > MEMORY_WARNING_PERCENT {
        Status::Warning
    } else {
        Status::Ok
    }
}

pub fn memory(percent: f64) -> CheckResult {
    let status = memory_status(percent);
    let suffix = if status == Status::Ok { "" } else { " (HIGH)" };
    CheckResult::new(
        MEMORY,
        status,
        format!("Memory usage {:.1}%{}", percent, suffix),
    )
    .with_value(percent)
}

pub fn temperature_status(celsius: f64) -> Status {
    if celsius > TEMP_CRITICAL_CELSIUS {
        Status::Critical
    } else if celsius > TEMP_WARNING_CELSIUS {
        Status::Warning
    } else {
        Status::Ok
    }
}

pub fn temperature(celsius: f64) -> CheckResult {
    let status = temperature_status(celsius);
    let suffix = match status {
        Status::Critical => " (CRITICAL)",
        Status::Warning => " (HIGH)",
        Status::Ok => "",
    };
    CheckResult::new(
        TEMPERATURE,
        status,
        format!("Temperature {:.1}°C{}", celsius, suffix),
    )
    .with_value(celsius)
}

pub fn uptime(seconds: u64) -> CheckResult {
    CheckResult::ok(UPTIME, format!("Up {}", format_uptime(seconds))).with_value(seconds as f64)
}

pub fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    if days > 0 {
        format!("{} days, {} hours", days, hours)
    } else {
        format!("{} hours", hours)
    }
}

pub fn not_configured(name: &str, what: &str) -> CheckResult {
    CheckResult::ok(name, format!("No {} configured", what))
}

pub fn unavailable(name: &str, err: &CheckUnavailable) -> CheckResult {
    CheckResult::new(name, Status::Warning, format!("Check could not run: {}", err))
}

pub fn timed_out(name: &str, timeout: Duration) -> CheckResult {
    CheckResult::new(
        name,
        Status::Warning,
        format!("Check timed out after {}s", timeout.as_secs()),
    )
}
