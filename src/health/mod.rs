//! Appliance health monitoring
//!
//! A [`HealthSampler`] runs the fixed battery of checks through a
//! [`SystemProbe`] and classifies each measurement with the thresholds in
//! [`classify`]. The result is an immutable [`HealthSnapshot`].

pub mod classify;
pub mod error;
pub mod probe;
pub mod sampler;

pub use error::CheckUnavailable;
pub use probe::{LinuxProbe, StorageUsage, SystemProbe};
pub use sampler::{HealthSampler, SamplerSettings};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Severity of a single check or of a whole snapshot
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Ok,
    Warning,
    Critical,
}

impl Status {
    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Ok => "✅",
            Self::Warning => "🟡",
            Self::Critical => "🔴",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub status: Status,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl CheckResult {
    pub fn new(name: impl Into<String>, status: Status, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            message: message.into(),
            value: None,
        }
    }

    pub fn ok(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, Status::Ok, message)
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }
}

/// One sampling pass. `overall` is the worst status among `checks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub timestamp: DateTime<Local>,
    pub device_name: String,
    pub checks: Vec<CheckResult>,
    pub overall: Status,
}

impl HealthSnapshot {
    pub fn new(
        timestamp: DateTime<Local>,
        device_name: impl Into<String>,
        checks: Vec<CheckResult>,
    ) -> Self {
        let overall = checks
            .iter()
            .map(|c| c.status)
            .max()
            .unwrap_or_default();
        Self {
            timestamp,
            device_name: device_name.into(),
            checks,
            overall,
        }
    }

    pub fn get(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.name == name)
    }

    pub fn is_healthy(&self) -> bool {
        self.overall == Status::Ok
    }
}
