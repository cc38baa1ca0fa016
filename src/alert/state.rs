//! Alert state - JSON file persistence between health passes

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::health::Status;

/// Last known status of one check and when a human was last told about it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckAlert {
    pub last_status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_notified_at: Option<DateTime<Utc>>,
}

/// A warning (or its resolution) held back for the next digest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingWarning {
    pub check_name: String,
    pub status: Status,
    pub message: String,
    pub queued_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertState {
    #[serde(default)]
    pub per_check: BTreeMap<String, CheckAlert>,
    #[serde(default)]
    pub pending_digest: Vec<PendingWarning>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_digest_on: Option<NaiveDate>,
}

impl AlertState {
    /// Queue a warning, replacing any earlier entry for the same check.
    pub fn queue(&mut self, pending: PendingWarning) {
        self.pending_digest
            .retain(|p| p.check_name != pending.check_name);
        self.pending_digest.push(pending);
    }

    /// Undo the bookkeeping for a notification that could not be delivered,
    /// so the next pass treats the check as never notified.
    pub fn forget_notification(&mut self, check_name: &str) {
        if let Some(entry) = self.per_check.get_mut(check_name) {
            entry.last_notified_at = None;
        }
    }
}

/// Reads and writes [`AlertState`] at a fixed path
pub struct AlertStateStore {
    path: PathBuf,
}

impl AlertStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable state starts over from empty.
    pub fn load(&self) -> AlertState {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no alert state yet");
                return AlertState::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), "Failed to read alert state: {}", e);
                return AlertState::default();
            }
        };
        if content.trim().is_empty() {
            return AlertState::default();
        }
        match serde_json::from_str(&content) {
            Ok(state) => state,
            Err(e) => {
                warn!(path = %self.path.display(), "Discarding corrupt alert state: {}", e);
                AlertState::default()
            }
        }
    }

    pub fn save(&self, state: &AlertState) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let content = serde_json::to_string_pretty(state)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to stage alert state in {}", dir.display()))?;
        tmp.write_all(content.as_bytes())?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}
