//! In-memory host scheduler used by tests

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use super::error::{HostCallError, Result};
use super::HostScheduler;

#[derive(Debug, Default)]
struct HostState {
    units: BTreeMap<String, String>,
    enabled: BTreeSet<String>,
    active: BTreeSet<String>,
    calls: Vec<String>,
    failing: BTreeSet<String>,
}

/// Mimics systemctl semantics closely enough for reconciliation tests.
///
/// Every call is recorded as `"<verb> <unit>"` (or just the verb), and calls
/// registered with [`MemoryHost::fail_on`] exit with status 1.
#[derive(Debug, Default)]
pub struct MemoryHost {
    state: Mutex<HostState>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HostState> {
        self.state.lock().expect("memory host lock poisoned")
    }

    /// Make every future call rendered as `call` fail, e.g. `"start filmbot-record-a.timer"`.
    pub fn fail_on(&self, call: &str) {
        self.lock().failing.insert(call.to_string());
    }

    pub fn clear_failures(&self) {
        self.lock().failing.clear();
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn unit_names(&self) -> Vec<String> {
        self.lock().units.keys().cloned().collect()
    }

    pub fn unit_text(&self, name: &str) -> Option<String> {
        self.lock().units.get(name).cloned()
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.lock().enabled.contains(name)
    }

    /// Simulate a timer that stopped behind our back.
    pub fn deactivate(&self, name: &str) {
        self.lock().active.remove(name);
    }

    /// Simulate someone hand-editing a unit file.
    pub fn tamper(&self, name: &str, text: &str) {
        self.lock().units.insert(name.to_string(), text.to_string());
    }

    fn record(&self, verb: &str, unit: Option<&str>) -> Result<std::sync::MutexGuard<'_, HostState>> {
        let call = match unit {
            Some(unit) => format!("{} {}", verb, unit),
            None => verb.to_string(),
        };
        let mut state = self.lock();
        state.calls.push(call.clone());
        if state.failing.contains(&call) {
            return Err(HostCallError::Failed {
                command: format!("systemctl {}", call),
                status: "exit status: 1".to_string(),
                exit_code: Some(1),
                stderr: "simulated failure".to_string(),
            });
        }
        Ok(state)
    }

    fn require_unit(state: &HostState, verb: &str, name: &str) -> Result<()> {
        if state.units.contains_key(name) {
            Ok(())
        } else {
            Err(HostCallError::Failed {
                command: format!("systemctl {} {}", verb, name),
                status: "exit status: 5".to_string(),
                exit_code: Some(5),
                stderr: format!("Unit {} not found.", name),
            })
        }
    }
}

#[async_trait]
impl HostScheduler for MemoryHost {
    async fn list_units(&self, prefix: &str) -> Result<Vec<String>> {
        let state = self.record("list", None)?;
        Ok(state
            .units
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn read_unit(&self, name: &str) -> Result<Option<String>> {
        Ok(self.lock().units.get(name).cloned())
    }

    async fn write_unit(&self, name: &str, text: &str) -> Result<()> {
        let mut state = self.record("write", Some(name))?;
        state.units.insert(name.to_string(), text.to_string());
        Ok(())
    }

    async fn remove_unit(&self, name: &str) -> Result<()> {
        let mut state = self.record("remove", Some(name))?;
        state.units.remove(name);
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        self.record("daemon-reload", None).map(|_| ())
    }

    async fn enable(&self, name: &str) -> Result<()> {
        let mut state = self.record("enable", Some(name))?;
        Self::require_unit(&state, "enable", name)?;
        state.enabled.insert(name.to_string());
        Ok(())
    }

    async fn disable(&self, name: &str) -> Result<()> {
        let mut state = self.record("disable", Some(name))?;
        state.enabled.remove(name);
        Ok(())
    }

    async fn start(&self, name: &str) -> Result<()> {
        let mut state = self.record("start", Some(name))?;
        Self::require_unit(&state, "start", name)?;
        state.active.insert(name.to_string());
        Ok(())
    }

    async fn stop(&self, name: &str) -> Result<()> {
        let mut state = self.record("stop", Some(name))?;
        state.active.remove(name);
        Ok(())
    }

    async fn is_active(&self, name: &str) -> Result<bool> {
        Ok(self.lock().active.contains(name))
    }
}
