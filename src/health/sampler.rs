use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;
use futures_util::future::{join_all, BoxFuture, FutureExt};
use tracing::{debug, warn};

use super::classify;
use super::probe::SystemProbe;
use super::{CheckResult, HealthSnapshot};
use crate::config::Config;

/// Where and how long to look
#[derive(Debug, Clone)]
pub struct SamplerSettings {
    pub device_name: String,
    pub storage_path: PathBuf,
    /// `None` when the appliance has no capture device
    pub video_device: Option<PathBuf>,
    /// `None` skips the switcher check
    pub switcher_address: Option<String>,
    /// `None` skips the connectivity check
    pub network_probe_host: Option<String>,
    pub check_timeout: Duration,
}

impl SamplerSettings {
    pub fn from_config(config: &Config) -> Self {
        let configured = |s: &str| {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        };
        Self {
            device_name: config.device_name.clone(),
            storage_path: config.health.storage_path.clone(),
            video_device: configured(&config.devices.video_device).map(PathBuf::from),
            switcher_address: configured(&config.health.switcher_address),
            network_probe_host: configured(&config.health.network_probe_host),
            check_timeout: Duration::from_secs(config.health.check_timeout_secs.max(1)),
        }
    }
}

pub struct HealthSampler<P: SystemProbe> {
    probe: P,
    settings: SamplerSettings,
}

impl<P: SystemProbe> HealthSampler<P> {
    pub fn new(probe: P, settings: SamplerSettings) -> Self {
        Self { probe, settings }
    }

    /// Run every check concurrently and collect a snapshot.
    ///
    /// Never fails: a check that cannot measure, or that exceeds the
    /// per-check timeout, is reported as a WARNING. Results come back in a
    /// fixed order regardless of completion order.
    pub async fn sample(&self) -> HealthSnapshot {
        let checks: Vec<BoxFuture<'_, CheckResult>> = vec![
            self.guarded(classify::STORAGE, self.check_storage()),
            self.guarded(classify::CAPTURE_DEVICE, self.check_capture_device()),
            self.guarded(classify::SWITCHER, self.check_switcher()),
            self.guarded(classify::NETWORK, self.check_network()),
            self.guarded(classify::CPU, self.check_cpu()),
            self.guarded(classify::MEMORY, self.check_memory()),
            self.guarded(classify::TEMPERATURE, self.check_temperature()),
            self.guarded(classify::UPTIME, self.check_uptime()),
        ];

        let results = join_all(checks).await;
        let snapshot = HealthSnapshot::new(Local::now(), self.settings.device_name.clone(), results);
        debug!(overall = %snapshot.overall, checks = snapshot.checks.len(), "health sampled");
        snapshot
    }

    fn guarded<'a, F>(&'a self, name: &'static str, check: F) -> BoxFuture<'a, CheckResult>
    where
        F: Future<Output = CheckResult> + Send + 'a,
    {
        let timeout = self.settings.check_timeout;
        async move {
            match tokio::time::timeout(timeout, check).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(check = name, timeout_secs = timeout.as_secs(), "health check timed out");
                    classify::timed_out(name, timeout)
                }
            }
        }
        .boxed()
    }

    async fn check_storage(&self) -> CheckResult {
        let path = &self.settings.storage_path;
        match self.probe.storage(path).await {
            Ok(Some(usage)) => classify::storage(&usage),
            Ok(None) => classify::storage_not_mounted(path),
            Err(e) => classify::unavailable(classify::STORAGE, &e),
        }
    }

    async fn check_capture_device(&self) -> CheckResult {
        match &self.settings.video_device {
            Some(path) => {
                let present = self.probe.path_exists(path).await;
                classify::capture_device(path, present)
            }
            None => classify::not_configured(classify::CAPTURE_DEVICE, "capture device"),
        }
    }

    async fn check_switcher(&self) -> CheckResult {
        match &self.settings.switcher_address {
            Some(address) => self.reachability(classify::SWITCHER, address).await,
            None => classify::not_configured(classify::SWITCHER, "switcher address"),
        }
    }

    async fn check_network(&self) -> CheckResult {
        match &self.settings.network_probe_host {
            Some(host) => self.reachability(classify::NETWORK, host).await,
            None => classify::not_configured(classify::NETWORK, "network probe host"),
        }
    }

    async fn reachability(&self, name: &str, target: &str) -> CheckResult {
        match self.probe.ping(target).await {
            Ok(reachable) => classify::reachability(name, target, reachable),
            Err(e) => classify::unavailable(name, &e),
        }
    }

    async fn check_cpu(&self) -> CheckResult {
        match self.probe.cpu_percent().await {
            Ok(percent) => classify::cpu(percent),
            Err(e) => classify::unavailable(classify::CPU, &e),
        }
    }

    async fn check_memory(&self) -> CheckResult {
        match self.probe.memory_percent().await {
            Ok(percent) => classify::memory(percent),
            Err(e) => classify::unavailable(classify::MEMORY, &e),
        }
    }

    async fn check_temperature(&self) -> CheckResult {
        match self.probe.temperature_c().await {
            Ok(Some(celsius)) => classify::temperature(celsius),
            Ok(None) => CheckResult::ok(classify::TEMPERATURE, "No thermal sensor"),
            Err(e) => classify::unavailable(classify::TEMPERATURE, &e),
        }
    }

    async fn check_uptime(&self) -> CheckResult {
        match self.probe.uptime_secs().await {
            Ok(secs) => classify::uptime(secs),
            Err(e) => classify::unavailable(classify::UPTIME, &e),
        }
    }
}
