//! Integration tests for the health sampling and alerting pipeline
//!
//! A scripted probe feeds the sampler; the resulting snapshots go through the
//! alert policy and a recording mail transport, with alert state persisted
//! to disk between passes the way separate `health run` invocations do.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone};
use filmbot_control::alert::error::Result as NotifyResult;
use filmbot_control::alert::{AlertPolicy, AlertStateStore, MailTransport, Notifier};
use filmbot_control::cli::health::alert_pass;
use filmbot_control::config::{AlertConfig, Config, QuietHours};
use filmbot_control::health::error::Result as ProbeResult;
use filmbot_control::health::{
    HealthSampler, HealthSnapshot, SamplerSettings, Status, StorageUsage, SystemProbe,
};

struct ScriptedProbe {
    free_percent: Mutex<u64>,
    switcher_up: Mutex<bool>,
}

impl ScriptedProbe {
    fn new(free_percent: u64) -> Self {
        Self {
            free_percent: Mutex::new(free_percent),
            switcher_up: Mutex::new(true),
        }
    }

    fn set_switcher(&self, up: bool) {
        *self.switcher_up.lock().unwrap() = up;
    }
}

#[async_trait]
impl SystemProbe for ScriptedProbe {
    async fn storage(&self, _path: &Path) -> ProbeResult<Option<StorageUsage>> {
        Ok(Some(StorageUsage {
            total_bytes: 1_000_000,
            free_bytes: *self.free_percent.lock().unwrap() * 10_000,
        }))
    }

    async fn path_exists(&self, _path: &Path) -> bool {
        true
    }

    async fn ping(&self, host: &str) -> ProbeResult<bool> {
        if host == "192.168.100.2" {
            Ok(*self.switcher_up.lock().unwrap())
        } else {
            Ok(true)
        }
    }

    async fn cpu_percent(&self) -> ProbeResult<f64> {
        Ok(20.0)
    }

    async fn memory_percent(&self) -> ProbeResult<f64> {
        Ok(35.0)
    }

    async fn temperature_c(&self) -> ProbeResult<Option<f64>> {
        Ok(Some(48.0))
    }

    async fn uptime_secs(&self) -> ProbeResult<u64> {
        Ok(3 * 86_400)
    }
}

#[derive(Default)]
struct Outbox {
    subjects: Mutex<Vec<String>>,
}

impl Outbox {
    fn subjects(&self) -> Vec<String> {
        self.subjects.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailTransport for Outbox {
    async fn send(&self, _to: &[String], subject: &str, _body: &str) -> NotifyResult<()> {
        self.subjects.lock().unwrap().push(subject.to_string());
        Ok(())
    }
}

fn alert_config() -> AlertConfig {
    AlertConfig {
        enabled: true,
        email_to: vec!["ops@example.org".to_string()],
        quiet_hours: Some(QuietHours::new(
            NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
        )),
        cooldown_minutes: 60,
        // keep the digest out of the way until a test asks for it
        digest_time: NaiveTime::from_hms_opt(23, 59, 0).unwrap(),
        ..AlertConfig::default()
    }
}

fn sampler(probe: ScriptedProbe) -> HealthSampler<ScriptedProbe> {
    let config = Config {
        device_name: "Filmbot Main Hall".to_string(),
        ..Config::default()
    };
    HealthSampler::new(probe, SamplerSettings::from_config(&config))
}

fn at(hour: u32, minute: u32) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(2026, 3, 10, hour, minute, 0)
        .single()
        .unwrap()
}

async fn pass(
    snapshot: &HealthSnapshot,
    policy: &AlertPolicy,
    notifier: &Notifier<Outbox>,
    store: &AlertStateStore,
    now: DateTime<Local>,
) {
    let mut state = store.load();
    alert_pass(snapshot, policy, Some(notifier), &mut state, now).await;
    store.save(&state).unwrap();
}

#[tokio::test]
async fn test_storage_levels_map_to_overall_status() {
    for (free, expected) in [
        (8, Status::Critical),
        (15, Status::Warning),
        (50, Status::Ok),
    ] {
        let snapshot = sampler(ScriptedProbe::new(free)).sample().await;
        assert_eq!(snapshot.overall, expected, "free {}%", free);
    }
}

#[tokio::test]
async fn test_critical_twice_within_cooldown_sends_one_email() {
    let dir = tempfile::tempdir().unwrap();
    let store = AlertStateStore::new(dir.path().join("state.json"));
    let policy = AlertPolicy::from_config(&alert_config());
    let notifier = Notifier::new(
        Outbox::default(),
        "Filmbot Main Hall",
        vec!["ops@example.org".to_string()],
    );
    let sampler = sampler(ScriptedProbe::new(8));

    let snapshot = sampler.sample().await;
    pass(&snapshot, &policy, &notifier, &store, at(12, 0)).await;
    let snapshot = sampler.sample().await;
    pass(&snapshot, &policy, &notifier, &store, at(12, 5)).await;

    assert_eq!(
        notifier.transport().subjects(),
        vec!["🔴 CRITICAL: storage - Filmbot Main Hall".to_string()]
    );
}

#[tokio::test]
async fn test_night_warning_waits_for_digest_while_critical_goes_out() {
    let dir = tempfile::tempdir().unwrap();
    let store = AlertStateStore::new(dir.path().join("state.json"));
    let policy = AlertPolicy::from_config(&alert_config());
    let notifier = Notifier::new(
        Outbox::default(),
        "Filmbot Main Hall",
        vec!["ops@example.org".to_string()],
    );
    let probe = ScriptedProbe::new(8);
    probe.set_switcher(false);
    let sampler = sampler(probe);

    let snapshot = sampler.sample().await;
    pass(&snapshot, &policy, &notifier, &store, at(23, 0)).await;

    assert_eq!(
        notifier.transport().subjects(),
        vec!["🔴 CRITICAL: storage - Filmbot Main Hall".to_string()]
    );
    let state = store.load();
    assert_eq!(state.pending_digest.len(), 1);
    assert_eq!(state.pending_digest[0].check_name, "switcher");
}

#[tokio::test]
async fn test_recovery_sends_resolution_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = AlertStateStore::new(dir.path().join("state.json"));
    let policy = AlertPolicy::from_config(&alert_config());
    let notifier = Notifier::new(
        Outbox::default(),
        "Filmbot Main Hall",
        vec!["ops@example.org".to_string()],
    );
    let snapshot = sampler(ScriptedProbe::new(15)).sample().await;
    pass(&snapshot, &policy, &notifier, &store, at(10, 0)).await;

    let snapshot = sampler(ScriptedProbe::new(60)).sample().await;
    pass(&snapshot, &policy, &notifier, &store, at(10, 30)).await;
    pass(&snapshot, &policy, &notifier, &store, at(11, 0)).await;

    assert_eq!(
        notifier.transport().subjects(),
        vec![
            "🟡 WARNING: storage - Filmbot Main Hall".to_string(),
            "✅ RESOLVED: storage - Filmbot Main Hall".to_string(),
        ]
    );
    assert!(store.load().per_check.is_empty());
}

#[tokio::test]
async fn test_digest_carries_overnight_warnings() {
    let dir = tempfile::tempdir().unwrap();
    let store = AlertStateStore::new(dir.path().join("state.json"));
    let config = AlertConfig {
        digest_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        ..alert_config()
    };
    let policy = AlertPolicy::from_config(&config);
    let notifier = Notifier::new(
        Outbox::default(),
        "Filmbot Main Hall",
        vec!["ops@example.org".to_string()],
    );
    let probe = ScriptedProbe::new(50);
    probe.set_switcher(false);
    let sampler = sampler(probe);

    let mut state = store.load();
    state.last_digest_on = NaiveDate::from_ymd_opt(2026, 3, 9);
    store.save(&state).unwrap();

    let night = Local
        .with_ymd_and_hms(2026, 3, 9, 23, 30, 0)
        .single()
        .unwrap();
    let snapshot = sampler.sample().await;
    pass(&snapshot, &policy, &notifier, &store, night).await;
    assert!(notifier.transport().subjects().is_empty());

    pass(&snapshot, &policy, &notifier, &store, at(8, 15)).await;

    let subjects = notifier.transport().subjects();
    assert_eq!(subjects.len(), 2);
    assert!(subjects.contains(&"🟡 Daily Report - Filmbot Main Hall".to_string()));
    let state = store.load();
    assert!(state.pending_digest.is_empty());
    assert_eq!(state.last_digest_on, Some(at(8, 15).date_naive()));
}
