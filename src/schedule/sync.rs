//! Reconciliation of desired schedules against materialized systemd units

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::future::Future;
use tracing::{debug, info, warn};

use super::calendar::compile;
use super::error::InvalidSchedule;
use super::model::Schedule;
use super::unit::{
    generate, schedule_id_from_unit, service_name, timer_name, UnitPair, UnitSettings, UNIT_PREFIX,
};
use crate::host::{HostCallError, HostScheduler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Validate,
    List,
    Create,
    Update,
    Remove,
    Reload,
    Enable,
    Start,
    Stop,
    Disable,
}

impl SyncAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::List => "list",
            Self::Create => "create",
            Self::Update => "update",
            Self::Remove => "remove",
            Self::Reload => "daemon-reload",
            Self::Enable => "enable",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Disable => "disable",
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Applied,
    /// Host registration call not made because dry-run is active
    Skipped,
    Failed(HostCallError),
    Invalid(InvalidSchedule),
}

impl ItemOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Skipped => "skipped",
            Self::Failed(_) => "failed",
            Self::Invalid(_) => "invalid",
        }
    }

    pub fn error(&self) -> Option<String> {
        match self {
            Self::Failed(e) => Some(e.to_string()),
            Self::Invalid(e) => Some(e.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportItem {
    pub schedule_id: Option<String>,
    pub unit: Option<String>,
    pub action: SyncAction,
    pub outcome: ItemOutcome,
}

/// Everything one reconciliation pass did, skipped, or failed to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub dry_run: bool,
    pub items: Vec<ReportItem>,
    /// Schedules whose units were already correct and active
    pub unchanged: Vec<String>,
}

impl ReconcileReport {
    fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Default::default()
        }
    }

    fn push(
        &mut self,
        schedule_id: Option<&str>,
        unit: Option<&str>,
        action: SyncAction,
        outcome: ItemOutcome,
    ) {
        self.items.push(ReportItem {
            schedule_id: schedule_id.map(String::from),
            unit: unit.map(String::from),
            action,
            outcome,
        });
    }

    /// Number of mutations actually carried out against the host
    pub fn changes(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.outcome == ItemOutcome::Applied)
            .count()
    }

    pub fn skipped(&self) -> impl Iterator<Item = &ReportItem> {
        self.items
            .iter()
            .filter(|item| item.outcome == ItemOutcome::Skipped)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ReportItem> {
        self.items.iter().filter(|item| {
            matches!(
                item.outcome,
                ItemOutcome::Failed(_) | ItemOutcome::Invalid(_)
            )
        })
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn summary_line(&self) -> String {
        let failed = self.failures().count();
        let skipped = self.skipped().count();
        let mut line = format!(
            "{} change(s), {} unchanged, {} failure(s)",
            self.changes(),
            self.unchanged.len(),
            failed
        );
        if self.dry_run {
            line.push_str(&format!(", {} host call(s) skipped (dry run)", skipped));
        }
        line
    }
}

enum WriteResult {
    Written,
    Unchanged,
    Failed,
}

/// Makes the unit files and timer registrations match the desired schedules.
pub struct Synchronizer<H> {
    host: H,
    settings: UnitSettings,
    dry_run: bool,
}

impl<H: HostScheduler> Synchronizer<H> {
    /// `dry_run` skips reload/enable/start/stop/disable but still writes and
    /// removes unit files, so point the host at a scratch directory when simulating.
    pub fn new(host: H, settings: UnitSettings, dry_run: bool) -> Self {
        Self {
            host,
            settings,
            dry_run,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub async fn reconcile(&self, desired: &[Schedule]) -> ReconcileReport {
        let mut report = ReconcileReport::new(self.dry_run);

        let (wanted, protected) = self.plan(desired, &mut report);

        let materialized = match self.host.list_units(UNIT_PREFIX).await {
            Ok(names) => Some(
                names
                    .iter()
                    .filter_map(|name| schedule_id_from_unit(name))
                    .map(String::from)
                    .collect::<BTreeSet<_>>(),
            ),
            Err(e) => {
                warn!(error = %e, "Could not list installed units, skipping removals");
                report.push(None, None, SyncAction::List, ItemOutcome::Failed(e));
                None
            }
        };

        let mut files_changed = false;

        if let Some(current) = &materialized {
            for id in current {
                if wanted.contains_key(id) || protected.contains(id) {
                    continue;
                }
                self.remove_pair(id, &mut report).await;
                files_changed = true;
            }
        }

        let mut needs_activation = Vec::new();
        for (id, pair) in &wanted {
            match self.write_pair(pair, &mut report).await {
                WriteResult::Written => {
                    files_changed = true;
                    needs_activation.push(pair);
                }
                WriteResult::Unchanged => match self.host.is_active(&pair.timer_name).await {
                    Ok(true) => report.unchanged.push(id.clone()),
                    Ok(false) => {
                        info!(schedule = %id, timer = %pair.timer_name, "Timer not active, re-activating");
                        needs_activation.push(pair);
                    }
                    Err(e) => {
                        warn!(schedule = %id, error = %e, "Could not query timer state, re-activating");
                        needs_activation.push(pair);
                    }
                },
                WriteResult::Failed => {}
            }
        }

        if files_changed {
            self.host_call(&mut report, None, None, SyncAction::Reload, || {
                self.host.reload()
            })
            .await;
        }

        for pair in needs_activation {
            let id = Some(pair.schedule_id.as_str());
            let timer = pair.timer_name.as_str();
            self.host_call(&mut report, id, Some(timer), SyncAction::Enable, || {
                self.host.enable(timer)
            })
            .await;
            self.host_call(&mut report, id, Some(timer), SyncAction::Start, || {
                self.host.start(timer)
            })
            .await;
        }

        info!(
            dry_run = self.dry_run,
            changes = report.changes(),
            failures = report.failures().count(),
            "Schedule reconciliation finished"
        );
        report
    }

    /// Compile the enabled schedules. Returns the unit pairs to install and
    /// the ids of invalid schedules, whose existing units are left alone.
    fn plan(
        &self,
        desired: &[Schedule],
        report: &mut ReconcileReport,
    ) -> (BTreeMap<String, UnitPair>, BTreeSet<String>) {
        let mut wanted = BTreeMap::new();
        let mut protected = BTreeSet::new();

        for schedule in desired.iter().filter(|s| s.enabled) {
            let compiled = if wanted.contains_key(&schedule.id) {
                Err(InvalidSchedule::DuplicateId {
                    id: schedule.id.clone(),
                })
            } else {
                compile(schedule)
            };

            match compiled {
                Ok(compiled) => {
                    let pair = generate(schedule, &compiled, &self.settings);
                    debug!(schedule = %schedule.id, on_calendar = %pair.on_calendar, "Compiled schedule");
                    wanted.insert(schedule.id.clone(), pair);
                }
                Err(e) => {
                    warn!(schedule = %schedule.id, error = %e, "Skipping invalid schedule");
                    protected.insert(schedule.id.clone());
                    report.push(
                        Some(&schedule.id),
                        None,
                        SyncAction::Validate,
                        ItemOutcome::Invalid(e),
                    );
                }
            }
        }

        (wanted, protected)
    }

    async fn write_pair(&self, pair: &UnitPair, report: &mut ReconcileReport) -> WriteResult {
        let id = Some(pair.schedule_id.as_str());
        let mut any_existing = false;
        let mut all_current = true;

        for (name, text) in [(&pair.service_name, &pair.service), (&pair.timer_name, &pair.timer)] {
            match self.host.read_unit(name).await {
                Ok(Some(existing)) => {
                    any_existing = true;
                    if existing != *text {
                        all_current = false;
                    }
                }
                Ok(None) => all_current = false,
                Err(e) => {
                    warn!(unit = %name, error = %e, "Could not read unit, rewriting");
                    all_current = false;
                }
            }
        }

        if all_current {
            return WriteResult::Unchanged;
        }

        let action = if any_existing {
            SyncAction::Update
        } else {
            SyncAction::Create
        };

        for (name, text) in [(&pair.service_name, &pair.service), (&pair.timer_name, &pair.timer)] {
            match self.host.write_unit(name, text).await {
                Ok(()) => {
                    info!(schedule = %pair.schedule_id, unit = %name, %action, "Wrote unit");
                    report.push(id, Some(name.as_str()), action, ItemOutcome::Applied);
                }
                Err(e) => {
                    warn!(schedule = %pair.schedule_id, unit = %name, error = %e, "Failed to write unit");
                    report.push(id, Some(name.as_str()), action, ItemOutcome::Failed(e));
                    return WriteResult::Failed;
                }
            }
        }

        WriteResult::Written
    }

    async fn remove_pair(&self, schedule_id: &str, report: &mut ReconcileReport) {
        let timer = timer_name(schedule_id);
        let service = service_name(schedule_id);
        let id = Some(schedule_id);

        self.host_call(report, id, Some(&timer), SyncAction::Stop, || {
            self.host.stop(&timer)
        })
        .await;
        self.host_call(report, id, Some(&timer), SyncAction::Disable, || {
            self.host.disable(&timer)
        })
        .await;

        for name in [&timer, &service] {
            match self.host.remove_unit(name).await {
                Ok(()) => {
                    info!(schedule = %schedule_id, unit = %name, "Removed unit");
                    report.push(id, Some(name.as_str()), SyncAction::Remove, ItemOutcome::Applied);
                }
                Err(e) => {
                    warn!(schedule = %schedule_id, unit = %name, error = %e, "Failed to remove unit");
                    report.push(
                        id,
                        Some(name.as_str()),
                        SyncAction::Remove,
                        ItemOutcome::Failed(e),
                    );
                }
            }
        }
    }

    /// Run one registration call, or record it as skipped in dry-run.
    async fn host_call<F, Fut>(
        &self,
        report: &mut ReconcileReport,
        schedule_id: Option<&str>,
        unit: Option<&str>,
        action: SyncAction,
        call: F,
    ) where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), HostCallError>>,
    {
        if self.dry_run {
            info!(%action, unit = unit.unwrap_or("-"), "[dry run] Skipping host call");
            report.push(schedule_id, unit, action, ItemOutcome::Skipped);
            return;
        }

        match call().await {
            Ok(()) => report.push(schedule_id, unit, action, ItemOutcome::Applied),
            Err(e) => {
                warn!(%action, unit = unit.unwrap_or("-"), error = %e, "Host call failed");
                report.push(schedule_id, unit, action, ItemOutcome::Failed(e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use std::sync::Arc;

    fn settings() -> UnitSettings {
        UnitSettings {
            record_command: "/opt/filmbot-appliance/record-atem.sh".to_string(),
            run_as: "filmbot".to_string(),
        }
    }

    fn synchronizer(dry_run: bool) -> (Arc<MemoryHost>, Synchronizer<Arc<MemoryHost>>) {
        let host = Arc::new(MemoryHost::new());
        let sync = Synchronizer::new(host.clone(), settings(), dry_run);
        (host, sync)
    }

    fn schedules() -> Vec<Schedule> {
        vec![
            Schedule::new("svc1", "sunday", "09:20", 60),
            Schedule::new("svc2", "sunday", "11:00", 75),
            Schedule::new("midweek", "wednesday", "19:00", 90),
        ]
    }

    #[tokio::test]
    async fn test_first_pass_creates_and_activates_everything() {
        let (host, sync) = synchronizer(false);

        let report = sync.reconcile(&schedules()).await;

        assert!(report.is_clean(), "{:?}", report.items);
        assert_eq!(host.unit_names().len(), 6);
        for id in ["svc1", "svc2", "midweek"] {
            let timer = timer_name(id);
            assert!(host.is_enabled(&timer));
            assert!(host.is_active(&timer).await.unwrap());
        }
        // 6 writes + reload + 3 enable + 3 start
        assert_eq!(report.changes(), 13);
        assert_eq!(
            host.calls().iter().filter(|c| *c == "daemon-reload").count(),
            1
        );
    }

    #[tokio::test]
    async fn test_second_pass_is_a_no_op() {
        let (host, sync) = synchronizer(false);
        sync.reconcile(&schedules()).await;
        host.clear_calls();

        let report = sync.reconcile(&schedules()).await;

        assert_eq!(report.changes(), 0);
        assert!(report.items.is_empty());
        assert_eq!(report.unchanged.len(), 3);
        assert_eq!(host.calls(), vec!["list"]);
    }

    #[tokio::test]
    async fn test_disabling_removes_exactly_that_pair() {
        let (host, sync) = synchronizer(false);
        sync.reconcile(&schedules()).await;

        let mut updated = schedules();
        updated[1].enabled = false;
        let report = sync.reconcile(&updated).await;

        assert!(report.is_clean());
        assert_eq!(
            host.unit_names(),
            vec![
                "filmbot-record-midweek.service",
                "filmbot-record-midweek.timer",
                "filmbot-record-svc1.service",
                "filmbot-record-svc1.timer",
            ]
        );
        assert!(!host.is_enabled("filmbot-record-svc2.timer"));
        let removed: Vec<_> = report
            .items
            .iter()
            .filter(|i| i.action == SyncAction::Remove)
            .filter_map(|i| i.unit.clone())
            .collect();
        assert_eq!(
            removed,
            vec!["filmbot-record-svc2.timer", "filmbot-record-svc2.service"]
        );
        assert_eq!(report.unchanged, vec!["midweek", "svc1"]);
    }

    #[tokio::test]
    async fn test_changed_schedule_rewrites_units() {
        let (host, sync) = synchronizer(false);
        sync.reconcile(&schedules()).await;

        let mut updated = schedules();
        updated[0].start_time = "09:30".to_string();
        let report = sync.reconcile(&updated).await;

        let updates: Vec<_> = report
            .items
            .iter()
            .filter(|i| i.action == SyncAction::Update)
            .collect();
        assert_eq!(updates.len(), 2);
        assert!(host
            .unit_text("filmbot-record-svc1.timer")
            .unwrap()
            .contains("OnCalendar=Sun *-*-* 09:30:00"));
        assert!(report
            .items
            .iter()
            .any(|i| i.action == SyncAction::Reload && i.outcome == ItemOutcome::Applied));
    }

    #[tokio::test]
    async fn test_inactive_timer_is_reactivated_without_rewrite() {
        let (host, sync) = synchronizer(false);
        sync.reconcile(&schedules()).await;
        host.deactivate("filmbot-record-svc1.timer");
        host.clear_calls();

        let report = sync.reconcile(&schedules()).await;

        assert_eq!(
            host.calls(),
            vec![
                "list",
                "enable filmbot-record-svc1.timer",
                "start filmbot-record-svc1.timer"
            ]
        );
        assert_eq!(report.changes(), 2);
    }

    #[tokio::test]
    async fn test_hand_edited_unit_is_restored() {
        let (host, sync) = synchronizer(false);
        sync.reconcile(&schedules()).await;
        host.tamper("filmbot-record-svc2.service", "[Service]\nExecStart=/bin/true\n");

        sync.reconcile(&schedules()).await;

        assert!(host
            .unit_text("filmbot-record-svc2.service")
            .unwrap()
            .contains("record-atem.sh 4500"));
    }

    #[tokio::test]
    async fn test_failed_start_is_reported_and_retried_next_pass() {
        let (host, sync) = synchronizer(false);
        host.fail_on("start filmbot-record-svc2.timer");

        let report = sync.reconcile(&schedules()).await;

        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].action, SyncAction::Start);
        assert_eq!(failures[0].unit.as_deref(), Some("filmbot-record-svc2.timer"));
        match &failures[0].outcome {
            ItemOutcome::Failed(e) => {
                assert_eq!(e.exit_code(), Some(1));
                assert!(e.command().contains("start filmbot-record-svc2.timer"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        // the other schedules were still activated
        assert!(host.is_active("filmbot-record-svc1.timer").await.unwrap());
        assert!(host.is_active("filmbot-record-midweek.timer").await.unwrap());

        host.clear_failures();
        let retry = sync.reconcile(&schedules()).await;
        assert!(retry.is_clean());
        assert!(host.is_active("filmbot-record-svc2.timer").await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_schedule_does_not_block_others() {
        let (host, sync) = synchronizer(false);
        let mut desired = schedules();
        desired.push(Schedule::new("broken", "someday", "09:00", 30));
        desired.push(Schedule::new("svc1", "monday", "09:00", 30));

        let report = sync.reconcile(&desired).await;

        let invalid: Vec<_> = report
            .items
            .iter()
            .filter(|i| matches!(i.outcome, ItemOutcome::Invalid(_)))
            .filter_map(|i| i.schedule_id.clone())
            .collect();
        assert_eq!(invalid, vec!["broken", "svc1"]);
        assert_eq!(host.unit_names().len(), 6);
        assert!(host
            .unit_text("filmbot-record-svc1.timer")
            .unwrap()
            .contains("OnCalendar=Sun *-*-* 09:20:00"));
    }

    #[tokio::test]
    async fn test_invalid_edit_keeps_previous_units() {
        let (host, sync) = synchronizer(false);
        sync.reconcile(&schedules()).await;

        let mut updated = schedules();
        updated[2].start_time = "25:00".to_string();
        let report = sync.reconcile(&updated).await;

        assert!(!report.is_clean());
        assert!(host.unit_text("filmbot-record-midweek.timer").is_some());
        assert!(report.items.iter().all(|i| i.action != SyncAction::Remove));
    }

    #[tokio::test]
    async fn test_dry_run_writes_files_but_skips_registration() {
        let (host, sync) = synchronizer(true);

        let report = sync.reconcile(&schedules()).await;

        assert!(sync.is_dry_run());
        assert_eq!(host.unit_names().len(), 6);
        assert!(host
            .calls()
            .iter()
            .all(|c| c == "list" || c.starts_with("write ")));
        // reload + enable/start per schedule
        assert_eq!(report.skipped().count(), 7);
        assert_eq!(report.changes(), 6);
        assert!(report.summary_line().contains("skipped (dry run)"));

        let again = sync.reconcile(&schedules()).await;
        assert_eq!(again.changes(), 0);
    }

    #[tokio::test]
    async fn test_dry_run_removal_skips_stop_and_disable() {
        let (host, live) = synchronizer(false);
        live.reconcile(&schedules()).await;
        let dry = Synchronizer::new(host.clone(), settings(), true);
        host.clear_calls();

        let report = dry.reconcile(&schedules()[..2]).await;

        assert!(!host.calls().iter().any(|c| c.starts_with("stop") || c.starts_with("disable")));
        assert!(report
            .skipped()
            .any(|i| i.action == SyncAction::Stop && i.schedule_id.as_deref() == Some("midweek")));
        assert!(host.unit_text("filmbot-record-midweek.timer").is_none());
    }

    #[tokio::test]
    async fn test_unmanaged_units_are_ignored() {
        let (host, sync) = synchronizer(false);
        host.tamper("ssh.service", "[Service]\n");

        sync.reconcile(&[]).await;

        assert_eq!(host.unit_names(), vec!["ssh.service"]);
    }

    #[tokio::test]
    async fn test_list_failure_still_installs_desired_units() {
        let (host, sync) = synchronizer(false);
        host.fail_on("list");

        let report = sync.reconcile(&schedules()).await;

        assert_eq!(report.failures().count(), 1);
        assert_eq!(host.unit_names().len(), 6);
    }
}
