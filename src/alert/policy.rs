//! When to tell a human
//!
//! The policy is a pure function of the snapshot, the alert state and the
//! clock. It decides which notifications are due and records what it decided
//! in [`AlertState`]; delivery is the notifier's job.

use chrono::{DateTime, Duration, Local, NaiveTime, Utc};
use serde::Serialize;
use tracing::debug;

use super::state::{AlertState, CheckAlert, PendingWarning};
use crate::config::{AlertConfig, QuietHours};
use crate::health::{HealthSnapshot, Status};

pub const DIGEST_CHECK_NAME: &str = "daily_report";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationIntent {
    pub severity: Status,
    pub check_name: String,
    pub message: String,
    pub is_digest: bool,
    pub resolved: bool,
}

#[derive(Debug, Clone)]
pub struct AlertPolicy {
    enabled: bool,
    quiet_hours: Option<QuietHours>,
    cooldown: Duration,
    digest_time: NaiveTime,
    send_resolved: bool,
}

impl AlertPolicy {
    pub fn from_config(config: &AlertConfig) -> Self {
        Self {
            enabled: config.enabled,
            quiet_hours: config.quiet_hours,
            cooldown: Duration::minutes(i64::from(config.cooldown_minutes)),
            digest_time: config.digest_time,
            send_resolved: config.send_resolved,
        }
    }

    fn in_quiet_hours(&self, now: &DateTime<Local>) -> bool {
        self.quiet_hours
            .is_some_and(|quiet| quiet.contains(now.time()))
    }

    pub fn evaluate(
        &self,
        snapshot: &HealthSnapshot,
        state: &mut AlertState,
        now: DateTime<Local>,
    ) -> Vec<NotificationIntent> {
        let now_utc = now.with_timezone(&Utc);
        let quiet = self.in_quiet_hours(&now);
        let mut intents = Vec::new();

        for check in &snapshot.checks {
            let previous = state.per_check.get(&check.name).cloned();

            if !self.enabled {
                track_only(state, &check.name, check.status, previous);
                continue;
            }

            if check.status == Status::Ok {
                let Some(previous) = state.per_check.remove(&check.name) else {
                    continue;
                };
                if previous.last_notified_at.is_none() {
                    debug!(check = %check.name, "cleared without ever notifying");
                    state.pending_digest.retain(|p| p.check_name != check.name);
                    continue;
                }
                if !self.send_resolved {
                    continue;
                }
                let message = format!("Back to normal: {}", check.message);
                if quiet && previous.last_status == Status::Warning {
                    state.queue(PendingWarning {
                        check_name: check.name.clone(),
                        status: Status::Ok,
                        message,
                        queued_at: now_utc,
                        resolved: true,
                    });
                } else {
                    intents.push(NotificationIntent {
                        severity: Status::Ok,
                        check_name: check.name.clone(),
                        message,
                        is_digest: false,
                        resolved: true,
                    });
                }
                continue;
            }

            let last_notified_at = previous.as_ref().and_then(|p| p.last_notified_at);

            if check.status == Status::Warning && quiet {
                debug!(check = %check.name, "warning queued for digest during quiet hours");
                state.queue(PendingWarning {
                    check_name: check.name.clone(),
                    status: check.status,
                    message: check.message.clone(),
                    queued_at: now_utc,
                    resolved: false,
                });
                state.per_check.insert(
                    check.name.clone(),
                    CheckAlert {
                        last_status: check.status,
                        last_notified_at,
                    },
                );
                continue;
            }

            let escalated = previous
                .as_ref()
                .is_none_or(|p| check.status > p.last_status);
            let cooled_down = last_notified_at.is_none_or(|at| now_utc - at >= self.cooldown);

            if escalated || cooled_down {
                intents.push(NotificationIntent {
                    severity: check.status,
                    check_name: check.name.clone(),
                    message: check.message.clone(),
                    is_digest: false,
                    resolved: false,
                });
                state.per_check.insert(
                    check.name.clone(),
                    CheckAlert {
                        last_status: check.status,
                        last_notified_at: Some(now_utc),
                    },
                );
            } else {
                debug!(check = %check.name, status = %check.status, "suppressed by cooldown");
                state.per_check.insert(
                    check.name.clone(),
                    CheckAlert {
                        last_status: check.status,
                        last_notified_at,
                    },
                );
            }
        }

        intents
    }

    /// Build the daily summary, draining the queued warnings into it.
    pub fn digest(
        &self,
        snapshot: &HealthSnapshot,
        state: &mut AlertState,
        now: DateTime<Local>,
    ) -> NotificationIntent {
        let mut message = format!(
            "Status: {} {}\n\n",
            snapshot.overall.emoji(),
            if snapshot.is_healthy() {
                "Healthy"
            } else {
                "Needs attention"
            }
        );
        for check in &snapshot.checks {
            message.push_str(&format!(
                "{} {}: {}\n",
                check.status.emoji(),
                check.name,
                check.message
            ));
        }

        let queued = std::mem::take(&mut state.pending_digest);
        if !queued.is_empty() {
            message.push_str("\nSince the last report:\n");
            for pending in &queued {
                let when = pending.queued_at.with_timezone(&Local).format("%Y-%m-%d %H:%M");
                let label = if pending.resolved {
                    "resolved"
                } else {
                    pending.status.label()
                };
                message.push_str(&format!(
                    "• {} {} ({}): {}\n",
                    when, pending.check_name, label, pending.message
                ));
            }
        }

        state.last_digest_on = Some(now.date_naive());

        NotificationIntent {
            severity: snapshot.overall,
            check_name: DIGEST_CHECK_NAME.to_string(),
            message,
            is_digest: true,
            resolved: false,
        }
    }

    /// True once per local day, at or after the configured digest time.
    pub fn digest_due(&self, state: &AlertState, now: DateTime<Local>) -> bool {
        self.enabled
            && now.time() >= self.digest_time
            && state.last_digest_on != Some(now.date_naive())
    }
}

/// Alerting disabled: remember statuses so enabling later does not replay
/// old problems as new, but never mark anything as notified.
fn track_only(state: &mut AlertState, name: &str, status: Status, previous: Option<CheckAlert>) {
    if status == Status::Ok {
        state.per_check.remove(name);
        return;
    }
    state.per_check.insert(
        name.to_string(),
        CheckAlert {
            last_status: status,
            last_notified_at: previous.and_then(|p| p.last_notified_at),
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::CheckResult;
    use chrono::TimeZone;

    fn config() -> AlertConfig {
        AlertConfig {
            enabled: true,
            quiet_hours: Some(QuietHours::new(
                NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            )),
            cooldown_minutes: 60,
            ..AlertConfig::default()
        }
    }

    fn at(hour: u32, minute: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2026, 3, 10, hour, minute, 0)
            .single()
            .unwrap()
    }

    fn snapshot(checks: Vec<CheckResult>) -> HealthSnapshot {
        HealthSnapshot::new(at(12, 0), "Filmbot Test", checks)
    }

    fn check(name: &str, status: Status) -> CheckResult {
        CheckResult::new(name, status, format!("{} is {}", name, status))
    }

    #[test]
    fn test_repeated_critical_within_cooldown_notifies_once() {
        let policy = AlertPolicy::from_config(&config());
        let mut state = AlertState::default();
        let snap = snapshot(vec![check("storage", Status::Critical)]);

        let first = policy.evaluate(&snap, &mut state, at(12, 0));
        let second = policy.evaluate(&snap, &mut state, at(12, 30));

        assert_eq!(first.len(), 1);
        assert_eq!(first[0].severity, Status::Critical);
        assert!(second.is_empty());
    }

    #[test]
    fn test_repeat_after_cooldown_notifies_again() {
        let policy = AlertPolicy::from_config(&config());
        let mut state = AlertState::default();
        let snap = snapshot(vec![check("storage", Status::Critical)]);

        policy.evaluate(&snap, &mut state, at(12, 0));
        let again = policy.evaluate(&snap, &mut state, at(13, 0));
        assert_eq!(again.len(), 1);
    }

    #[test]
    fn test_escalation_bypasses_cooldown() {
        let policy = AlertPolicy::from_config(&config());
        let mut state = AlertState::default();

        let warn = policy.evaluate(
            &snapshot(vec![check("temperature", Status::Warning)]),
            &mut state,
            at(12, 0),
        );
        let crit = policy.evaluate(
            &snapshot(vec![check("temperature", Status::Critical)]),
            &mut state,
            at(12, 5),
        );
        assert_eq!(warn.len(), 1);
        assert_eq!(crit.len(), 1);
        assert_eq!(crit[0].severity, Status::Critical);
    }

    #[test]
    fn test_milder_status_rearms_escalation() {
        let policy = AlertPolicy::from_config(&config());
        let mut state = AlertState::default();

        policy.evaluate(
            &snapshot(vec![check("temperature", Status::Critical)]),
            &mut state,
            at(12, 0),
        );
        let milder = policy.evaluate(
            &snapshot(vec![check("temperature", Status::Warning)]),
            &mut state,
            at(12, 5),
        );
        assert!(milder.is_empty());
        assert_eq!(state.per_check["temperature"].last_status, Status::Warning);

        let again = policy.evaluate(
            &snapshot(vec![check("temperature", Status::Critical)]),
            &mut state,
            at(12, 10),
        );
        assert_eq!(again.len(), 1);
    }

    #[test]
    fn test_quiet_hours_queue_warning_but_send_critical() {
        let policy = AlertPolicy::from_config(&config());
        let mut state = AlertState::default();
        let snap = snapshot(vec![
            check("network", Status::Warning),
            check("capture_device", Status::Critical),
        ]);

        let intents = policy.evaluate(&snap, &mut state, at(23, 0));

        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].check_name, "capture_device");
        assert_eq!(state.pending_digest.len(), 1);
        assert_eq!(state.pending_digest[0].check_name, "network");
        assert!(state.per_check["network"].last_notified_at.is_none());
    }

    #[test]
    fn test_queued_warning_is_sent_after_quiet_hours() {
        let policy = AlertPolicy::from_config(&config());
        let mut state = AlertState::default();
        let snap = snapshot(vec![check("network", Status::Warning)]);

        assert!(policy.evaluate(&snap, &mut state, at(23, 0)).is_empty());
        assert!(policy.evaluate(&snap, &mut state, at(3, 0)).is_empty());
        assert_eq!(state.pending_digest.len(), 1);

        let morning = policy.evaluate(&snap, &mut state, at(7, 30));
        assert_eq!(morning.len(), 1);
    }

    #[test]
    fn test_resolution_after_notification() {
        let policy = AlertPolicy::from_config(&config());
        let mut state = AlertState::default();

        policy.evaluate(
            &snapshot(vec![check("switcher", Status::Warning)]),
            &mut state,
            at(12, 0),
        );
        let intents = policy.evaluate(
            &snapshot(vec![check("switcher", Status::Ok)]),
            &mut state,
            at(12, 10),
        );

        assert_eq!(intents.len(), 1);
        assert!(intents[0].resolved);
        assert_eq!(intents[0].severity, Status::Ok);
        assert!(!state.per_check.contains_key("switcher"));

        let quiet = policy.evaluate(
            &snapshot(vec![check("switcher", Status::Ok)]),
            &mut state,
            at(12, 20),
        );
        assert!(quiet.is_empty());
    }

    #[test]
    fn test_resolution_without_notification_is_silent() {
        let policy = AlertPolicy::from_config(&config());
        let mut state = AlertState::default();

        policy.evaluate(
            &snapshot(vec![check("network", Status::Warning)]),
            &mut state,
            at(23, 0),
        );
        let intents = policy.evaluate(
            &snapshot(vec![check("network", Status::Ok)]),
            &mut state,
            at(23, 30),
        );

        assert!(intents.is_empty());
        assert!(state.per_check.is_empty());
        assert!(state.pending_digest.is_empty());
    }

    #[test]
    fn test_warning_resolution_in_quiet_hours_is_queued() {
        let policy = AlertPolicy::from_config(&config());
        let mut state = AlertState::default();

        policy.evaluate(
            &snapshot(vec![check("memory", Status::Warning)]),
            &mut state,
            at(21, 0),
        );
        let intents = policy.evaluate(
            &snapshot(vec![check("memory", Status::Ok)]),
            &mut state,
            at(22, 30),
        );

        assert!(intents.is_empty());
        assert_eq!(state.pending_digest.len(), 1);
        assert!(state.pending_digest[0].resolved);
    }

    #[test]
    fn test_send_resolved_off_skips_resolution() {
        let policy = AlertPolicy::from_config(&AlertConfig {
            send_resolved: false,
            ..config()
        });
        let mut state = AlertState::default();

        policy.evaluate(
            &snapshot(vec![check("cpu", Status::Warning)]),
            &mut state,
            at(12, 0),
        );
        let intents = policy.evaluate(
            &snapshot(vec![check("cpu", Status::Ok)]),
            &mut state,
            at(12, 5),
        );
        assert!(intents.is_empty());
        assert!(state.per_check.is_empty());
    }

    #[test]
    fn test_disabled_alerting_tracks_without_intents() {
        let policy = AlertPolicy::from_config(&AlertConfig {
            enabled: false,
            ..config()
        });
        let mut state = AlertState::default();

        let intents = policy.evaluate(
            &snapshot(vec![check("storage", Status::Critical)]),
            &mut state,
            at(12, 0),
        );

        assert!(intents.is_empty());
        assert_eq!(state.per_check["storage"].last_status, Status::Critical);
        assert!(state.per_check["storage"].last_notified_at.is_none());
        assert!(!policy.digest_due(&state, at(12, 0)));
    }

    #[test]
    fn test_digest_drains_queue_and_records_day() {
        let policy = AlertPolicy::from_config(&config());
        let mut state = AlertState::default();
        policy.evaluate(
            &snapshot(vec![check("network", Status::Warning)]),
            &mut state,
            at(23, 0),
        );

        let snap = snapshot(vec![check("network", Status::Ok), check("cpu", Status::Ok)]);
        let intent = policy.digest(&snap, &mut state, at(8, 0));

        assert!(intent.is_digest);
        assert_eq!(intent.severity, Status::Ok);
        assert!(intent.message.contains("Healthy"));
        assert!(intent.message.contains("network (warning)"));
        assert!(state.pending_digest.is_empty());
        assert_eq!(state.last_digest_on, Some(at(8, 0).date_naive()));
        // per-check state untouched
        assert!(state.per_check.contains_key("network"));
    }

    #[test]
    fn test_digest_due_once_per_day_after_digest_time() {
        let policy = AlertPolicy::from_config(&config());
        let mut state = AlertState::default();

        assert!(!policy.digest_due(&state, at(7, 59)));
        assert!(policy.digest_due(&state, at(8, 0)));

        policy.digest(&snapshot(Vec::new()), &mut state, at(8, 0));
        assert!(!policy.digest_due(&state, at(9, 0)));

        let tomorrow = Local
            .with_ymd_and_hms(2026, 3, 11, 8, 5, 0)
            .single()
            .unwrap();
        assert!(policy.digest_due(&state, tomorrow));
    }
}
