//! systemd unit text generation for recording schedules

use super::calendar::CompiledSchedule;
use super::model::Schedule;
use crate::config::SchedulerConfig;

/// Every unit this crate manages starts with this prefix.
pub const UNIT_PREFIX: &str = "filmbot-record-";

pub const SERVICE_SUFFIX: &str = ".service";
pub const TIMER_SUFFIX: &str = ".timer";

const GENERATED_HEADER: &str = "# Generated by filmbotctl from the appliance schedule. Do not edit.";

/// What the generated action unit runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSettings {
    pub record_command: String,
    pub run_as: String,
}

impl UnitSettings {
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            record_command: config.record_command.clone(),
            run_as: config.run_as.clone(),
        }
    }
}

/// Action (service) and trigger (timer) text for one schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitPair {
    pub schedule_id: String,
    pub service_name: String,
    pub timer_name: String,
    pub service: String,
    pub timer: String,
    pub on_calendar: String,
}

pub fn service_name(schedule_id: &str) -> String {
    format!("{}{}{}", UNIT_PREFIX, schedule_id, SERVICE_SUFFIX)
}

pub fn timer_name(schedule_id: &str) -> String {
    format!("{}{}{}", UNIT_PREFIX, schedule_id, TIMER_SUFFIX)
}

/// Recover the schedule id from a managed unit file name.
pub fn schedule_id_from_unit(unit_name: &str) -> Option<&str> {
    let rest = unit_name.strip_prefix(UNIT_PREFIX)?;
    let id = rest
        .strip_suffix(SERVICE_SUFFIX)
        .or_else(|| rest.strip_suffix(TIMER_SUFFIX))?;
    (!id.is_empty()).then_some(id)
}

pub fn generate(schedule: &Schedule, compiled: &CompiledSchedule, settings: &UnitSettings) -> UnitPair {
    let service_name = service_name(&schedule.id);
    let timer_name = timer_name(&schedule.id);

    let service = format!(
        "{header}
[Unit]
Description=Filmbot recording {id}
After=network-online.target

[Service]
Type=oneshot
User={user}
Environment=FILMBOT_SCHEDULE_ID={id}
ExecStart={command} {duration}
StandardOutput=journal
StandardError=journal
",
        header = GENERATED_HEADER,
        id = schedule.id,
        user = settings.run_as,
        command = settings.record_command,
        duration = compiled.duration_seconds,
    );

    let timer = format!(
        "{header}
[Unit]
Description=Filmbot recording timer {id}

[Timer]
OnCalendar={on_calendar}
Persistent=true
Unit={service_name}

[Install]
WantedBy=timers.target
",
        header = GENERATED_HEADER,
        id = schedule.id,
        on_calendar = compiled.on_calendar,
        service_name = service_name,
    );

    UnitPair {
        schedule_id: schedule.id.clone(),
        service_name,
        timer_name,
        service,
        timer,
        on_calendar: compiled.on_calendar.clone(),
    }
}

fn directive<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    text.lines().find_map(|line| {
        let (k, v) = line.split_once('=')?;
        (k.trim() == key).then(|| v.trim())
    })
}

/// `OnCalendar=` value of a timer unit
pub fn parse_on_calendar(timer_text: &str) -> Option<&str> {
    directive(timer_text, "OnCalendar")
}

/// `ExecStart=` command line of a service unit
pub fn parse_exec_start(service_text: &str) -> Option<&str> {
    directive(service_text, "ExecStart")
}
