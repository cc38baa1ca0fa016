//! `filmbotctl schedules` command implementation

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::config::{Config, ConfigSource};
use crate::schedule::unit::{service_name, timer_name};
use crate::schedule::{compile, Schedule};

const TABLE_COL_ID: usize = 16;
const TABLE_COL_WHEN: usize = 24;
const TABLE_COL_DURATION: usize = 10;

#[derive(Args)]
pub struct SchedulesArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
pub struct ScheduleJson {
    pub id: String,
    pub enabled: bool,
    pub day_of_week: String,
    pub start_time: String,
    pub duration_minutes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_calendar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,
    pub timer: String,
    pub service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn describe(schedule: &Schedule) -> ScheduleJson {
    let compiled = compile(schedule);
    let (on_calendar, duration_seconds, error) = match compiled {
        Ok(c) => (Some(c.on_calendar), Some(c.duration_seconds), None),
        Err(e) => (None, None, Some(e.to_string())),
    };
    ScheduleJson {
        id: schedule.id.clone(),
        enabled: schedule.enabled,
        day_of_week: schedule.day_of_week.clone(),
        start_time: schedule.start_time.clone(),
        duration_minutes: schedule.duration_minutes,
        on_calendar,
        duration_seconds,
        timer: timer_name(&schedule.id),
        service: service_name(&schedule.id),
        error,
    }
}

pub async fn run(config: &Config, args: SchedulesArgs) -> Result<()> {
    let described: Vec<ScheduleJson> = config.schedules().iter().map(describe).collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&described)?);
        return Ok(());
    }

    if described.is_empty() {
        println!("No schedules configured.");
        return Ok(());
    }

    println!(
        "{:<wi$} {:<ww$} {:<wd$} STATUS",
        "ID",
        "ON CALENDAR",
        "DURATION",
        wi = TABLE_COL_ID,
        ww = TABLE_COL_WHEN,
        wd = TABLE_COL_DURATION
    );
    println!(
        "{}",
        "-".repeat(TABLE_COL_ID + TABLE_COL_WHEN + TABLE_COL_DURATION + 12)
    );
    for entry in &described {
        let when = entry.on_calendar.as_deref().unwrap_or("-");
        let status = match (&entry.error, entry.enabled) {
            (Some(error), _) => format!("invalid: {}", error),
            (None, true) => "enabled".to_string(),
            (None, false) => "disabled".to_string(),
        };
        println!(
            "{:<wi$} {:<ww$} {:<wd$} {}",
            super::truncate(&entry.id, TABLE_COL_ID),
            when,
            format!("{} min", entry.duration_minutes),
            status,
            wi = TABLE_COL_ID,
            ww = TABLE_COL_WHEN,
            wd = TABLE_COL_DURATION
        );
    }
    println!("\nTotal: {} schedules", described.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_valid_schedule() {
        let schedule = Schedule::new("svc1", "Sunday", "09:20", 60);
        let json = describe(&schedule);
        assert_eq!(json.on_calendar.as_deref(), Some("Sun *-*-* 09:20:00"));
        assert_eq!(json.duration_seconds, Some(3600));
        assert_eq!(json.timer, "filmbot-record-svc1.timer");
        assert!(json.error.is_none());
    }

    #[test]
    fn test_describe_invalid_schedule_keeps_error() {
        let schedule = Schedule::new("bad", "Funday", "09:20", 60);
        let json = describe(&schedule);
        assert!(json.on_calendar.is_none());
        assert!(json.error.unwrap().contains("Funday"));
    }
}
