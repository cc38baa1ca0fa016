//! Schedule to systemd calendar expression compilation

use chrono::NaiveTime;

use super::error::{InvalidSchedule, Result};
use super::model::{DayOfWeek, Schedule};
use crate::config::parse_clock_time;

/// A validated schedule in the form the unit generator consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledSchedule {
    pub day: DayOfWeek,
    pub start: NaiveTime,
    /// `OnCalendar=` value, e.g. `Sun *-*-* 09:20:00`
    pub on_calendar: String,
    pub duration_seconds: u64,
}

/// Compile a schedule into a weekly calendar expression and a recording length.
pub fn compile(schedule: &Schedule) -> Result<CompiledSchedule> {
    if let Some(reason) = &schedule.malformed {
        return Err(InvalidSchedule::Malformed {
            id: schedule.id.clone(),
            reason: reason.clone(),
        });
    }
    validate_id(&schedule.id)?;

    let day = DayOfWeek::parse(&schedule.day_of_week).ok_or_else(|| InvalidSchedule::UnknownDay {
        id: schedule.id.clone(),
        value: schedule.day_of_week.clone(),
    })?;

    let start = parse_clock_time(&schedule.start_time).ok_or_else(|| {
        InvalidSchedule::InvalidTime {
            id: schedule.id.clone(),
            value: schedule.start_time.clone(),
        }
    })?;

    if schedule.duration_minutes == 0 {
        return Err(InvalidSchedule::ZeroDuration {
            id: schedule.id.clone(),
        });
    }

    Ok(CompiledSchedule {
        day,
        start,
        on_calendar: calendar_expression(day, start),
        duration_seconds: u64::from(schedule.duration_minutes) * 60,
    })
}

/// Weekly expression in systemd's normalized form.
pub fn calendar_expression(day: DayOfWeek, start: NaiveTime) -> String {
    format!("{} *-*-* {}", day.abbreviation(), start.format("%H:%M:%S"))
}

/// Ids become part of unit file names, so only a conservative character set is allowed.
pub fn validate_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(InvalidSchedule::InvalidId { id: id.to_string() })
    }
}
