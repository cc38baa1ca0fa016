//! Recording schedule model

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A user-declared weekly recording window.
///
/// Day and time are kept exactly as written in the configuration; they are
/// validated when the schedule is compiled so one malformed entry cannot
/// prevent the rest of the file from loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,

    /// Day name such as `sunday` or `Sun`
    pub day_of_week: String,

    /// 24-hour `HH:MM`
    pub start_time: String,

    pub duration_minutes: u32,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Why the config entry could not be read as a schedule
    #[serde(skip)]
    pub malformed: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl Schedule {
    pub fn new(
        id: impl Into<String>,
        day_of_week: impl Into<String>,
        start_time: impl Into<String>,
        duration_minutes: u32,
    ) -> Self {
        Self {
            id: id.into(),
            day_of_week: day_of_week.into(),
            start_time: start_time.into(),
            duration_minutes,
            enabled: true,
            malformed: None,
        }
    }

    /// Read one `[[schedules]]` entry, keeping entries of the wrong shape as
    /// malformed placeholders so they are reported instead of failing the load.
    pub fn from_entry(index: usize, entry: toml::Value) -> Self {
        let id = entry
            .get("id")
            .and_then(toml::Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| format!("#{}", index + 1));
        let enabled = entry
            .get("enabled")
            .and_then(toml::Value::as_bool)
            .unwrap_or(true);

        match entry.try_into::<Schedule>() {
            Ok(schedule) => schedule,
            Err(e) => Self {
                id,
                day_of_week: String::new(),
                start_time: String::new(),
                duration_minutes: 0,
                enabled,
                malformed: Some(e.message().to_string()),
            },
        }
    }
}

/// Deserialize the schedule list one entry at a time.
pub(crate) fn deserialize_entries<'de, D>(deserializer: D) -> Result<Vec<Schedule>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Vec::<toml::Value>::deserialize(deserializer)?;
    Ok(entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| Schedule::from_entry(index, entry))
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        Self::Monday,
        Self::Tuesday,
        Self::Wednesday,
        Self::Thursday,
        Self::Friday,
        Self::Saturday,
        Self::Sunday,
    ];

    /// Parse a full English day name or its three-letter abbreviation, ignoring case.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|day| value == day.name() || value == day.abbreviation().to_ascii_lowercase())
    }

    /// Abbreviation used by systemd calendar expressions
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Self::Monday => "Mon",
            Self::Tuesday => "Tue",
            Self::Wednesday => "Wed",
            Self::Thursday => "Thu",
            Self::Friday => "Fri",
            Self::Saturday => "Sat",
            Self::Sunday => "Sun",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Monday => "monday",
            Self::Tuesday => "tuesday",
            Self::Wednesday => "wednesday",
            Self::Thursday => "thursday",
            Self::Friday => "friday",
            Self::Saturday => "saturday",
            Self::Sunday => "sunday",
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
