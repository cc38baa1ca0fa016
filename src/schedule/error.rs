use thiserror::Error;

/// A schedule that cannot be turned into units.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidSchedule {
    #[error("schedule '{id}': unknown day of week '{value}'")]
    UnknownDay { id: String, value: String },

    #[error("schedule '{id}': invalid start time '{value}' (expected 24-hour HH:MM)")]
    InvalidTime { id: String, value: String },

    #[error("schedule '{id}': duration must be greater than zero")]
    ZeroDuration { id: String },

    #[error("schedule id '{id}' may only contain letters, digits, '-' and '_'")]
    InvalidId { id: String },

    #[error("schedule id '{id}' is declared more than once")]
    DuplicateId { id: String },

    #[error("schedule '{id}': malformed entry: {reason}")]
    Malformed { id: String, reason: String },
}

impl InvalidSchedule {
    pub fn schedule_id(&self) -> &str {
        match self {
            Self::UnknownDay { id, .. }
            | Self::InvalidTime { id, .. }
            | Self::ZeroDuration { id }
            | Self::InvalidId { id }
            | Self::DuplicateId { id }
            | Self::Malformed { id, .. } => id,
        }
    }
}

pub type Result<T> = std::result::Result<T, InvalidSchedule>;
