use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Email alerts are not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid email address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build email: {0}")]
    Build(String),

    #[error("Failed to send email: {0}")]
    Transport(String),
}

impl NotifyError {
    pub fn is_not_configured(&self) -> bool {
        matches!(self, Self::NotConfigured(_))
    }
}

pub type Result<T> = std::result::Result<T, NotifyError>;
