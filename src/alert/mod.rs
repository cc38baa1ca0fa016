//! Health alerting
//!
//! [`AlertPolicy`] decides which notifications a snapshot warrants given the
//! persisted [`AlertState`]; [`Notifier`] renders and delivers them through a
//! [`MailTransport`].

pub mod error;
pub mod notifier;
pub mod policy;
pub mod smtp;
pub mod state;

pub use error::NotifyError;
pub use notifier::{MailTransport, Notifier, RenderedMessage};
pub use policy::{AlertPolicy, NotificationIntent};
pub use smtp::SmtpTransport;
pub use state::{AlertState, AlertStateStore, CheckAlert, PendingWarning};
