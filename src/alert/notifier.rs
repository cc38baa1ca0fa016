use async_trait::async_trait;
use chrono::{DateTime, Local};
use tracing::{info, warn};

use super::error::{NotifyError, Result};
use super::policy::NotificationIntent;
use crate::health::Status;

/// Delivers one rendered message
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, to: &[String], subject: &str, body: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub body: String,
}

/// Renders intents and hands them to a [`MailTransport`]. Never retries.
pub struct Notifier<T: MailTransport> {
    transport: T,
    device_name: String,
    recipients: Vec<String>,
}

impl<T: MailTransport> Notifier<T> {
    pub fn new(transport: T, device_name: impl Into<String>, recipients: Vec<String>) -> Self {
        Self {
            transport,
            device_name: device_name.into(),
            recipients,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn render(&self, intent: &NotificationIntent, now: DateTime<Local>) -> RenderedMessage {
        let subject = if intent.is_digest {
            format!("{} Daily Report - {}", intent.severity.emoji(), self.device_name)
        } else if intent.resolved {
            format!(
                "{} RESOLVED: {} - {}",
                Status::Ok.emoji(),
                intent.check_name,
                self.device_name
            )
        } else {
            let label = match intent.severity {
                Status::Critical => "CRITICAL",
                Status::Warning => "WARNING",
                Status::Ok => "OK",
            };
            format!(
                "{} {}: {} - {}",
                intent.severity.emoji(),
                label,
                intent.check_name,
                self.device_name
            )
        };

        let mut body = format!(
            "Device: {}\nTime: {}\n",
            self.device_name,
            now.format("%Y-%m-%d %H:%M:%S")
        );
        if intent.is_digest {
            body.push_str(&format!("Date: {}\n\n", now.format("%Y-%m-%d")));
        } else {
            body.push_str(&format!("Check: {}\n\n", intent.check_name));
        }
        body.push_str(&intent.message);
        if !body.ends_with('\n') {
            body.push('\n');
        }
        if intent.severity == Status::Critical && !intent.is_digest && !intent.resolved {
            body.push_str("\nACTION REQUIRED: Please check the device.\n");
        }

        RenderedMessage { subject, body }
    }

    pub async fn dispatch(&self, intent: &NotificationIntent) -> Result<()> {
        if self.recipients.is_empty() {
            return Err(NotifyError::NotConfigured("no recipients".to_string()));
        }
        let message = self.render(intent, Local::now());
        match self
            .transport
            .send(&self.recipients, &message.subject, &message.body)
            .await
        {
            Ok(()) => {
                info!(subject = %message.subject, "notification sent");
                Ok(())
            }
            Err(e) => {
                warn!(check = %intent.check_name, "Failed to send notification: {}", e);
                Err(e)
            }
        }
    }
}
