//! SMTP delivery over STARTTLS

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, warn};

use super::error::{NotifyError, Result};
use super::notifier::MailTransport;
use crate::config::AlertConfig;

const SMTP_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SmtpTransport {
    from: Mailbox,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpTransport {
    /// Disabled alerting or incomplete settings yield [`NotifyError::NotConfigured`].
    pub fn from_config(config: &AlertConfig) -> Result<Self> {
        if !config.enabled {
            return Err(NotifyError::NotConfigured(
                "alerts are disabled".to_string(),
            ));
        }
        let mut missing = Vec::new();
        if config.smtp_host.trim().is_empty() {
            missing.push("smtp_host");
        }
        if config.email_from.trim().is_empty() {
            missing.push("email_from");
        }
        if config.email_to.is_empty() {
            missing.push("email_to");
        }
        if config.smtp_password.is_empty() {
            missing.push("smtp_password");
        }
        if !missing.is_empty() {
            return Err(NotifyError::NotConfigured(format!(
                "missing {}",
                missing.join(", ")
            )));
        }

        let from = parse_mailbox(&config.email_from)?;
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| NotifyError::Transport(e.to_string()))?
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.email_from.clone(),
                config.smtp_password.clone(),
            ))
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        Ok(Self { from, mailer })
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address
        .trim()
        .parse::<Mailbox>()
        .map_err(|e| NotifyError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}

/// Assemble a plain-text message addressed to every recipient that parses.
///
/// Unparsable recipients are logged and left out; the message only fails
/// when none remain.
pub fn build_message(from: &Mailbox, to: &[String], subject: &str, body: &str) -> Result<Message> {
    let mut builder = Message::builder()
        .from(from.clone())
        .subject(subject)
        .header(ContentType::TEXT_PLAIN);
    let mut rejected = None;
    let mut accepted = 0;
    for address in to {
        match parse_mailbox(address) {
            Ok(mailbox) => {
                builder = builder.to(mailbox);
                accepted += 1;
            }
            Err(e) => {
                warn!(error = %e, "Skipping recipient");
                rejected = Some(e);
            }
        }
    }
    if accepted == 0 {
        return Err(rejected.unwrap_or_else(|| {
            NotifyError::NotConfigured("no recipients".to_string())
        }));
    }
    builder
        .body(body.to_string())
        .map_err(|e| NotifyError::Build(e.to_string()))
}

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn send(&self, to: &[String], subject: &str, body: &str) -> Result<()> {
        let message = build_message(&self.from, to, subject, body)?;
        debug!(recipients = to.len(), subject, "sending mail");
        self.mailer
            .send(message)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(())
    }
}
