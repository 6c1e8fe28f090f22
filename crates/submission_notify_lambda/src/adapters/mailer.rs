use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use submission_notify_core::email::StatusEmail;

use super::block_on;
use crate::config::SmtpSettings;

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

pub trait StatusMailer {
    fn send(&self, email: &StatusEmail) -> Result<(), String>;
}

/// Plain-text status mail through an authenticated STARTTLS relay.
pub struct SmtpStatusMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpStatusMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self, String> {
        let from: Mailbox = settings
            .from
            .parse()
            .map_err(|error| format!("invalid sender address '{}': {error}", settings.from))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .map_err(|error| format!("failed to configure smtp relay: {error}"))?
            .port(settings.port)
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.api_key.clone(),
            ))
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        Ok(Self { transport, from })
    }
}

pub fn build_message(from: &Mailbox, email: &StatusEmail) -> Result<Message, String> {
    let to: Mailbox = email
        .recipient
        .parse()
        .map_err(|error| format!("invalid recipient address '{}': {error}", email.recipient))?;

    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(email.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(email.body.clone())
        .map_err(|error| format!("failed to build status email: {error}"))
}

impl StatusMailer for SmtpStatusMailer {
    fn send(&self, email: &StatusEmail) -> Result<(), String> {
        let message = build_message(&self.from, email)?;

        block_on(self.transport.send(message))
            .map(|_| ())
            .map_err(|error| format!("failed to send status email: {error}"))
    }
}
