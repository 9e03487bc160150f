//! Email alert channel.
//!
//! Composes a plain-text summary per event and hands it to a [`MailTransport`].
//! The channel carries a cooldown (enforced by the dispatcher's rate limiter)
//! and a hard timeout on the transport call so a stalled SMTP server cannot
//! stall the pipeline.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::types::ChangeEvent;
use crate::utils::format_timestamp;

use super::{AlertChannel, DeliveryError};

/// Port on which SMTP servers expect implicit TLS. Any other port uses STARTTLS.
pub const SMTPS_PORT: u16 = 465;

pub const SUBJECT: &str = "FileGuard-FIM Alert – File Activity Detected";

/// A composed alert email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Sends composed messages.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), DeliveryError>;
}

/// SMTP transport backed by `lettre`.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    timeout: Duration,
}

impl SmtpMailer {
    /// Build a mailer for `host:port`, authenticating as `username`.
    ///
    /// Port 465 connects with implicit TLS, other ports upgrade with STARTTLS.
    pub fn new(
        host: &str,
        port: u16,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self, DeliveryError> {
        let builder = if port == SMTPS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
        }
        .map_err(|e| DeliveryError::Transport(format!("invalid SMTP relay {host}: {e}")))?;

        let transport = builder
            .port(port)
            .credentials(Credentials::new(username.to_string(), password.to_string()))
            .timeout(Some(timeout))
            .build();

        Ok(Self { transport, timeout })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), DeliveryError> {
        let from: Mailbox = message
            .from
            .parse()
            .map_err(|e| DeliveryError::InvalidMessage(format!("sender {}: {e}", message.from)))?;

        let mut builder = Message::builder().from(from);
        for to in &message.to {
            let mailbox: Mailbox = to
                .parse()
                .map_err(|e| DeliveryError::InvalidMessage(format!("receiver {to}: {e}")))?;
            builder = builder.to(mailbox);
        }

        let email = builder
            .subject(message.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .map_err(|e| DeliveryError::InvalidMessage(e.to_string()))?;

        self.transport.send(email).await.map_err(|e| {
            if e.is_timeout() {
                DeliveryError::Timeout(self.timeout)
            } else {
                DeliveryError::Transport(e.to_string())
            }
        })?;

        Ok(())
    }
}

/// Emails a summary of each event to every receiver.
pub struct EmailChannel {
    sender: String,
    receivers: Vec<String>,
    cooldown: Duration,
    timeout: Duration,
    transport: Box<dyn MailTransport>,
}

impl EmailChannel {
    pub fn new(
        sender: impl Into<String>,
        receivers: Vec<String>,
        transport: impl MailTransport + 'static,
    ) -> Self {
        Self {
            sender: sender.into(),
            receivers,
            cooldown: Duration::ZERO,
            timeout: Duration::from_secs(30),
            transport: Box::new(transport),
        }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn compose(&self, event: &ChangeEvent) -> EmailMessage {
        let path = event.path();
        let folder = path
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        let mut body = format!(
            "Alert: File Activity Detected\n\
             -----------------------------\n\
             Event Type: {}\n\
             File Path: {}\n\
             Monitored Folder: {folder}\n\
             Timestamp: {}\n",
            event.label(),
            path.display(),
            format_timestamp(&event.occurred_at()),
        );
        if let Some(to) = event.secondary_path() {
            body.push_str(&format!("Destination: {}\n", to.display()));
        }

        EmailMessage {
            from: self.sender.clone(),
            to: self.receivers.clone(),
            subject: SUBJECT.to_string(),
            body,
        }
    }
}

#[async_trait]
impl AlertChannel for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    fn cooldown(&self) -> Duration {
        self.cooldown
    }

    async fn deliver(&self, event: &ChangeEvent) -> Result<(), DeliveryError> {
        let message = self.compose(event);
        match tokio::time::timeout(self.timeout, self.transport.send(&message)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout(self.timeout)),
        }
    }
}
