//! Notification dispatcher: relay a summary to a recipient over SMTP.
//!
//! Inputs are only checked for presence. Addresses are parsed when the message is built, so a
//! malformed recipient surfaces as a delivery failure rather than a validation error.

use crate::config::SmtpConfig;
use async_trait::async_trait;
use lettre::message::{Mailbox, Mailboxes, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors raised while sending a notification.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// At least one required field was missing or empty.
    #[error("Missing to/subject/bodyHtml")]
    Validation,
    /// The relay rejected the message or could not be reached.
    #[error("{0}")]
    Delivery(String),
}

/// Body of `POST /api/send`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailRequest {
    /// Recipient address (or comma-separated list).
    #[serde(default)]
    pub to: Option<String>,
    /// Subject line.
    #[serde(default)]
    pub subject: Option<String>,
    /// HTML body.
    #[serde(default, rename = "bodyHtml")]
    pub body_html: Option<String>,
}

/// Email that passed presence validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    /// Recipient address (or comma-separated list).
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub body_html: String,
}

impl EmailRequest {
    /// Require all three fields to be present and non-empty.
    pub fn validate(self) -> Result<OutgoingEmail, NotificationError> {
        let present = |value: Option<String>| value.filter(|text| !text.is_empty());
        match (present(self.to), present(self.subject), present(self.body_html)) {
            (Some(to), Some(subject), Some(body_html)) => Ok(OutgoingEmail {
                to,
                subject,
                body_html,
            }),
            _ => Err(NotificationError::Validation),
        }
    }
}

/// Successful send acknowledgement returned by `POST /api/send`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailReceipt {
    /// Always `true`.
    pub ok: bool,
    /// Message-ID assigned to the outgoing message.
    pub id: String,
}

/// Interface implemented by mail transports.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver `email` and return its message id.
    async fn send(&self, email: OutgoingEmail) -> Result<String, NotificationError>;
}

/// Validate `request` and hand it to `mailer`.
pub async fn dispatch(
    mailer: &dyn Mailer,
    request: EmailRequest,
) -> Result<EmailReceipt, NotificationError> {
    let email = request.validate()?;
    let id = mailer.send(email).await?;
    tracing::info!(message_id = %id, "Email sent");
    Ok(EmailReceipt { ok: true, id })
}

/// [`Mailer`] that opens a fresh connection to the configured relay for every message.
pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    /// Build a mailer from relay settings.
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn sender(&self) -> Result<Mailbox, NotificationError> {
        let from = self.config.from_email.as_deref().ok_or_else(|| {
            NotificationError::Delivery("FROM_EMAIL is not configured".into())
        })?;
        from.parse::<Mailbox>().map_err(|error| {
            NotificationError::Delivery(format!("invalid sender address {from:?}: {error}"))
        })
    }

    /// Assemble the MIME message with a fresh `<uuid@sender-domain>` Message-ID.
    fn build_message(&self, email: OutgoingEmail) -> Result<(Message, String), NotificationError> {
        let from = self.sender()?;
        let recipients: Mailboxes = email.to.parse().map_err(|error| {
            NotificationError::Delivery(format!("invalid recipient {:?}: {error}", email.to))
        })?;
        let message_id = format!("<{}@{}>", Uuid::new_v4().simple(), from.email.domain());

        let mut builder = Message::builder()
            .from(from)
            .subject(email.subject)
            .message_id(Some(message_id.clone()))
            .header(ContentType::TEXT_HTML);
        for recipient in recipients {
            builder = builder.to(recipient);
        }
        let message = builder.body(email.body_html).map_err(|error| {
            NotificationError::Delivery(format!("failed to build message: {error}"))
        })?;
        Ok((message, message_id))
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotificationError> {
        let host = self.config.host.clone().ok_or_else(|| {
            NotificationError::Delivery("SMTP_HOST is not configured".into())
        })?;
        let tls = TlsParameters::new(host.clone()).map_err(|error| {
            NotificationError::Delivery(format!("invalid TLS parameters for {host}: {error}"))
        })?;
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
            .port(self.config.port)
            .tls(Tls::Opportunistic(tls));
        if let Some(user) = self.config.user.clone() {
            let pass = self.config.pass.clone().unwrap_or_default();
            builder = builder.credentials(Credentials::new(user, pass));
        }
        Ok(builder.build())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<String, NotificationError> {
        let (message, message_id) = self.build_message(email)?;
        let transport = self.transport()?;
        transport.send(message).await.map_err(|error| {
            NotificationError::Delivery(format!(
                "SMTP delivery via {}:{} failed: {error}",
                self.config.host.as_deref().unwrap_or_default(),
                self.config.port
            ))
        })?;
        Ok(message_id)
    }
}
