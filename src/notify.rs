//! Best-effort operator notifications.
//!
//! After each delivered reply the operator is emailed a short notice. Callers
//! log and discard notification failures.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};

/// Errors from notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// An address could not be parsed.
    #[error("invalid address {address:?}: {reason}")]
    InvalidAddress {
        /// The offending address.
        address: String,
        /// Parser error text.
        reason: String,
    },

    /// The email could not be built.
    #[error("failed to build email: {0}")]
    Build(String),

    /// SMTP delivery failed.
    #[error("SMTP delivery failed: {0}")]
    Smtp(String),
}

/// Sends a notification to a recipient.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `body` with `subject` to `recipient`.
    async fn send(&self, subject: &str, recipient: &str, body: &str) -> Result<(), NotifyError>;
}

/// SMTP settings resolved from configuration.
#[derive(Clone)]
pub struct SmtpSettings {
    /// Relay host (STARTTLS).
    pub host: String,
    /// Relay port.
    pub port: u16,
    /// Login user name.
    pub username: String,
    /// Login password.
    pub password: String,
    /// `From:` address.
    pub from: String,
}

impl std::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

/// [`Notifier`] delivering email through an SMTP relay.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpNotifier {
    /// Build a notifier for the given relay.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Smtp`] if the relay cannot be configured.
    pub fn new(settings: &SmtpSettings) -> Result<Self, NotifyError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .map_err(|e| NotifyError::Smtp(e.to_string()))?
            .port(settings.port)
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .build();
        info!(host = %settings.host, port = settings.port, "SMTP notifier configured");
        Ok(Self {
            transport,
            from: settings.from.clone(),
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, subject: &str, recipient: &str, body: &str) -> Result<(), NotifyError> {
        let from = self
            .from
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::InvalidAddress {
                address: self.from.clone(),
                reason: e.to_string(),
            })?;
        let to = recipient
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::InvalidAddress {
                address: recipient.to_owned(),
                reason: e.to_string(),
            })?;
        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_owned())
            .map_err(|e| NotifyError::Build(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;
        debug!(recipient, subject, "notification email sent");
        Ok(())
    }
}

/// [`Notifier`] that only logs; used when SMTP is not configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, subject: &str, recipient: &str, body: &str) -> Result<(), NotifyError> {
        info!(recipient, subject, body, "notification (email disabled)");
        Ok(())
    }
}
