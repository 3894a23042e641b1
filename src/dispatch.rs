//! Outbound reply delivery.
//!
//! Sends a reply through the Cloud API, records the sent message, and fires a
//! best-effort operator notification. A rejected send is terminal for that
//! message; redelivery is left to the platform.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::notify::Notifier;
use crate::store::{MessageRecord, Store};
use crate::whatsapp::client::CloudApiClient;
use crate::whatsapp::WhatsAppError;

/// Subject of the operator notification.
pub const NOTIFICATION_SUBJECT: &str = "WhatsApp Message Sent";

/// Errors that stop a reply from being delivered.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The messaging API answered with a non-success status.
    #[error("messaging API rejected the reply with status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// The request never produced a response.
    #[error("messaging API request failed: {0}")]
    Transport(#[source] reqwest::Error),
}

impl From<WhatsAppError> for DispatchError {
    fn from(err: WhatsAppError) -> Self {
        match err {
            WhatsAppError::Rejected { status, body } => Self::Rejected { status, body },
            WhatsAppError::Http(e) => Self::Transport(e),
        }
    }
}

/// A reply that the messaging API accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Id the API assigned to the message, if returned.
    pub external_id: Option<String>,
    /// Row id of the outbound record, if it was persisted.
    pub record_id: Option<i64>,
}

/// Sends replies and records their delivery.
pub struct Dispatcher {
    client: CloudApiClient,
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    business_number: String,
    operator_email: Option<String>,
}

impl Dispatcher {
    /// Create a dispatcher. Notifications are skipped when `operator_email` is `None`.
    pub fn new(
        client: CloudApiClient,
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        business_number: String,
        operator_email: Option<String>,
    ) -> Self {
        Self {
            client,
            store,
            notifier,
            business_number,
            operator_email,
        }
    }

    /// Send `text` to `to`.
    ///
    /// On success exactly one outbound record is written and the operator is
    /// notified; failures of either are logged only.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] when the API rejects the message or the
    /// request fails. Nothing is recorded in that case.
    pub async fn send_reply(&self, to: &str, text: &str) -> Result<Delivery, DispatchError> {
        let response = self.client.send_text(to, text).await?;
        let sent_at = Utc::now();
        let external_id = response.message_id().map(str::to_owned);

        let record = MessageRecord::outgoing(
            &self.business_number,
            to,
            text,
            external_id.as_deref(),
            sent_at,
        );
        let record_id = match self.store.insert_message(&record).await {
            Ok(id) => Some(id),
            Err(e) => {
                error!(error = %e, to, "failed to record outbound message");
                None
            }
        };
        info!(to, external_id = ?external_id, "reply delivered");

        if let Some(operator) = &self.operator_email {
            let body = format!(
                "Message to {to} was sent successfully at {}.",
                sent_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            if let Err(e) = self
                .notifier
                .send(NOTIFICATION_SUBJECT, operator, &body)
                .await
            {
                warn!(error = %e, operator, "operator notification failed");
            }
        }

        Ok(Delivery {
            external_id,
            record_id,
        })
    }
}
