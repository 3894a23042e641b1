//! Persistence for message records and tickets.
//!
//! The pipeline talks to storage only through the [`Store`] trait; the
//! SQLite implementation lives in [`sqlite`].

pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tickets::Ticket;

/// Status stored on inbound message records.
pub const STATUS_RECEIVED: &str = "received";

/// Status stored on outbound message records.
pub const STATUS_SENT: &str = "sent";

/// Direction of a recorded message relative to the business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Sent by a customer to the business number.
    Incoming,
    /// Sent by the business to a customer.
    Outgoing,
}

impl Direction {
    /// Returns the string representation stored in SQLite.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incoming => "incoming",
            Self::Outgoing => "outgoing",
        }
    }

    /// Parse from a SQLite text value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a recognised direction.
    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "incoming" => Ok(Self::Incoming),
            "outgoing" => Ok(Self::Outgoing),
            other => Err(StoreError::InvalidEnum {
                field: "direction",
                value: other.to_owned(),
            }),
        }
    }
}

/// Audit record of one inbound or outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Database row id (`None` for records not yet persisted).
    pub id: Option<i64>,
    /// Incoming or outgoing.
    pub direction: Direction,
    /// Sender address.
    pub from: String,
    /// Recipient address.
    pub to: String,
    /// Message text.
    pub body: String,
    /// Delivery status label.
    pub status: String,
    /// Platform message id (webhook id inbound, API-assigned id outbound).
    pub external_id: Option<String>,
    /// When the message was received or sent.
    pub received_at: DateTime<Utc>,
}

impl MessageRecord {
    /// Record for a message a customer sent to the business number.
    pub fn incoming(
        external_id: &str,
        from: &str,
        business_number: &str,
        body: &str,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            direction: Direction::Incoming,
            from: from.to_owned(),
            to: business_number.to_owned(),
            body: body.to_owned(),
            status: STATUS_RECEIVED.to_owned(),
            external_id: Some(external_id.to_owned()),
            received_at: at,
        }
    }

    /// Record for a reply the business sent to a customer.
    pub fn outgoing(
        business_number: &str,
        to: &str,
        body: &str,
        external_id: Option<&str>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            direction: Direction::Outgoing,
            from: business_number.to_owned(),
            to: to.to_owned(),
            body: body.to_owned(),
            status: STATUS_SENT.to_owned(),
            external_id: external_id.map(str::to_owned),
            received_at: at,
        }
    }
}

/// Errors from storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A ticket with this number already exists.
    #[error("duplicate ticket number: {0}")]
    DuplicateTicketNumber(String),

    /// Replace targeted a ticket that does not exist.
    #[error("ticket not found: {0}")]
    TicketNotFound(String),

    /// An invalid enum value was read from the database.
    #[error("invalid {field} value: {value:?}")]
    InvalidEnum {
        /// Which field contained the bad value.
        field: &'static str,
        /// The unexpected value.
        value: String,
    },

    /// A stored value could not be decoded.
    #[error("corrupt {field}: {reason}")]
    Corrupt {
        /// Which field failed to decode.
        field: &'static str,
        /// Decoder error text.
        reason: String,
    },
}

/// Storage operations the pipeline relies on.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a message record, returning its row id.
    async fn insert_message(&self, record: &MessageRecord) -> Result<i64, StoreError>;

    /// Open or in-progress tickets for `phone`, newest first.
    async fn find_open_tickets(&self, phone: &str) -> Result<Vec<Ticket>, StoreError>;

    /// Insert a ticket, returning its row id.
    ///
    /// Fails with [`StoreError::DuplicateTicketNumber`] when the number is taken.
    async fn insert_ticket(&self, ticket: &Ticket) -> Result<i64, StoreError>;

    /// Replace a persisted ticket with `ticket` (matched by row id).
    async fn replace_ticket(&self, ticket: &Ticket) -> Result<(), StoreError>;

    /// Total number of tickets ever stored.
    async fn count_tickets(&self) -> Result<i64, StoreError>;
}
