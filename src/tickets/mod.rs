//! Support tickets: domain types and the lifecycle manager.
//!
//! A ticket is opened by a customer's first qualifying query and grows an
//! append-only transcript as follow-ups arrive. Resolution and closure are
//! operator actions outside this service.

pub mod lifecycle;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::store::StoreError;

/// Stage assigned to freshly created tickets.
pub const DEFAULT_STAGE: &str = "New";

/// Subject used when the query text is blank.
pub const DEFAULT_SUBJECT: &str = "Customer Query";

/// Subjects longer than this are truncated.
const SUBJECT_MAX_CHARS: usize = 50;

/// Characters kept before the ellipsis when truncating.
const SUBJECT_TRUNCATED_CHARS: usize = 47;

/// Length of the random fallback suffix in ticket numbers.
const SUFFIX_LEN: usize = 8;

/// Base62 alphabet used for random ticket suffixes.
const BASE62_CHARS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Lifecycle status of a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TicketStatus {
    /// Newly raised, not yet picked up.
    Open,
    /// Being worked on by an operator.
    InProgress,
    /// Resolved by an operator.
    Resolved,
    /// Closed; terminal.
    Closed,
}

impl TicketStatus {
    /// Returns the string representation stored in SQLite.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::InProgress => "InProgress",
            Self::Resolved => "Resolved",
            Self::Closed => "Closed",
        }
    }

    /// Parse from a SQLite text value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a recognised status.
    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "Open" => Ok(Self::Open),
            "InProgress" => Ok(Self::InProgress),
            "Resolved" => Ok(Self::Resolved),
            "Closed" => Ok(Self::Closed),
            other => Err(StoreError::InvalidEnum {
                field: "status",
                value: other.to_owned(),
            }),
        }
    }

    /// Whether the ticket still accepts follow-ups.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open | Self::InProgress)
    }
}

/// Ticket priority tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    /// Low.
    Low,
    /// Medium; the default.
    Medium,
    /// High.
    High,
    /// Urgent.
    Urgent,
}

impl Priority {
    /// Returns the string representation stored in SQLite.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Urgent => "Urgent",
        }
    }

    /// Parse from a SQLite text value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a recognised priority.
    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "Low" => Ok(Self::Low),
            "Medium" => Ok(Self::Medium),
            "High" => Ok(Self::High),
            "Urgent" => Ok(Self::Urgent),
            other => Err(StoreError::InvalidEnum {
                field: "priority",
                value: other.to_owned(),
            }),
        }
    }
}

/// A support ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Database row id (`None` for tickets not yet persisted).
    pub id: Option<i64>,
    /// Human-facing ticket number (`TKT-YYYYMMDD-...`).
    pub ticket_number: String,
    /// Short subject derived from the first query.
    pub subject: String,
    /// Append-only transcript.
    pub description: String,
    /// Lifecycle status.
    pub status: TicketStatus,
    /// Free-form pipeline stage label.
    pub stage: String,
    /// Priority tier.
    pub priority: Priority,
    /// Customer WhatsApp phone number.
    pub customer_phone: String,
    /// Customer display name from the directory.
    pub contact_name: Option<String>,
    /// Customer email from the directory.
    pub contact_email: Option<String>,
    /// Message that opened the ticket.
    pub initial_message_id: Option<i64>,
    /// Every message associated with the ticket, oldest first.
    pub message_ids: Vec<i64>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Ticket number built from the UTC date and a sequence value.
pub fn sequential_ticket_number(now: DateTime<Utc>, sequence: i64) -> String {
    format!("TKT-{}-{sequence:06}", now.format("%Y%m%d"))
}

/// Ticket number built from the UTC date and a random base62 suffix.
pub fn random_ticket_number(now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..BASE62_CHARS.len());
            char::from(BASE62_CHARS[idx])
        })
        .collect();
    format!("TKT-{}-{suffix}", now.format("%Y%m%d"))
}

/// Subject line for a ticket raised from `query`.
///
/// Uses the first sentence when it ends within the first 50 characters,
/// otherwise truncates to 50 characters including a trailing ellipsis.
pub fn ticket_subject(query: &str) -> String {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return DEFAULT_SUBJECT.to_owned();
    }

    let sentence_end = trimmed
        .chars()
        .position(|c| matches!(c, '.' | '!' | '?' | '？'));
    if let Some(end) = sentence_end {
        if end > 0 && end <= SUBJECT_MAX_CHARS {
            return trimmed.chars().take(end).collect();
        }
    }

    if trimmed.chars().count() > SUBJECT_MAX_CHARS {
        let head: String = trimmed.chars().take(SUBJECT_TRUNCATED_CHARS).collect();
        return format!("{head}...");
    }
    trimmed.to_owned()
}

/// Transcript line appended to a ticket's description for a follow-up.
pub fn transcript_line(at: DateTime<Utc>, query: &str) -> String {
    format!("\n\n[{}] {query}", at.format("%Y-%m-%d %H:%M"))
}
