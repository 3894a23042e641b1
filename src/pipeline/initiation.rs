//! Decide whether an inbound message starts a new interaction.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::classifier::Classifier;
use super::recency::RecencyStore;
use crate::whatsapp::webhook::InboundMessage;

/// Why a message was judged initial or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitiationReason {
    /// The payload carried a reply-context reference.
    ReplyContext,
    /// The sender was active within the recency window.
    RecentActivity,
    /// The text is a greeting.
    Greeting,
    /// No evidence of an ongoing conversation.
    NoHistory,
}

/// Result of the initiation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Initiation {
    /// Whether the message starts a new interaction.
    pub is_initial: bool,
    /// Which rule decided.
    pub reason: InitiationReason,
}

/// Apply the initiation rules in priority order.
///
/// Must run before the sender's recency entry is refreshed with this message.
/// Defaulting to initial when nothing else matches favours creating a ticket
/// over silently continuing one.
pub fn resolve_initiation(
    message: &InboundMessage,
    recency: &dyn RecencyStore,
    classifier: &dyn Classifier,
    now: DateTime<Utc>,
) -> Initiation {
    let decided = if message.context_message_id.is_some() {
        Initiation {
            is_initial: false,
            reason: InitiationReason::ReplyContext,
        }
    } else if recency.get_last_activity(&message.from, now).is_some() {
        Initiation {
            is_initial: false,
            reason: InitiationReason::RecentActivity,
        }
    } else if classifier.is_greeting(&message.text) {
        Initiation {
            is_initial: true,
            reason: InitiationReason::Greeting,
        }
    } else {
        Initiation {
            is_initial: true,
            reason: InitiationReason::NoHistory,
        }
    };
    debug!(
        message_id = %message.id,
        is_initial = decided.is_initial,
        reason = ?decided.reason,
        "initiation resolved"
    );
    decided
}
