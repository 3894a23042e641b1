//! Create-or-append logic for customer tickets.
//!
//! At most one ticket per customer phone should be open at a time: follow-ups
//! are appended to the newest open ticket unless the message starts a fresh
//! conversation. The lookup and the write for one phone run under a per-phone
//! lock so concurrent deliveries for the same customer cannot both create a
//! ticket or overwrite each other's append.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use super::{
    random_ticket_number, sequential_ticket_number, ticket_subject, transcript_line, Ticket,
    TicketStatus, DEFAULT_STAGE,
};
use crate::directory::Customer;
use crate::pipeline::classifier::Classifier;
use crate::pipeline::locks::KeyedLocks;
use crate::store::{Store, StoreError};

/// Input for one ticket decision.
#[derive(Debug, Clone, Copy)]
pub struct TicketRequest<'a> {
    /// Row id of the persisted inbound message.
    pub message_id: i64,
    /// Customer phone number.
    pub phone: &'a str,
    /// Query text recorded on the ticket.
    pub query: &'a str,
    /// Whether the message starts a new interaction.
    pub is_initial: bool,
    /// Directory entry for the customer, when one was found.
    pub customer: Option<&'a Customer>,
}

/// What happened to the ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketOutcome {
    /// A new ticket was opened.
    Created(Ticket),
    /// The customer's open ticket was extended.
    Updated(Ticket),
}

impl TicketOutcome {
    /// The resulting ticket.
    pub fn ticket(&self) -> &Ticket {
        match self {
            Self::Created(t) | Self::Updated(t) => t,
        }
    }

    /// Consume the outcome, returning the ticket.
    pub fn into_ticket(self) -> Ticket {
        match self {
            Self::Created(t) | Self::Updated(t) => t,
        }
    }
}

/// Owns ticket numbering and the create/append decision.
pub struct TicketManager {
    store: Arc<dyn Store>,
    classifier: Arc<dyn Classifier>,
    phone_locks: KeyedLocks,
}

impl TicketManager {
    /// Create a manager over `store`, using `classifier` for priorities.
    pub fn new(store: Arc<dyn Store>, classifier: Arc<dyn Classifier>) -> Self {
        Self {
            store,
            classifier,
            phone_locks: KeyedLocks::new(),
        }
    }

    /// Create a ticket or append to the customer's open one.
    ///
    /// Storage failures are logged and yield `None`; ticketing must never
    /// block receipt of or reply to a message.
    pub async fn create_or_update(
        &self,
        request: TicketRequest<'_>,
        now: DateTime<Utc>,
    ) -> Option<TicketOutcome> {
        let result = {
            let _guard = self.phone_locks.lock(request.phone).await;
            self.apply(request, now).await
        };

        match result {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!(
                    error = %e,
                    phone = request.phone,
                    message_id = request.message_id,
                    "ticket create/update failed"
                );
                None
            }
        }
    }

    async fn apply(
        &self,
        request: TicketRequest<'_>,
        now: DateTime<Utc>,
    ) -> Result<TicketOutcome, StoreError> {
        let newest_open = self
            .store
            .find_open_tickets(request.phone)
            .await?
            .into_iter()
            .next();

        match newest_open {
            Some(mut ticket) if !request.is_initial => {
                ticket
                    .description
                    .push_str(&transcript_line(now, request.query));
                ticket.message_ids.push(request.message_id);
                ticket.updated_at = now;
                self.store.replace_ticket(&ticket).await?;
                info!(number = %ticket.ticket_number, phone = request.phone, "ticket updated");
                Ok(TicketOutcome::Updated(ticket))
            }
            _ => {
                let ticket = self.create(request, now).await?;
                info!(
                    number = %ticket.ticket_number,
                    phone = request.phone,
                    priority = ticket.priority.as_str(),
                    "ticket created"
                );
                Ok(TicketOutcome::Created(ticket))
            }
        }
    }

    async fn create(
        &self,
        request: TicketRequest<'_>,
        now: DateTime<Utc>,
    ) -> Result<Ticket, StoreError> {
        let sequence = self.store.count_tickets().await?.saturating_add(1);
        let mut ticket = Ticket {
            id: None,
            ticket_number: sequential_ticket_number(now, sequence),
            subject: ticket_subject(request.query),
            description: request.query.to_owned(),
            status: TicketStatus::Open,
            stage: DEFAULT_STAGE.to_owned(),
            priority: self.classifier.priority(request.query),
            customer_phone: request.phone.to_owned(),
            contact_name: request.customer.map(|c| c.name.clone()),
            contact_email: request.customer.and_then(|c| c.email.clone()),
            initial_message_id: Some(request.message_id),
            message_ids: vec![request.message_id],
            created_at: now,
            updated_at: now,
        };

        match self.store.insert_ticket(&ticket).await {
            Ok(id) => ticket.id = Some(id),
            Err(StoreError::DuplicateTicketNumber(taken)) => {
                // Sequence numbers come from a count, so they can collide
                // (e.g. after deletions or with a second instance).
                ticket.ticket_number = random_ticket_number(now);
                warn!(taken = %taken, fallback = %ticket.ticket_number, "ticket number collision");
                ticket.id = Some(self.store.insert_ticket(&ticket).await?);
            }
            Err(e) => return Err(e),
        }
        Ok(ticket)
    }

    /// Number of phones with a live lock entry.
    pub fn active_locks(&self) -> usize {
        self.phone_locks.active()
    }
}
