//! Inbound message pipeline.
//!
//! Each text message from a webhook delivery runs through:
//! dedup → classification → initiation → inbound record → recency refresh →
//! ticket (queries only) → reply → dispatch.
//!
//! Shared state (dedup window, recency map, ticket locks) lives in injected
//! components with their own synchronisation, so deliveries can be processed
//! concurrently. Messages from the same sender are serialised from the
//! initiation decision through the ticket step.

pub mod classifier;
pub mod dedup;
pub mod initiation;
pub mod locks;
pub mod recency;
pub mod reply;

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

use self::classifier::{Classification, Classifier};
use self::dedup::DedupWindow;
use self::initiation::{resolve_initiation, Initiation};
use self::locks::KeyedLocks;
use self::recency::RecencyStore;
use self::reply::generate_reply;
use crate::directory::{personalised_query, split_customer_query, Customer, CustomerDirectory};
use crate::dispatch::{Delivery, DispatchError, Dispatcher};
use crate::store::{MessageRecord, Store};
use crate::tickets::lifecycle::{TicketManager, TicketOutcome, TicketRequest};
use crate::whatsapp::webhook::{InboundItem, InboundMessage, WebhookBatch};

/// Errors that escape the pipeline for a single message.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The reply could not be delivered.
    #[error("reply to message {message_id} not delivered: {source}")]
    Dispatch {
        /// External id of the inbound message.
        message_id: String,
        /// Underlying dispatch failure.
        source: DispatchError,
    },
}

/// Result of processing one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// The id was in the dedup window; nothing was done.
    Duplicate,
    /// The message was handled and a reply delivered.
    Replied(ReplySummary),
}

/// What the pipeline did with a handled message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplySummary {
    /// Classifier results.
    pub classification: Classification,
    /// Initiation decision.
    pub initiation: Initiation,
    /// Row id of the inbound record, if it was persisted.
    pub inbound_record_id: Option<i64>,
    /// Ticket created or updated, if any.
    pub ticket: Option<TicketOutcome>,
    /// Reply text sent to the customer.
    pub reply: String,
    /// Delivery receipt.
    pub delivery: Delivery,
}

/// Tally for one webhook batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Messages replied to.
    pub replied: usize,
    /// Messages dropped as redeliveries.
    pub duplicates: usize,
    /// Non-text or malformed elements skipped.
    pub skipped: usize,
    /// Messages whose reply failed.
    pub failures: Vec<PipelineError>,
}

/// Collaborators the pipeline is assembled from.
pub struct PipelineParts {
    /// Redelivery window.
    pub dedup: DedupWindow,
    /// Sender recency store.
    pub recency: Arc<dyn RecencyStore>,
    /// Classification strategy.
    pub classifier: Arc<dyn Classifier>,
    /// Message and ticket storage.
    pub store: Arc<dyn Store>,
    /// Optional customer directory.
    pub directory: Option<Arc<dyn CustomerDirectory>>,
    /// Outbound dispatcher.
    pub dispatcher: Dispatcher,
    /// Business phone number recorded on inbound messages.
    pub business_number: String,
}

/// The inbound message pipeline.
pub struct Pipeline {
    dedup: DedupWindow,
    recency: Arc<dyn RecencyStore>,
    classifier: Arc<dyn Classifier>,
    store: Arc<dyn Store>,
    directory: Option<Arc<dyn CustomerDirectory>>,
    sender_locks: KeyedLocks,
    tickets: TicketManager,
    dispatcher: Dispatcher,
    business_number: String,
}

impl Pipeline {
    /// Assemble a pipeline.
    pub fn new(parts: PipelineParts) -> Self {
        let tickets = TicketManager::new(Arc::clone(&parts.store), Arc::clone(&parts.classifier));
        Self {
            dedup: parts.dedup,
            recency: parts.recency,
            classifier: parts.classifier,
            store: parts.store,
            directory: parts.directory,
            sender_locks: KeyedLocks::new(),
            tickets,
            dispatcher: parts.dispatcher,
            business_number: parts.business_number,
        }
    }

    /// Process every element of a webhook batch's `messages`.
    ///
    /// Each message is handled independently; a failure is collected and the
    /// remaining messages still run.
    pub async fn process_batch(&self, batch: &WebhookBatch) -> BatchReport {
        let mut report = BatchReport::default();
        for item in batch.messages.iter().flatten() {
            match item {
                InboundItem::Text(message) => match self.process(message).await {
                    Ok(MessageOutcome::Duplicate) => {
                        report.duplicates = report.duplicates.saturating_add(1);
                    }
                    Ok(MessageOutcome::Replied(_)) => {
                        report.replied = report.replied.saturating_add(1);
                    }
                    Err(e) => {
                        error!(error = %e, "message processing failed");
                        report.failures.push(e);
                    }
                },
                InboundItem::Unsupported { id, kind } => {
                    debug!(message_id = %id, kind = %kind, "ignoring non-text message");
                    report.skipped = report.skipped.saturating_add(1);
                }
                InboundItem::Malformed(reason) => {
                    warn!(reason = %reason, "skipping malformed message");
                    report.skipped = report.skipped.saturating_add(1);
                }
            }
        }
        report
    }

    /// Run one text message through the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Dispatch`] when the reply was not delivered.
    /// The inbound record and any ticket change have already been persisted.
    #[instrument(skip_all, fields(message_id = %message.id, from = %message.from))]
    pub async fn process(&self, message: &InboundMessage) -> Result<MessageOutcome, PipelineError> {
        if self.dedup.check_and_record(&message.id) {
            info!("duplicate delivery dropped");
            return Ok(MessageOutcome::Duplicate);
        }

        let sender_guard = self.sender_locks.lock(&message.from).await;
        let now = Utc::now();
        let classification = self.classifier.classify(&message.text);
        // Decide before this message refreshes the sender's recency entry.
        let initiation = resolve_initiation(
            message,
            self.recency.as_ref(),
            self.classifier.as_ref(),
            now,
        );

        let record = MessageRecord::incoming(
            &message.id,
            &message.from,
            &self.business_number,
            &message.text,
            now,
        );
        let inbound_record_id = match self.store.insert_message(&record).await {
            Ok(id) => Some(id),
            Err(e) => {
                error!(error = %e, "failed to record inbound message");
                None
            }
        };
        self.recency.set_last_activity(&message.from, now);

        let ticket = match inbound_record_id {
            Some(record_id) if classification.is_query => {
                let (query, customer) = self.resolve_query(&message.text).await;
                self.tickets
                    .create_or_update(
                        TicketRequest {
                            message_id: record_id,
                            phone: &message.from,
                            query: &query,
                            is_initial: initiation.is_initial,
                            customer: customer.as_ref(),
                        },
                        now,
                    )
                    .await
            }
            _ => None,
        };
        drop(sender_guard);

        let reply = generate_reply(
            classification.is_query,
            initiation.is_initial,
            ticket.as_ref().map(TicketOutcome::ticket),
        );

        let delivery = self
            .dispatcher
            .send_reply(&message.from, &reply)
            .await
            .map_err(|source| PipelineError::Dispatch {
                message_id: message.id.clone(),
                source,
            })?;

        Ok(MessageOutcome::Replied(ReplySummary {
            classification,
            initiation,
            inbound_record_id,
            ticket,
            reply,
            delivery,
        }))
    }

    /// Query text for the ticket, personalised when the customer is known.
    async fn resolve_query(&self, text: &str) -> (String, Option<Customer>) {
        let (Some(directory), Some((customer_id, query))) =
            (self.directory.as_ref(), split_customer_query(text))
        else {
            return (text.to_owned(), None);
        };

        match directory.lookup(customer_id).await {
            Ok(Some(customer)) => (personalised_query(&customer, query), Some(customer)),
            Ok(None) => {
                debug!(customer_id, "customer id not in directory");
                (text.to_owned(), None)
            }
            Err(e) => {
                warn!(error = %e, customer_id, "directory lookup failed");
                (text.to_owned(), None)
            }
        }
    }
}
