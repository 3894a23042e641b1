//! Reply text for an inbound message.

use crate::tickets::Ticket;

/// Reply asking the customer to use the `<CustomerId>:<Query>` format.
pub const FORMAT_INSTRUCTIONS: &str =
    "Hi! Please send your query in this format <CustomerId>:<Query>";

/// Reply when a query was received but no ticket could be recorded.
pub const GENERIC_ACK: &str =
    "Thank you for your message. We have received your query and will respond shortly.";

/// Build the reply for a classified message and its ticket outcome.
pub fn generate_reply(is_query: bool, is_initial: bool, ticket: Option<&Ticket>) -> String {
    if !is_query {
        return FORMAT_INSTRUCTIONS.to_owned();
    }
    match ticket {
        Some(t) if is_initial => format!(
            "Thank you for your query. We have created a support ticket #{} for your request. \
             Our team will get back to you soon.",
            t.ticket_number
        ),
        Some(t) => format!(
            "Thank you for the additional information. We've updated your ticket #{}. \
             Our team is working on it.",
            t.ticket_number
        ),
        None => GENERIC_ACK.to_owned(),
    }
}
