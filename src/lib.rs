//! Ticketline: WhatsApp webhook ingestion and support ticketing.
//!
//! Inbound messages are deduplicated, classified, matched to a conversation,
//! turned into support tickets when they carry a query, and answered through
//! the WhatsApp Cloud API.
//!
//! See `DESIGN.md` for the architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod directory;
pub mod dispatch;
pub mod logging;
pub mod notify;
pub mod pipeline;
pub mod server;
pub mod store;
pub mod tickets;
pub mod whatsapp;
