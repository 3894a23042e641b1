//! WhatsApp Cloud API adapter: outbound message client and inbound webhook payloads.
//!
//! Outbound replies go through [`client::CloudApiClient`], which talks to the
//! Graph API with bearer-token auth. Inbound events arrive as webhook POSTs and
//! are decoded by [`webhook`].

pub mod client;
pub mod webhook;

/// Errors from the WhatsApp adapter.
#[derive(Debug, thiserror::Error)]
pub enum WhatsAppError {
    /// HTTP request to the Graph API failed before a response arrived.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The Graph API answered with a non-success status.
    #[error("send rejected with status {status}: {body}")]
    Rejected {
        /// HTTP status code returned by the API.
        status: u16,
        /// Raw response body.
        body: String,
    },
}
