//! HTTP client for the WhatsApp Cloud (Graph) API.
//!
//! Only plain text messages are sent. Every request carries the configured
//! access token as a bearer credential.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::WhatsAppError;

/// Default Graph API base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://graph.facebook.com";

/// HTTP connect timeout for the reqwest client.
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// HTTP request timeout for send operations.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Client for the WhatsApp Cloud API.
pub struct CloudApiClient {
    client: reqwest::Client,
    base_url: String,
    phone_number_id: String,
    access_token: String,
}

impl std::fmt::Debug for CloudApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudApiClient")
            .field("base_url", &self.base_url)
            .field("phone_number_id", &self.phone_number_id)
            .finish_non_exhaustive()
    }
}

/// Request body for `POST /{phone_number_id}/messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundTextMessage {
    /// Recipient phone number.
    pub to: String,
    /// Always `"whatsapp"`.
    pub messaging_product: String,
    /// Always `"text"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Text payload.
    pub text: TextBody,
}

/// Text payload of an outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBody {
    /// Message text.
    pub body: String,
}

impl OutboundTextMessage {
    /// Build a plain text message for `to`.
    pub fn text(to: &str, body: &str) -> Self {
        Self {
            to: to.to_owned(),
            messaging_product: "whatsapp".to_owned(),
            kind: "text".to_owned(),
            text: TextBody {
                body: body.to_owned(),
            },
        }
    }
}

/// Successful send response from the Graph API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendResponse {
    /// Messages accepted by the API.
    #[serde(default)]
    pub messages: Vec<SentMessageId>,
}

/// Identifier the API assigned to an accepted message.
#[derive(Debug, Clone, Deserialize)]
pub struct SentMessageId {
    /// WhatsApp message id (`wamid...`).
    pub id: String,
}

impl SendResponse {
    /// The id of the first accepted message, if any.
    pub fn message_id(&self) -> Option<&str> {
        self.messages.first().map(|m| m.id.as_str())
    }
}

impl CloudApiClient {
    /// Create a client for the given API base URL and business phone number id.
    pub fn new(base_url: String, phone_number_id: String, access_token: String) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to build HTTP client with timeouts, using default");
                reqwest::Client::default()
            });
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            phone_number_id,
            access_token,
        }
    }

    /// Full URL of the messages endpoint.
    pub fn messages_url(&self) -> String {
        format!("{}/{}/messages", self.base_url, self.phone_number_id)
    }

    /// Send a text message to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`WhatsAppError::Rejected`] with the raw response body when the
    /// API answers with a non-success status, or [`WhatsAppError::Http`] when
    /// the request itself fails.
    pub async fn send_text(&self, to: &str, text: &str) -> Result<SendResponse, WhatsAppError> {
        let body = OutboundTextMessage::text(to, text);
        let resp = self
            .client
            .post(self.messages_url())
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let raw = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            warn!(%status, to, "WhatsApp send failed: {raw}");
            return Err(WhatsAppError::Rejected {
                status: status.as_u16(),
                body: raw,
            });
        }

        // A success body we cannot parse still means the message went out.
        let parsed = serde_json::from_str::<SendResponse>(&raw).unwrap_or_default();
        debug!(to, message_id = ?parsed.message_id(), "message sent via WhatsApp");
        Ok(parsed)
    }
}
