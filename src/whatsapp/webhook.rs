//! Decoding of inbound Cloud API webhook deliveries.
//!
//! Only the first `entry` and its first `change` are inspected. Each element
//! of `messages` is decoded independently so one malformed element cannot
//! spoil the rest of the batch.

use serde::Deserialize;
use serde_json::Value;

/// A text message received from a customer. Immutable once decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Platform-assigned message id, used for redelivery suppression.
    pub id: String,
    /// Sender phone number.
    pub from: String,
    /// Message text.
    pub text: String,
    /// Id of the message this one replies to, when the customer used "reply".
    pub context_message_id: Option<String>,
}

/// A delivery status callback for a previously sent message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    /// Id of the message the status refers to.
    pub message_id: String,
    /// Status label (`sent`, `delivered`, `read`, `failed`).
    pub status: String,
}

/// One element of the `messages` array after decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundItem {
    /// A text message ready for the pipeline.
    Text(InboundMessage),
    /// A well-formed message of a type other than `text`.
    Unsupported {
        /// Message id.
        id: String,
        /// Message type as reported by the platform.
        kind: String,
    },
    /// An element missing required fields.
    Malformed(String),
}

/// Messages and statuses carried by one webhook delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookBatch {
    /// Decoded `messages` elements; `None` when the key was absent.
    pub messages: Option<Vec<InboundItem>>,
    /// Decoded `statuses` elements; `None` when the key was absent.
    pub statuses: Option<Vec<StatusUpdate>>,
}

/// Outcome of decoding a webhook body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookParse {
    /// The body was empty or whitespace.
    Empty,
    /// The body was not valid JSON.
    Invalid(String),
    /// No `entry` element to inspect.
    NoEntry,
    /// The first entry has no `changes`.
    NoChanges,
    /// The first change was decoded.
    Batch(WebhookBatch),
}

#[derive(Deserialize)]
struct RawMessage {
    id: Option<String>,
    from: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    text: Option<RawText>,
    context: Option<RawContext>,
}

#[derive(Deserialize)]
struct RawText {
    body: Option<String>,
}

#[derive(Deserialize)]
struct RawContext {
    message_id: Option<String>,
}

#[derive(Deserialize)]
struct RawStatus {
    id: Option<String>,
    status: Option<String>,
}

/// Decode a raw webhook body.
pub fn parse_webhook(body: &[u8]) -> WebhookParse {
    if body.iter().all(u8::is_ascii_whitespace) {
        return WebhookParse::Empty;
    }

    let root: Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => return WebhookParse::Invalid(e.to_string()),
    };

    let Some(entry) = root
        .get("entry")
        .and_then(Value::as_array)
        .and_then(|entries| entries.first())
    else {
        return WebhookParse::NoEntry;
    };

    let Some(change) = entry
        .get("changes")
        .and_then(Value::as_array)
        .and_then(|changes| changes.first())
    else {
        return WebhookParse::NoChanges;
    };

    let value = change.get("value");
    let messages = value
        .and_then(|v| v.get("messages"))
        .and_then(Value::as_array)
        .map(|items| items.iter().map(decode_message).collect());
    let statuses = value
        .and_then(|v| v.get("statuses"))
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(decode_status).collect());

    WebhookParse::Batch(WebhookBatch { messages, statuses })
}

fn decode_message(value: &Value) -> InboundItem {
    let raw: RawMessage = match serde_json::from_value(value.clone()) {
        Ok(raw) => raw,
        Err(e) => return InboundItem::Malformed(e.to_string()),
    };

    let Some(id) = raw.id.filter(|s| !s.is_empty()) else {
        return InboundItem::Malformed("missing message id".to_owned());
    };
    let kind = raw.kind.unwrap_or_else(|| "text".to_owned());
    if kind != "text" {
        return InboundItem::Unsupported { id, kind };
    }
    let Some(from) = raw.from.filter(|s| !s.is_empty()) else {
        return InboundItem::Malformed(format!("message {id} has no sender"));
    };
    let Some(text) = raw.text.and_then(|t| t.body) else {
        return InboundItem::Malformed(format!("message {id} has no text body"));
    };
    let context_message_id = raw
        .context
        .and_then(|c| c.message_id)
        .filter(|s| !s.is_empty());

    InboundItem::Text(InboundMessage {
        id,
        from,
        text,
        context_message_id,
    })
}

fn decode_status(value: &Value) -> Option<StatusUpdate> {
    let raw: RawStatus = serde_json::from_value(value.clone()).ok()?;
    Some(StatusUpdate {
        message_id: raw.id.unwrap_or_default(),
        status: raw.status.unwrap_or_default(),
    })
}
