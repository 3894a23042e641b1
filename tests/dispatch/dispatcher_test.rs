//! Tests for reply delivery against a local fake Cloud API.

use std::sync::Arc;

use ticketline::dispatch::{DispatchError, NOTIFICATION_SUBJECT};
use ticketline::notify::LogNotifier;
use ticketline::whatsapp::client::CloudApiClient;
use ticketline::whatsapp::WhatsAppError;

use crate::support::{
    count_messages, dispatcher, memory_store, FakeApi, RecordingNotifier, BUSINESS_NUMBER,
};

const CUSTOMER: &str = "15551112222";

#[tokio::test]
async fn accepted_send_writes_exactly_one_outbound_record() {
    let api = FakeApi::accepting().await;
    let store = memory_store().await;
    let sender = dispatcher(&api, store.clone(), Arc::new(LogNotifier), None);

    let delivery = sender
        .send_reply(CUSTOMER, "Thanks, we are on it.")
        .await
        .expect("send should succeed");

    assert_eq!(delivery.external_id.as_deref(), Some("wamid.OUT1"));
    assert!(delivery.record_id.is_some());
    assert_eq!(count_messages(&store, "outgoing").await, 1);
    assert_eq!(count_messages(&store, "incoming").await, 0);

    let records = store.conversation(CUSTOMER).await.expect("conversation");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].from, BUSINESS_NUMBER);
    assert_eq!(records[0].to, CUSTOMER);
    assert_eq!(records[0].body, "Thanks, we are on it.");
    assert_eq!(records[0].external_id.as_deref(), Some("wamid.OUT1"));
}

#[tokio::test]
async fn request_carries_token_and_text_payload() {
    let api = FakeApi::accepting().await;
    let store = memory_store().await;
    let sender = dispatcher(&api, store, Arc::new(LogNotifier), None);

    sender.send_reply(CUSTOMER, "hello").await.expect("send");

    let requests = api.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.authorization.as_deref(), Some("Bearer test-token"));
    assert_eq!(request.body["messaging_product"], "whatsapp");
    assert_eq!(request.body["type"], "text");
    assert_eq!(request.body["to"], CUSTOMER);
    assert_eq!(request.body["text"]["body"], "hello");
}

#[tokio::test]
async fn rejected_send_records_nothing() {
    let api = FakeApi::rejecting().await;
    let store = memory_store().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let sender = dispatcher(&api, store.clone(), notifier.clone(), Some("ops@example.com"));

    let result = sender.send_reply(CUSTOMER, "hello").await;

    match result {
        Err(DispatchError::Rejected { status, body }) => {
            assert_eq!(status, 400);
            assert!(body.contains("Invalid parameter"), "raw body kept: {body}");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(count_messages(&store, "outgoing").await, 0);
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn operator_is_notified_after_success() {
    let api = FakeApi::accepting().await;
    let store = memory_store().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let sender = dispatcher(&api, store, notifier.clone(), Some("ops@example.com"));

    sender.send_reply(CUSTOMER, "hello").await.expect("send");

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    let (subject, recipient, body) = &sent[0];
    assert_eq!(subject, NOTIFICATION_SUBJECT);
    assert_eq!(recipient, "ops@example.com");
    assert!(body.starts_with(&format!("Message to {CUSTOMER} was sent successfully at ")));
}

#[tokio::test]
async fn no_operator_means_no_notification() {
    let api = FakeApi::accepting().await;
    let store = memory_store().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let sender = dispatcher(&api, store, notifier.clone(), None);

    sender.send_reply(CUSTOMER, "hello").await.expect("send");
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn unreachable_api_is_a_transport_error() {
    // Point at a port nothing listens on.
    let client = CloudApiClient::new(
        "http://127.0.0.1:1".to_owned(),
        "1".to_owned(),
        "token".to_owned(),
    );
    let result = client.send_text(CUSTOMER, "hello").await;
    assert!(matches!(result, Err(WhatsAppError::Http(_))));

    let mapped = result.map_err(DispatchError::from);
    assert!(matches!(mapped, Err(DispatchError::Transport(_))));
}
