//! Tests for `src/pipeline/initiation.rs`: the initiation precedence rules.

use chrono::{Duration, Utc};
use ticketline::pipeline::classifier::KeywordClassifier;
use ticketline::pipeline::initiation::{resolve_initiation, InitiationReason};
use ticketline::pipeline::recency::{InMemoryRecencyStore, RecencyStore};
use ticketline::whatsapp::webhook::InboundMessage;

fn message(text: &str, context: Option<&str>) -> InboundMessage {
    InboundMessage {
        id: "wamid.IN1".to_owned(),
        from: "15551112222".to_owned(),
        text: text.to_owned(),
        context_message_id: context.map(str::to_owned),
    }
}

fn classifier() -> KeywordClassifier {
    KeywordClassifier::new().expect("vocabularies compile")
}

#[test]
fn reply_context_is_never_initial() {
    let recency = InMemoryRecencyStore::default();
    let result = resolve_initiation(
        &message("hello", Some("wamid.PREV")),
        &recency,
        &classifier(),
        Utc::now(),
    );
    assert!(!result.is_initial);
    assert_eq!(result.reason, InitiationReason::ReplyContext);
}

#[test]
fn recent_activity_is_not_initial_even_for_greetings() {
    let recency = InMemoryRecencyStore::default();
    let now = Utc::now();
    recency.set_last_activity("15551112222", now - Duration::hours(1));

    let result = resolve_initiation(&message("hi", None), &recency, &classifier(), now);
    assert!(!result.is_initial);
    assert_eq!(result.reason, InitiationReason::RecentActivity);
}

#[test]
fn greeting_without_history_is_initial() {
    let recency = InMemoryRecencyStore::default();
    let result = resolve_initiation(&message("Hello", None), &recency, &classifier(), Utc::now());
    assert!(result.is_initial);
    assert_eq!(result.reason, InitiationReason::Greeting);
}

#[test]
fn any_message_without_history_is_initial() {
    let recency = InMemoryRecencyStore::default();
    let result = resolve_initiation(
        &message("my order never arrived", None),
        &recency,
        &classifier(),
        Utc::now(),
    );
    assert!(result.is_initial);
    assert_eq!(result.reason, InitiationReason::NoHistory);
}

#[test]
fn expired_activity_counts_as_no_history() {
    let recency = InMemoryRecencyStore::new(Duration::hours(24));
    let now = Utc::now();
    recency.set_last_activity("15551112222", now - Duration::hours(25));

    let result = resolve_initiation(
        &message("still waiting on my refund", None),
        &recency,
        &classifier(),
        now,
    );
    assert!(result.is_initial);
}
