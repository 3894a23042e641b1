//! Tests for `src/pipeline/recency.rs`: expiry of sender activity.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use ticketline::pipeline::recency::{spawn_sweeper, InMemoryRecencyStore, RecencyStore};

fn t0() -> chrono::DateTime<Utc> {
    match Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).single() {
        Some(t) => t,
        None => panic!("valid timestamp"),
    }
}

#[test]
fn unknown_sender_has_no_activity() {
    let store = InMemoryRecencyStore::default();
    assert_eq!(store.get_last_activity("15551112222", t0()), None);
}

#[test]
fn activity_is_visible_until_ttl_elapses() {
    let store = InMemoryRecencyStore::new(Duration::hours(24));
    store.set_last_activity("15551112222", t0());

    let within = t0() + Duration::hours(23);
    assert_eq!(store.get_last_activity("15551112222", within), Some(t0()));

    let at_boundary = t0() + Duration::hours(24);
    assert_eq!(store.get_last_activity("15551112222", at_boundary), Some(t0()));
}

#[test]
fn expired_activity_is_absent_and_dropped() {
    let store = InMemoryRecencyStore::new(Duration::hours(24));
    store.set_last_activity("15551112222", t0());

    let after = t0() + Duration::hours(24) + Duration::seconds(1);
    assert_eq!(store.get_last_activity("15551112222", after), None);
    assert!(store.is_empty());
}

#[test]
fn refresh_extends_expiry() {
    let store = InMemoryRecencyStore::new(Duration::hours(24));
    store.set_last_activity("15551112222", t0());
    let later = t0() + Duration::hours(20);
    store.set_last_activity("15551112222", later);

    let check = t0() + Duration::hours(30);
    assert_eq!(store.get_last_activity("15551112222", check), Some(later));
}

#[test]
fn purge_removes_only_expired_entries() {
    let store = InMemoryRecencyStore::new(Duration::hours(1));
    store.set_last_activity("old", t0());
    store.set_last_activity("fresh", t0() + Duration::hours(2));

    let removed = store.purge_expired(t0() + Duration::hours(2));
    assert_eq!(removed, 1);
    assert_eq!(store.len(), 1);
    assert!(store
        .get_last_activity("fresh", t0() + Duration::hours(2))
        .is_some());
}

#[tokio::test]
async fn sweeper_purges_in_background() {
    let store = Arc::new(InMemoryRecencyStore::new(Duration::seconds(1)));
    store.set_last_activity("15551112222", Utc::now() - Duration::hours(1));

    let handle = spawn_sweeper(store.clone(), std::time::Duration::from_millis(10));
    for _ in 0..50 {
        if store.is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    handle.abort();
    assert!(store.is_empty());
}
