//! Per-sender last-activity timestamps with expiry.
//!
//! The store answers "was this sender recently active?" for the initiation
//! resolver. Entries expire a fixed TTL after they were written; an expired
//! or missing entry means "no known recent activity".

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tracing::trace;

/// Default time-to-live for recency entries.
pub const DEFAULT_RECENCY_TTL_HOURS: i64 = 24;

/// Last-activity lookup used to infer conversational continuity.
pub trait RecencyStore: Send + Sync {
    /// Last activity of `sender`, if recorded and not expired at `now`.
    fn get_last_activity(&self, sender: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>>;

    /// Record activity for `sender` at `at`, replacing any earlier entry.
    fn set_last_activity(&self, sender: &str, at: DateTime<Utc>);

    /// Drop every entry expired at `now`, returning how many were removed.
    fn purge_expired(&self, now: DateTime<Utc>) -> usize;
}

#[derive(Debug, Clone, Copy)]
struct RecencyEntry {
    last_activity: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// In-process [`RecencyStore`] backed by a mutex-guarded map.
///
/// Expiry is enforced lazily on read and actively via [`RecencyStore::purge_expired`].
#[derive(Debug)]
pub struct InMemoryRecencyStore {
    ttl: Duration,
    entries: Mutex<HashMap<String, RecencyEntry>>,
}

impl InMemoryRecencyStore {
    /// Create a store whose entries live for `ttl` after being written.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of entries held, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|m| m.len()).unwrap_or(0)
    }

    /// Whether no entries are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryRecencyStore {
    fn default() -> Self {
        Self::new(Duration::hours(DEFAULT_RECENCY_TTL_HOURS))
    }
}

impl RecencyStore for InMemoryRecencyStore {
    fn get_last_activity(&self, sender: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut map = self.entries.lock().ok()?;
        let entry = *map.get(sender)?;
        if now > entry.expires_at {
            map.remove(sender);
            trace!(sender, "recency entry expired");
            return None;
        }
        Some(entry.last_activity)
    }

    fn set_last_activity(&self, sender: &str, at: DateTime<Utc>) {
        let expires_at = at.checked_add_signed(self.ttl).unwrap_or(at);
        if let Ok(mut map) = self.entries.lock() {
            map.insert(
                sender.to_owned(),
                RecencyEntry {
                    last_activity: at,
                    expires_at,
                },
            );
        }
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        match self.entries.lock() {
            Ok(mut map) => {
                let before = map.len();
                map.retain(|_, entry| entry.expires_at >= now);
                before.saturating_sub(map.len())
            }
            Err(_) => 0,
        }
    }
}

/// Spawn a background task that purges expired entries every `every`.
///
/// Returns immediately; the task runs until aborted.
pub fn spawn_sweeper(
    store: std::sync::Arc<dyn RecencyStore>,
    every: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let removed = store.purge_expired(Utc::now());
            if removed > 0 {
                trace!(removed, "expired recency entries purged");
            }
        }
    })
}
