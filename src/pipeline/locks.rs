//! Keyed async locks.
//!
//! Entries are created on first use and removed when the last holder or
//! waiter lets go, so the table only grows with the number of keys in flight.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

type Slot = Arc<tokio::sync::Mutex<()>>;

/// A table of async mutexes keyed by string.
#[derive(Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<String, Slot>>,
}

/// Holds the lock for one key until dropped.
pub struct KeyedGuard<'a> {
    owner: &'a KeyedLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyedLocks {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    pub async fn lock(&self, key: &str) -> KeyedGuard<'_> {
        let slot = self.slot(key);
        let guard = slot.lock_owned().await;
        KeyedGuard {
            owner: self,
            key: key.to_owned(),
            guard: Some(guard),
        }
    }

    /// Number of keys with a live entry.
    pub fn active(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn slot(&self, key: &str) -> Slot {
        match self.slots.lock() {
            Ok(mut slots) => Arc::clone(slots.entry(key.to_owned()).or_default()),
            Err(_) => Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    fn release(&self, key: &str) {
        if let Ok(mut slots) = self.slots.lock() {
            // Only the table itself still holds it: nobody is waiting.
            if slots.get(key).is_some_and(|s| Arc::strong_count(s) == 1) {
                slots.remove(key);
            }
        }
    }
}

impl Drop for KeyedGuard<'_> {
    fn drop(&mut self) {
        // The owned guard keeps a reference to the slot; let it go first.
        self.guard.take();
        self.owner.release(&self.key);
    }
}
