//! Bounded window of recently seen webhook message ids.
//!
//! The platform redelivers a webhook when our response is slow or ambiguous.
//! Only immediate redeliveries are suppressed; this is not full idempotency.

use std::collections::VecDeque;
use std::sync::Mutex;

/// Default number of ids remembered.
pub const DEFAULT_DEDUP_CAPACITY: usize = 5;

/// Fixed-capacity FIFO of external message ids.
///
/// Uses a sync [`Mutex`] since the critical section is brief (no awaits).
#[derive(Debug)]
pub struct DedupWindow {
    capacity: usize,
    ids: Mutex<VecDeque<String>>,
}

impl DedupWindow {
    /// Create a window holding at most `capacity` ids (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            ids: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Whether `id` is currently in the window.
    pub fn seen(&self, id: &str) -> bool {
        match self.ids.lock() {
            Ok(ids) => ids.iter().any(|existing| existing == id),
            Err(_) => false,
        }
    }

    /// Remember `id`, evicting the oldest entry when at capacity.
    pub fn record(&self, id: &str) {
        if let Ok(mut ids) = self.ids.lock() {
            push_bounded(&mut ids, self.capacity, id);
        }
    }

    /// Test and record under one lock.
    ///
    /// Returns `true` when `id` was already present (the delivery is a
    /// duplicate); otherwise records it and returns `false`.
    pub fn check_and_record(&self, id: &str) -> bool {
        let Ok(mut ids) = self.ids.lock() else {
            return false;
        };
        if ids.iter().any(|existing| existing == id) {
            return true;
        }
        push_bounded(&mut ids, self.capacity, id);
        false
    }

    /// Number of ids currently held.
    pub fn len(&self) -> usize {
        self.ids.lock().map(|ids| ids.len()).unwrap_or(0)
    }

    /// Whether the window is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DedupWindow {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_CAPACITY)
    }
}

fn push_bounded(ids: &mut VecDeque<String>, capacity: usize, id: &str) {
    if ids.len() >= capacity {
        ids.pop_front();
    }
    ids.push_back(id.to_owned());
}
