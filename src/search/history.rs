//! Query De-duplication
//!
//! Remembers the most recent query IDs a node has handled so that a query
//! arriving again over another path is dropped instead of re-expanded.

use std::collections::VecDeque;
use tokio::sync::Mutex;

use super::types::QueryId;

pub const QUERY_HISTORY_CAPACITY: usize = 5;

/// Bounded FIFO of handled query IDs.
pub struct QueryHistory {
    seen: Mutex<VecDeque<QueryId>>,
    capacity: usize,
}

impl QueryHistory {
    pub fn new() -> Self {
        Self::with_capacity(QUERY_HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            seen: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Records `id` and returns `true` if it was not already present.
    ///
    /// The check and the insert happen under one lock, so two concurrent
    /// copies of the same query cannot both be accepted.
    pub async fn record(&self, id: &QueryId) -> bool {
        let mut seen = self.seen.lock().await;
        if seen.contains(id) {
            return false;
        }
        if seen.len() == self.capacity {
            seen.pop_front();
        }
        seen.push_back(id.clone());
        true
    }

    pub async fn contains(&self, id: &QueryId) -> bool {
        self.seen.lock().await.contains(id)
    }

    pub async fn len(&self) -> usize {
        self.seen.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.seen.lock().await.is_empty()
    }
}

impl Default for QueryHistory {
    fn default() -> Self {
        Self::new()
    }
}
