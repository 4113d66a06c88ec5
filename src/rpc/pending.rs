//! Pending request table
//!
//! Maps an outstanding request's id to the completion callback that should
//! run when its response arrives. Bounded: at most [`MAX_IN_FLIGHT`]
//! requests can be waiting at once, and a registration past that limit is
//! rejected with [`RpcError::TableFull`] so the caller can retry or drop
//! the originating action.

use super::endpoint::{RpcError, RpcHandle};
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Maximum number of in-flight requests per endpoint.
pub const MAX_IN_FLIGHT: usize = 64;

/// Completion callback for a single request. Receives the endpoint handle
/// (so it can itself send, as the initialize callback does) and either the
/// full parsed response payload or a timeout error. Fires exactly once.
pub type ResponseCallback = Box<dyn FnOnce(&RpcHandle, Result<Value, RpcError>) + Send>;

struct PendingEntry {
    callback: ResponseCallback,
    registered_at: Instant,
}

#[derive(Default)]
pub struct PendingTable {
    entries: HashMap<i64, PendingEntry>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a callback under `id`. Ids are minted from the endpoint's
    /// monotonic counter, so an id is registered at most once.
    pub fn register(&mut self, id: i64, callback: ResponseCallback) -> Result<(), RpcError> {
        if self.entries.len() >= MAX_IN_FLIGHT {
            return Err(RpcError::TableFull);
        }
        let previous = self.entries.insert(
            id,
            PendingEntry {
                callback,
                registered_at: Instant::now(),
            },
        );
        debug_assert!(previous.is_none(), "request id {} registered twice", id);
        Ok(())
    }

    /// Remove and return the callback for `id`, freeing its slot. A second
    /// response carrying the same id finds nothing here and is dropped.
    pub fn take(&mut self, id: i64) -> Option<ResponseCallback> {
        self.entries.remove(&id).map(|entry| entry.callback)
    }

    /// Drain every entry older than `max_age`. The dispatch loop invokes
    /// the returned callbacks with a timeout error, so a server that never
    /// answers cannot occupy a slot forever.
    pub fn expire(&mut self, max_age: Duration) -> Vec<(i64, ResponseCallback)> {
        let stale: Vec<i64> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.registered_at.elapsed() >= max_age)
            .map(|(&id, _)| id)
            .collect();
        stale
            .into_iter()
            .filter_map(|id| self.entries.remove(&id).map(|entry| (id, entry.callback)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> ResponseCallback {
        Box::new(|_, _| {})
    }

    #[test]
    fn test_register_and_take() {
        let mut table = PendingTable::new();
        table.register(1, noop()).unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.take(1).is_some());
        assert!(table.is_empty());
    }

    #[test]
    fn test_take_twice_returns_none() {
        let mut table = PendingTable::new();
        table.register(7, noop()).unwrap();
        assert!(table.take(7).is_some());
        assert!(table.take(7).is_none());
    }

    #[test]
    fn test_take_unknown_id_returns_none() {
        let mut table = PendingTable::new();
        table.register(1, noop()).unwrap();
        assert!(table.take(99).is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_capacity_boundary() {
        let mut table = PendingTable::new();
        for id in 1..=MAX_IN_FLIGHT as i64 {
            table.register(id, noop()).unwrap();
        }
        assert!(matches!(
            table.register(65, noop()),
            Err(RpcError::TableFull)
        ));
        // Existing entries survive the rejected registration.
        assert_eq!(table.len(), MAX_IN_FLIGHT);
        assert!(table.take(32).is_some());
        // Freeing one slot admits exactly one more registration.
        table.register(65, noop()).unwrap();
        assert!(matches!(
            table.register(66, noop()),
            Err(RpcError::TableFull)
        ));
    }

    #[test]
    fn test_expire_drains_stale_entries() {
        let mut table = PendingTable::new();
        table.register(1, noop()).unwrap();
        table.register(2, noop()).unwrap();
        let expired = table.expire(Duration::ZERO);
        assert_eq!(expired.len(), 2);
        assert!(table.is_empty());
    }

    #[test]
    fn test_expire_keeps_fresh_entries() {
        let mut table = PendingTable::new();
        table.register(1, noop()).unwrap();
        assert!(table.expire(Duration::from_secs(3600)).is_empty());
        assert_eq!(table.len(), 1);
    }
}
