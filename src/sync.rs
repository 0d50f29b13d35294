//! Read-your-writes position synchronization.
//!
//! A writer that just appended a command can block until a named subscriber
//! has observably advanced at least to a given position. The waiting side is
//! correlated with the source's acknowledgment by a caller-supplied
//! [`SyncId`]; no timeout is enforced at this layer.

use crate::error::Result;
use crate::store::{MessageStore, SyncWaiter};
use crate::types::{GlobalPosition, SubscriberId, SyncId};
use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Block until the source acknowledges that `subscriber_id` has advanced at
/// least to `position`.
///
/// Callers needing a deadline use
/// [`MessageStore::begin_synchronize`] directly and
/// [`SyncWaiter::wait_timeout`].
pub fn synchronize(
    store: &dyn MessageStore,
    subscriber_id: &SubscriberId,
    position: GlobalPosition,
    sync_id: &SyncId,
) -> Result<()> {
    store
        .begin_synchronize(subscriber_id, position, sync_id)?
        .wait()
}

/// Routes `synchronize_ack` signals from a transport to pending waiters.
///
/// Transports hold one registry, register a waiter per outgoing
/// synchronization request, and call [`acknowledge`](SyncRegistry::acknowledge)
/// when the source's acknowledgment for a `(subscriber, sync)` pair arrives.
#[derive(Default)]
pub struct SyncRegistry {
    pending: Mutex<HashMap<(SubscriberId, SyncId), Sender<()>>>,
}

impl SyncRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending synchronization and hand back its waiter.
    ///
    /// Registering the same pair twice replaces the first waiter, whose
    /// `wait` then reports a transport failure.
    pub fn register(&self, subscriber_id: &SubscriberId, sync_id: &SyncId) -> SyncWaiter {
        let (tx, rx) = bounded(1);
        self.pending
            .lock()
            .insert((subscriber_id.clone(), sync_id.clone()), tx);
        SyncWaiter::new(rx)
    }

    /// Wake the waiter for a pair. Returns false when no waiter was pending.
    pub fn acknowledge(&self, subscriber_id: &SubscriberId, sync_id: &SyncId) -> bool {
        let sender = self
            .pending
            .lock()
            .remove(&(subscriber_id.clone(), sync_id.clone()));
        match sender {
            Some(sender) => sender.try_send(()).is_ok(),
            None => false,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_acknowledge_wakes_waiter() {
        let registry = SyncRegistry::new();
        let subscriber = SubscriberId::from("person-test");
        let sync = SyncId::from("sync-1");

        let waiter = registry.register(&subscriber, &sync);
        assert_eq!(registry.pending_count(), 1);

        assert!(registry.acknowledge(&subscriber, &sync));
        assert!(waiter.wait().is_ok());
        assert_eq!(registry.pending_count(), 0);
    }

    #[test]
    fn test_unknown_pair_is_ignored() {
        let registry = SyncRegistry::new();
        assert!(!registry.acknowledge(&SubscriberId::from("nobody"), &SyncId::from("sync-9")));
    }

    #[test]
    fn test_waiter_times_out_without_acknowledgment() {
        let registry = SyncRegistry::new();
        let waiter = registry.register(&SubscriberId::from("s"), &SyncId::from("sync-1"));

        let acked = waiter.wait_timeout(Duration::from_millis(20)).unwrap();
        assert!(!acked);
    }

    #[test]
    fn test_replaced_waiter_observes_disconnect() {
        let registry = SyncRegistry::new();
        let subscriber = SubscriberId::from("s");
        let sync = SyncId::from("sync-1");

        let first = registry.register(&subscriber, &sync);
        let _second = registry.register(&subscriber, &sync);

        assert!(first.wait().is_err());
    }
}
