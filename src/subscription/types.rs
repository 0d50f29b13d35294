//! Subscription options, status and handles.

use crate::error::{ProtocolError, Result};
use crate::types::{GlobalPosition, SubscriberId, Timestamp};
use crossbeam_channel::Sender;
use std::fmt;
use std::time::Duration;

/// Static partition of a merged category sequence across group members.
///
/// A message at ordinal `n` of the merged sequence belongs to member
/// `n % size`. Every member must observe the identical merged ordering for
/// the partition to be gap- and duplicate-free, so all members subscribe
/// from the same `last_position`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ConsumerGroup {
    member: u32,
    size: u32,
}

impl ConsumerGroup {
    pub fn new(member: u32, size: u32) -> Result<Self> {
        if size == 0 || member >= size {
            return Err(ProtocolError::InvalidConsumerGroup { member, size });
        }
        Ok(Self { member, size })
    }

    pub fn member(&self) -> u32 {
        self.member
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Does this member own the message at the given merged-sequence ordinal?
    pub(crate) fn owns(&self, ordinal: u64) -> bool {
        ordinal % u64::from(self.size) == u64::from(self.member)
    }
}

impl fmt::Debug for ConsumerGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConsumerGroup({}/{})", self.member, self.size)
    }
}

/// Callback observing liveness pings for a subscriber.
pub type KeepAliveFn = Box<dyn Fn(&SubscriberId, Timestamp) + Send>;

/// Callback observing subscription progress after each settled handler.
pub type ProgressFn = Box<dyn Fn(&SubscriptionStatus) + Send>;

/// Callback observing the terminal error of a subscription.
pub type CrashFn = Box<dyn Fn(&ProtocolError) + Send>;

/// Options for [`subscribe`](crate::subscription::subscribe).
///
/// All fields are optional; the defaults give a freshly identified
/// subscriber consuming the whole sequence from position 0 with no pacing.
#[derive(Default)]
pub struct SubscribeOptions {
    /// Identity of this consumer. Generated when absent.
    pub subscriber_id: Option<SubscriberId>,

    /// Inclusive resume cursor. Re-subscribing with the same cursor
    /// redelivers the same sequence: delivery is at-least-once.
    pub last_position: GlobalPosition,

    /// Static consumer-group partition.
    pub consumer_group: Option<ConsumerGroup>,

    /// Pacing delay inserted after each settled handler.
    pub tick_delay: Option<Duration>,

    /// Observes keep-alive pings.
    pub on_keep_alive: Option<KeepAliveFn>,

    /// Observes cursor advancement.
    pub on_progress: Option<ProgressFn>,

    /// Observes the terminal transport or handler failure.
    pub on_crash: Option<CrashFn>,
}

impl SubscribeOptions {
    pub fn with_subscriber_id(mut self, id: SubscriberId) -> Self {
        self.subscriber_id = Some(id);
        self
    }

    pub fn with_last_position(mut self, position: GlobalPosition) -> Self {
        self.last_position = position;
        self
    }

    pub fn with_consumer_group(mut self, group: ConsumerGroup) -> Self {
        self.consumer_group = Some(group);
        self
    }

    pub fn with_tick_delay(mut self, delay: Duration) -> Self {
        self.tick_delay = Some(delay);
        self
    }

    pub fn on_keep_alive(mut self, f: impl Fn(&SubscriberId, Timestamp) + Send + 'static) -> Self {
        self.on_keep_alive = Some(Box::new(f));
        self
    }

    pub fn on_progress(mut self, f: impl Fn(&SubscriptionStatus) + Send + 'static) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    pub fn on_crash(mut self, f: impl Fn(&ProtocolError) + Send + 'static) -> Self {
        self.on_crash = Some(Box::new(f));
        self
    }
}

/// Per-subscription state, owned exclusively by the delivery thread and
/// observed read-only through the progress callback.
#[derive(Clone, Debug)]
pub struct SubscriptionStatus {
    pub subscriber_id: SubscriberId,

    /// Global position of the last successfully handled message.
    pub position: GlobalPosition,

    /// Data messages handled so far. Keep-alive pings never count.
    pub messages_read: u64,

    /// Latest liveness ping observed from the source.
    pub last_keep_alive: Option<Timestamp>,

    /// The source's end-of-known marker has been observed.
    pub caught_up: bool,

    /// A handler error has been observed. Terminal: once set, no further
    /// delivery occurs for this subscription.
    pub failed: bool,
}

impl SubscriptionStatus {
    pub(crate) fn new(subscriber_id: SubscriberId, position: GlobalPosition) -> Self {
        Self {
            subscriber_id,
            position,
            messages_read: 0,
            last_keep_alive: None,
            caught_up: false,
            failed: false,
        }
    }
}

/// Handle to an active subscription.
///
/// Cancellation is cooperative: it takes effect at the delivery thread's
/// next suspension point and never aborts a handler invocation already in
/// flight. Dropping the handle cancels too.
pub struct SubscriptionHandle {
    subscriber_id: SubscriberId,
    cancel: Sender<()>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl SubscriptionHandle {
    pub(crate) fn new(
        subscriber_id: SubscriberId,
        cancel: Sender<()>,
        thread: std::thread::JoinHandle<()>,
    ) -> Self {
        Self {
            subscriber_id,
            cancel,
            thread: Some(thread),
        }
    }

    pub fn subscriber_id(&self) -> &SubscriberId {
        &self.subscriber_id
    }

    /// Stop future dispatch and release the underlying stream.
    ///
    /// Idempotent: calling it twice is harmless, and on a subscription that
    /// already failed it is a no-op.
    pub fn cancel(&self) {
        let _ = self.cancel.try_send(());
    }

    /// Cancel and block until the delivery thread has torn down.
    pub fn cancel_and_join(mut self) {
        self.cancel();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriptionHandle({})", self.subscriber_id)
    }
}

/// Several independent subscriptions behind a single cancel handle.
///
/// Cancelling the combination cancels every constituent; it does not change
/// their delivery semantics.
#[derive(Debug, Default)]
pub struct CombinedSubscription {
    handles: Vec<SubscriptionHandle>,
}

impl CombinedSubscription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handle: SubscriptionHandle) {
        self.handles.push(handle);
    }

    pub fn cancel(&self) {
        for handle in &self.handles {
            handle.cancel();
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl FromIterator<SubscriptionHandle> for CombinedSubscription {
    fn from_iter<I: IntoIterator<Item = SubscriptionHandle>>(iter: I) -> Self {
        Self {
            handles: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consumer_group_validation() {
        assert!(ConsumerGroup::new(0, 2).is_ok());
        assert!(ConsumerGroup::new(1, 2).is_ok());
        assert!(matches!(
            ConsumerGroup::new(2, 2),
            Err(ProtocolError::InvalidConsumerGroup { member: 2, size: 2 })
        ));
        assert!(ConsumerGroup::new(0, 0).is_err());
    }

    #[test]
    fn test_consumer_group_partitions_ordinals() {
        let member_0 = ConsumerGroup::new(0, 2).unwrap();
        let member_1 = ConsumerGroup::new(1, 2).unwrap();

        let owned_by_0: Vec<u64> = (0..6).filter(|n| member_0.owns(*n)).collect();
        let owned_by_1: Vec<u64> = (0..6).filter(|n| member_1.owns(*n)).collect();

        assert_eq!(owned_by_0, vec![0, 2, 4]);
        assert_eq!(owned_by_1, vec![1, 3, 5]);
    }

    #[test]
    fn test_status_starts_clean() {
        let status = SubscriptionStatus::new(SubscriberId::from("s"), GlobalPosition(7));
        assert_eq!(status.position, GlobalPosition(7));
        assert_eq!(status.messages_read, 0);
        assert!(!status.failed);
        assert!(!status.caught_up);
    }
}
