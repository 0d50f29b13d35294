//! In-memory message store and assertion helpers.
//!
//! Consumers of this crate test their handlers and projections against the
//! same protocol surface they run in production, so the in-memory store is
//! part of the public API rather than test-only scaffolding.

use crate::error::{ProtocolError, Result};
use crate::selector::StreamName;
use crate::store::{AckOutcome, MessageStore, StreamHandle, StreamSignal, SyncWaiter};
use crate::sync::SyncRegistry;
use crate::types::{
    AppendInput, AppendReceipt, GlobalPosition, Message, MessageId, Position, SubscriberId, SyncId,
    Timestamp,
};
use crossbeam_channel::{unbounded, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One recorded acknowledgment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AckRecord {
    pub subscriber_id: SubscriberId,
    pub outcome: AckOutcome,
}

/// One recorded synchronization request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncRequest {
    pub subscriber_id: SubscriberId,
    pub position: GlobalPosition,
    pub sync_id: SyncId,
}

struct LiveStream {
    selector: StreamName,
    sender: Sender<StreamSignal>,
}

#[derive(Default)]
struct Inner {
    /// Concrete streams in append order, keyed by canonical name.
    streams: HashMap<String, Vec<Message>>,
    next_global: u64,
    live: Vec<LiveStream>,
    suppress_caught_up: bool,
}

/// In-memory [`MessageStore`] with live delivery.
///
/// Appends assign gap-free per-stream positions and a strictly increasing
/// store-wide global position, then broadcast to every open stream whose
/// selector matches. Acknowledgments and synchronization requests are
/// recorded for inspection.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Inner>>,
    acks: Arc<Mutex<Vec<AckRecord>>>,
    sync_requests: Arc<Mutex<Vec<SyncRequest>>>,
    syncs: Arc<SyncRegistry>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated through [`append`](MessageStore::append).
    pub fn with_messages(inputs: impl IntoIterator<Item = AppendInput>) -> Result<Self> {
        let store = Self::new();
        for input in inputs {
            store.append(input)?;
        }
        Ok(store)
    }

    /// All messages of the concrete stream, in position order.
    pub fn stream_messages(&self, stream: &StreamName) -> Vec<Message> {
        self.inner
            .lock()
            .streams
            .get(&stream.to_string())
            .cloned()
            .unwrap_or_default()
    }

    /// The selector's currently-known messages in `global_position` order.
    pub fn selector_messages(&self, selector: &StreamName) -> Vec<Message> {
        let inner = self.inner.lock();
        let mut merged: Vec<Message> = inner
            .streams
            .values()
            .flatten()
            .filter(|message| selector.matches(&message.stream_name))
            .cloned()
            .collect();
        merged.sort_by_key(|message| message.global_position);
        merged
    }

    /// Recorded acknowledgments, oldest first.
    pub fn acks(&self) -> Vec<AckRecord> {
        self.acks.lock().clone()
    }

    /// Recorded synchronization requests, oldest first.
    pub fn sync_requests(&self) -> Vec<SyncRequest> {
        self.sync_requests.lock().clone()
    }

    /// Broadcast a liveness ping to every open stream.
    pub fn ping(&self) {
        let at = Timestamp::now();
        self.inner
            .lock()
            .live
            .retain(|live| live.sender.send(StreamSignal::KeepAlive(at)).is_ok());
    }

    /// Acknowledge a pending synchronization request.
    pub fn complete_sync(&self, subscriber_id: &SubscriberId, sync_id: &SyncId) -> bool {
        self.syncs.acknowledge(subscriber_id, sync_id)
    }

    /// Drop every open stream, as a broken transport would.
    pub fn drop_live_streams(&self) {
        self.inner.lock().live.clear();
    }

    /// When set, `open_stream` omits the end-of-known marker. Lets tests
    /// exercise truncated-stream handling.
    pub fn suppress_caught_up(&self, suppress: bool) {
        self.inner.lock().suppress_caught_up = suppress;
    }
}

impl MessageStore for InMemoryStore {
    fn append(&self, input: AppendInput) -> Result<AppendReceipt> {
        let mut inner = self.inner.lock();

        let key = input.stream_name.to_string();
        let current_version = inner.streams.get(&key).map_or(0, Vec::len) as u64;
        if let Some(expected) = input.expected_version {
            if expected != current_version {
                return Err(ProtocolError::VersionConflict {
                    stream_name: key,
                    expected,
                    actual: current_version,
                });
            }
        }

        let global_position = GlobalPosition(inner.next_global);
        inner.next_global += 1;

        let message = Message {
            id: MessageId::generate(),
            stream_name: input.stream_name.clone(),
            message_type: input.message_type,
            position: Position(current_version),
            global_position,
            data: input.data,
            metadata: input.metadata,
            time: Timestamp::now(),
        };

        let receipt = AppendReceipt {
            stream_name: message.stream_name.clone(),
            position: message.position,
            global_position,
            time: message.time,
        };

        inner.streams.entry(key).or_default().push(message.clone());

        // Deliver to open streams while still holding the lock, so live
        // delivery preserves append order.
        inner.live.retain(|live| {
            if live.selector.matches(&message.stream_name) {
                live.sender
                    .send(StreamSignal::Message(message.clone()))
                    .is_ok()
            } else {
                true
            }
        });

        Ok(receipt)
    }

    fn read_last(&self, stream: &StreamName) -> Result<Option<Message>> {
        Ok(self
            .inner
            .lock()
            .streams
            .get(&stream.to_string())
            .and_then(|messages| messages.last().cloned()))
    }

    fn read_at(&self, stream: &StreamName, position: Position) -> Result<Option<Message>> {
        Ok(self
            .inner
            .lock()
            .streams
            .get(&stream.to_string())
            .and_then(|messages| messages.get(position.0 as usize).cloned()))
    }

    fn open_stream(&self, selector: &StreamName, from: GlobalPosition) -> Result<StreamHandle> {
        let mut inner = self.inner.lock();

        let mut known: Vec<Message> = inner
            .streams
            .values()
            .flatten()
            .filter(|message| {
                selector.matches(&message.stream_name) && message.global_position >= from
            })
            .cloned()
            .collect();
        known.sort_by_key(|message| message.global_position);

        let (sender, receiver) = unbounded();
        for message in known {
            let _ = sender.send(StreamSignal::Message(message));
        }
        if !inner.suppress_caught_up {
            let _ = sender.send(StreamSignal::CaughtUp);
        }

        inner.live.push(LiveStream {
            selector: selector.clone(),
            sender,
        });

        Ok(StreamHandle::new(receiver))
    }

    fn acknowledge(&self, subscriber_id: &SubscriberId, outcome: AckOutcome) -> Result<()> {
        self.acks.lock().push(AckRecord {
            subscriber_id: subscriber_id.clone(),
            outcome,
        });
        Ok(())
    }

    fn begin_synchronize(
        &self,
        subscriber_id: &SubscriberId,
        position: GlobalPosition,
        sync_id: &SyncId,
    ) -> Result<SyncWaiter> {
        self.sync_requests.lock().push(SyncRequest {
            subscriber_id: subscriber_id.clone(),
            position,
            sync_id: sync_id.clone(),
        });
        Ok(self.syncs.register(subscriber_id, sync_id))
    }
}

/// Poll `condition` until it holds or `timeout` passes.
///
/// Subscriptions deliver on their own threads, so assertions about observed
/// side effects need to wait for the delivery loop to catch up.
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}
