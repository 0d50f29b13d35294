//! The store abstraction consumed by the protocol engines.
//!
//! The append-only log itself, its durability, and the wire transport live
//! behind [`MessageStore`]. The core only ever reads the log; the one
//! mutation it performs is advancing its own per-subscription cursors.

use crate::error::{ProtocolError, Result};
use crate::selector::StreamName;
use crate::types::{
    AppendInput, AppendReceipt, GlobalPosition, Message, Position, SubscriberId, SyncId, Timestamp,
};
use crossbeam_channel::Receiver;
use std::time::Duration;

/// One signal on an open stream.
#[derive(Clone, Debug)]
pub enum StreamSignal {
    /// The next data message in ascending `global_position` order.
    Message(Message),

    /// Out-of-band liveness ping. Never advances the cursor and never
    /// counts toward messages read.
    KeepAlive(Timestamp),

    /// All messages known to the source at open time have been delivered.
    /// A projection run terminates here; a subscription keeps consuming
    /// live messages that follow.
    CaughtUp,
}

/// Handle to an open stream of signals.
///
/// Dropping the handle releases the source-side producer; the source
/// observes the disconnect on its next send.
pub struct StreamHandle {
    signals: Receiver<StreamSignal>,
}

impl StreamHandle {
    pub fn new(signals: Receiver<StreamSignal>) -> Self {
        Self { signals }
    }

    /// The underlying signal channel.
    pub fn signals(&self) -> &Receiver<StreamSignal> {
        &self.signals
    }
}

/// Outcome reported back to the source after a handler settles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AckOutcome {
    /// Handler settled successfully; the source may release the next
    /// message where the transport paces delivery.
    Ok,
    /// Handler failed; the subscription is entering its terminal state.
    Error,
}

/// Pending position-synchronization acknowledgment.
///
/// No timeout is enforced by [`wait`](SyncWaiter::wait); callers impose
/// their own deadline via [`wait_timeout`](SyncWaiter::wait_timeout).
pub struct SyncWaiter {
    acknowledged: Receiver<()>,
}

impl SyncWaiter {
    pub fn new(acknowledged: Receiver<()>) -> Self {
        Self { acknowledged }
    }

    /// Block until the source acknowledges.
    pub fn wait(&self) -> Result<()> {
        self.acknowledged
            .recv()
            .map_err(|_| ProtocolError::Transport("synchronization channel closed".to_string()))
    }

    /// Block until acknowledged or the deadline passes. `Ok(false)` means
    /// the deadline passed with no acknowledgment.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<bool> {
        match self.acknowledged.recv_timeout(timeout) {
            Ok(()) => Ok(true),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => Ok(false),
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => Err(
                ProtocolError::Transport("synchronization channel closed".to_string()),
            ),
        }
    }
}

/// The primitives an external store/transport exposes to this core.
pub trait MessageStore: Send + Sync {
    /// Append a message, assigning its positions and time.
    fn append(&self, input: AppendInput) -> Result<AppendReceipt>;

    /// Last message of a concrete stream, if any.
    fn read_last(&self, stream: &StreamName) -> Result<Option<Message>>;

    /// Message of a concrete stream at an exact per-stream position, if any.
    fn read_at(&self, stream: &StreamName, position: Position) -> Result<Option<Message>>;

    /// Open an ascending signal sequence for `selector` beginning at the
    /// inclusive `from` cursor: the currently-known messages merged and
    /// sorted by `global_position`, a [`StreamSignal::CaughtUp`] marker,
    /// then live messages as they are appended.
    fn open_stream(&self, selector: &StreamName, from: GlobalPosition) -> Result<StreamHandle>;

    /// Best-effort acknowledgment back to the source.
    fn acknowledge(&self, subscriber_id: &SubscriberId, outcome: AckOutcome) -> Result<()>;

    /// Ask the source to acknowledge once the named subscriber has
    /// observably advanced at least to `position`.
    fn begin_synchronize(
        &self,
        subscriber_id: &SubscriberId,
        position: GlobalPosition,
        sync_id: &SyncId,
    ) -> Result<SyncWaiter>;
}
