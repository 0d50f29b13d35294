//! The per-subscription delivery loop.

use crate::error::{BoxError, ProtocolError, Result};
use crate::selector::StreamName;
use crate::store::{AckOutcome, MessageStore, StreamHandle, StreamSignal};
use crate::types::{Message, SubscriberId};
use crossbeam_channel::{bounded, select};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::types::{SubscribeOptions, SubscriptionHandle, SubscriptionStatus};

/// Pause between a handler failure and teardown, giving the error
/// acknowledgment a chance to reach the source before the stream closes.
const FAILURE_GRACE: Duration = Duration::from_millis(250);

/// Subscribe a handler to a stream or category.
///
/// Opens the source stream at `options.last_position`, then drives delivery
/// on a dedicated thread: strictly sequential dispatch, cursor advancement
/// and acknowledgment after each settled handler, terminal fail-fast on the
/// first handler error.
///
/// The returned handle cancels cooperatively; an in-flight handler always
/// runs to completion.
pub fn subscribe<H>(
    store: Arc<dyn MessageStore>,
    selector: StreamName,
    options: SubscribeOptions,
    handler: H,
) -> Result<SubscriptionHandle>
where
    H: FnMut(&Message) -> std::result::Result<(), BoxError> + Send + 'static,
{
    let subscriber_id = options
        .subscriber_id
        .clone()
        .unwrap_or_else(SubscriberId::generate);

    let stream = store.open_stream(&selector, options.last_position)?;
    let (cancel_tx, cancel_rx) = bounded::<()>(1);

    let status = SubscriptionStatus::new(subscriber_id.clone(), options.last_position);
    let thread = thread::Builder::new()
        .name(format!("subscription-{subscriber_id}"))
        .spawn(move || {
            Worker {
                store,
                stream,
                cancel: cancel_rx,
                options,
                handler,
                status,
                ordinal: 0,
            }
            .run();
        })?;

    tracing::debug!(subscriber = %subscriber_id, selector = %selector, "subscription started");

    Ok(SubscriptionHandle::new(subscriber_id, cancel_tx, thread))
}

struct Worker<H> {
    store: Arc<dyn MessageStore>,
    stream: StreamHandle,
    cancel: crossbeam_channel::Receiver<()>,
    options: SubscribeOptions,
    handler: H,
    status: SubscriptionStatus,
    /// Ordinal of the next data message within the merged sequence, counted
    /// from `last_position` across all group members' messages.
    ordinal: u64,
}

impl<H> Worker<H>
where
    H: FnMut(&Message) -> std::result::Result<(), BoxError>,
{
    fn run(&mut self) {
        let cancel = self.cancel.clone();
        let signals = self.stream.signals().clone();
        loop {
            select! {
                recv(cancel) -> _ => {
                    // Either an explicit cancel() or the handle was dropped.
                    tracing::debug!(subscriber = %self.status.subscriber_id, "subscription cancelled");
                    break;
                }
                recv(signals) -> signal => {
                    let signal = match signal {
                        Ok(signal) => signal,
                        Err(_) => {
                            self.crash(ProtocolError::Transport(
                                "message stream closed by source".to_string(),
                            ));
                            break;
                        }
                    };
                    if !self.dispatch(signal) {
                        break;
                    }
                }
            }
        }
        // Dropping `self.stream` here releases the source-side producer.
    }

    /// Handle one signal. Returns false once the subscription is terminal.
    fn dispatch(&mut self, signal: StreamSignal) -> bool {
        match signal {
            StreamSignal::KeepAlive(at) => {
                self.status.last_keep_alive = Some(at);
                if let Some(on_keep_alive) = &self.options.on_keep_alive {
                    on_keep_alive(&self.status.subscriber_id, at);
                }
                true
            }
            StreamSignal::CaughtUp => {
                self.status.caught_up = true;
                true
            }
            StreamSignal::Message(message) => {
                let owned = self
                    .options
                    .consumer_group
                    .map_or(true, |group| group.owns(self.ordinal));
                self.ordinal += 1;
                if !owned {
                    return true;
                }
                self.deliver(&message)
            }
        }
    }

    /// Dispatch one message and settle its outcome. Returns false on the
    /// terminal failure path.
    fn deliver(&mut self, message: &Message) -> bool {
        if let Err(source) = (self.handler)(message) {
            self.status.failed = true;
            let error = ProtocolError::Handler {
                stream_name: message.stream_name.to_string(),
                global_position: message.global_position,
                source,
            };
            tracing::error!(
                subscriber = %self.status.subscriber_id,
                %error,
                "handler failed, halting delivery",
            );
            let _ = self
                .store
                .acknowledge(&self.status.subscriber_id, AckOutcome::Error);
            if let Some(on_crash) = &self.options.on_crash {
                on_crash(&error);
            }
            thread::sleep(FAILURE_GRACE);
            return false;
        }

        self.status.position = message.global_position;
        self.status.messages_read += 1;

        if self
            .store
            .acknowledge(&self.status.subscriber_id, AckOutcome::Ok)
            .is_err()
        {
            tracing::warn!(
                subscriber = %self.status.subscriber_id,
                "acknowledgment did not reach the source",
            );
        }
        if let Some(on_progress) = &self.options.on_progress {
            on_progress(&self.status);
        }
        if let Some(delay) = self.options.tick_delay {
            thread::sleep(delay);
        }
        true
    }

    fn crash(&mut self, error: ProtocolError) {
        tracing::warn!(
            subscriber = %self.status.subscriber_id,
            %error,
            "subscription terminated",
        );
        if let Some(on_crash) = &self.options.on_crash {
            on_crash(&error);
        }
    }
}
