//! Idempotency guard for non-idempotent side effects under at-least-once
//! command delivery.

use crate::error::Result;
use crate::projection::project;
use crate::selector::StreamName;
use crate::store::MessageStore;
use crate::types::{GlobalPosition, TraceId};

/// Has the command identified by `trace_id` already produced an effect on
/// `target_stream`?
///
/// A cheap last-message check runs first: an empty target stream, or one
/// whose latest write predates the command's origin point in the log, cannot
/// contain the command's effect. Only once the stream has caught up to the
/// origin is the full trace scan performed.
///
/// This check is O(stream length) and is a safety net, not a hot path.
pub fn already_processed(
    store: &dyn MessageStore,
    target_stream: &StreamName,
    origin_global_position: GlobalPosition,
    trace_id: &TraceId,
) -> Result<bool> {
    let last = match store.read_last(target_stream)? {
        Some(message) => message,
        None => return Ok(false),
    };

    if !reached_origin(last.global_position, origin_global_position) {
        return Ok(false);
    }

    project(
        store,
        target_stream,
        None,
        |found, message| found || message.metadata.trace_id == *trace_id,
        false,
    )
}

/// Policy: is a trace scan of the target stream warranted?
///
/// An effect is always appended after the command that caused it, so a
/// target stream whose last write sits before the command's origin position
/// cannot yet contain that command's effect. The comparison direction is
/// isolated here so a change of intent touches exactly one place.
fn reached_origin(last: GlobalPosition, origin: GlobalPosition) -> bool {
    last >= origin
}
