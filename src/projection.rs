//! Bounded, point-in-time folds over a stream or category.

use crate::error::{ProtocolError, Result};
use crate::selector::StreamName;
use crate::store::{MessageStore, StreamSignal};
use crate::types::{GlobalPosition, Message};

/// Fold the selector's currently-known messages left-to-right into `initial`.
///
/// Messages arrive in ascending `global_position` order (the only ordering
/// key comparable across a merged category). The run ends at the source's
/// end-of-known marker; messages appended after that marker are not
/// incorporated — callers needing continuous aggregation re-invoke this or
/// layer a subscription on top.
///
/// `until` is an inclusive upper bound: messages with
/// `global_position <= until` are folded, and the first message beyond the
/// bound ends the run early.
pub fn project<S, F>(
    store: &dyn MessageStore,
    selector: &StreamName,
    until: Option<GlobalPosition>,
    mut fold: F,
    initial: S,
) -> Result<S>
where
    F: FnMut(S, &Message) -> S,
{
    let stream = store.open_stream(selector, GlobalPosition(0))?;
    let mut state = initial;

    loop {
        match stream.signals().recv() {
            Ok(StreamSignal::Message(message)) => {
                if let Some(bound) = until {
                    if message.global_position > bound {
                        break;
                    }
                }
                state = fold(state, &message);
            }
            Ok(StreamSignal::KeepAlive(_)) => {}
            Ok(StreamSignal::CaughtUp) => break,
            Err(_) => {
                return Err(ProtocolError::Transport(
                    "stream closed before end-of-sequence marker".to_string(),
                ))
            }
        }
    }

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryStore;
    use crate::types::AppendInput;

    fn count(state: u64, _message: &Message) -> u64 {
        state + 1
    }

    #[test]
    fn test_count_fold_over_instance_stream() {
        let store = InMemoryStore::new();
        let stream = StreamName::parse("example").unwrap();
        for _ in 0..3 {
            store
                .append(AppendInput::new(stream.clone(), "SAY_HELLO"))
                .unwrap();
        }

        let total = project(&store, &stream, None, count, 0).unwrap();
        assert_eq!(total, 3);
    }

    #[test]
    fn test_category_fold_visits_instances_in_global_order() {
        let store = InMemoryStore::with_messages(
            ["abc", "def", "ref"]
                .map(|id| AppendInput::event("example", id, "SAY_HELLO").unwrap()),
        )
        .unwrap();

        let selector = StreamName::category("example").unwrap();
        let visited = project(
            &store,
            &selector,
            None,
            |mut order: Vec<u64>, message| {
                order.push(message.global_position.0);
                order
            },
            Vec::new(),
        )
        .unwrap();

        assert_eq!(visited, vec![0, 1, 2]);
    }

    #[test]
    fn test_until_bound_is_inclusive() {
        let store = InMemoryStore::new();
        let stream = StreamName::parse("example").unwrap();
        for _ in 0..5 {
            store
                .append(AppendInput::new(stream.clone(), "SAY_HELLO"))
                .unwrap();
        }

        let total = project(&store, &stream, Some(GlobalPosition(2)), count, 0).unwrap();
        assert_eq!(total, 3);
    }

    #[test]
    fn test_messages_after_snapshot_are_not_incorporated() {
        let store = InMemoryStore::new();
        let stream = StreamName::parse("example").unwrap();
        store
            .append(AppendInput::new(stream.clone(), "SAY_HELLO"))
            .unwrap();

        let total = project(&store, &stream, None, count, 0).unwrap();
        assert_eq!(total, 1);

        store
            .append(AppendInput::new(stream.clone(), "SAY_HELLO"))
            .unwrap();
        let total = project(&store, &stream, None, count, 0).unwrap();
        assert_eq!(total, 2);
    }

    #[test]
    fn test_truncated_stream_is_a_transport_failure() {
        let store = InMemoryStore::new();
        let stream = StreamName::parse("example").unwrap();
        store
            .append(AppendInput::new(stream.clone(), "SAY_HELLO"))
            .unwrap();

        store.suppress_caught_up(true);
        let handle_thread = {
            let store = store.clone();
            std::thread::spawn(move || {
                std::thread::sleep(std::time::Duration::from_millis(50));
                store.drop_live_streams();
            })
        };

        let result = project(&store, &stream, None, count, 0u64);
        handle_thread.join().unwrap();
        assert!(matches!(result, Err(ProtocolError::Transport(_))));
    }
}
