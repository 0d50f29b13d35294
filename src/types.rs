//! Core types for the consumption protocol.

use crate::selector::StreamName;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Unique identifier for a message (assigned by the store at append time).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl MessageId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        MessageId(Uuid::new_v4())
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sequence number of a message within its own stream.
///
/// For a fixed stream, positions form a gap-free sequence starting at 0.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Position(pub u64);

impl Position {
    pub fn next(self) -> Self {
        Position(self.0 + 1)
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pos({})", self.0)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store-wide sequence number, unique and strictly increasing with append
/// order across all streams. The only ordering key that is comparable
/// across streams.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct GlobalPosition(pub u64);

impl GlobalPosition {
    pub fn next(self) -> Self {
        GlobalPosition(self.0 + 1)
    }
}

impl fmt::Debug for GlobalPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Global({})", self.0)
    }
}

impl fmt::Display for GlobalPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one logical consumer.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriberId(pub String);

impl SubscriberId {
    pub fn new(id: impl Into<String>) -> Self {
        SubscriberId(id.into())
    }

    /// Generate a fresh unique subscriber id.
    pub fn generate() -> Self {
        SubscriberId(Uuid::new_v4().to_string())
    }
}

impl fmt::Debug for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriberId({})", self.0)
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SubscriberId {
    fn from(s: &str) -> Self {
        SubscriberId(s.to_string())
    }
}

/// Correlation identifier carried by every message's metadata.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TraceId(pub String);

impl TraceId {
    pub fn new(id: impl Into<String>) -> Self {
        TraceId(id.into())
    }

    /// Generate a fresh random trace id.
    pub fn generate() -> Self {
        TraceId(Uuid::new_v4().to_string())
    }
}

impl fmt::Debug for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TraceId({})", self.0)
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TraceId {
    fn from(s: &str) -> Self {
        TraceId(s.to_string())
    }
}

/// Correlation identifier for one position-synchronization request.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncId(pub String);

impl SyncId {
    pub fn new(id: impl Into<String>) -> Self {
        SyncId(id.into())
    }
}

impl fmt::Debug for SyncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SyncId({})", self.0)
    }
}

impl fmt::Display for SyncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SyncId {
    fn from(s: &str) -> Self {
        SyncId(s.to_string())
    }
}

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards");
        Timestamp(duration.as_micros() as i64)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Structured message metadata.
///
/// `trace_id` is mandatory and correlates a message with the command that
/// caused it. Unknown fields survive a decode/encode round trip in `extra`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(rename = "traceId")]
    pub trace_id: TraceId,

    #[serde(rename = "actorId", default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Metadata {
    pub fn new(trace_id: TraceId) -> Self {
        Self {
            trace_id,
            actor_id: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Metadata with a freshly generated trace id.
    pub fn generate() -> Self {
        Self::new(TraceId::generate())
    }

    pub fn with_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }
}

/// A single message in the store.
///
/// Created exactly once at append time by the store; never mutated.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier (assigned by store).
    pub id: MessageId,

    /// Concrete stream this message was appended to.
    pub stream_name: StreamName,

    /// Application-defined type discriminator.
    #[serde(rename = "type")]
    pub message_type: String,

    /// Sequence number within `stream_name`.
    pub position: Position,

    /// Store-wide sequence number.
    pub global_position: GlobalPosition,

    /// Opaque application payload.
    pub data: Value,

    /// Structured metadata.
    pub metadata: Metadata,

    /// When the message was appended.
    pub time: Timestamp,
}

impl Message {
    /// Decode the payload into a concrete type.
    pub fn decode_data<T: serde::de::DeserializeOwned>(&self) -> crate::error::Result<T> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

/// Input for appending a message (before positions are assigned).
#[derive(Clone, Debug)]
pub struct AppendInput {
    pub stream_name: StreamName,
    pub message_type: String,
    pub data: Value,
    pub metadata: Metadata,
    /// Optimistic concurrency check: the stream's version (its current
    /// message count) must equal this for the append to be accepted.
    pub expected_version: Option<u64>,
}

impl AppendInput {
    pub fn new(stream_name: StreamName, message_type: impl Into<String>) -> Self {
        Self {
            stream_name,
            message_type: message_type.into(),
            data: Value::Null,
            metadata: Metadata::generate(),
            expected_version: None,
        }
    }

    /// An event message for `category-id`.
    pub fn event(
        category: impl Into<String>,
        id: impl Into<String>,
        event_type: impl Into<String>,
    ) -> crate::error::Result<Self> {
        let stream = StreamName::instance(category, id)?;
        Ok(Self::new(stream, event_type))
    }

    /// A command message for `category:command-id`.
    pub fn command(
        category: impl Into<String>,
        id: impl Into<String>,
        command_type: impl Into<String>,
    ) -> crate::error::Result<Self> {
        let stream = StreamName::instance(category, id)?.into_commands();
        Ok(Self::new(stream, command_type))
    }

    pub fn with_data(mut self, data: &impl Serialize) -> crate::error::Result<Self> {
        self.data = serde_json::to_value(data)?;
        Ok(self)
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_expected_version(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// Result of a successful append.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppendReceipt {
    pub stream_name: StreamName,
    pub position: Position,
    pub global_position: GlobalPosition,
    pub time: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_roundtrip_preserves_unknown_fields() {
        let raw = serde_json::json!({
            "traceId": "trace-1",
            "actorId": "actor-9",
            "origin": "billing"
        });

        let metadata: Metadata = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(metadata.trace_id, TraceId::from("trace-1"));
        assert_eq!(metadata.actor_id.as_deref(), Some("actor-9"));
        assert_eq!(metadata.extra["origin"], "billing");

        let back = serde_json::to_value(&metadata).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn test_append_input_builders() {
        #[derive(Serialize)]
        struct Payload {
            amount: u32,
        }

        let input = AppendInput::command("billing", "abc", "CHARGE")
            .unwrap()
            .with_data(&Payload { amount: 3 })
            .unwrap()
            .with_expected_version(4);

        assert_eq!(input.stream_name.to_string(), "billing:command-abc");
        assert_eq!(input.message_type, "CHARGE");
        assert_eq!(input.data["amount"], 3);
        assert_eq!(input.expected_version, Some(4));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(MessageId::generate(), MessageId::generate());
        assert_ne!(SubscriberId::generate(), SubscriberId::generate());
        assert_ne!(TraceId::generate(), TraceId::generate());
    }

    #[test]
    fn test_position_ordering() {
        assert!(GlobalPosition(3) < GlobalPosition(7));
        assert_eq!(Position(2).next(), Position(3));
        assert_eq!(GlobalPosition::default(), GlobalPosition(0));
    }
}
