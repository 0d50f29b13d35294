//! Error types for the consumption protocol.

use crate::types::GlobalPosition;
use thiserror::Error;

/// Application error escaping a subscription handler.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for protocol operations.
///
/// Absence of a message (`read_last` on an empty stream) is `Option::None`,
/// not an error. Transport and handler failures terminate the owning
/// subscription only; they never crash unrelated subscriptions.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The underlying stream or signal channel broke.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Application logic raised while processing a message. Terminal for
    /// the owning subscription.
    #[error("handler failure on {stream_name} at global position {global_position}: {source}")]
    Handler {
        stream_name: String,
        global_position: GlobalPosition,
        #[source]
        source: BoxError,
    },

    #[error("invalid stream name: {0}")]
    InvalidStreamName(String),

    #[error("consumer group member {member} out of range for size {size}")]
    InvalidConsumerGroup { member: u32, size: u32 },

    /// Optimistic concurrency failure: the stream's version (its message
    /// count) did not match the expected one.
    #[error("expected version {expected} but stream {stream_name} is at {actual}")]
    VersionConflict {
        stream_name: String,
        expected: u64,
        actual: u64,
    },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(e: serde_json::Error) -> Self {
        ProtocolError::Serialization(e.to_string())
    }
}

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_handler_error_preserves_source() {
        let source: BoxError = "ledger out of balance".into();
        let err = ProtocolError::Handler {
            stream_name: "account-abc".to_string(),
            global_position: GlobalPosition(41),
            source,
        };

        assert!(err.to_string().contains("account-abc"));
        assert!(err.to_string().contains("41"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_version_conflict_display() {
        let err = ProtocolError::VersionConflict {
            stream_name: "account-abc".to_string(),
            expected: 3,
            actual: 5,
        };
        assert!(err.to_string().contains("expected version 3"));
    }
}
