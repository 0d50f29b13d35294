//! # Sequent
//!
//! An ordered-consumption and consistency protocol layer for append-only,
//! globally ordered message stores.
//!
//! ## Core Concepts
//!
//! - **Streams**: Named append-only message sequences, grouped into
//!   categories with an optional command qualifier
//! - **Subscriptions**: Strictly sequential, acknowledged delivery of a
//!   stream or category to one handler
//! - **Projections**: Bounded point-in-time folds over a selector's messages
//! - **Consistency**: An idempotency guard and read-your-writes position
//!   synchronization on top of at-least-once delivery
//!
//! The store itself — storage, durability, and the wire transport — lives
//! behind the [`MessageStore`] trait; the crate ships an in-memory
//! implementation in [`testing`] for handler and projection tests.
//!
//! ## Example
//!
//! ```ignore
//! use sequent::{subscribe, testing::InMemoryStore, StreamName, SubscribeOptions};
//! use std::sync::Arc;
//!
//! let store = Arc::new(InMemoryStore::new());
//!
//! let handle = subscribe(
//!     store.clone(),
//!     StreamName::category("person")?,
//!     SubscribeOptions::default(),
//!     |message| {
//!         println!("{} at {}", message.message_type, message.global_position);
//!         Ok(())
//!     },
//! )?;
//!
//! // A bounded fold over the same category.
//! let count = sequent::project(
//!     store.as_ref(),
//!     &StreamName::category("person")?,
//!     None,
//!     |count: u64, _message| count + 1,
//!     0,
//! )?;
//!
//! handle.cancel();
//! ```

pub mod error;
pub mod idempotency;
pub mod projection;
pub mod selector;
pub mod store;
pub mod subscription;
pub mod sync;
pub mod testing;
pub mod types;

// Re-exports
pub use error::{BoxError, ProtocolError, Result};
pub use idempotency::already_processed;
pub use projection::project;
pub use selector::{Qualifier, StreamName};
pub use store::{AckOutcome, MessageStore, StreamHandle, StreamSignal, SyncWaiter};
pub use subscription::{
    subscribe, CombinedSubscription, ConsumerGroup, SubscribeOptions, SubscriptionHandle,
    SubscriptionStatus,
};
pub use sync::{synchronize, SyncRegistry};
pub use types::{
    AppendInput, AppendReceipt, GlobalPosition, Message, MessageId, Metadata, Position,
    SubscriberId, SyncId, Timestamp, TraceId,
};
