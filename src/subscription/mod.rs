//! Continuous, strictly ordered consumption of a stream or category.
//!
//! One cooperative delivery thread per subscription:
//! - messages are dispatched to the handler one at a time, in the source's
//!   merged `global_position` order
//! - the handler for message *k+1* never starts before the handler for
//!   message *k* has settled
//! - a handler error puts the subscription into its terminal failed state
//! - keep-alive pings are observed out of band and never advance the cursor
//!
//! # Example
//!
//! ```ignore
//! let handle = subscribe(
//!     store,
//!     StreamName::category("person")?,
//!     SubscribeOptions::default().with_subscriber_id("person-projector".into()),
//!     |message| {
//!         println!("{} at {}", message.message_type, message.global_position);
//!         Ok(())
//!     },
//! )?;
//!
//! // Later: idempotent, takes effect at the next suspension point.
//! handle.cancel();
//! ```

mod engine;
mod types;

pub use engine::subscribe;
pub use types::{
    CombinedSubscription, ConsumerGroup, CrashFn, KeepAliveFn, ProgressFn, SubscribeOptions,
    SubscriptionHandle, SubscriptionStatus,
};
