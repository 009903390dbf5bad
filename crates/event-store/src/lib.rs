//! History and checkpoint storage for saga instances.
//!
//! Every order saga appends its state changes as events to a stream keyed by
//! the order ID, and periodically saves a [`Snapshot`] of the rebuilt state so
//! an interrupted instance can be resumed without replaying the whole stream.

pub mod error;
pub mod event;
pub mod memory;
pub mod snapshot;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use snapshot::Snapshot;
pub use store::{AppendOptions, EventStore, EventStoreExt};
