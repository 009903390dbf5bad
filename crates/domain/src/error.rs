//! Domain error types.

use event_store::EventStoreError;
use thiserror::Error;

use crate::order::{OrderError, OrderId};

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// An order invariant was violated.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// No history exists for the order.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
