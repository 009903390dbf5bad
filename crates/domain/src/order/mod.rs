//! Order saga state, lifecycle and events.

mod aggregate;
mod events;
mod repository;
mod stage;
mod value_objects;

pub use aggregate::{CompensationFailure, OrderState, StepFailure};
pub use events::{
    CancellationData, CompensationData, DeadlineData, OrderEvent, SagaCancelledData,
    SagaCompletedData, SagaFailedData, SagaStartedData, StageEnteredData, StepCompletedData,
    StepFailedData, VersionMarkerData,
};
pub use repository::OrderRepository;
pub use stage::Stage;
pub use value_objects::{CancelRequest, LineItem, OrderEnrichment, PaymentApproval, Sku};

use thiserror::Error;

/// Orders are identified by the caller-assigned aggregate ID.
pub type OrderId = common::AggregateId;

/// Errors raised when order input violates an invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// Line item quantity must be positive.
    #[error("Invalid quantity for {sku}: {quantity} (must be greater than 0)")]
    InvalidQuantity { sku: String, quantity: u32 },

    /// Line item SKU must not be blank.
    #[error("SKU must not be empty")]
    EmptySku,

    /// Order ID must not be blank.
    #[error("Order ID must not be empty")]
    EmptyOrderId,
}
