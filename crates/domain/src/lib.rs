//! Domain layer for the order saga.
//!
//! This crate provides:
//! - the `Aggregate` / `DomainEvent` traits for event-sourced state
//! - the order saga's state (`OrderState`), its lifecycle (`Stage`) and the
//!   events that move it forward
//! - `OrderRepository`, which persists those events and checkpoints the state

pub mod aggregate;
pub mod error;
pub mod order;

pub use aggregate::{Aggregate, DomainEvent, SnapshotCapable};
pub use error::DomainError;
pub use order::{
    CancelRequest, CompensationFailure, LineItem, OrderEnrichment, OrderError, OrderEvent,
    OrderId, OrderRepository, OrderState, PaymentApproval, Sku, Stage, StepFailure,
};
