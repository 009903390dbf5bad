//! Saga error types.

use std::fmt;

use domain::{DomainError, OrderError, OrderId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a failed external operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Network, timeout or resource exhaustion. Retried per policy.
    Transient,
    /// Business rejection such as a declined card. Never retried.
    Permanent,
    /// Malformed input detected before any side effect. Never retried.
    Validation,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transient => "transient",
            ErrorKind::Permanent => "permanent",
            ErrorKind::Validation => "validation",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure returned by an external operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct OperationError {
    pub kind: ErrorKind,
    pub message: String,
}

impl OperationError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permanent, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }
}

/// Errors that can occur during saga operations.
#[derive(Debug, Error)]
pub enum SagaError {
    /// An external operation failed after the invoker gave up on it.
    #[error("{step} failed: {source}")]
    StepFailed {
        step: &'static str,
        #[source]
        source: OperationError,
    },

    /// The inventory snapshot reported the cart cannot be fulfilled.
    #[error("Insufficient inventory for order {0}")]
    InsufficientInventory(OrderId),

    /// Order input violated an invariant.
    #[error("Invalid order: {0}")]
    InvalidOrder(#[from] OrderError),

    /// A saga already exists for this order.
    #[error("Order {0} already has a saga")]
    AlreadyStarted(OrderId),

    /// No saga history exists for this order.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The saga instance has finished and no longer accepts signals.
    #[error("Saga instance for order {0} is closed")]
    InstanceClosed(OrderId),

    /// The saga task ended without producing a result.
    #[error("Saga task for order {order_id} aborted: {reason}")]
    Aborted { order_id: OrderId, reason: String },

    /// Checkpoint persistence failed.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl SagaError {
    pub fn step_failed(step: &'static str, source: OperationError) -> Self {
        SagaError::StepFailed { step, source }
    }

    /// Classifies the error for callers and observability.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SagaError::StepFailed { source, .. } => source.kind,
            SagaError::InsufficientInventory(_) | SagaError::InvalidOrder(_) => {
                ErrorKind::Validation
            }
            SagaError::Aborted { .. } => ErrorKind::Transient,
            SagaError::AlreadyStarted(_)
            | SagaError::OrderNotFound(_)
            | SagaError::InstanceClosed(_)
            | SagaError::Domain(_) => ErrorKind::Permanent,
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
