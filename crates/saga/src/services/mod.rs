//! External service traits and in-memory implementations for saga steps.
//!
//! Each trait method is one external operation. The in-memory
//! implementations count invocations, make their reversals idempotent and
//! accept injected [`Fault`]s for testing.

pub mod customer;
pub mod inventory;
pub mod notification;
pub mod orders;
pub mod payment;

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub use customer::{CustomerService, InMemoryCustomerService};
pub use inventory::{InMemoryInventoryService, InventoryService};
pub use notification::{InMemoryNotificationService, Notification, NotificationService};
pub use orders::{InMemoryOrderStatusService, OrderStatusService};
pub use payment::{InMemoryPaymentService, PaymentReceipt, PaymentService};

use crate::error::OperationError;

/// A failure injected into an in-memory operation.
#[derive(Debug, Clone)]
pub struct Fault {
    error: OperationError,
    remaining: Option<u32>,
}

impl Fault {
    /// Fails every call.
    pub fn always(error: OperationError) -> Self {
        Self {
            error,
            remaining: None,
        }
    }

    /// Fails the next `count` calls (at least one), then succeeds.
    pub fn times(count: u32, error: OperationError) -> Self {
        Self {
            error,
            remaining: Some(count.max(1)),
        }
    }
}

/// Returns the injected error for this call, consuming one use of the fault.
fn trip(slot: &mut Option<Fault>) -> Result<(), OperationError> {
    let Some(fault) = slot else {
        return Ok(());
    };
    let error = fault.error.clone();
    let exhausted = match &mut fault.remaining {
        None => return Err(error),
        Some(remaining) => {
            *remaining = remaining.saturating_sub(1);
            *remaining == 0
        }
    };
    if exhausted {
        *slot = None;
    }
    Err(error)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
