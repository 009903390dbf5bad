//! Payment service trait and in-memory implementation.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::{LineItem, OrderId};

use super::{Fault, read, trip, write};
use crate::error::OperationError;

/// Result of a successful payment charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    /// The payment ID assigned by the payment service.
    pub payment_id: String,
    pub order_id: OrderId,
    /// The cart that was charged.
    pub items: Vec<LineItem>,
}

/// Trait for payment processing operations.
#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Charges the customer for the given cart.
    async fn process_payment(
        &self,
        order_id: &OrderId,
        items: &[LineItem],
    ) -> Result<PaymentReceipt, OperationError>;

    /// Refunds the order's payment. Refunding twice has no further effect.
    async fn refund_payment(&self, order_id: &OrderId) -> Result<(), OperationError>;
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    payments: HashMap<OrderId, PaymentReceipt>,
    refunded: HashSet<String>,
    next_id: u32,
    charge_calls: u32,
    refund_calls: u32,
    charge_fault: Option<Fault>,
    refund_fault: Option<Fault>,
}

/// In-memory payment service for testing.
///
/// Charges are keyed by order, so a repeated charge for an order that is
/// already paid returns the existing receipt.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentService {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentService {
    /// Creates a new in-memory payment service.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_charge(&self, fault: Fault) {
        write(&self.state).charge_fault = Some(fault);
    }

    pub fn fail_refund(&self, fault: Fault) {
        write(&self.state).refund_fault = Some(fault);
    }

    /// Returns the number of payments that are charged and not refunded.
    pub fn active_payment_count(&self) -> usize {
        let state = read(&self.state);
        state
            .payments
            .values()
            .filter(|p| !state.refunded.contains(&p.payment_id))
            .count()
    }

    /// Returns the receipt for the order's payment, refunded or not.
    pub fn receipt(&self, order_id: &OrderId) -> Option<PaymentReceipt> {
        read(&self.state).payments.get(order_id).cloned()
    }

    /// Returns true if the order's payment was refunded.
    pub fn is_refunded(&self, order_id: &OrderId) -> bool {
        let state = read(&self.state);
        state
            .payments
            .get(order_id)
            .is_some_and(|p| state.refunded.contains(&p.payment_id))
    }

    /// Returns how many times `process_payment` was invoked.
    pub fn charge_calls(&self) -> u32 {
        read(&self.state).charge_calls
    }

    /// Returns how many times `refund_payment` was invoked.
    pub fn refund_calls(&self) -> u32 {
        read(&self.state).refund_calls
    }
}

#[async_trait]
impl PaymentService for InMemoryPaymentService {
    async fn process_payment(
        &self,
        order_id: &OrderId,
        items: &[LineItem],
    ) -> Result<PaymentReceipt, OperationError> {
        let mut state = write(&self.state);
        state.charge_calls += 1;
        trip(&mut state.charge_fault)?;

        if let Some(existing) = state.payments.get(order_id)
            && !state.refunded.contains(&existing.payment_id)
        {
            return Ok(existing.clone());
        }

        state.next_id += 1;
        let receipt = PaymentReceipt {
            payment_id: format!("PAY-{:04}", state.next_id),
            order_id: order_id.clone(),
            items: items.to_vec(),
        };
        state.payments.insert(order_id.clone(), receipt.clone());
        tracing::debug!(%order_id, payment_id = %receipt.payment_id, "payment charged");

        Ok(receipt)
    }

    async fn refund_payment(&self, order_id: &OrderId) -> Result<(), OperationError> {
        let mut state = write(&self.state);
        state.refund_calls += 1;
        trip(&mut state.refund_fault)?;

        if let Some(payment_id) = state.payments.get(order_id).map(|p| p.payment_id.clone()) {
            state.refunded.insert(payment_id);
        }
        Ok(())
    }
}
