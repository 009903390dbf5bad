//! Inbound signals for a running saga instance.

use domain::{CancelRequest, LineItem, OrderId, PaymentApproval, Sku};
use tokio::sync::mpsc;

use crate::error::{Result, SagaError};

/// An external event delivered into a running saga.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderSignal {
    ApprovePayment(PaymentApproval),
    Cancel(CancelRequest),
    AddLineItem(LineItem),
}

impl OrderSignal {
    pub fn name(&self) -> &'static str {
        match self {
            OrderSignal::ApprovePayment(_) => "approve-payment",
            OrderSignal::Cancel(_) => "cancel-order",
            OrderSignal::AddLineItem(_) => "add-line-item",
        }
    }
}

/// Receiving half of an instance's signal queue.
pub type SignalReceiver = mpsc::UnboundedReceiver<OrderSignal>;

/// Creates the ordered signal queue for one saga instance.
///
/// All signal kinds share the queue, so they are consumed in the order they
/// were sent.
pub fn signal_channel(order_id: OrderId) -> (SignalSender, SignalReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SignalSender { order_id, tx }, rx)
}

/// Cloneable handle for sending signals to one saga instance.
#[derive(Debug, Clone)]
pub struct SignalSender {
    order_id: OrderId,
    tx: mpsc::UnboundedSender<OrderSignal>,
}

impl SignalSender {
    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    /// Sends a signal. Fails once the instance has finished.
    pub fn send(&self, signal: OrderSignal) -> Result<()> {
        tracing::debug!(order_id = %self.order_id, signal = signal.name(), "signal sent");
        self.tx
            .send(signal)
            .map_err(|_| SagaError::InstanceClosed(self.order_id.clone()))
    }

    pub fn approve_payment(&self, approved_by: impl Into<String>) -> Result<()> {
        self.send(OrderSignal::ApprovePayment(PaymentApproval::new(approved_by)))
    }

    pub fn cancel_order(&self, reason: impl Into<String>) -> Result<()> {
        self.send(OrderSignal::Cancel(CancelRequest::new(reason)))
    }

    /// Validates and sends a new line item.
    pub fn add_line_item(&self, sku: impl Into<Sku>, quantity: u32) -> Result<()> {
        let item = LineItem::new(sku, quantity)?;
        self.send(OrderSignal::AddLineItem(item))
    }

    /// Returns true once the instance stopped accepting signals.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
