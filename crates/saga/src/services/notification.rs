//! Customer notifications.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::OrderId;

use super::{Fault, read, trip, write};
use crate::error::OperationError;

/// Trait for sending customer emails.
#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn send_order_confirmation(
        &self,
        order_id: &OrderId,
        email: &str,
    ) -> Result<(), OperationError>;

    async fn send_cancellation_email(
        &self,
        order_id: &OrderId,
        reason: &str,
    ) -> Result<(), OperationError>;
}

/// A notification that was delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Confirmation { order_id: OrderId, email: String },
    Cancellation { order_id: OrderId, reason: String },
}

#[derive(Debug, Default)]
struct InMemoryNotificationState {
    sent: Vec<Notification>,
    confirmation_calls: u32,
    cancellation_calls: u32,
    confirmation_fault: Option<Fault>,
    cancellation_fault: Option<Fault>,
}

/// In-memory notification service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationService {
    state: Arc<RwLock<InMemoryNotificationState>>,
}

impl InMemoryNotificationService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_confirmation(&self, fault: Fault) {
        write(&self.state).confirmation_fault = Some(fault);
    }

    pub fn fail_cancellation(&self, fault: Fault) {
        write(&self.state).cancellation_fault = Some(fault);
    }

    /// Returns every delivered notification in send order.
    pub fn sent(&self) -> Vec<Notification> {
        read(&self.state).sent.clone()
    }

    pub fn confirmation_calls(&self) -> u32 {
        read(&self.state).confirmation_calls
    }

    pub fn cancellation_calls(&self) -> u32 {
        read(&self.state).cancellation_calls
    }
}

#[async_trait]
impl NotificationService for InMemoryNotificationService {
    async fn send_order_confirmation(
        &self,
        order_id: &OrderId,
        email: &str,
    ) -> Result<(), OperationError> {
        let mut state = write(&self.state);
        state.confirmation_calls += 1;
        trip(&mut state.confirmation_fault)?;

        state.sent.push(Notification::Confirmation {
            order_id: order_id.clone(),
            email: email.to_string(),
        });
        Ok(())
    }

    async fn send_cancellation_email(
        &self,
        order_id: &OrderId,
        reason: &str,
    ) -> Result<(), OperationError> {
        let mut state = write(&self.state);
        state.cancellation_calls += 1;
        trip(&mut state.cancellation_fault)?;

        state.sent.push(Notification::Cancellation {
            order_id: order_id.clone(),
            reason: reason.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_sent_notifications() {
        let service = InMemoryNotificationService::new();
        let order_id = OrderId::new("order-1");

        service
            .send_order_confirmation(&order_id, "customer@example.com")
            .await
            .unwrap();
        service
            .send_cancellation_email(&order_id, "approval timeout")
            .await
            .unwrap();

        assert_eq!(
            service.sent(),
            [
                Notification::Confirmation {
                    order_id: order_id.clone(),
                    email: "customer@example.com".to_string()
                },
                Notification::Cancellation {
                    order_id,
                    reason: "approval timeout".to_string()
                }
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_confirmation_is_counted() {
        let service = InMemoryNotificationService::new();
        service.fail_confirmation(Fault::always(OperationError::transient("smtp down")));

        let result = service
            .send_order_confirmation(&OrderId::new("order-1"), "customer@example.com")
            .await;

        assert!(result.is_err());
        assert_eq!(service.confirmation_calls(), 1);
        assert!(service.sent().is_empty());
    }
}
