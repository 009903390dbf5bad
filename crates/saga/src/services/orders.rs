//! Order status persistence.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::OrderId;

use super::{Fault, read, trip, write};
use crate::error::OperationError;

/// Trait for persisting an order's business status.
#[async_trait]
pub trait OrderStatusService: Send + Sync {
    async fn update_order_status(&self, order_id: &OrderId, status: &str)
    -> Result<(), OperationError>;
}

#[derive(Debug, Default)]
struct InMemoryOrderStatusState {
    statuses: HashMap<OrderId, String>,
    update_calls: u32,
    update_fault: Option<Fault>,
}

/// In-memory order status store for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderStatusService {
    state: Arc<RwLock<InMemoryOrderStatusState>>,
}

impl InMemoryOrderStatusService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_update(&self, fault: Fault) {
        write(&self.state).update_fault = Some(fault);
    }

    pub fn status(&self, order_id: &OrderId) -> Option<String> {
        read(&self.state).statuses.get(order_id).cloned()
    }

    pub fn update_calls(&self) -> u32 {
        read(&self.state).update_calls
    }
}

#[async_trait]
impl OrderStatusService for InMemoryOrderStatusService {
    async fn update_order_status(
        &self,
        order_id: &OrderId,
        status: &str,
    ) -> Result<(), OperationError> {
        let mut state = write(&self.state);
        state.update_calls += 1;
        trip(&mut state.update_fault)?;

        state.statuses.insert(order_id.clone(), status.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_update_status() {
        let service = InMemoryOrderStatusService::new();
        let order_id = OrderId::new("order-1");

        service
            .update_order_status(&order_id, "COMPLETED")
            .await
            .unwrap();

        assert_eq!(service.status(&order_id).as_deref(), Some("COMPLETED"));
        assert_eq!(service.update_calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_update_leaves_no_status() {
        let service = InMemoryOrderStatusService::new();
        service.fail_update(Fault::always(OperationError::transient("db timeout")));
        let order_id = OrderId::new("order-1");

        assert!(
            service
                .update_order_status(&order_id, "COMPLETED")
                .await
                .is_err()
        );
        assert_eq!(service.status(&order_id), None);
    }
}
