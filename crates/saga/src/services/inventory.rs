//! Inventory service trait and in-memory implementation.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::{LineItem, OrderId, Sku};

use super::{Fault, read, trip, write};
use crate::error::OperationError;

/// Trait for inventory operations.
#[async_trait]
pub trait InventoryService: Send + Sync {
    /// Returns true if stock can cover every item.
    async fn fetch_inventory_snapshot(&self, items: &[LineItem]) -> Result<bool, OperationError>;

    /// Reserves stock for an order.
    async fn reserve_stock(&self, order_id: &OrderId, items: &[LineItem])
    -> Result<(), OperationError>;

    /// Releases an order's reservation. Releasing twice has no further effect.
    async fn release_stock(&self, order_id: &OrderId) -> Result<(), OperationError>;
}

#[derive(Debug, Default)]
struct InMemoryInventoryState {
    reservations: HashMap<OrderId, Vec<LineItem>>,
    out_of_stock: HashSet<Sku>,
    snapshot_calls: u32,
    reserve_calls: u32,
    release_calls: u32,
    snapshot_fault: Option<Fault>,
    reserve_fault: Option<Fault>,
    release_fault: Option<Fault>,
}

/// In-memory inventory service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryService {
    state: Arc<RwLock<InMemoryInventoryState>>,
}

impl InMemoryInventoryService {
    /// Creates a new in-memory inventory service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the inventory snapshot report `sku` as unavailable.
    pub fn mark_out_of_stock(&self, sku: impl Into<Sku>) {
        write(&self.state).out_of_stock.insert(sku.into());
    }

    pub fn fail_snapshot(&self, fault: Fault) {
        write(&self.state).snapshot_fault = Some(fault);
    }

    pub fn fail_reserve(&self, fault: Fault) {
        write(&self.state).reserve_fault = Some(fault);
    }

    pub fn fail_release(&self, fault: Fault) {
        write(&self.state).release_fault = Some(fault);
    }

    /// Returns true if stock is currently reserved for the order.
    pub fn is_reserved(&self, order_id: &OrderId) -> bool {
        read(&self.state).reservations.contains_key(order_id)
    }

    /// Returns the items reserved for the order.
    pub fn reserved_items(&self, order_id: &OrderId) -> Option<Vec<LineItem>> {
        read(&self.state).reservations.get(order_id).cloned()
    }

    /// Returns the number of active reservations.
    pub fn reservation_count(&self) -> usize {
        read(&self.state).reservations.len()
    }

    pub fn snapshot_calls(&self) -> u32 {
        read(&self.state).snapshot_calls
    }

    pub fn reserve_calls(&self) -> u32 {
        read(&self.state).reserve_calls
    }

    /// Returns how many times `release_stock` was invoked.
    pub fn release_calls(&self) -> u32 {
        read(&self.state).release_calls
    }
}

#[async_trait]
impl InventoryService for InMemoryInventoryService {
    async fn fetch_inventory_snapshot(&self, items: &[LineItem]) -> Result<bool, OperationError> {
        let mut state = write(&self.state);
        state.snapshot_calls += 1;
        trip(&mut state.snapshot_fault)?;

        Ok(items
            .iter()
            .all(|item| !state.out_of_stock.contains(&item.sku)))
    }

    async fn reserve_stock(
        &self,
        order_id: &OrderId,
        items: &[LineItem],
    ) -> Result<(), OperationError> {
        let mut state = write(&self.state);
        state.reserve_calls += 1;
        trip(&mut state.reserve_fault)?;

        if let Some(item) = items.iter().find(|i| state.out_of_stock.contains(&i.sku)) {
            return Err(OperationError::permanent(format!(
                "{} is out of stock",
                item.sku
            )));
        }
        state.reservations.insert(order_id.clone(), items.to_vec());
        tracing::debug!(%order_id, items = items.len(), "stock reserved");
        Ok(())
    }

    async fn release_stock(&self, order_id: &OrderId) -> Result<(), OperationError> {
        let mut state = write(&self.state);
        state.release_calls += 1;
        trip(&mut state.release_fault)?;

        state.reservations.remove(order_id);
        tracing::debug!(%order_id, "stock released");
        Ok(())
    }
}
