//! Customer profile and recommendation lookups.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::OrderId;

use super::{Fault, read, trip, write};
use crate::error::OperationError;

/// Read-only customer lookups used to enrich an order.
#[async_trait]
pub trait CustomerService: Send + Sync {
    /// Returns the customer's tier (e.g. "Gold").
    async fn fetch_customer_profile(&self, order_id: &OrderId) -> Result<String, OperationError>;

    /// Returns recommended products in ranking order.
    async fn fetch_recommendations(&self, order_id: &OrderId)
    -> Result<Vec<String>, OperationError>;
}

#[derive(Debug)]
struct InMemoryCustomerState {
    tier: String,
    recommendations: Vec<String>,
    profile_calls: u32,
    recommendation_calls: u32,
    profile_fault: Option<Fault>,
    recommendation_fault: Option<Fault>,
}

impl Default for InMemoryCustomerState {
    fn default() -> Self {
        Self {
            tier: "Gold".to_string(),
            recommendations: vec![
                "Product-A".to_string(),
                "Product-B".to_string(),
                "Product-C".to_string(),
            ],
            profile_calls: 0,
            recommendation_calls: 0,
            profile_fault: None,
            recommendation_fault: None,
        }
    }
}

/// In-memory customer service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCustomerService {
    state: Arc<RwLock<InMemoryCustomerState>>,
}

impl InMemoryCustomerService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_tier(&self, tier: impl Into<String>) {
        write(&self.state).tier = tier.into();
    }

    pub fn fail_profile(&self, fault: Fault) {
        write(&self.state).profile_fault = Some(fault);
    }

    pub fn fail_recommendations(&self, fault: Fault) {
        write(&self.state).recommendation_fault = Some(fault);
    }

    pub fn profile_calls(&self) -> u32 {
        read(&self.state).profile_calls
    }

    pub fn recommendation_calls(&self) -> u32 {
        read(&self.state).recommendation_calls
    }
}

#[async_trait]
impl CustomerService for InMemoryCustomerService {
    async fn fetch_customer_profile(&self, _order_id: &OrderId) -> Result<String, OperationError> {
        let mut state = write(&self.state);
        state.profile_calls += 1;
        trip(&mut state.profile_fault)?;
        Ok(state.tier.clone())
    }

    async fn fetch_recommendations(
        &self,
        _order_id: &OrderId,
    ) -> Result<Vec<String>, OperationError> {
        let mut state = write(&self.state);
        state.recommendation_calls += 1;
        trip(&mut state.recommendation_fault)?;
        Ok(state.recommendations.clone())
    }
}
