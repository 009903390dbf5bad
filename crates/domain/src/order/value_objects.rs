//! Value objects for the order domain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::OrderError;

/// Stock keeping unit identifying a product.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    /// Creates a SKU from a string.
    pub fn new(sku: impl Into<String>) -> Self {
        Self(sku.into())
    }

    /// Returns the SKU as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Sku {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Sku {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Sku {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A product line in an order's cart.
///
/// Line items are immutable once added. The cart keeps them in insertion
/// order for audit even though totals do not depend on order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub sku: Sku,
    pub quantity: u32,
}

impl LineItem {
    /// Creates a validated line item.
    pub fn new(sku: impl Into<Sku>, quantity: u32) -> Result<Self, OrderError> {
        let item = Self {
            sku: sku.into(),
            quantity,
        };
        item.validate()?;
        Ok(item)
    }

    /// Checks the item invariants: non-blank SKU and positive quantity.
    ///
    /// Items arriving through deserialization bypass [`LineItem::new`], so
    /// callers re-validate them at the boundary.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.sku.as_str().trim().is_empty() {
            return Err(OrderError::EmptySku);
        }
        if self.quantity == 0 {
            return Err(OrderError::InvalidQuantity {
                sku: self.sku.to_string(),
                quantity: self.quantity,
            });
        }
        Ok(())
    }
}

/// Data gathered during the enrichment stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEnrichment {
    /// Customer tier (e.g. "Gold"); empty when the lookup did not run.
    pub customer_tier: String,
    /// Whether inventory can cover the cart.
    pub inventory_ok: bool,
    /// Recommended products, in ranking order.
    pub recommendations: Vec<String>,
}

/// Signal payload approving payment for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentApproval {
    pub approved_by: String,
    pub timestamp: DateTime<Utc>,
}

impl PaymentApproval {
    /// Creates an approval stamped with the current time.
    pub fn new(approved_by: impl Into<String>) -> Self {
        Self {
            approved_by: approved_by.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Signal payload requesting cancellation of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelRequest {
    pub reason: String,
}

impl CancelRequest {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
