//! Order fulfillment saga constants.

/// Decision point guarding the concurrent enrichment branch.
pub const VERSION_DECISION_ID: &str = "order-workflow-v2";

/// Branch version written by this code at [`VERSION_DECISION_ID`].
pub const CURRENT_VERSION: i32 = 2;

/// Status persisted once payment has been taken.
pub const STATUS_COMPLETED: &str = "COMPLETED";

/// Step name: enrich the order with inventory and customer data.
pub const STEP_ENRICHMENT: &str = "enrichment";

/// Step name: reserve stock for the order.
pub const STEP_RESERVE_STOCK: &str = "reserve_stock";

/// Step name: charge the customer.
pub const STEP_PAYMENT: &str = "payment";

/// Step name: persist the order status.
pub const STEP_STATUS_UPDATE: &str = "status_update";

/// Step name: send the order confirmation.
pub const STEP_CONFIRMATION: &str = "confirmation";

/// Step name: send the cancellation email.
pub const STEP_CANCELLATION_EMAIL: &str = "cancellation_email";

/// Compensation: release reserved stock.
pub const COMPENSATE_RELEASE_STOCK: &str = "release_stock";

/// Compensation: refund a charged payment.
pub const COMPENSATE_REFUND_PAYMENT: &str = "refund_payment";

// Operation names reported by the invoker
pub(crate) const OP_INVENTORY_SNAPSHOT: &str = "fetch_inventory_snapshot";
pub(crate) const OP_CUSTOMER_PROFILE: &str = "fetch_customer_profile";
pub(crate) const OP_RECOMMENDATIONS: &str = "fetch_recommendations";
pub(crate) const OP_RESERVE_STOCK: &str = "reserve_stock";
pub(crate) const OP_PROCESS_PAYMENT: &str = "process_payment";
pub(crate) const OP_UPDATE_ORDER_STATUS: &str = "update_order_status";
pub(crate) const OP_ORDER_CONFIRMATION: &str = "send_order_confirmation";
pub(crate) const OP_CANCELLATION_EMAIL: &str = "send_cancellation_email";
pub(crate) const OP_RELEASE_STOCK: &str = "release_stock";
pub(crate) const OP_REFUND_PAYMENT: &str = "refund_payment";
