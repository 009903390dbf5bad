//! Order fulfillment saga orchestration.
//!
//! A saga drives one order through a fixed sequence of external steps:
//!
//! 1. Enrich the order (inventory, customer tier, recommendations)
//! 2. Reserve stock
//! 3. Wait for payment approval, a cancellation or the approval deadline
//! 4. Charge payment
//! 5. Persist the order status
//! 6. Send the confirmation
//!
//! Every completed step with a side effect pushes a reversal onto a
//! compensation stack. A cancellation or a failed step unwinds the stack in
//! reverse order before the saga ends. Each state change is checkpointed as
//! an event so an unfinished saga can be resumed from its history.

pub mod approval;
pub mod compensation;
pub mod coordinator;
pub mod error;
pub mod invoker;
pub mod options;
pub mod order_fulfillment;
pub mod services;
pub mod signals;
pub mod status;
pub mod timer;
pub mod version_gate;

pub use approval::{ApprovalEvent, ApprovalLoop};
pub use compensation::{CompensationStack, Reversal, UnwindReport, UnwindStep};
pub use coordinator::{SagaCoordinator, SagaHandle, SagaOutcome, SagaServices};
pub use error::{ErrorKind, OperationError, Result, SagaError};
pub use invoker::{OperationInvoker, RetryPolicy};
pub use options::SagaOptions;
pub use services::{
    CustomerService, Fault, InMemoryCustomerService, InMemoryInventoryService,
    InMemoryNotificationService, InMemoryOrderStatusService, InMemoryPaymentService,
    InventoryService, Notification, NotificationService, OrderStatusService, PaymentReceipt,
    PaymentService,
};
pub use signals::{OrderSignal, SignalSender, signal_channel};
pub use status::StatusProjector;
pub use timer::{DurableTimer, TokioTimer};
pub use version_gate::{BranchVersion, DEFAULT_VERSION, GateDecision, VersionGate};
