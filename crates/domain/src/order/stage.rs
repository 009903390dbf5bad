//! Order saga lifecycle.

use serde::{Deserialize, Serialize};

/// The stage of an order saga.
///
/// Stage transitions:
/// ```text
/// Start ──► Enrichment ──► Reserve ──► AwaitingApproval ──► Payment ──► StatusUpdate ──► Notify ──► Completed
///   │            │            │               │                │             │
///   └────────────┴────────────┴───────────────┴────────────────┴─────────────┴──► Cancelled / Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    #[default]
    Start,
    Enrichment,
    Reserve,
    AwaitingApproval,
    Payment,
    StatusUpdate,
    Notify,
    /// All steps succeeded (terminal).
    Completed,
    /// Cancelled by a signal or the approval deadline (terminal).
    Cancelled,
    /// A step failed after compensation was attempted (terminal).
    Failed,
}

impl Stage {
    fn ordinal(&self) -> u8 {
        match self {
            Stage::Start => 0,
            Stage::Enrichment => 1,
            Stage::Reserve => 2,
            Stage::AwaitingApproval => 3,
            Stage::Payment => 4,
            Stage::StatusUpdate => 5,
            Stage::Notify => 6,
            Stage::Completed => 7,
            Stage::Cancelled | Stage::Failed => 8,
        }
    }

    /// Returns true if this is a terminal stage.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Completed | Stage::Cancelled | Stage::Failed)
    }

    /// Returns true if the saga may move from this stage to `next`.
    ///
    /// The main path only moves forward; Cancelled and Failed can be entered
    /// from any non-terminal stage.
    pub fn can_advance_to(&self, next: Stage) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            Stage::Cancelled | Stage::Failed => true,
            _ => next.ordinal() > self.ordinal(),
        }
    }

    /// Returns the stage name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Start => "start",
            Stage::Enrichment => "enrichment",
            Stage::Reserve => "reserve",
            Stage::AwaitingApproval => "awaiting-approval",
            Stage::Payment => "payment",
            Stage::StatusUpdate => "status-update",
            Stage::Notify => "notify",
            Stage::Completed => "completed",
            Stage::Cancelled => "cancelled",
            Stage::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
