//! Branch selection that stays fixed for the life of an instance.

use std::fmt;

use domain::{OrderState, Stage};

/// Version returned for instances that predate a decision point.
pub const DEFAULT_VERSION: i32 = -1;

/// A resolved branch version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BranchVersion(i32);

impl BranchVersion {
    pub fn new(version: i32) -> Self {
        Self(version)
    }

    pub fn value(&self) -> i32 {
        self.0
    }

    /// Returns the tag stored on the order state, e.g. "v2" or "v-1".
    pub fn tag(&self) -> String {
        format!("v{}", self.0)
    }
}

impl fmt::Display for BranchVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Result of consulting the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateDecision {
    pub version: BranchVersion,
    /// True when no marker existed and the caller must record one.
    pub needs_marker: bool,
}

/// Resolves branch versions from markers recorded in an instance's history.
///
/// A recorded marker always wins. Without one, an instance still at
/// [`Stage::Start`] gets `current_version`; an instance that already moved
/// past start was begun by code without this decision point and gets
/// `default_version`. Callers record the marker in the same append that
/// moves the instance out of start, so the two cases cannot be confused on
/// resume.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionGate;

impl VersionGate {
    pub fn resolve(
        &self,
        state: &OrderState,
        decision_id: &str,
        default_version: i32,
        current_version: i32,
    ) -> GateDecision {
        if let Some(recorded) = state.version_marker(decision_id) {
            return GateDecision {
                version: BranchVersion(recorded),
                needs_marker: false,
            };
        }

        let version = if state.stage() == Stage::Start {
            current_version
        } else {
            default_version
        };
        tracing::debug!(decision_id, version, "version marker resolved");

        GateDecision {
            version: BranchVersion(version),
            needs_marker: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{Aggregate, OrderEvent, OrderId};

    const DECISION: &str = "order-workflow-v2";

    fn fresh() -> OrderState {
        let mut state = OrderState::default();
        state.apply(OrderEvent::saga_started(OrderId::new("order-1"), vec![]));
        state
    }

    #[test]
    fn fresh_instance_takes_current_version() {
        let decision = VersionGate.resolve(&fresh(), DECISION, DEFAULT_VERSION, 2);
        assert_eq!(decision.version, BranchVersion::new(2));
        assert!(decision.needs_marker);
        assert_eq!(decision.version.tag(), "v2");
    }

    #[test]
    fn recorded_marker_wins_over_newer_code() {
        let mut state = fresh();
        state.apply(OrderEvent::version_marker(DECISION, 2));
        state.apply(OrderEvent::stage_entered(Stage::Enrichment));

        let decision = VersionGate.resolve(&state, DECISION, DEFAULT_VERSION, 3);
        assert_eq!(decision.version.value(), 2);
        assert!(!decision.needs_marker);
    }

    #[test]
    fn progressed_instance_without_marker_takes_default() {
        let mut state = fresh();
        state.apply(OrderEvent::stage_entered(Stage::Enrichment));

        let decision = VersionGate.resolve(&state, DECISION, DEFAULT_VERSION, 2);
        assert_eq!(decision.version.value(), DEFAULT_VERSION);
        assert_eq!(decision.version.to_string(), "v-1");
        assert!(decision.needs_marker);
    }
}
