//! Compensation stack for undoing completed saga steps.

use futures_util::future::BoxFuture;

use crate::error::OperationError;

/// A deferred reversal of one forward step.
pub type Reversal =
    Box<dyn FnOnce() -> BoxFuture<'static, Result<(), OperationError>> + Send + Sync>;

/// A recorded reversal together with the step it undoes.
pub struct CompensationEntry {
    step_name: String,
    reversal: Reversal,
}

impl CompensationEntry {
    pub fn step_name(&self) -> &str {
        &self.step_name
    }
}

impl std::fmt::Debug for CompensationEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompensationEntry")
            .field("step_name", &self.step_name)
            .finish_non_exhaustive()
    }
}

/// Outcome of running one reversal.
#[derive(Debug, Clone, PartialEq)]
pub struct UnwindStep {
    pub step_name: String,
    pub result: Result<(), OperationError>,
}

/// Every reversal attempted by [`CompensationStack::unwind_all`], in
/// execution order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnwindReport {
    pub steps: Vec<UnwindStep>,
}

impl UnwindReport {
    /// Names of the reversals that succeeded, in execution order.
    pub fn compensated(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.result.is_ok())
            .map(|s| s.step_name.as_str())
            .collect()
    }

    /// Reversals that failed with their errors.
    pub fn failures(&self) -> Vec<(&str, &OperationError)> {
        self.steps
            .iter()
            .filter_map(|s| match &s.result {
                Ok(()) => None,
                Err(e) => Some((s.step_name.as_str(), e)),
            })
            .collect()
    }

    pub fn is_clean(&self) -> bool {
        self.steps.iter().all(|s| s.result.is_ok())
    }
}

/// Reversals for completed forward steps, newest on top.
///
/// Read top to bottom the stack is the exact reverse of forward completion
/// order. Unwinding is sequential and continues past failed reversals.
#[derive(Debug, Default)]
pub struct CompensationStack {
    entries: Vec<CompensationEntry>,
}

impl CompensationStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes the reversal for a step that just succeeded.
    pub fn record(&mut self, step_name: impl Into<String>, reversal: Reversal) {
        let step_name = step_name.into();
        tracing::debug!(step = %step_name, "compensation recorded");
        self.entries.push(CompensationEntry {
            step_name,
            reversal,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the recorded step names, bottom to top.
    pub fn step_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.step_name.as_str()).collect()
    }

    /// Pops and runs every reversal, most recent first.
    pub async fn unwind_all(&mut self) -> UnwindReport {
        let mut report = UnwindReport::default();

        while let Some(entry) = self.entries.pop() {
            let CompensationEntry {
                step_name,
                reversal,
            } = entry;

            metrics::counter!("compensation_steps_total").increment(1);
            let result = reversal().await;
            match &result {
                Ok(()) => tracing::info!(step = %step_name, "compensation step completed"),
                Err(error) => {
                    metrics::counter!("compensation_failures_total").increment(1);
                    tracing::error!(
                        step = %step_name,
                        %error,
                        "compensation step failed, continuing"
                    );
                }
            }
            report.steps.push(UnwindStep { step_name, result });
        }

        report
    }
}
