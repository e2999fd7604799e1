//! Sequential step execution with reverse-order unwinding.

use tracing::{info, warn};

use super::{BuildError, BuildState, CancelHandle, CleanupWarning, RunnerStatus, Step};
use crate::client::ComputeClient;

/// Runs steps in order and unwinds the ones that succeeded when a step
/// fails or cancellation is requested.
pub struct Runner<C> {
    steps: Vec<Box<dyn Step<C>>>,
    cancel: CancelHandle,
}

impl<C: ComputeClient> Runner<C> {
    /// Creates a runner over `steps`.
    #[must_use]
    pub fn new(steps: Vec<Box<dyn Step<C>>>) -> Self {
        Self {
            steps,
            cancel: CancelHandle::new(),
        }
    }

    /// Uses an existing cancellation handle instead of a fresh one.
    #[must_use]
    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns a handle that can cancel this runner from another task.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> RunnerStatus {
        self.cancel.status()
    }

    /// Executes every step, unwinding on failure or cancellation.
    ///
    /// The halting error is recorded in `state`; cleanup failures are
    /// recorded as warnings and never replace it.
    pub async fn run(&mut self, state: &mut BuildState<C>) -> RunnerStatus {
        self.cancel.set_status(RunnerStatus::Running);
        state.set_cancel_handle(self.cancel.clone());

        let total = self.steps.len();
        let mut executed = 0_usize;
        let mut outcome = RunnerStatus::Completed;
        for step in &mut self.steps {
            if self.cancel.is_cancelled() {
                state.record_error(BuildError::Cancelled);
                outcome = RunnerStatus::Cancelled;
                break;
            }

            let name = step.name();
            info!(step = name, "running step");
            if let Err(err) = step.run(state).await {
                warn!(step = name, error = %err, "step failed");
                outcome = if err == BuildError::Cancelled {
                    RunnerStatus::Cancelled
                } else {
                    RunnerStatus::Halted
                };
                state.record_error(err);
                break;
            }
            executed += 1;

            // A finished final step keeps its result even if cancel raced it.
            if executed < total && self.cancel.is_cancelled() {
                state.record_error(BuildError::Cancelled);
                outcome = RunnerStatus::Cancelled;
                break;
            }
        }

        if outcome != RunnerStatus::Completed {
            Self::unwind(&mut self.steps, executed, state).await;
        }

        self.cancel.set_status(outcome);
        outcome
    }

    async fn unwind(steps: &mut [Box<dyn Step<C>>], executed: usize, state: &mut BuildState<C>) {
        for step in steps.iter_mut().take(executed).rev() {
            let name = step.name();
            info!(step = name, "cleaning up step");
            if let Err(err) = step.cleanup(state).await {
                warn!(step = name, error = %err, "cleanup failed");
                state.push_warning(CleanupWarning::new(name, err.to_string()));
            }
        }
    }
}
