//! The unit of work executed by the runner.

use std::future::Future;
use std::pin::Pin;

use super::{BuildError, BuildState};
use crate::client::ComputeClient;

/// Future returned by step operations.
pub type StepFuture<'a> = Pin<Box<dyn Future<Output = Result<(), BuildError>> + Send + 'a>>;

/// A pipeline step with a forward action and an optional compensating
/// action.
///
/// `cleanup` runs only when `run` succeeded and a later step failed or the
/// build was cancelled. A step may keep private state to drive its own
/// cleanup.
pub trait Step<C: ComputeClient>: Send {
    /// Short name used in logs and cleanup warnings.
    fn name(&self) -> &'static str;

    /// Performs the step.
    fn run<'a>(&'a mut self, state: &'a mut BuildState<C>) -> StepFuture<'a>;

    /// Undoes the step while unwinding. Errors become cleanup warnings.
    fn cleanup<'a>(&'a mut self, _state: &'a mut BuildState<C>) -> StepFuture<'a> {
        Box::pin(std::future::ready(Ok(())))
    }
}
