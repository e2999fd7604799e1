//! Step pipeline: typed state, steps, the runner, and polling.

mod cancel;
mod error;
mod poll;
mod runner;
mod state;
mod step;

pub use cancel::{CancelHandle, RunnerStatus};
pub use error::{BuildError, BuildFailure, CleanupWarning};
pub use poll::{PollError, Poller};
pub use runner::Runner;
pub use state::BuildState;
pub use step::{Step, StepFuture};
