//! Asks the guest to power itself off.

use tracing::{info, warn};

use crate::client::ComputeClient;
use crate::pipeline::{BuildState, Step, StepFuture};

/// Runs the shutdown command over the session, taking it out of the
/// state. Failures are logged and ignored; the halt step follows anyway.
#[derive(Clone, Copy, Debug, Default)]
pub struct Shutdown;

impl<C: ComputeClient> Step<C> for Shutdown {
    fn name(&self) -> &'static str {
        "shutdown"
    }

    fn run<'a>(&'a mut self, state: &'a mut BuildState<C>) -> StepFuture<'a> {
        Box::pin(async move {
            let Some(session) = state.take_session() else {
                warn!("no SSH session; skipping graceful shutdown");
                return Ok(());
            };
            let config = state.config();
            let command = config.shutdown_command.as_str();

            info!(command, "shutting down server");
            match session
                .exec_with_timeout(command, config.state_timeout)
                .await
            {
                Ok(0) => info!("shutdown command finished"),
                Ok(status) => warn!(status, "shutdown command exited unsuccessfully"),
                Err(err) => warn!(error = %err, "shutdown command failed"),
            }
            Ok(())
        })
    }
}
