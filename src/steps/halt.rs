//! Forces the server off and waits for it to stop.

use std::sync::Arc;

use tracing::info;

use crate::client::ComputeClient;
use crate::pipeline::{BuildError, BuildState, Poller, Step, StepFuture};

/// Issues a halt, then polls until the server reports it is stopped.
#[derive(Clone, Copy, Debug, Default)]
pub struct Halt;

impl<C: ComputeClient> Step<C> for Halt {
    fn name(&self) -> &'static str {
        "halt"
    }

    fn run<'a>(&'a mut self, state: &'a mut BuildState<C>) -> StepFuture<'a> {
        Box::pin(async move {
            let server_id = state.require_server_id()?;
            let client = state.client();
            let timeout = state.config().state_timeout;

            info!(server_id = %server_id, "halting server");
            client
                .halt_server(&server_id)
                .await
                .map_err(BuildError::remote("halt server"))?;

            Poller::new(state.cancel_handle(), timeout, state.poll_interval())
                .until(|| {
                    let poll_client = Arc::clone(&client);
                    let id = server_id.clone();
                    async move {
                        let server = poll_client
                            .server_info(&id)
                            .await
                            .map_err(BuildError::remote("query server"))?;
                        Ok(server.is_stopped().then_some(()))
                    }
                })
                .await
                .map_err(|err| err.into_state_error("server to power off", timeout))?;

            info!(server_id = %server_id, "server is stopped");
            Ok(())
        })
    }
}
