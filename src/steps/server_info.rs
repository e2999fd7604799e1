//! Waits for the server to become active and routable.

use std::sync::Arc;

use tracing::{debug, info};

use crate::client::ComputeClient;
use crate::pipeline::{BuildError, BuildState, Poller, Step, StepFuture};

/// Polls the server until it is active with a routable address, then
/// records the address and any provider-generated root password.
#[derive(Clone, Copy, Debug, Default)]
pub struct WaitForServer;

impl<C: ComputeClient> Step<C> for WaitForServer {
    fn name(&self) -> &'static str {
        "server_info"
    }

    fn run<'a>(&'a mut self, state: &'a mut BuildState<C>) -> StepFuture<'a> {
        Box::pin(async move {
            let server_id = state.require_server_id()?;
            let client = state.client();
            let timeout = state.config().state_timeout;

            info!(server_id = %server_id, "waiting for server to become active");
            let (ip, password) =
                Poller::new(state.cancel_handle(), timeout, state.poll_interval())
                    .until(|| {
                        let poll_client = Arc::clone(&client);
                        let id = server_id.clone();
                        async move {
                            let server = poll_client
                                .server_info(&id)
                                .await
                                .map_err(BuildError::remote("query server"))?;
                            debug!(
                                server_id = %id,
                                status = ?server.status,
                                "polled server"
                            );
                            Ok(server
                                .reachable_ip()
                                .map(|ip| (ip, server.default_password.clone())))
                        }
                    })
                    .await
                    .map_err(|err| err.into_state_error("server to become active", timeout))?;

            info!(server_id = %server_id, %ip, "server is active");
            state.put_server_ip(ip);
            if let Some(value) = password {
                state.put_default_password(value);
            }
            Ok(())
        })
    }
}
