//! Waits for SSH to accept the build's credentials.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use crate::client::ComputeClient;
use crate::pipeline::{BuildError, BuildState, PollError, Poller, Step, StepFuture};
use crate::ssh::{Communicator, SshError, resolve_credentials};

/// Retries SSH connections until one authenticates or `ssh_timeout`
/// elapses, then stores the session.
pub struct Connect {
    communicator: Arc<dyn Communicator>,
}

impl Connect {
    /// Creates the step around `communicator`.
    #[must_use]
    pub fn new(communicator: Arc<dyn Communicator>) -> Self {
        Self { communicator }
    }
}

impl<C: ComputeClient> Step<C> for Connect {
    fn name(&self) -> &'static str {
        "connect"
    }

    fn run<'a>(&'a mut self, state: &'a mut BuildState<C>) -> StepFuture<'a> {
        Box::pin(async move {
            let ip = state.require_server_ip()?;
            let config = state.config();
            let address = SocketAddr::new(ip, config.ssh_port);
            let timeout = config.ssh_timeout;
            let credentials = resolve_credentials(config, state.default_password())?;

            info!(%address, "waiting for SSH");
            let last_error: Mutex<Option<SshError>> = Mutex::new(None);
            let communicator = &self.communicator;
            let outcome = Poller::new(state.cancel_handle(), timeout, state.poll_interval())
                .until(|| {
                    let login = &credentials;
                    let failure = &last_error;
                    async move {
                        match communicator.connect(address, login).await {
                            Ok(session) => Ok(Some(session)),
                            Err(err) => {
                                debug!(%address, error = %err, "SSH not ready");
                                *failure.lock().unwrap_or_else(PoisonError::into_inner) =
                                    Some(err);
                                Ok(None)
                            }
                        }
                    }
                })
                .await;

            let session = match outcome {
                Ok(session) => session,
                Err(PollError::TimedOut) => {
                    let last = last_error
                        .into_inner()
                        .unwrap_or_else(PoisonError::into_inner)
                        .map_or_else(
                            || String::from("no connection attempt completed"),
                            |err| err.to_string(),
                        );
                    return Err(BuildError::ConnectTimeout {
                        address: address.to_string(),
                        timeout,
                        last_error: last,
                    });
                }
                Err(PollError::Cancelled) => return Err(BuildError::Cancelled),
                Err(PollError::Probe(err)) => return Err(err),
            };

            info!(%address, "connected over SSH");
            state.put_session(session);
            Ok(())
        })
    }

    fn cleanup<'a>(&'a mut self, state: &'a mut BuildState<C>) -> StepFuture<'a> {
        Box::pin(async move {
            if state.take_session().is_some() {
                debug!("closed SSH session");
            }
            Ok(())
        })
    }
}
