//! Hands the session to the provisioning hook.

use std::sync::Arc;

use tracing::info;

use crate::client::ComputeClient;
use crate::pipeline::{BuildError, BuildState, Step, StepFuture};
use crate::provision::ProvisionHook;

/// Runs the caller's [`ProvisionHook`]. A hook failure halts the build and
/// destroys the server.
pub struct Provision {
    hook: Arc<dyn ProvisionHook>,
}

impl Provision {
    /// Creates the step around `hook`.
    #[must_use]
    pub fn new(hook: Arc<dyn ProvisionHook>) -> Self {
        Self { hook }
    }
}

impl<C: ComputeClient> Step<C> for Provision {
    fn name(&self) -> &'static str {
        "provision"
    }

    fn run<'a>(&'a mut self, state: &'a mut BuildState<C>) -> StepFuture<'a> {
        Box::pin(async move {
            let session = state.require_session()?;
            info!("provisioning server");
            self.hook
                .provision(session, state.config())
                .await
                .map_err(|err| BuildError::Provision {
                    message: err.to_string(),
                })
        })
    }
}
