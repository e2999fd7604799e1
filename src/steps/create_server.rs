//! Registers the SSH key and creates the build server.

use tracing::{info, warn};
use uuid::Uuid;

use crate::client::{ComputeClient, ServerRequest};
use crate::pipeline::{BuildError, BuildState, CleanupWarning, Step, StepFuture};
use crate::ssh::public_key_for;

const NAME: &str = "create_server";

/// Creates the server, first registering the configured private key's
/// public half when one is set. Cleanup destroys both.
#[derive(Debug, Default)]
pub struct CreateServer {
    server_id: Option<String>,
    key_id: Option<String>,
}

impl CreateServer {
    /// Creates the step.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            server_id: None,
            key_id: None,
        }
    }
}

impl<C: ComputeClient> Step<C> for CreateServer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn run<'a>(&'a mut self, state: &'a mut BuildState<C>) -> StepFuture<'a> {
        Box::pin(async move {
            let client = state.client();
            let config = state.config();
            let label = format!("kiln-{}", Uuid::new_v4().simple());

            let public_key = config
                .ssh_private_key
                .as_deref()
                .map(public_key_for)
                .transpose()?;
            if let Some(key) = public_key {
                let key_id = client
                    .create_ssh_key(&label, &key)
                    .await
                    .map_err(BuildError::remote("create SSH key"))?;
                info!(key_id = %key_id, "registered SSH key");
                self.key_id = Some(key_id);
            }

            let created = match ServerRequest::builder()
                .region(config.region.as_str())
                .plan(config.plan.as_str())
                .boot(config.boot_source())
                .label(label.as_str())
                .private_networking(config.private_networking)
                .ipv6(config.ipv6)
                .ssh_key_id(self.key_id.clone())
                .build()
            {
                Ok(request) => client.create_server(&request).await,
                Err(err) => Err(err),
            };

            let server_id = match created {
                Ok(id) => id,
                Err(err) => {
                    if let Some(key_id) = self.key_id.take()
                        && let Err(delete_err) = client.delete_ssh_key(&key_id).await
                    {
                        warn!(key_id = %key_id, error = %delete_err, "failed to delete SSH key");
                    }
                    return Err(BuildError::remote("create server")(err));
                }
            };

            info!(server_id = %server_id, "created server");
            self.server_id = Some(server_id.clone());
            state.put_server_id(server_id);
            Ok(())
        })
    }

    fn cleanup<'a>(&'a mut self, state: &'a mut BuildState<C>) -> StepFuture<'a> {
        Box::pin(async move {
            let client = state.client();
            if let Some(server_id) = self.server_id.take() {
                info!(server_id = %server_id, "destroying server");
                if let Err(err) = client.delete_server(&server_id).await {
                    warn!(
                        server_id = %server_id,
                        error = %err,
                        "failed to destroy server; delete it manually"
                    );
                    state.push_warning(CleanupWarning::new(
                        NAME,
                        format!(
                            "failed to destroy server {server_id}: {err}; delete it manually"
                        ),
                    ));
                }
            }

            if let Some(key_id) = self.key_id.take()
                && let Err(err) = client.delete_ssh_key(&key_id).await
            {
                warn!(key_id = %key_id, error = %err, "failed to delete SSH key");
                state.push_warning(CleanupWarning::new(
                    NAME,
                    format!("failed to delete SSH key {key_id}: {err}"),
                ));
            }
            Ok(())
        })
    }
}
