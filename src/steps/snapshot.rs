//! Captures the stopped server as a snapshot.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::client::{ComputeClient, SnapshotStatus};
use crate::pipeline::{BuildError, BuildState, CleanupWarning, Poller, Step, StepFuture};

/// Creates a snapshot named after the rendered template and waits for it
/// to complete.
///
/// A snapshot that never completes is left in place and reported as a
/// warning naming its id.
#[derive(Clone, Copy, Debug, Default)]
pub struct Snapshot;

impl<C: ComputeClient> Step<C> for Snapshot {
    fn name(&self) -> &'static str {
        "snapshot"
    }

    fn run<'a>(&'a mut self, state: &'a mut BuildState<C>) -> StepFuture<'a> {
        Box::pin(async move {
            let server_id = state.require_server_id()?;
            let client = state.client();
            let name = state.config().snapshot_name.clone();
            let timeout = state.config().state_timeout;

            info!(server_id = %server_id, snapshot_name = %name, "creating snapshot");
            let snapshot_id = client
                .create_snapshot(&server_id, &name)
                .await
                .map_err(BuildError::remote("create snapshot"))?;
            info!(snapshot_id = %snapshot_id, "snapshot requested");

            let polled = Poller::new(state.cancel_handle(), timeout, state.poll_interval())
                .until(|| {
                    let poll_client = Arc::clone(&client);
                    let id = snapshot_id.clone();
                    async move {
                        let snapshot = poll_client
                            .snapshot_info(&id)
                            .await
                            .map_err(BuildError::remote("query snapshot"))?;
                        debug!(snapshot_id = %id, status = ?snapshot.status, "polled snapshot");
                        Ok((snapshot.status == SnapshotStatus::Complete).then_some(()))
                    }
                })
                .await;
            if let Err(err) = polled {
                warn!(snapshot_id = %snapshot_id, "snapshot did not complete");
                state.push_warning(CleanupWarning::new(
                    "snapshot",
                    format!("snapshot {snapshot_id} did not complete; delete it manually"),
                ));
                return Err(err.into_state_error("snapshot to complete", timeout));
            }

            info!(snapshot_id = %snapshot_id, "snapshot is complete");
            state.put_snapshot(snapshot_id, name);
            Ok(())
        })
    }
}
