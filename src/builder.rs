//! Assembles the pipeline and turns its outcome into an artifact.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::artifact::Artifact;
use crate::client::{ComputeClient, ParamKind};
use crate::config::BuildConfig;
use crate::pipeline::{BuildFailure, BuildState, CancelHandle, Runner, Step};
use crate::provision::ProvisionHook;
use crate::ssh::Communicator;
use crate::steps::{Connect, CreateServer, Halt, Provision, Shutdown, Snapshot, WaitForServer};

/// Runs one snapshot build.
pub struct Builder<C> {
    config: Arc<BuildConfig>,
    client: Arc<C>,
    communicator: Arc<dyn Communicator>,
    hook: Arc<dyn ProvisionHook>,
    cancel: CancelHandle,
    poll_interval: Option<Duration>,
}

impl<C: ComputeClient + 'static> Builder<C> {
    /// Creates a builder for a prepared configuration.
    #[must_use]
    pub fn new(
        config: BuildConfig,
        client: Arc<C>,
        communicator: Arc<dyn Communicator>,
        hook: Arc<dyn ProvisionHook>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            client,
            communicator,
            hook,
            cancel: CancelHandle::new(),
            poll_interval: None,
        }
    }

    /// Overrides the delay between provider polls.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Returns a handle that cancels the build from another task.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Requests cancellation. Safe to call repeatedly and after the build
    /// has finished.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The pipeline steps in execution order.
    #[must_use]
    pub fn steps(&self) -> Vec<Box<dyn Step<C>>> {
        vec![
            Box::new(CreateServer::new()),
            Box::new(WaitForServer),
            Box::new(Connect::new(Arc::clone(&self.communicator))),
            Box::new(Provision::new(Arc::clone(&self.hook))),
            Box::new(Shutdown),
            Box::new(Halt),
            Box::new(Snapshot),
        ]
    }

    /// Runs the build.
    ///
    /// # Errors
    ///
    /// Returns a [`BuildFailure`] carrying the halting error and any cleanup
    /// warnings.
    pub async fn run(&self) -> Result<Artifact<C>, BuildFailure> {
        let mut state = BuildState::new(Arc::clone(&self.config), Arc::clone(&self.client));
        if let Some(interval) = self.poll_interval {
            state = state.with_poll_interval(interval);
        }

        let mut runner = Runner::new(self.steps()).with_cancel_handle(self.cancel.clone());
        let status = runner.run(&mut state).await;
        info!(?status, "pipeline finished");

        let warnings = state.take_warnings();
        if let Some(error) = state.take_error() {
            return Err(BuildFailure { error, warnings });
        }

        let snapshot_id = state.require_snapshot_id()?;
        let snapshot_name = state.require_snapshot_name()?;
        let region_name = self.region_label().await;
        Ok(Artifact::new(
            snapshot_id,
            snapshot_name,
            region_name,
            Arc::clone(&self.client),
        ))
    }

    async fn region_label(&self) -> String {
        let configured = self.config.region.as_str();
        let resolved = match self.client.resolve_id(ParamKind::Region, configured).await {
            Ok(id) => self.client.resolve_label(ParamKind::Region, &id).await,
            Err(err) => Err(err),
        };
        resolved.unwrap_or_else(|err| {
            warn!(region = configured, error = %err, "could not resolve region label");
            configured.to_owned()
        })
    }
}
