//! Typed state shared between pipeline steps.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use super::{BuildError, CancelHandle, CleanupWarning};
use crate::client::ComputeClient;
use crate::config::BuildConfig;
use crate::ssh::RemoteSession;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Values produced and consumed by the pipeline steps.
///
/// Required getters return [`BuildError::MissingState`] instead of
/// panicking when an earlier step did not record the value.
pub struct BuildState<C> {
    config: Arc<BuildConfig>,
    client: Arc<C>,
    cancel: CancelHandle,
    poll_interval: Duration,
    server_id: Option<String>,
    server_ip: Option<IpAddr>,
    default_password: Option<String>,
    session: Option<Box<dyn RemoteSession>>,
    snapshot_id: Option<String>,
    snapshot_name: Option<String>,
    error: Option<BuildError>,
    warnings: Vec<CleanupWarning>,
}

impl<C: ComputeClient> BuildState<C> {
    /// Creates an empty state for a build.
    #[must_use]
    pub fn new(config: Arc<BuildConfig>, client: Arc<C>) -> Self {
        Self {
            config,
            client,
            cancel: CancelHandle::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            server_id: None,
            server_ip: None,
            default_password: None,
            session: None,
            snapshot_id: None,
            snapshot_name: None,
            error: None,
            warnings: Vec::new(),
        }
    }

    /// Overrides the delay between provider polls.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Validated configuration for this build.
    #[must_use]
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Shared handle to the compute client.
    #[must_use]
    pub fn client(&self) -> Arc<C> {
        Arc::clone(&self.client)
    }

    /// Cancellation handle observed by poll loops.
    #[must_use]
    pub const fn cancel_handle(&self) -> &CancelHandle {
        &self.cancel
    }

    pub(crate) fn set_cancel_handle(&mut self, cancel: CancelHandle) {
        self.cancel = cancel;
    }

    /// Delay between provider polls.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Records the created server.
    pub fn put_server_id(&mut self, server_id: impl Into<String>) {
        self.server_id = Some(server_id.into());
    }

    /// Identifier of the created server, if any.
    #[must_use]
    pub fn server_id(&self) -> Option<&str> {
        self.server_id.as_deref()
    }

    /// Identifier of the created server.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::MissingState`] when no server was recorded.
    pub fn require_server_id(&self) -> Result<String, BuildError> {
        self.server_id
            .clone()
            .ok_or(BuildError::MissingState { key: "server_id" })
    }

    /// Records the server's public address.
    pub fn put_server_ip(&mut self, ip: IpAddr) {
        self.server_ip = Some(ip);
    }

    /// Public address of the server, if known.
    #[must_use]
    pub const fn server_ip(&self) -> Option<IpAddr> {
        self.server_ip
    }

    /// Public address of the server.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::MissingState`] when no address was recorded.
    pub fn require_server_ip(&self) -> Result<IpAddr, BuildError> {
        self.server_ip
            .ok_or(BuildError::MissingState { key: "server_ip" })
    }

    /// Records the provider-generated root password.
    pub fn put_default_password(&mut self, password: impl Into<String>) {
        self.default_password = Some(password.into());
    }

    /// Provider-generated root password, if any.
    #[must_use]
    pub fn default_password(&self) -> Option<&str> {
        self.default_password.as_deref()
    }

    /// Stores the open SSH session.
    pub fn put_session(&mut self, session: Box<dyn RemoteSession>) {
        self.session = Some(session);
    }

    /// Open SSH session, if any.
    #[must_use]
    pub fn session(&self) -> Option<&dyn RemoteSession> {
        self.session.as_deref()
    }

    /// Open SSH session.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::MissingState`] when no session is open.
    pub fn require_session(&self) -> Result<&dyn RemoteSession, BuildError> {
        self.session()
            .ok_or(BuildError::MissingState { key: "session" })
    }

    /// Removes and returns the SSH session.
    pub fn take_session(&mut self) -> Option<Box<dyn RemoteSession>> {
        self.session.take()
    }

    /// Records the finished snapshot.
    pub fn put_snapshot(&mut self, id: impl Into<String>, name: impl Into<String>) {
        self.snapshot_id = Some(id.into());
        self.snapshot_name = Some(name.into());
    }

    /// Identifier of the finished snapshot, if any.
    #[must_use]
    pub fn snapshot_id(&self) -> Option<&str> {
        self.snapshot_id.as_deref()
    }

    /// Identifier of the finished snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::MissingState`] when no snapshot was recorded.
    pub fn require_snapshot_id(&self) -> Result<String, BuildError> {
        self.snapshot_id
            .clone()
            .ok_or(BuildError::MissingState { key: "snapshot_id" })
    }

    /// Display name of the finished snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::MissingState`] when no snapshot was recorded.
    pub fn require_snapshot_name(&self) -> Result<String, BuildError> {
        self.snapshot_name
            .clone()
            .ok_or(BuildError::MissingState {
                key: "snapshot_name",
            })
    }

    /// Error that halted the pipeline, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&BuildError> {
        self.error.as_ref()
    }

    /// Records the error that halted the pipeline. The first error wins.
    pub fn record_error(&mut self, error: BuildError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Removes the recorded error.
    pub fn take_error(&mut self) -> Option<BuildError> {
        self.error.take()
    }

    /// Cleanup warnings recorded so far.
    #[must_use]
    pub fn warnings(&self) -> &[CleanupWarning] {
        &self.warnings
    }

    /// Records a cleanup warning.
    pub fn push_warning(&mut self, warning: CleanupWarning) {
        self.warnings.push(warning);
    }

    /// Removes and returns every cleanup warning.
    pub fn take_warnings(&mut self) -> Vec<CleanupWarning> {
        std::mem::take(&mut self.warnings)
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::test_support::{FakeClient, build_config};

    fn state() -> BuildState<FakeClient> {
        BuildState::new(Arc::new(build_config()), Arc::new(FakeClient::new()))
    }

    #[test]
    fn required_getters_report_missing_keys() {
        let state = state();
        assert_eq!(
            state.require_server_id(),
            Err(BuildError::MissingState { key: "server_id" })
        );
        assert_eq!(
            state.require_server_ip(),
            Err(BuildError::MissingState { key: "server_ip" })
        );
        assert!(matches!(
            state.require_session(),
            Err(BuildError::MissingState { key: "session" })
        ));
        assert_eq!(state.server_id(), None);
    }

    #[test]
    fn stores_written_values() {
        let mut state = state();
        let ip = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7));
        state.put_server_id("srv-1");
        state.put_server_ip(ip);
        state.put_snapshot("snap-1", "kiln-1");

        assert_eq!(state.require_server_id(), Ok(String::from("srv-1")));
        assert_eq!(state.require_server_ip(), Ok(ip));
        assert_eq!(state.require_snapshot_id(), Ok(String::from("snap-1")));
        assert_eq!(state.require_snapshot_name(), Ok(String::from("kiln-1")));
    }

    #[test]
    fn first_recorded_error_wins() {
        let mut state = state();
        state.record_error(BuildError::Cancelled);
        state.record_error(BuildError::MissingState { key: "server_id" });
        assert_eq!(state.error(), Some(&BuildError::Cancelled));
    }
}
