//! Provisioning hooks run over the build's SSH session.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;
use tracing::info;

use crate::config::BuildConfig;
use crate::ssh::{RemoteSession, SshError};

/// Future returned by [`ProvisionHook::provision`].
pub type HookFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ProvisionError>> + Send + 'a>>;

/// Errors raised by provisioning hooks.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProvisionError {
    /// Raised when the session fails.
    #[error(transparent)]
    Ssh(#[from] SshError),
    /// Raised when a command exits unsuccessfully.
    #[error("`{command}` exited with status {status}")]
    NonZeroExit {
        /// Command that failed.
        command: String,
        /// Exit status reported by the remote shell.
        status: i32,
    },
    /// Raised by hooks for any other failure.
    #[error("{0}")]
    Failed(String),
}

/// Caller-supplied work performed while the server is reachable.
pub trait ProvisionHook: Send + Sync {
    /// Provisions the server behind `session`.
    fn provision<'a>(
        &'a self,
        session: &'a dyn RemoteSession,
        config: &'a BuildConfig,
    ) -> HookFuture<'a>;
}

/// Hook that does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHook;

impl ProvisionHook for NoopHook {
    fn provision<'a>(
        &'a self,
        _session: &'a dyn RemoteSession,
        _config: &'a BuildConfig,
    ) -> HookFuture<'a> {
        Box::pin(std::future::ready(Ok(())))
    }
}

/// Hook that runs the configured provisioning commands in order and stops
/// at the first failure.
#[derive(Clone, Copy, Debug, Default)]
pub struct CommandHook;

impl ProvisionHook for CommandHook {
    fn provision<'a>(
        &'a self,
        session: &'a dyn RemoteSession,
        config: &'a BuildConfig,
    ) -> HookFuture<'a> {
        Box::pin(async move {
            for command in &config.provision_commands {
                info!(command = %command, "running provisioning command");
                let status = session.exec(command).await?;
                if status != 0 {
                    return Err(ProvisionError::NonZeroExit {
                        command: command.clone(),
                        status,
                    });
                }
            }
            Ok(())
        })
    }
}
