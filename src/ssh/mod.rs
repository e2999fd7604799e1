//! SSH sessions used for provisioning and graceful shutdown.

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::time::Duration;

use ssh_key::PrivateKey;
use thiserror::Error;

use crate::config::BuildConfig;
use crate::pipeline::BuildError;

mod session;

pub use session::Ssh2Communicator;

/// Future returned by SSH operations.
pub type SshFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SshError>> + Send + 'a>>;

/// Errors raised while connecting to or using an SSH session.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SshError {
    /// Raised when the TCP connection cannot be established.
    #[error("failed to connect to {address}: {message}")]
    Connect {
        /// Address that was dialled.
        address: SocketAddr,
        /// Operating system error.
        message: String,
    },
    /// Raised when the SSH handshake fails.
    #[error("SSH handshake failed: {message}")]
    Handshake {
        /// Library diagnostic.
        message: String,
    },
    /// Raised when the server rejects the credentials.
    #[error("SSH authentication failed for {username}: {message}")]
    Auth {
        /// User that attempted to log in.
        username: String,
        /// Library diagnostic.
        message: String,
    },
    /// Raised when a remote command cannot be started or read.
    #[error("remote command `{command}` failed: {message}")]
    Exec {
        /// Command that was run.
        command: String,
        /// Library diagnostic.
        message: String,
    },
    /// Raised when a remote command does not finish within its bound.
    #[error("remote command `{command}` did not finish within {timeout:?}")]
    TimedOut {
        /// Command that was run.
        command: String,
        /// Bound that elapsed.
        timeout: Duration,
    },
    /// Raised when the blocking SSH task cannot be joined.
    #[error("SSH worker task failed: {message}")]
    Join {
        /// Runtime diagnostic.
        message: String,
    },
}

/// Secret used to authenticate the SSH session.
#[derive(Clone, Eq, PartialEq)]
pub enum SshAuth {
    /// Password authentication.
    Password(String),
    /// Public-key authentication with an OpenSSH private key.
    PrivateKey(String),
}

impl fmt::Debug for SshAuth {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password(_) => formatter.write_str("Password(<redacted>)"),
            Self::PrivateKey(_) => formatter.write_str("PrivateKey(<redacted>)"),
        }
    }
}

/// User and secret for an SSH login.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SshCredentials {
    /// Login user.
    pub username: String,
    /// Authentication secret.
    pub auth: SshAuth,
}

/// An authenticated SSH session.
pub trait RemoteSession: Send + Sync {
    /// Runs `command` and returns its exit status.
    fn exec<'a>(&'a self, command: &'a str) -> SshFuture<'a, i32>;

    /// Runs `command`, giving up once `timeout` elapses.
    ///
    /// Implementations backed by blocking I/O should bound the I/O itself so
    /// no worker thread outlives the call.
    fn exec_with_timeout<'a>(&'a self, command: &'a str, timeout: Duration) -> SshFuture<'a, i32> {
        Box::pin(async move {
            tokio::time::timeout(timeout, self.exec(command))
                .await
                .map_err(|_| SshError::TimedOut {
                    command: command.to_owned(),
                    timeout,
                })?
        })
    }
}

/// Opens SSH sessions.
pub trait Communicator: Send + Sync {
    /// Connects to `address`, completes the handshake, and authenticates.
    fn connect<'a>(
        &'a self,
        address: SocketAddr,
        credentials: &'a SshCredentials,
    ) -> SshFuture<'a, Box<dyn RemoteSession>>;
}

/// Chooses the SSH credentials for a build.
///
/// Stock images use the provider-generated root password. Custom boot
/// sources use the configured password, falling back to the configured
/// private key.
///
/// # Errors
///
/// Returns [`BuildError::MissingState`] when a stock image reported no
/// default password, and [`BuildError::KeyParse`] when the private key is
/// malformed or encrypted.
pub fn resolve_credentials(
    config: &BuildConfig,
    default_password: Option<&str>,
) -> Result<SshCredentials, BuildError> {
    let username = config.ssh_username.clone();
    if !config.uses_custom_boot() {
        let password = default_password.ok_or(BuildError::MissingState {
            key: "default_password",
        })?;
        return Ok(SshCredentials {
            username,
            auth: SshAuth::Password(password.to_owned()),
        });
    }

    if let Some(password) = &config.ssh_password {
        return Ok(SshCredentials {
            username,
            auth: SshAuth::Password(password.clone()),
        });
    }

    let key = config
        .ssh_private_key
        .as_deref()
        .ok_or(BuildError::MissingState {
            key: "ssh_private_key",
        })?;
    parse_private_key(key)?;
    Ok(SshCredentials {
        username,
        auth: SshAuth::PrivateKey(key.to_owned()),
    })
}

/// Parses an unencrypted OpenSSH private key.
///
/// # Errors
///
/// Returns [`BuildError::KeyParse`] when the key is malformed or encrypted.
pub fn parse_private_key(text: &str) -> Result<PrivateKey, BuildError> {
    let key = PrivateKey::from_openssh(text).map_err(|err| BuildError::KeyParse {
        message: err.to_string(),
    })?;
    if key.is_encrypted() {
        return Err(BuildError::KeyParse {
            message: String::from("encrypted private keys are not supported"),
        });
    }
    Ok(key)
}

/// Derives the OpenSSH public key line for a private key.
///
/// # Errors
///
/// Returns [`BuildError::KeyParse`] when the key cannot be parsed or encoded.
pub fn public_key_for(private_key: &str) -> Result<String, BuildError> {
    let key = parse_private_key(private_key)?;
    key.public_key()
        .to_openssh()
        .map_err(|err| BuildError::KeyParse {
            message: err.to_string(),
        })
}
