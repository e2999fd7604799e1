//! `ssh2`-backed sessions. Blocking library calls run on the tokio
//! blocking pool.

use std::io::{BufRead, BufReader, Read};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use ssh2::Session;
use tracing::debug;

use super::{Communicator, RemoteSession, SshAuth, SshCredentials, SshError, SshFuture};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const LIBSSH2_ERROR_TIMEOUT: i32 = -9;

/// Opens sessions with `libssh2`.
#[derive(Clone, Debug)]
pub struct Ssh2Communicator {
    connect_timeout: Duration,
}

impl Default for Ssh2Communicator {
    fn default() -> Self {
        Self::new()
    }
}

impl Ssh2Communicator {
    /// Creates a communicator with the default per-attempt timeout.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Overrides the per-attempt TCP and handshake timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Communicator for Ssh2Communicator {
    fn connect<'a>(
        &'a self,
        address: SocketAddr,
        credentials: &'a SshCredentials,
    ) -> SshFuture<'a, Box<dyn RemoteSession>> {
        let owned = credentials.clone();
        let timeout = self.connect_timeout;
        Box::pin(async move {
            let session =
                tokio::task::spawn_blocking(move || open_session(address, &owned, timeout))
                    .await
                    .map_err(|err| SshError::Join {
                        message: err.to_string(),
                    })??;
            Ok(Box::new(session) as Box<dyn RemoteSession>)
        })
    }
}

fn open_session(
    address: SocketAddr,
    credentials: &SshCredentials,
    timeout: Duration,
) -> Result<Ssh2Session, SshError> {
    debug!(%address, username = %credentials.username, "trying SSH");
    let stream =
        TcpStream::connect_timeout(&address, timeout).map_err(|err| SshError::Connect {
            address,
            message: err.to_string(),
        })?;

    let handshake_error = |err: ssh2::Error| SshError::Handshake {
        message: err.to_string(),
    };
    let mut session = Session::new().map_err(handshake_error)?;
    session.set_timeout(timeout_millis(timeout));
    session.set_tcp_stream(stream);
    session.handshake().map_err(handshake_error)?;

    let username = credentials.username.as_str();
    let auth_error = |err: ssh2::Error| SshError::Auth {
        username: username.to_owned(),
        message: err.to_string(),
    };
    match &credentials.auth {
        SshAuth::Password(password) => session.userauth_password(username, password),
        SshAuth::PrivateKey(key) => session.userauth_pubkey_memory(username, None, key, None),
    }
    .map_err(auth_error)?;
    if !session.authenticated() {
        return Err(SshError::Auth {
            username: username.to_owned(),
            message: String::from("server did not accept the credentials"),
        });
    }

    // Commands such as provisioning scripts may run far longer than a
    // connection attempt.
    session.set_timeout(0);
    debug!(%address, "established SSH connection");
    Ok(Ssh2Session { session })
}

struct Ssh2Session {
    session: Session,
}

impl RemoteSession for Ssh2Session {
    fn exec<'a>(&'a self, command: &'a str) -> SshFuture<'a, i32> {
        let session = self.session.clone();
        let owned = command.to_owned();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || run_command(&session, &owned))
                .await
                .map_err(|err| SshError::Join {
                    message: err.to_string(),
                })?
        })
    }

    fn exec_with_timeout<'a>(&'a self, command: &'a str, timeout: Duration) -> SshFuture<'a, i32> {
        let session = self.session.clone();
        let owned = command.to_owned();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                session.set_timeout(timeout_millis(timeout));
                let result = run_command(&session, &owned).map_err(|err| match err {
                    SshError::Exec { command: failed, .. } if session_timed_out(&session) => {
                        SshError::TimedOut {
                            command: failed,
                            timeout,
                        }
                    }
                    other => other,
                });
                session.set_timeout(0);
                result
            })
            .await
            .map_err(|err| SshError::Join {
                message: err.to_string(),
            })?
        })
    }
}

/// Converts a bound to the millisecond form libssh2 expects. Zero would
/// mean "wait forever", so the smallest bound is one millisecond.
fn timeout_millis(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX).max(1)
}

fn session_timed_out(session: &Session) -> bool {
    matches!(
        ssh2::Error::last_session_error(session).map(|err| err.code()),
        Some(ssh2::ErrorCode::Session(LIBSSH2_ERROR_TIMEOUT))
    )
}

fn run_command(session: &Session, command: &str) -> Result<i32, SshError> {
    let exec_error = |err: &dyn std::fmt::Display| SshError::Exec {
        command: command.to_owned(),
        message: err.to_string(),
    };
    debug!(command, "executing command over SSH");

    let mut channel = session.channel_session().map_err(|err| exec_error(&err))?;
    channel.exec(command).map_err(|err| exec_error(&err))?;

    let mut stdout = BufReader::new(channel.stream(0));
    let mut line = String::new();
    loop {
        line.clear();
        match stdout.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => debug!(command, "{}", line.trim_end()),
            Err(err) => return Err(exec_error(&err)),
        }
    }
    drop(stdout);

    let mut stderr = String::new();
    channel
        .stderr()
        .read_to_string(&mut stderr)
        .map_err(|err| exec_error(&err))?;
    for text in stderr.lines() {
        debug!(command, stderr = text);
    }

    channel.wait_close().map_err(|err| exec_error(&err))?;
    let status = channel.exit_status().map_err(|err| exec_error(&err))?;
    debug!(command, status, "command finished");
    Ok(status)
}
