//! Compute provider abstraction used by the build pipeline.

use std::future::Future;
use std::pin::Pin;

mod error;
mod types;

pub use error::ClientError;
pub use types::{
    BootSource, ParamKind, PowerStatus, ServerInfo, ServerRequest, ServerRequestBuilder,
    ServerStatus, SnapshotInfo, SnapshotStatus,
};

/// Future returned by client operations.
pub type ClientFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ClientError>> + Send + 'a>>;

/// Remote operations the pipeline needs from a compute provider.
///
/// Every method is a single request/response call; polling for state
/// transitions is the caller's job.
pub trait ComputeClient: Send + Sync {
    /// Registers an SSH public key and returns its provider identifier.
    fn create_ssh_key<'a>(&'a self, name: &'a str, public_key: &'a str)
    -> ClientFuture<'a, String>;

    /// Removes a previously registered SSH key.
    fn delete_ssh_key<'a>(&'a self, key_id: &'a str) -> ClientFuture<'a, ()>;

    /// Creates a server and returns its identifier.
    fn create_server<'a>(&'a self, request: &'a ServerRequest) -> ClientFuture<'a, String>;

    /// Fetches the current state of a server.
    fn server_info<'a>(&'a self, server_id: &'a str) -> ClientFuture<'a, ServerInfo>;

    /// Destroys a server.
    fn delete_server<'a>(&'a self, server_id: &'a str) -> ClientFuture<'a, ()>;

    /// Forcefully powers a server off.
    fn halt_server<'a>(&'a self, server_id: &'a str) -> ClientFuture<'a, ()>;

    /// Starts a snapshot of a server and returns the snapshot identifier.
    fn create_snapshot<'a>(
        &'a self,
        server_id: &'a str,
        description: &'a str,
    ) -> ClientFuture<'a, String>;

    /// Fetches the current state of a snapshot.
    fn snapshot_info<'a>(&'a self, snapshot_id: &'a str) -> ClientFuture<'a, SnapshotInfo>;

    /// Deletes a snapshot.
    fn delete_snapshot<'a>(&'a self, snapshot_id: &'a str) -> ClientFuture<'a, ()>;

    /// Resolves a human label (for example a region city) to an identifier.
    fn resolve_id<'a>(&'a self, kind: ParamKind, label: &'a str) -> ClientFuture<'a, String>;

    /// Resolves an identifier back to its human label.
    fn resolve_label<'a>(&'a self, kind: ParamKind, id: &'a str) -> ClientFuture<'a, String>;
}
