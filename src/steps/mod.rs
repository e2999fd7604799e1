//! The concrete steps of a snapshot build, in execution order.

mod connect;
mod create_server;
mod halt;
mod provision;
mod server_info;
mod shutdown;
mod snapshot;

pub use connect::Connect;
pub use create_server::CreateServer;
pub use halt::Halt;
pub use provision::Provision;
pub use server_info::WaitForServer;
pub use shutdown::Shutdown;
pub use snapshot::Snapshot;

#[cfg(test)]
mod tests;
