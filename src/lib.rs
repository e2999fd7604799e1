//! Core library for the kiln snapshot builder.
//!
//! The crate provisions a Vultr server, waits for it to become reachable
//! over SSH, hands the session to a provisioning hook, powers the server
//! off, and captures it as a snapshot. Every step that creates a remote
//! resource knows how to undo it, so a failed or cancelled build unwinds
//! in reverse order and leaves nothing billable behind.

pub mod artifact;
pub mod builder;
pub mod client;
pub mod config;
pub mod pipeline;
pub mod provision;
pub mod ssh;
pub mod steps;
#[cfg(test)]
pub mod test_helpers;
pub mod test_support;
pub mod vultr;

pub use artifact::{Artifact, BUILDER_ID};
pub use builder::Builder;
pub use client::{ClientError, ComputeClient};
pub use config::{BuildConfig, BuilderConfig, ConfigError, ValidationErrors};
pub use pipeline::{BuildError, BuildFailure, CancelHandle, CleanupWarning, RunnerStatus};
pub use provision::{CommandHook, NoopHook, ProvisionHook};
pub use ssh::{Communicator, RemoteSession, Ssh2Communicator};
pub use vultr::VultrClient;
